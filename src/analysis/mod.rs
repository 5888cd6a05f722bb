//! A/B comparison of two product events over a query result.
//!
//! The assignment column splits rows into variants; a row converts when its
//! second event column is not NULL. From that, this module derives:
//! - conversion rates per variant and the lift of B over A
//! - a chi-squared test of independence between variant and conversion
//! - Beta posterior densities of each variant's conversion rate

mod chi_squared;
mod conversion;
mod posterior;
mod report;
mod special;

pub use chi_squared::{ChiSquaredResult, chi_squared_test};
pub use conversion::{ConversionSummary, conversion_rates};
pub use posterior::{PosteriorCurve, posterior_curves};
pub use report::{AbTestReport, DEFAULT_ALPHA, format_percent};

use serde::Serialize;
use thiserror::Error;

/// Which result columns play which role in the comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSelection {
    /// Exposure event
    pub event1: String,
    /// Conversion event; a non-NULL cell means the row converted
    pub event2: String,
    /// Variant label for each row
    pub assignment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("the query returned no rows")]
    EmptyResult,

    #[error("column '{0}' is not in the query result")]
    MissingColumn(String),

    #[error("a cell of the contingency table has an expected frequency of zero")]
    ZeroExpectedFrequency,

    #[error("the assignment column must hold exactly the two variants A and B")]
    NotAbAssignment,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ColumnSelection;
    use crate::warehouse::{Column, QueryResult, Value};

    pub fn selection() -> ColumnSelection {
        ColumnSelection {
            event1: "viewed".into(),
            event2: "purchased".into(),
            assignment: "assignment".into(),
        }
    }

    /// Build a result from `(variant, rows, conversions)` triples
    pub fn ab_result(groups: &[(&str, usize, usize)]) -> QueryResult {
        let mut rows = Vec::new();
        for &(variant, count, conversions) in groups {
            for i in 0..count {
                let purchased = if i < conversions {
                    Value::String("2025-01-02".into())
                } else {
                    Value::Null
                };
                rows.push(vec![
                    Value::String("2025-01-01".into()),
                    purchased,
                    Value::String(variant.to_string()),
                ]);
            }
        }
        QueryResult::new(
            vec![
                Column::new("viewed", "STRING"),
                Column::new("purchased", "STRING"),
                Column::new("assignment", "STRING"),
            ],
            rows,
        )
    }
}
