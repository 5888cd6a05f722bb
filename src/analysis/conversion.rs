//! Conversion rates per assignment group and the B-over-A lift.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{AnalysisError, ColumnSelection};
use crate::warehouse::{QueryResult, Value};

pub const VARIANT_A: &str = "A";
pub const VARIANT_B: &str = "B";

/// Conversion counts for one assignment group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantConversion {
    pub assignment: String,
    /// Rows in the group
    pub count: u64,
    /// Rows whose conversion event is present
    pub conversions: u64,
    pub conversion_rate: f64,
}

impl VariantConversion {
    pub fn failures(&self) -> u64 {
        self.count - self.conversions
    }
}

/// Per-group conversion rates plus the relative change of B over A
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    /// Sorted by assignment label
    pub variants: Vec<VariantConversion>,
    /// `(rate_B - rate_A) / rate_A`, only for exactly the groups A and B
    pub lift: Option<f64>,
}

impl ConversionSummary {
    pub fn variant(&self, label: &str) -> Option<&VariantConversion> {
        self.variants.iter().find(|v| v.assignment == label)
    }

    /// True when the groups are exactly A and B
    pub fn is_ab(&self) -> bool {
        self.variants.len() == 2
            && self.variant(VARIANT_A).is_some()
            && self.variant(VARIANT_B).is_some()
    }
}

/// Per-label (count, conversions), plus rows left out for a NULL assignment
#[derive(Debug, Clone, Default)]
pub(crate) struct Tally {
    pub groups: BTreeMap<String, (u64, u64)>,
    pub unassigned: u64,
}

/// Tally (count, conversions) per assignment label.
///
/// Rows with a NULL assignment belong to no group. A row counts as converted
/// when its conversion-event cell is neither NULL nor NaN.
pub(crate) fn tally(result: &QueryResult, selection: &ColumnSelection) -> Result<Tally, AnalysisError> {
    if result.is_empty() {
        return Err(AnalysisError::EmptyResult);
    }
    let column = |name: &str| {
        result
            .column_index(name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    };
    // The exposure column only needs to exist
    column(&selection.event1)?;
    let event2 = column(&selection.event2)?;
    let assignment = column(&selection.assignment)?;

    let mut tally = Tally::default();
    let cells = result
        .column_values(assignment)
        .zip(result.column_values(event2));
    for (label, outcome) in cells {
        if label.is_missing() {
            tally.unassigned += 1;
            continue;
        }
        let entry = tally.groups.entry(label.to_string()).or_insert((0, 0));
        entry.0 += 1;
        if !outcome.is_missing() {
            entry.1 += 1;
        }
    }
    Ok(tally)
}

/// Conversion rate of each assignment group; rows without an assignment are skipped
pub fn conversion_rates(
    result: &QueryResult,
    selection: &ColumnSelection,
) -> Result<ConversionSummary, AnalysisError> {
    let variants: Vec<VariantConversion> = tally(result, selection)?
        .groups
        .into_iter()
        .map(|(assignment, (count, conversions))| VariantConversion {
            assignment,
            count,
            conversions,
            conversion_rate: conversions as f64 / count as f64,
        })
        .collect();

    let mut summary = ConversionSummary {
        variants,
        lift: None,
    };
    if summary.is_ab() {
        summary.lift = match (summary.variant(VARIANT_A), summary.variant(VARIANT_B)) {
            (Some(a), Some(b)) if a.conversion_rate > 0.0 => {
                Some((b.conversion_rate - a.conversion_rate) / a.conversion_rate)
            }
            _ => None,
        };
    }
    Ok(summary)
}
