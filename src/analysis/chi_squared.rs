//! Chi-squared test of independence between assignment and conversion.

use serde::Serialize;

use super::conversion::tally;
use super::special::chi_squared_sf;
use super::{AnalysisError, ColumnSelection};
use crate::warehouse::QueryResult;

/// Assignment x converted contingency table and test outcome
#[derive(Debug, Clone, Serialize)]
pub struct ChiSquaredResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    /// Assignment labels, one per table row
    pub row_labels: Vec<String>,
    /// Observed conversion outcomes, one per table column
    pub column_labels: Vec<bool>,
    pub observed: Vec<Vec<u64>>,
    pub expected: Vec<Vec<f64>>,
}

impl ChiSquaredResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Run the test on the rows of `result`
pub fn chi_squared_test(
    result: &QueryResult,
    selection: &ColumnSelection,
) -> Result<ChiSquaredResult, AnalysisError> {
    let groups = tally(result, selection)?.groups;

    // Cross-tab columns: only outcomes that occur at least once
    let any_failures = groups.values().any(|&(count, conv)| count > conv);
    let any_conversions = groups.values().any(|&(_, conv)| conv > 0);
    let column_labels: Vec<bool> = [(false, any_failures), (true, any_conversions)]
        .into_iter()
        .filter_map(|(label, present)| present.then_some(label))
        .collect();

    let row_labels: Vec<String> = groups.keys().cloned().collect();
    let observed: Vec<Vec<u64>> = groups
        .values()
        .map(|&(count, conv)| {
            column_labels
                .iter()
                .map(|&converted| if converted { conv } else { count - conv })
                .collect()
        })
        .collect();

    contingency_test(row_labels, column_labels, observed)
}

/// Pearson's chi-squared on an observed table, with Yates' correction when dof is 1
fn contingency_test(
    row_labels: Vec<String>,
    column_labels: Vec<bool>,
    observed: Vec<Vec<u64>>,
) -> Result<ChiSquaredResult, AnalysisError> {
    let rows = observed.len();
    let cols = column_labels.len();
    let row_totals: Vec<f64> = observed
        .iter()
        .map(|r| r.iter().sum::<u64>() as f64)
        .collect();
    let col_totals: Vec<f64> = (0..cols)
        .map(|j| observed.iter().map(|r| r[j]).sum::<u64>() as f64)
        .collect();
    let total: f64 = row_totals.iter().sum();

    let expected: Vec<Vec<f64>> = row_totals
        .iter()
        .map(|rt| col_totals.iter().map(|ct| rt * ct / total).collect())
        .collect();
    if expected.iter().flatten().any(|&e| e == 0.0) {
        return Err(AnalysisError::ZeroExpectedFrequency);
    }

    let dof = rows.saturating_sub(1) * cols.saturating_sub(1);
    let (statistic, p_value) = if dof == 0 {
        (0.0, 1.0)
    } else {
        let statistic: f64 = observed
            .iter()
            .flatten()
            .zip(expected.iter().flatten())
            .map(|(&o, &e)| {
                let mut diff = (o as f64 - e).abs();
                if dof == 1 {
                    diff -= diff.min(0.5);
                }
                diff * diff / e
            })
            .sum();
        (statistic, chi_squared_sf(statistic, dof))
    };

    Ok(ChiSquaredResult {
        statistic,
        p_value,
        dof,
        row_labels,
        column_labels,
        observed,
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{ab_result, selection};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_two_by_two_uses_yates_correction() {
        let result = ab_result(&[("A", 100, 10), ("B", 100, 20)]);
        let test = chi_squared_test(&result, &selection()).unwrap();

        assert_eq!(test.dof, 1);
        assert_eq!(test.row_labels, vec!["A", "B"]);
        assert_eq!(test.column_labels, vec![false, true]);
        assert_eq!(test.observed, vec![vec![90, 10], vec![80, 20]]);
        assert_close(test.expected[0][0], 85.0, 1e-12);
        assert_close(test.expected[1][1], 15.0, 1e-12);
        assert_close(test.statistic, 3.176_470_588_235_294, 1e-9);
        assert_close(test.p_value, 0.074_705_933_312_130_46, 1e-6);
        assert!(!test.is_significant(0.05));
        assert!(test.is_significant(0.1));
    }

    #[test]
    fn test_three_groups_no_correction() {
        let result = ab_result(&[("A", 100, 50), ("B", 100, 60), ("C", 100, 70)]);
        let test = chi_squared_test(&result, &selection()).unwrap();

        assert_eq!(test.dof, 2);
        assert_close(test.statistic, 25.0 / 3.0, 1e-9);
        assert_close(test.p_value, 0.015_503_853_599_009_314, 1e-9);
        assert!(test.is_significant(0.05));
    }

    #[test]
    fn test_single_outcome_has_zero_dof() {
        // Nobody converted: the table has a single column
        let result = ab_result(&[("A", 10, 0), ("B", 12, 0)]);
        let test = chi_squared_test(&result, &selection()).unwrap();

        assert_eq!(test.column_labels, vec![false]);
        assert_eq!(test.dof, 0);
        assert_eq!(test.statistic, 0.0);
        assert_eq!(test.p_value, 1.0);
    }

    #[test]
    fn test_zero_expected_frequency() {
        let err = contingency_test(
            vec!["A".into(), "B".into()],
            vec![false, true],
            vec![vec![5, 0], vec![0, 0]],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ZeroExpectedFrequency));
    }

    #[test]
    fn test_small_differences_are_clamped_by_correction() {
        // |O - E| below 0.5 contributes nothing after Yates' correction
        let result = ab_result(&[("A", 10, 5), ("B", 10, 5)]);
        let test = chi_squared_test(&result, &selection()).unwrap();
        assert_eq!(test.statistic, 0.0);
        assert_close(test.p_value, 1.0, 1e-12);
    }
}
