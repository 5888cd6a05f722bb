//! Everything the comparison produces for one result, plus its wording.

use serde::Serialize;
use serde_json::json;

use super::{
    AnalysisError, ChiSquaredResult, ColumnSelection, ConversionSummary, PosteriorCurve,
    chi_squared_test, conversion_rates, posterior_curves,
};
use crate::warehouse::QueryResult;

/// Significance level for the chi-squared verdict
pub const DEFAULT_ALPHA: f64 = 0.05;

const COLUMN_PROBLEM: &str = "There was a problem with one of your column selections, or there is not both A and B assignments in your data";
const NO_LIFT: &str =
    "Could not calculate lift/drop, ensure you have a proper assignment column with values A and B";
const NO_CHI_SQUARED: &str =
    "There was a problem with your column selections, could not perform chi-squared test";
const NO_POSTERIOR: &str = "Could not create posterior distribution chart. Ensure there are exactly two assignments named A and B";

/// Format a ratio as a percentage with two decimals (0.1234 -> "12.34%")
pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Results of every comparison step.
///
/// Each step runs independently so a failure in one does not hide the others.
#[derive(Debug, Clone)]
pub struct AbTestReport {
    pub selection: ColumnSelection,
    pub alpha: f64,
    pub conversion: Result<ConversionSummary, AnalysisError>,
    pub chi_squared: Result<ChiSquaredResult, AnalysisError>,
    pub posterior: Result<Vec<PosteriorCurve>, AnalysisError>,
}

impl AbTestReport {
    pub fn build(result: &QueryResult, selection: ColumnSelection, alpha: f64) -> Self {
        let conversion = conversion_rates(result, &selection);
        let chi_squared = chi_squared_test(result, &selection);
        let posterior = posterior_curves(result, &selection);
        for err in [
            conversion.as_ref().err(),
            chi_squared.as_ref().err(),
            posterior.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        {
            tracing::debug!(error = %err, "comparison step unavailable");
        }

        AbTestReport {
            selection,
            alpha,
            conversion,
            chi_squared,
            posterior,
        }
    }

    /// The lift/drop sentence, or why it could not be computed
    pub fn lift_message(&self) -> String {
        match &self.conversion {
            Ok(summary) => match summary.lift {
                Some(lift) => format!(
                    "Lift/Drop of Variant B compared to Variant A: {}",
                    format_percent(lift)
                ),
                None => NO_LIFT.to_string(),
            },
            Err(_) => COLUMN_PROBLEM.to_string(),
        }
    }

    /// Chi-squared statistics followed by the hypothesis verdict
    pub fn chi_squared_lines(&self) -> Vec<String> {
        let test = match &self.chi_squared {
            Ok(test) => test,
            Err(_) => return vec![NO_CHI_SQUARED.to_string()],
        };
        let verdict = if test.is_significant(self.alpha) {
            format!(
                "Since the p-value ({:.4}) is less than alpha ({}), we reject the null hypothesis. There is a statistically significant difference in conversion rates between the variants.",
                test.p_value, self.alpha
            )
        } else {
            format!(
                "Since the p-value ({:.4}) is greater than alpha ({}), we fail to reject the null hypothesis. There is no statistically significant difference in conversion rates between the variants.",
                test.p_value, self.alpha
            )
        };
        vec![
            "Chi-Squared Test Results:".to_string(),
            format!("Chi-Squared Statistic: {:.4}", test.statistic),
            format!("P-value: {:.4}", test.p_value),
            format!("Degrees of Freedom: {}", test.dof),
            verdict,
        ]
    }

    /// Posterior summary lines, or why the posterior is unavailable
    pub fn posterior_lines(&self) -> Vec<String> {
        match &self.posterior {
            Ok(curves) => curves
                .iter()
                .map(|c| format!("{}  mean {}", c.label(), format_percent(c.mean())))
                .collect(),
            Err(_) => vec![NO_POSTERIOR.to_string()],
        }
    }

    /// Plain-text rendering for the headless report
    pub fn render_text(&self) -> String {
        let mut lines = vec!["Conversion Rate by Assignment".to_string()];
        match &self.conversion {
            Ok(summary) => {
                let width = summary
                    .variants
                    .iter()
                    .map(|v| v.assignment.len())
                    .max()
                    .unwrap_or(0);
                for v in &summary.variants {
                    lines.push(format!(
                        "  {:<width$}  {:>7}  ({} / {})",
                        v.assignment,
                        format_percent(v.conversion_rate),
                        v.conversions,
                        v.count
                    ));
                }
            }
            Err(err) => lines.push(format!("  {COLUMN_PROBLEM} ({err})")),
        }
        lines.push(self.lift_message());
        lines.push(String::new());
        lines.extend(self.chi_squared_lines());
        lines.push(String::new());
        lines.push("Posterior Distribution of Conversion Rates".to_string());
        lines.extend(self.posterior_lines().into_iter().map(|l| format!("  {l}")));
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// JSON rendering for the headless report
    pub fn to_json(&self) -> serde_json::Value {
        let posterior = self.posterior.as_ref().map(|curves| {
            curves
                .iter()
                .map(|c| {
                    json!({
                        "variant": c.variant,
                        "alpha": c.alpha,
                        "beta": c.beta,
                        "mean": c.mean(),
                    })
                })
                .collect::<Vec<_>>()
        });
        let significant = self
            .chi_squared
            .as_ref()
            .ok()
            .map(|t| t.is_significant(self.alpha));

        json!({
            "selection": self.selection,
            "alpha": self.alpha,
            "conversion": section(&self.conversion),
            "chi_squared": section(&self.chi_squared),
            "significant": significant,
            "posterior": section(&posterior),
        })
    }
}

fn section<T: Serialize, E: std::fmt::Display>(outcome: &Result<T, E>) -> serde_json::Value {
    match outcome {
        Ok(value) => json!({ "ok": true, "value": value }),
        Err(err) => json!({ "ok": false, "error": err.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{ab_result, selection};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.5), "50.00%");
        assert_eq!(format_percent(-0.125), "-12.50%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn test_text_report_for_ab_data() {
        let result = ab_result(&[("A", 100, 10), ("B", 100, 20)]);
        let report = AbTestReport::build(&result, selection(), DEFAULT_ALPHA);

        let expected = "\
Conversion Rate by Assignment
  A   10.00%  (10 / 100)
  B   20.00%  (20 / 100)
Lift/Drop of Variant B compared to Variant A: 100.00%

Chi-Squared Test Results:
Chi-Squared Statistic: 3.1765
P-value: 0.0747
Degrees of Freedom: 1
Since the p-value (0.0747) is greater than alpha (0.05), we fail to reject the null hypothesis. There is no statistically significant difference in conversion rates between the variants.

Posterior Distribution of Conversion Rates
  A (a=11, b=91)  mean 10.78%
  B (a=21, b=81)  mean 20.59%
";
        assert_eq!(report.render_text(), expected);
    }

    #[test]
    fn test_unassigned_rows_leave_ab_comparison_intact() {
        use crate::warehouse::Value;

        let mut result = ab_result(&[("A", 100, 10), ("B", 100, 20)]);
        result
            .rows
            .push(vec![Value::String("2025-01-01".into()), Value::Null, Value::Null]);
        let report = AbTestReport::build(&result, selection(), DEFAULT_ALPHA);

        assert_eq!(
            report.lift_message(),
            "Lift/Drop of Variant B compared to Variant A: 100.00%"
        );
        let lines = report.chi_squared_lines();
        assert_eq!(lines[1], "Chi-Squared Statistic: 3.1765");
        assert_eq!(lines[2], "P-value: 0.0747");
        assert_eq!(lines[3], "Degrees of Freedom: 1");
        // The posterior still requires every row to be A or B
        assert_eq!(report.posterior_lines(), vec![NO_POSTERIOR.to_string()]);
    }

    #[test]
    fn test_significant_verdict() {
        let result = ab_result(&[("A", 500, 50), ("B", 500, 100)]);
        let report = AbTestReport::build(&result, selection(), DEFAULT_ALPHA);
        let lines = report.chi_squared_lines();
        assert!(lines[4].starts_with("Since the p-value (0.0000) is less than alpha (0.05)"));
    }

    #[test]
    fn test_unavailable_steps_explain_themselves() {
        let result = ab_result(&[("A", 10, 1), ("B", 10, 2), ("C", 10, 3)]);
        let report = AbTestReport::build(&result, selection(), DEFAULT_ALPHA);

        assert_eq!(report.lift_message(), NO_LIFT);
        assert_eq!(report.posterior_lines(), vec![NO_POSTERIOR.to_string()]);
        // The chi-squared test still runs on three groups
        assert_eq!(report.chi_squared_lines()[3], "Degrees of Freedom: 2");

        let mut bad = selection();
        bad.assignment = "variant".into();
        let report = AbTestReport::build(&result, bad, DEFAULT_ALPHA);
        assert_eq!(report.lift_message(), COLUMN_PROBLEM);
        assert_eq!(report.chi_squared_lines(), vec![NO_CHI_SQUARED.to_string()]);
    }

    #[test]
    fn test_json_report() {
        let result = ab_result(&[("A", 100, 10), ("B", 100, 20)]);
        let report = AbTestReport::build(&result, selection(), 0.1);
        let json = report.to_json();

        assert_eq!(json["alpha"], 0.1);
        assert_eq!(json["selection"]["assignment"], "assignment");
        assert_eq!(json["conversion"]["ok"], true);
        assert_eq!(json["conversion"]["value"]["variants"][1]["conversions"], 20);
        assert_eq!(json["chi_squared"]["value"]["dof"], 1);
        assert_eq!(json["significant"], true);
        assert_eq!(json["posterior"]["value"][0]["alpha"], 11.0);
    }

    #[test]
    fn test_json_report_errors() {
        let result = ab_result(&[("control", 10, 1), ("test", 10, 2)]);
        let report = AbTestReport::build(&result, selection(), DEFAULT_ALPHA);
        let json = report.to_json();

        assert_eq!(json["conversion"]["ok"], true);
        assert!(json["conversion"]["value"]["lift"].is_null());
        assert_eq!(json["posterior"]["ok"], false);
        assert_eq!(
            json["posterior"]["error"],
            "the assignment column must hold exactly the two variants A and B"
        );
    }
}
