//! Beta posterior of each variant's conversion rate.
//!
//! With a uniform Beta(1, 1) prior, observing `s` conversions and `f`
//! non-conversions gives a Beta(s + 1, f + 1) posterior.

use serde::Serialize;

use super::conversion::{VARIANT_A, VARIANT_B, tally};
use super::special::beta_pdf;
use super::{AnalysisError, ColumnSelection};
use crate::warehouse::QueryResult;

/// Standard deviations either side of the mean that a chart needs to show
const SUPPORT_WIDTH: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct PosteriorCurve {
    pub variant: String,
    pub alpha: f64,
    pub beta: f64,
}

impl PosteriorCurve {
    pub fn new(variant: String, successes: u64, failures: u64) -> Self {
        PosteriorCurve {
            variant,
            alpha: successes as f64 + 1.0,
            beta: failures as f64 + 1.0,
        }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn std_dev(&self) -> f64 {
        let n = self.alpha + self.beta;
        (self.alpha * self.beta / (n * n * (n + 1.0))).sqrt()
    }

    /// Rates within `SUPPORT_WIDTH` standard deviations of the mean, clamped to [0, 1]
    pub fn support(&self) -> (f64, f64) {
        let spread = SUPPORT_WIDTH * self.std_dev();
        let mean = self.mean();
        ((mean - spread).max(0.0), (mean + spread).min(1.0))
    }

    /// Density at `n` evenly spaced rates in [lo, hi]
    pub fn density_between(&self, lo: f64, hi: f64, n: usize) -> Vec<(f64, f64)> {
        sample_density(self.alpha, self.beta, lo, hi, n)
    }

    /// Legend label, e.g. "A (a=11, b=91)"
    pub fn label(&self) -> String {
        format!("{} (a={}, b={})", self.variant, self.alpha, self.beta)
    }
}

fn sample_density(alpha: f64, beta: f64, lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
    match points {
        0 => Vec::new(),
        1 => {
            let x = (lo + hi) / 2.0;
            vec![(x, beta_pdf(x, alpha, beta))]
        }
        n => (0..n)
            .map(|i| {
                let x = lo + (hi - lo) * i as f64 / (n - 1) as f64;
                (x, beta_pdf(x, alpha, beta))
            })
            .collect(),
    }
}

/// Posterior curves for variants A and B
pub fn posterior_curves(
    result: &QueryResult,
    selection: &ColumnSelection,
) -> Result<Vec<PosteriorCurve>, AnalysisError> {
    let tally = tally(result, selection)?;
    // NULL assignments count as a third label here
    let groups = tally.groups;
    let is_ab = tally.unassigned == 0
        && groups.len() == 2
        && groups.contains_key(VARIANT_A)
        && groups.contains_key(VARIANT_B);
    if !is_ab {
        return Err(AnalysisError::NotAbAssignment);
    }

    Ok(groups
        .into_iter()
        .map(|(variant, (count, conversions))| {
            PosteriorCurve::new(variant, conversions, count - conversions)
        })
        .collect())
}
