//! Conformal prediction interval machinery.
//!
//! Only the single-level, symmetric case is needed here: the evaluator
//! always asks for the 95th percentile of absolute holdout residuals per
//! bucket (spec.md §4.6), not a user-chosen coverage level.

use crate::error::{ForecastError, Result};

/// The `(1 - alpha)` quantile of absolute residuals — a plain
/// linear-interpolated percentile (`np.percentile(residuals, 95)` for
/// `alpha = 0.05`), matching spec.md §4.6 and the GLOSSARY's definition of
/// the interval width as "the 95th percentile of absolute ML residuals".
/// Deliberately not the split-conformal finite-sample correction
/// (`ceil((n+1)(1-alpha))/n`, which clamps to the max residual for the
/// small per-bucket holdouts this engine produces).
pub fn conformal_quantile(residuals: &[f64], alpha: f64) -> Result<f64> {
    if residuals.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    if !(0.0..1.0).contains(&alpha) {
        return Err(ForecastError::InvalidInput(
            "alpha must be between 0 and 1 (exclusive)".to_string(),
        ));
    }

    let mut abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    abs_residuals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(compute_quantile(&abs_residuals, 1.0 - alpha))
}

fn compute_quantile(sorted_data: &[f64], quantile: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }
    if quantile <= 0.0 {
        return sorted_data[0];
    }
    if quantile >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }
    let n = sorted_data.len();
    let index = quantile * (n - 1) as f64;
    let lower_idx = index.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = index - lower_idx as f64;
    sorted_data[lower_idx] * (1.0 - fraction) + sorted_data[upper_idx] * fraction
}
