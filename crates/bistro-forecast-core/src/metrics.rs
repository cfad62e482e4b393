//! Restaurant-specific forecast accuracy metrics (spec.md GLOSSARY).

use crate::error::{ForecastError, Result};

fn validate(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::InvalidInput(format!(
            "actual and predicted must have the same length: {} vs {}",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}

/// Weighted Mean Absolute Percentage Error: `sum(|actual-pred|) / sum(|actual|)`.
pub fn wmape(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    let denom: f64 = actual.iter().map(|a| a.abs()).sum();
    if denom == 0.0 {
        return Ok(0.0);
    }
    let numer: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(numer / denom)
}

fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean Absolute Scaled Error, scaled against a seasonal reference series
/// (lag-168) rather than the usual one-step-back naive.
pub fn mase(actual: &[f64], predicted: &[f64], seasonal_reference: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    if actual.len() != seasonal_reference.len() {
        return Err(ForecastError::InvalidInput(
            "actual and seasonal_reference must have the same length".to_string(),
        ));
    }
    let model_mae = mae(actual, predicted);
    let naive_mae = mae(actual, seasonal_reference);
    if naive_mae == 0.0 {
        return Ok(0.0);
    }
    Ok(model_mae / naive_mae)
}

/// Signed bias: `mean(pred - actual) / mean(actual)`. Positive = over-forecast.
pub fn bias(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    let mean_actual = actual.iter().sum::<f64>() / actual.len() as f64;
    if mean_actual == 0.0 {
        return Ok(0.0);
    }
    let mean_err = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| p - a)
        .sum::<f64>()
        / actual.len() as f64;
    Ok(mean_err / mean_actual)
}

/// Fraction of consecutive pairs where the sign of the first difference of
/// predictions matches that of actuals.
pub fn directional_accuracy(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate(actual, predicted)?;
    if actual.len() < 2 {
        return Ok(0.0);
    }
    let mut correct = 0usize;
    let mut total = 0usize;
    for w in actual.windows(2).zip(predicted.windows(2)) {
        let (a, p) = w;
        let actual_up = a[1] - a[0] >= 0.0;
        let pred_up = p[1] - p[0] >= 0.0;
        if actual_up == pred_up {
            correct += 1;
        }
        total += 1;
    }
    Ok(correct as f64 / total as f64)
}

/// Fraction of actuals that fall inside `[lower, upper]`.
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    if actual.len() != lower.len() || actual.len() != upper.len() {
        return Err(ForecastError::InvalidInput(
            "actual, lower, and upper must have the same length".to_string(),
        ));
    }
    if actual.is_empty() {
        return Ok(0.0);
    }
    let within = actual
        .iter()
        .zip(lower.iter())
        .zip(upper.iter())
        .filter(|((a, l), u)| **a >= **l && **a <= **u)
        .count();
    Ok(within as f64 / actual.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wmape_zero_for_perfect_forecast() {
        let actual = vec![10.0, 20.0, 30.0];
        assert_relative_eq!(wmape(&actual, &actual).unwrap(), 0.0);
    }

    #[test]
    fn wmape_handles_all_zero_actuals() {
        assert_eq!(wmape(&[0.0, 0.0], &[5.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn mase_below_one_means_better_than_seasonal_reference() {
        let actual = vec![10.0, 10.0, 10.0, 10.0];
        let predicted = vec![10.0, 10.0, 10.0, 10.0];
        let seasonal = vec![5.0, 15.0, 5.0, 15.0];
        let value = mase(&actual, &predicted, &seasonal).unwrap();
        assert_relative_eq!(value, 0.0);
    }

    #[test]
    fn bias_is_positive_for_over_forecast() {
        let actual = vec![10.0, 10.0];
        let predicted = vec![12.0, 12.0];
        assert_relative_eq!(bias(&actual, &predicted).unwrap(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn directional_accuracy_all_correct() {
        let actual = vec![1.0, 2.0, 1.0, 3.0];
        let predicted = vec![5.0, 6.0, 5.0, 9.0];
        assert_relative_eq!(directional_accuracy(&actual, &predicted).unwrap(), 1.0);
    }

    #[test]
    fn coverage_counts_inclusive_bounds() {
        let actual = vec![1.0, 2.0, 3.0];
        let lower = vec![1.0, 1.0, 1.0];
        let upper = vec![1.0, 3.0, 2.0];
        assert_relative_eq!(
            coverage(&actual, &lower, &upper).unwrap(),
            2.0 / 3.0,
            epsilon = 1e-9
        );
    }
}
