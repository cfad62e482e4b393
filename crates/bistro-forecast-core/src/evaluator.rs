//! Holdout evaluation and per-bucket champion/challenger selection
//! (spec.md §4.6).

use crate::baseline;
use crate::conformal;
use crate::gbm::GbmModel;
use crate::metrics;
use crate::types::{BucketDecision, BucketKey, BucketMetrics, Champion, FeatureRow, GatingVerdict};
use std::collections::HashMap;

/// Below this many training occurrences of a bucket, the ML model is never
/// allowed to win it even if its holdout metrics look better — too few
/// samples to trust.
pub const MIN_BUCKET_SAMPLES_FOR_ML: u32 = 6;

/// ML must beat the baseline's WMAPE by more than this many percentage
/// points to take a bucket; ties and near-ties default to the simpler model.
pub const CHAMPION_TOLERANCE: f64 = 0.02;

/// A bucket is treated as closed (`ClosedHourHeuristic`) when the sum of
/// absolute holdout actuals falls below this currency-unit threshold.
const CLOSED_HOUR_THRESHOLD: f64 = 1.0;

/// Trailing holdout window: `min(14, max(7, total_days/4))`.
pub fn holdout_days(total_days: u32) -> u32 {
    (total_days / 4).clamp(7, 14)
}

/// Split a feature table into (train, holdout) by the trailing
/// `holdout_days` distinct sale dates. Rows are assumed sorted by
/// `(sale_date, hour_of_day)`, as [`crate::aggregator::aggregate`] produces.
pub fn split_holdout(rows: &[FeatureRow], holdout_days: u32) -> (Vec<FeatureRow>, Vec<FeatureRow>) {
    let mut dates: Vec<_> = rows.iter().map(|r| r.cell.sale_date).collect();
    dates.sort();
    dates.dedup();

    if dates.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let cutoff_idx = dates.len().saturating_sub(holdout_days as usize);
    let cutoff = dates[cutoff_idx];

    let (holdout, train): (Vec<_>, Vec<_>) =
        rows.iter().partition(|r| r.cell.sale_date >= cutoff);
    (train.into_iter().copied().collect(), holdout.into_iter().copied().collect())
}

/// Per-bucket occurrence counts of trainable rows, used to enforce
/// [`MIN_BUCKET_SAMPLES_FOR_ML`].
pub fn training_counts(train_rows: &[FeatureRow]) -> HashMap<BucketKey, u32> {
    let mut counts = HashMap::new();
    for row in train_rows.iter().filter(|r| r.is_trainable()) {
        *counts.entry(row.bucket_key()).or_insert(0) += 1;
    }
    counts
}

/// Holdout rows' actual values alongside whichever model won each row, for
/// the run-level metrics a caller would report.
pub struct EvaluationOutcome {
    pub registry: HashMap<BucketKey, BucketDecision>,
    pub actual: Vec<f64>,
    pub champion_pred: Vec<f64>,
    pub seasonal_reference: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Evaluate every bucket present in `holdout_rows` against both models and
/// select a champion.
pub fn evaluate(
    holdout_rows: &[FeatureRow],
    training_counts: &HashMap<BucketKey, u32>,
    hourly_means: &HashMap<u8, f64>,
    ml_model: Option<&GbmModel>,
    gating: &GatingVerdict,
) -> EvaluationOutcome {
    let mut by_bucket: HashMap<BucketKey, Vec<&FeatureRow>> = HashMap::new();
    for row in holdout_rows {
        by_bucket.entry(row.bucket_key()).or_default().push(row);
    }

    let mut registry = HashMap::new();
    let mut all_actual = Vec::with_capacity(holdout_rows.len());
    let mut all_champion_pred = Vec::with_capacity(holdout_rows.len());
    let mut all_seasonal_ref = Vec::with_capacity(holdout_rows.len());
    let mut all_lower = Vec::with_capacity(holdout_rows.len());
    let mut all_upper = Vec::with_capacity(holdout_rows.len());

    for (bucket_key, rows) in by_bucket {
        let actual: Vec<f64> = rows.iter().map(|r| r.cell.net_sales).collect();
        let baseline_pred = baseline::predict_with(
            &rows.iter().map(|r| **r).collect::<Vec<_>>(),
            hourly_means,
        );
        let ml_pred: Option<Vec<f64>> = ml_model.map(|model| {
            rows.iter().map(|r| model.predict(&r.to_vector())).collect()
        });

        let closed_hour = actual.iter().map(|a| a.abs()).sum::<f64>() < CLOSED_HOUR_THRESHOLD;
        let samples = training_counts.get(&bucket_key).copied().unwrap_or(0);
        let ml_allowed =
            !closed_hour && ml_pred.is_some() && gating.sufficiency != crate::types::Sufficiency::Low
                && samples >= MIN_BUCKET_SAMPLES_FOR_ML;

        let baseline_metrics = bucket_metrics(&actual, &baseline_pred, &baseline_pred);

        let (champion, champion_metrics, challenger, challenger_metrics, conformal_residual_95) =
            if ml_allowed {
                let ml_pred = ml_pred.as_ref().unwrap();
                let ml_metrics = bucket_metrics(&actual, ml_pred, &baseline_pred);
                if ml_metrics.wmape + CHAMPION_TOLERANCE < baseline_metrics.wmape {
                    let residuals: Vec<f64> = actual
                        .iter()
                        .zip(ml_pred.iter())
                        .map(|(a, p)| a - p)
                        .collect();
                    let conformal_95 = if residuals.len() >= 3 {
                        conformal::conformal_quantile(&residuals, 0.05).unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    (
                        Champion::Lgbm,
                        ml_metrics,
                        Champion::SeasonalNaive,
                        baseline_metrics,
                        conformal_95,
                    )
                } else {
                    (
                        Champion::SeasonalNaive,
                        baseline_metrics,
                        Champion::Lgbm,
                        ml_metrics,
                        0.0,
                    )
                }
            } else {
                let challenger_metrics = match &ml_pred {
                    Some(pred) => bucket_metrics(&actual, pred, &baseline_pred),
                    None => BucketMetrics::default(),
                };
                (
                    Champion::SeasonalNaive,
                    baseline_metrics,
                    Champion::Lgbm,
                    challenger_metrics,
                    0.0,
                )
            };

        let champion_pred = match champion {
            Champion::SeasonalNaive => baseline_pred.clone(),
            Champion::Lgbm => ml_pred.clone().unwrap(),
        };

        all_actual.extend(actual.iter().copied());
        all_champion_pred.extend(champion_pred.iter().copied());
        all_seasonal_ref.extend(baseline_pred.iter().copied());
        all_lower.extend(champion_pred.iter().map(|p| (p - conformal_residual_95).max(0.0)));
        all_upper.extend(champion_pred.iter().map(|p| p + conformal_residual_95));

        registry.insert(
            bucket_key,
            BucketDecision {
                day_of_week: bucket_key.0,
                hour_of_day: bucket_key.1,
                champion,
                champion_metrics,
                challenger,
                challenger_metrics,
                training_samples: samples,
                conformal_residual_95,
            },
        );
    }

    EvaluationOutcome {
        registry,
        actual: all_actual,
        champion_pred: all_champion_pred,
        seasonal_reference: all_seasonal_ref,
        lower: all_lower,
        upper: all_upper,
    }
}

fn bucket_metrics(actual: &[f64], predicted: &[f64], seasonal_reference: &[f64]) -> BucketMetrics {
    BucketMetrics {
        wmape: metrics::wmape(actual, predicted).unwrap_or(0.0),
        mase: metrics::mase(actual, predicted, seasonal_reference).unwrap_or(0.0),
        bias: metrics::bias(actual, predicted).unwrap_or(0.0),
        dir_acc: metrics::directional_accuracy(actual, predicted).unwrap_or(0.0),
    }
}
