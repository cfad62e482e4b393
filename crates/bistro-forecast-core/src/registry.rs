//! Flattening the per-bucket decision map into the two sinks a caller would
//! persist (spec.md §6 Registry/Audit).

use crate::types::{
    AuditRow, BucketDecision, BucketKey, Champion, RegistryRow, RegistrySummary, Sufficiency,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

/// One [`RegistryRow`] per bucket, sorted by `(day_of_week, hour_of_day)`
/// for a stable, reviewable order.
pub fn build_rows(
    location_id: &str,
    registry: &HashMap<BucketKey, BucketDecision>,
    evaluated_at: DateTime<Utc>,
) -> Vec<RegistryRow> {
    let mut keys: Vec<&BucketKey> = registry.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| {
            let d = &registry[key];
            RegistryRow {
                location_id: location_id.to_string(),
                day_of_week: d.day_of_week,
                hour_of_day: d.hour_of_day,
                champion_model: d.champion.as_str().to_string(),
                champion_wmape: d.champion_metrics.wmape,
                champion_mase: d.champion_metrics.mase,
                champion_bias: d.champion_metrics.bias,
                champion_dir_acc: d.champion_metrics.dir_acc,
                challenger_model: d.challenger.as_str().to_string(),
                challenger_wmape: d.challenger_metrics.wmape,
                challenger_mase: d.challenger_metrics.mase,
                training_samples: d.training_samples,
                conformal_residual_95: d.conformal_residual_95,
                last_evaluated_at: evaluated_at,
            }
        })
        .collect()
}

/// Tally of which model won across all buckets the registry covers.
pub fn summarize(registry: &HashMap<BucketKey, BucketDecision>) -> RegistrySummary {
    let total_buckets = registry.len() as u32;
    let ml_wins = registry
        .values()
        .filter(|d| d.champion == Champion::Lgbm)
        .count() as u32;
    RegistrySummary {
        ml_wins,
        baseline_wins: total_buckets - ml_wins,
        total_buckets,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_audit_row(
    location_id: &str,
    algorithm_label: &str,
    sufficiency: Sufficiency,
    blend_ratio: f64,
    wmape: f64,
    history_start: NaiveDate,
    history_end: NaiveDate,
    horizon_days: u32,
    data_points: usize,
    interval_coverage: f64,
    generated_at: DateTime<Utc>,
) -> AuditRow {
    AuditRow {
        location_id: location_id.to_string(),
        algorithm_label: algorithm_label.to_string(),
        sufficiency,
        blend_ratio,
        wmape,
        history_start,
        history_end,
        horizon_days,
        data_points,
        interval_coverage,
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BucketMetrics;

    fn decision(day: u8, hour: u8, champion: Champion) -> BucketDecision {
        BucketDecision {
            day_of_week: day,
            hour_of_day: hour,
            champion,
            champion_metrics: BucketMetrics::default(),
            challenger: champion.other(),
            challenger_metrics: BucketMetrics::default(),
            training_samples: 20,
            conformal_residual_95: 0.0,
        }
    }

    #[test]
    fn rows_are_sorted_by_day_then_hour() {
        let mut registry = HashMap::new();
        registry.insert((1, 5), decision(1, 5, Champion::SeasonalNaive));
        registry.insert((0, 20), decision(0, 20, Champion::Lgbm));
        registry.insert((0, 9), decision(0, 9, Champion::SeasonalNaive));
        let rows = build_rows("loc-1", &registry, Utc::now());
        assert_eq!(
            rows.iter().map(|r| (r.day_of_week, r.hour_of_day)).collect::<Vec<_>>(),
            vec![(0, 9), (0, 20), (1, 5)]
        );
    }

    #[test]
    fn summary_counts_wins_by_champion() {
        let mut registry = HashMap::new();
        registry.insert((0, 1), decision(0, 1, Champion::Lgbm));
        registry.insert((0, 2), decision(0, 2, Champion::SeasonalNaive));
        registry.insert((0, 3), decision(0, 3, Champion::SeasonalNaive));
        let summary = summarize(&registry);
        assert_eq!(summary.total_buckets, 3);
        assert_eq!(summary.ml_wins, 1);
        assert_eq!(summary.baseline_wins, 2);
    }
}
