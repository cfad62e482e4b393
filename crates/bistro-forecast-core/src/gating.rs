//! Data-sufficiency gating (spec.md §4.3).
//!
//! A hard safety rail: the ML model has a much larger variance of failure
//! modes on thin data, so below a threshold it must not be allowed to win
//! any bucket — that override is applied later, in [`crate::evaluator`].

use crate::types::{GatingVerdict, HourlyCell, Sufficiency};
use std::collections::{HashMap, HashSet};

const LOW_MAX_DAYS: u32 = 14;
const MID_MAX_DAYS: u32 = 56;
const MID_BLEND_RATIO: f64 = 0.3;

/// Assess data sufficiency for a location from its full history grid.
pub fn evaluate(grid: &[HourlyCell]) -> GatingVerdict {
    let total_days = grid
        .iter()
        .map(|c| c.sale_date)
        .collect::<HashSet<_>>()
        .len() as u32;

    let mut bucket_counts: HashMap<(u8, u8), u32> = HashMap::new();
    for cell in grid {
        if cell.net_sales > 0.0 {
            *bucket_counts.entry(cell.bucket_key()).or_insert(0) += 1;
        }
    }
    let min_bucket_samples = bucket_counts.values().copied().min().unwrap_or(0);

    if total_days < LOW_MAX_DAYS {
        GatingVerdict {
            sufficiency: Sufficiency::Low,
            blend_ratio: 0.0,
            total_days,
            min_bucket_samples,
            algorithm_label: "BASELINE_ONLY".to_string(),
        }
    } else if total_days < MID_MAX_DAYS {
        GatingVerdict {
            sufficiency: Sufficiency::Mid,
            blend_ratio: MID_BLEND_RATIO,
            total_days,
            min_bucket_samples,
            algorithm_label: "BLEND_Naive70_LightGBM30".to_string(),
        }
    } else {
        GatingVerdict {
            sufficiency: Sufficiency::High,
            blend_ratio: 1.0,
            total_days,
            min_bucket_samples,
            algorithm_label: "LightGBM_ChampionChallenger".to_string(),
        }
    }
}

/// Per-bucket sample counts over populated hours only, used by the
/// evaluator to force sparse buckets back to the baseline.
pub fn bucket_sample_counts(grid: &[HourlyCell]) -> HashMap<(u8, u8), u32> {
    let mut counts = HashMap::new();
    for cell in grid {
        if cell.net_sales > 0.0 {
            *counts.entry(cell.bucket_key()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator;
    use crate::types::RawBucket;
    use chrono::{Duration, TimeZone, Utc};

    fn grid_for_days(days: i64) -> Vec<HourlyCell> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let rows: Vec<RawBucket> = (0..days)
            .map(|d| RawBucket {
                ts_bucket: start + Duration::days(d),
                sales_net: 50.0,
                tickets: 5,
            })
            .collect();
        aggregator::aggregate(&rows).unwrap()
    }

    #[test]
    fn three_days_is_low() {
        let verdict = evaluate(&grid_for_days(3));
        assert_eq!(verdict.sufficiency, Sufficiency::Low);
        assert_eq!(verdict.blend_ratio, 0.0);
        assert_eq!(verdict.algorithm_label, "BASELINE_ONLY");
    }

    #[test]
    fn boundary_14_days_is_mid() {
        let verdict = evaluate(&grid_for_days(14));
        assert_eq!(verdict.sufficiency, Sufficiency::Mid);
        assert_eq!(verdict.blend_ratio, 0.3);
    }

    #[test]
    fn boundary_56_days_is_high() {
        let verdict = evaluate(&grid_for_days(56));
        assert_eq!(verdict.sufficiency, Sufficiency::High);
        assert_eq!(verdict.blend_ratio, 1.0);
    }

    #[test]
    fn min_bucket_samples_ignores_empty_buckets() {
        let grid = grid_for_days(60);
        let verdict = evaluate(&grid);
        // Only hour 12 ever has sales in this fixture, so its count equals
        // the number of days, not zero from the 23 untouched hours.
        assert_eq!(verdict.min_bucket_samples, 60);
    }
}
