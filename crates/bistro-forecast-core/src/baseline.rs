//! Seasonal-naive baseline model (spec.md §4.4).
//!
//! Resolution order matters: lag-168 captures weekly seasonality first;
//! lag-24 is only a graceful degradation, and the hourly mean is the last
//! resort before giving up and returning zero.

use crate::types::FeatureRow;
use std::collections::HashMap;

/// Predict every row of a feature table with the seasonal-naive model,
/// computing the hourly-mean fallback table from the same rows.
pub fn predict(rows: &[FeatureRow]) -> Vec<f64> {
    predict_with(rows, &hourly_means(rows))
}

/// Predict every row with a caller-supplied hourly-mean fallback table, so
/// the evaluator and predictor can share one table computed from the full
/// training history rather than recomputing it per holdout slice.
pub fn predict_with(rows: &[FeatureRow], hourly_means: &HashMap<u8, f64>) -> Vec<f64> {
    rows.iter()
        .map(|row| predict_one(row, hourly_means))
        .collect()
}

fn predict_one(row: &FeatureRow, hourly_means: &HashMap<u8, f64>) -> f64 {
    let pred = row
        .lag_168
        .or(row.lag_24)
        .or_else(|| hourly_means.get(&row.cell.hour_of_day).copied())
        .unwrap_or(0.0);
    pred.max(0.0)
}

/// Historical mean net_sales per hour-of-day, used as the baseline's final
/// fallback and as the predictor's fallback for missing lag lookups.
pub fn hourly_means(rows: &[FeatureRow]) -> HashMap<u8, f64> {
    let mut sums: HashMap<u8, (f64, u32)> = HashMap::new();
    for row in rows {
        let entry = sums.entry(row.cell.hour_of_day).or_insert((0.0, 0));
        entry.0 += row.cell.net_sales;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(hour, (sum, count))| (hour, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator;
    use crate::features;
    use crate::holidays::HolidayCalendar;
    use crate::types::RawBucket;
    use chrono::{Duration, TimeZone, Utc};

    fn features_for_days(days: i64) -> Vec<FeatureRow> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut rows = Vec::new();
        for d in 0..days {
            for h in 10..=22 {
                rows.push(RawBucket {
                    ts_bucket: start + Duration::days(d) + Duration::hours(h),
                    sales_net: 10.0 + h as f64,
                    tickets: 1,
                });
            }
        }
        let grid = aggregator::aggregate(&rows).unwrap();
        features::build(&grid, &HolidayCalendar::default())
    }

    #[test]
    fn falls_back_through_lag168_then_lag24_then_mean() {
        let rows = features_for_days(10);
        let preds = predict(&rows);
        // Day 8 (index 8), hour 10 has lag_168 available (day 1).
        let idx = 8 * 24 + 10;
        assert_eq!(preds[idx], 10.0 + 10.0);
        // Day 0 hour 0 has no lag_168, no lag_24, falls to hourly mean (0
        // since no sales ever posted at hour 0).
        assert_eq!(preds[0], 0.0);
    }

    #[test]
    fn predictions_are_never_negative() {
        let rows = features_for_days(3);
        for p in predict(&rows) {
            assert!(p >= 0.0);
        }
    }
}
