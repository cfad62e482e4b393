//! Lag, rolling, and calendar feature construction over the dense hourly
//! grid (spec.md §4.2).

use crate::holidays::HolidayCalendar;
use crate::types::{FeatureRow, HourlyCell};
use chrono::Datelike;
use std::collections::{HashMap, VecDeque};

/// Build [`FeatureRow`]s in place on the dense grid produced by
/// [`crate::aggregator::aggregate`].
///
/// `rolling_mean_7d`/`rolling_std_7d` are grouped by hour-of-day across the
/// seven most recent *occurrences of that hour* (not the seven previous
/// rows) — the only place a hour-of-day grouping, rather than a positional
/// shift, is required.
pub fn build(grid: &[HourlyCell], holidays: &HolidayCalendar) -> Vec<FeatureRow> {
    let values: Vec<f64> = grid.iter().map(|c| c.net_sales).collect();
    let lag = |i: usize, offset: usize| -> Option<f64> {
        i.checked_sub(offset).map(|j| values[j])
    };

    let mut rolling_windows: HashMap<u8, VecDeque<f64>> = HashMap::new();
    let mut rows = Vec::with_capacity(grid.len());

    for (i, cell) in grid.iter().enumerate() {
        let window = rolling_windows.entry(cell.hour_of_day).or_default();
        window.push_back(cell.net_sales);
        if window.len() > 7 {
            window.pop_front();
        }
        let n = window.len();
        let mean = window.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        let day_of_month = cell.sale_date.day() as u8;
        rows.push(FeatureRow {
            cell: *cell,
            lag_1: lag(i, 1),
            lag_24: lag(i, 24),
            lag_168: lag(i, 168),
            lag_336: lag(i, 336),
            rolling_mean_7d: mean,
            rolling_std_7d: std,
            is_weekend: cell.day_of_week >= 5,
            month: cell.sale_date.month() as u8,
            week_of_year: cell.sale_date.iso_week().week() as u8,
            day_of_month,
            is_holiday: holidays.contains(cell.sale_date),
            is_payday: day_of_month == 1 || day_of_month == 15 || day_of_month >= 25,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator;
    use crate::types::RawBucket;
    use chrono::{Duration, TimeZone, Utc};

    fn synthetic_rows(days: i64) -> Vec<RawBucket> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut rows = Vec::new();
        for d in 0..days {
            for h in 10..=22 {
                let ts = start + Duration::days(d) + Duration::hours(h);
                rows.push(RawBucket {
                    ts_bucket: ts,
                    sales_net: 50.0,
                    tickets: 5,
                });
            }
        }
        rows
    }

    #[test]
    fn lag_168_matches_same_hour_one_week_prior() {
        let rows = synthetic_rows(10);
        let grid = aggregator::aggregate(&rows).unwrap();
        let features = build(&grid, &HolidayCalendar::default());
        // Row at day 8 (index 8*24..), hour 10 should see lag_168 from day 1.
        let target = features
            .iter()
            .find(|f| f.cell.sale_date == grid[0].sale_date + Duration::days(8) && f.cell.hour_of_day == 10)
            .unwrap();
        assert_eq!(target.lag_168, Some(50.0));
    }

    #[test]
    fn missing_lags_excluded_from_training_but_kept_in_grid() {
        let rows = synthetic_rows(2);
        let grid = aggregator::aggregate(&rows).unwrap();
        let features = build(&grid, &HolidayCalendar::default());
        assert_eq!(features.len(), grid.len());
        assert!(!features[0].is_trainable());
        assert!(features.last().unwrap().is_trainable());
    }

    #[test]
    fn rolling_std_is_zero_on_first_occurrence() {
        let rows = synthetic_rows(3);
        let grid = aggregator::aggregate(&rows).unwrap();
        let features = build(&grid, &HolidayCalendar::default());
        assert_eq!(features[10].rolling_std_7d, 0.0);
    }

    #[test]
    fn is_payday_matches_calendar_rule() {
        let rows = synthetic_rows(30);
        let grid = aggregator::aggregate(&rows).unwrap();
        let features = build(&grid, &HolidayCalendar::default());
        for f in &features {
            let expected = f.day_of_month == 1 || f.day_of_month == 15 || f.day_of_month >= 25;
            assert_eq!(f.is_payday, expected);
        }
    }
}
