//! Recursive hourly predictor (spec.md §4.7).
//!
//! Walks the forecast horizon hour by hour, writing each prediction back
//! into its own lookup buffer so that later hours' lag features see earlier
//! predictions rather than only real history — the "cyclic recursion"
//! spec.md §9 calls out explicitly, kept here rather than folded into
//! [`crate::features`] since it only matters for never-observed future rows.

use crate::gbm::GbmModel;
use crate::holidays::HolidayCalendar;
use crate::types::{BucketDecision, BucketKey, Champion, HourlyCell, HourlyForecast};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{HashMap, VecDeque};

/// Predict `horizon_days` of hourly forecasts starting at `start_date`.
///
/// When `force_baseline` is set every bucket is predicted with the
/// seasonal-naive model regardless of which model the registry names as
/// champion — used by the pipeline to compute the second leg of the
/// MID-tier blend (spec.md §4.7) without duplicating this function.
#[allow(clippy::too_many_arguments)]
pub fn predict_range(
    grid: &[HourlyCell],
    registry: &HashMap<BucketKey, BucketDecision>,
    ml_model: Option<&GbmModel>,
    hourly_means: &HashMap<u8, f64>,
    holidays: &HolidayCalendar,
    avg_ticket_value: f64,
    start_date: NaiveDate,
    horizon_days: u32,
    force_baseline: bool,
) -> Vec<HourlyForecast> {
    let mut buffer: HashMap<(NaiveDate, u8), f64> = grid
        .iter()
        .map(|c| ((c.sale_date, c.hour_of_day), c.net_sales))
        .collect();

    let mut rolling: HashMap<u8, VecDeque<f64>> = HashMap::new();
    for cell in grid {
        let window = rolling.entry(cell.hour_of_day).or_default();
        window.push_back(cell.net_sales);
        if window.len() > 7 {
            window.pop_front();
        }
    }

    let mut out = Vec::with_capacity(horizon_days as usize * 24);

    for d in 0..horizon_days as i64 {
        let date = start_date + Duration::days(d);
        let day_of_week = date.weekday().num_days_from_monday() as u8;
        let day_of_month = date.day() as u8;
        let is_weekend = day_of_week >= 5;
        let month = date.month() as u8;
        let week_of_year = date.iso_week().week() as u8;
        let is_holiday = holidays.contains(date);
        let is_payday = day_of_month == 1 || day_of_month == 15 || day_of_month >= 25;

        for hour in 0..24u8 {
            let lag_1 = lag_at(&buffer, date, hour, 1);
            let lag_24 = lag_at(&buffer, date, hour, 24);
            let lag_168 = lag_at(&buffer, date, hour, 168);
            let lag_336 = lag_at(&buffer, date, hour, 336);

            let window = rolling.entry(hour).or_default();
            let n = window.len();
            let rolling_mean_7d = if n > 0 {
                window.iter().sum::<f64>() / n as f64
            } else {
                0.0
            };
            let rolling_std_7d = if n > 1 {
                (window.iter().map(|v| (v - rolling_mean_7d).powi(2)).sum::<f64>() / (n - 1) as f64)
                    .sqrt()
            } else {
                0.0
            };

            let x: [f64; crate::gbm::FEATURE_COUNT] = [
                hour as f64,
                day_of_week as f64,
                is_weekend as u8 as f64,
                month as f64,
                week_of_year as f64,
                day_of_month as f64,
                is_holiday as u8 as f64,
                is_payday as u8 as f64,
                lag_1.unwrap_or(0.0),
                lag_24.unwrap_or(0.0),
                lag_168.unwrap_or(0.0),
                lag_336.unwrap_or(0.0),
                rolling_mean_7d,
                rolling_std_7d,
            ];

            let bucket_key: BucketKey = (day_of_week, hour);
            let decision = registry.get(&bucket_key);

            let (effective_champion, bucket_wmape, bucket_mase, conformal) = match decision {
                Some(d) if force_baseline && d.champion != Champion::SeasonalNaive => {
                    (Champion::SeasonalNaive, d.challenger_metrics.wmape, d.challenger_metrics.mase, 0.0)
                }
                Some(d) => (d.champion, d.champion_metrics.wmape, d.champion_metrics.mase, d.conformal_residual_95),
                None => (Champion::SeasonalNaive, 0.0, 0.0, 0.0),
            };

            let pred = match effective_champion {
                Champion::SeasonalNaive => lag_168
                    .or(lag_24)
                    .or_else(|| hourly_means.get(&hour).copied())
                    .unwrap_or(0.0)
                    .max(0.0),
                Champion::Lgbm => ml_model.map(|m| m.predict(&x)).unwrap_or(0.0),
            };

            let lower = (pred - conformal).max(0.0);
            let upper = pred + conformal;
            let forecast_orders = if avg_ticket_value > 0.0 {
                pred / avg_ticket_value
            } else {
                0.0
            };

            out.push(HourlyForecast {
                forecast_date: date,
                hour_of_day: hour,
                forecast_sales: pred,
                forecast_sales_lower: lower,
                forecast_sales_upper: upper,
                forecast_orders,
                forecast_covers: forecast_orders,
                model_used: effective_champion.as_str().to_string(),
                bucket_wmape,
                bucket_mase,
            });

            buffer.insert((date, hour), pred);
            window.push_back(pred);
            if window.len() > 7 {
                window.pop_front();
            }
        }
    }

    out
}

/// Linear blend of two horizons computed over the same `(date, hour)`
/// sequence, used for the MID-tier `BLEND_Naive70_LightGBM30` policy.
/// `champion_run` is weighted by `blend_ratio`, `baseline_run` by
/// `1 - blend_ratio`. Every blended row's `model_used` is set to
/// `algorithm_label`, the run's single verdict label (spec.md §4.7: "the
/// resulting `modelUsed` label becomes the algorithm label of the
/// verdict") — not a per-row formatted string.
pub fn blend(
    champion_run: &[HourlyForecast],
    baseline_run: &[HourlyForecast],
    blend_ratio: f64,
    algorithm_label: &str,
) -> Vec<HourlyForecast> {
    champion_run
        .iter()
        .zip(baseline_run.iter())
        .map(|(c, b)| HourlyForecast {
            forecast_date: c.forecast_date,
            hour_of_day: c.hour_of_day,
            forecast_sales: blend_ratio * c.forecast_sales + (1.0 - blend_ratio) * b.forecast_sales,
            forecast_sales_lower: blend_ratio * c.forecast_sales_lower
                + (1.0 - blend_ratio) * b.forecast_sales_lower,
            forecast_sales_upper: blend_ratio * c.forecast_sales_upper
                + (1.0 - blend_ratio) * b.forecast_sales_upper,
            forecast_orders: blend_ratio * c.forecast_orders + (1.0 - blend_ratio) * b.forecast_orders,
            forecast_covers: blend_ratio * c.forecast_covers + (1.0 - blend_ratio) * b.forecast_covers,
            model_used: algorithm_label.to_string(),
            bucket_wmape: c.bucket_wmape,
            bucket_mase: c.bucket_mase,
        })
        .collect()
}

fn lag_at(buffer: &HashMap<(NaiveDate, u8), f64>, date: NaiveDate, hour: u8, back_hours: i64) -> Option<f64> {
    let dt = NaiveDateTime::new(date, NaiveTime::from_hms_opt(hour as u32, 0, 0).unwrap())
        - Duration::hours(back_hours);
    buffer.get(&(dt.date(), dt.hour() as u8)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator;
    use crate::types::{BucketMetrics, RawBucket};
    use chrono::{TimeZone, Utc};

    fn history_grid(days: i64) -> Vec<HourlyCell> {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rows: Vec<RawBucket> = (0..days)
            .flat_map(|d| {
                (10..=22).map(move |h| RawBucket {
                    ts_bucket: start + Duration::days(d) + Duration::hours(h),
                    sales_net: 40.0 + h as f64,
                    tickets: 4,
                })
            })
            .collect();
        aggregator::aggregate(&rows).unwrap()
    }

    #[test]
    fn baseline_only_predictions_are_nonnegative_and_masked_later() {
        let grid = history_grid(20);
        let registry: HashMap<BucketKey, BucketDecision> = HashMap::new();
        let means = crate::baseline::hourly_means(&crate::features::build(&grid, &HolidayCalendar::default()));
        let start = grid.last().unwrap().sale_date + Duration::days(1);
        let forecasts = predict_range(&grid, &registry, None, &means, &HolidayCalendar::default(), 25.0, start, 3, false);
        assert_eq!(forecasts.len(), 72);
        assert!(forecasts.iter().all(|f| f.forecast_sales >= 0.0));
    }

    #[test]
    fn force_baseline_overrides_an_ml_champion_bucket() {
        let grid = history_grid(20);
        let mut registry: HashMap<BucketKey, BucketDecision> = HashMap::new();
        let key: BucketKey = (0, 12);
        registry.insert(
            key,
            BucketDecision {
                day_of_week: 0,
                hour_of_day: 12,
                champion: Champion::Lgbm,
                champion_metrics: BucketMetrics::default(),
                challenger: Champion::SeasonalNaive,
                challenger_metrics: BucketMetrics::default(),
                training_samples: 10,
                conformal_residual_95: 5.0,
            },
        );
        let means = HashMap::new();
        let start = grid.last().unwrap().sale_date + Duration::days(1);
        let forecasts = predict_range(&grid, &registry, None, &means, &HolidayCalendar::default(), 25.0, start, 1, true);
        let row = forecasts.iter().find(|f| f.hour_of_day == 12).unwrap();
        assert_eq!(row.model_used, "seasonal_naive");
    }

    #[test]
    fn blend_at_zero_equals_baseline_run() {
        let grid = history_grid(10);
        let registry: HashMap<BucketKey, BucketDecision> = HashMap::new();
        let means = HashMap::new();
        let start = grid.last().unwrap().sale_date + Duration::days(1);
        let champion_run = predict_range(&grid, &registry, None, &means, &HolidayCalendar::default(), 25.0, start, 1, false);
        let baseline_run = champion_run.clone();
        let blended = blend(&champion_run, &baseline_run, 0.0, "BLEND_Naive70_LightGBM30");
        for (b, base) in blended.iter().zip(baseline_run.iter()) {
            assert_eq!(b.forecast_sales, base.forecast_sales);
            assert_eq!(b.model_used, "BLEND_Naive70_LightGBM30");
        }
    }
}
