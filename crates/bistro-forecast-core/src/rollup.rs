//! Daily roll-up and labour planning (spec.md §4.8).

use crate::types::{DailyForecast, HourlyForecast};
use std::collections::BTreeMap;

const LABOUR_PERCENT_TARGET: f64 = 0.28;
const AVERAGE_HOURLY_WAGE: f64 = 14.5;
const MIN_LABOUR_HOURS: f64 = 20.0;
const MAX_LABOUR_HOURS: f64 = 120.0;

/// Sum each date's 24 [`HourlyForecast`] rows into one [`DailyForecast`],
/// deriving planned labour hours from a fixed labour-cost-percentage
/// target, clamped to a sane shift-count range.
pub fn rollup(hourly: &[HourlyForecast]) -> Vec<DailyForecast> {
    let mut by_date: BTreeMap<_, Vec<&HourlyForecast>> = BTreeMap::new();
    for row in hourly {
        by_date.entry(row.forecast_date).or_default().push(row);
    }

    by_date
        .into_iter()
        .map(|(date, rows)| {
            let forecast_sales: f64 = rows.iter().map(|r| r.forecast_sales).sum();
            let forecast_sales_lower: f64 = rows.iter().map(|r| r.forecast_sales_lower).sum();
            let forecast_sales_upper: f64 = rows.iter().map(|r| r.forecast_sales_upper).sum();
            let forecast_orders: f64 = rows.iter().map(|r| r.forecast_orders).sum();

            let planned_labour_cost = forecast_sales * LABOUR_PERCENT_TARGET;
            let planned_labour_hours =
                (planned_labour_cost / AVERAGE_HOURLY_WAGE).clamp(MIN_LABOUR_HOURS, MAX_LABOUR_HOURS);

            DailyForecast {
                date,
                forecast_sales,
                forecast_sales_lower,
                forecast_sales_upper,
                forecast_orders,
                planned_labour_hours,
                planned_labour_cost,
            }
        })
        .collect()
}
