//! Data model shared by every stage of the forecast pipeline.
//!
//! Types that cross the engine boundary (the CLI's JSON request/response,
//! and the rows a real caller would hand to its own sinks) derive
//! `Serialize`/`Deserialize`; purely internal types (e.g. the feature grid)
//! do not need to.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// (day_of_week, hour_of_day) identifying one of the 168 forecast buckets.
///
/// `day_of_week` follows `chrono`'s Monday=0 convention (matching the
/// `pandas.Timestamp.dayofweek` the original pipeline used).
pub type BucketKey = (u8, u8);

/// A single 15-minute point-of-sale observation, pre-filtered to one
/// location and sorted ascending by `ts_bucket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBucket {
    pub ts_bucket: DateTime<Utc>,
    pub sales_net: f64,
    pub tickets: u32,
}

/// One location-hour after 15-minute buckets have been summed and the
/// grid has been densified. Always present for every hour of every date
/// in the observed range, even when no sales occurred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyCell {
    pub sale_date: NaiveDate,
    pub hour_of_day: u8,
    pub net_sales: f64,
    pub ticket_count: u32,
    pub day_of_week: u8,
}

impl HourlyCell {
    pub fn bucket_key(&self) -> BucketKey {
        (self.day_of_week, self.hour_of_day)
    }
}

/// An [`HourlyCell`] enriched with lag, rolling, and calendar features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub cell: HourlyCell,
    pub lag_1: Option<f64>,
    pub lag_24: Option<f64>,
    pub lag_168: Option<f64>,
    pub lag_336: Option<f64>,
    pub rolling_mean_7d: f64,
    pub rolling_std_7d: f64,
    pub is_weekend: bool,
    pub month: u8,
    pub week_of_year: u8,
    pub day_of_month: u8,
    pub is_holiday: bool,
    pub is_payday: bool,
}

impl FeatureRow {
    /// Rows missing `lag_1` or `lag_24` are excluded from training but stay
    /// in the grid (spec.md §4.2).
    pub fn is_trainable(&self) -> bool {
        self.lag_1.is_some() && self.lag_24.is_some()
    }

    pub fn bucket_key(&self) -> BucketKey {
        self.cell.bucket_key()
    }

    /// Feature vector in the fixed order the ML model was trained on.
    /// Must be reproduced exactly at inference (spec.md §4.5).
    pub fn to_vector(&self) -> [f64; crate::gbm::FEATURE_COUNT] {
        [
            self.cell.hour_of_day as f64,
            self.cell.day_of_week as f64,
            self.is_weekend as u8 as f64,
            self.month as f64,
            self.week_of_year as f64,
            self.day_of_month as f64,
            self.is_holiday as u8 as f64,
            self.is_payday as u8 as f64,
            self.lag_1.unwrap_or(0.0),
            self.lag_24.unwrap_or(0.0),
            self.lag_168.unwrap_or(0.0),
            self.lag_336.unwrap_or(0.0),
            self.rolling_mean_7d,
            self.rolling_std_7d,
        ]
    }
}

/// Coarse data-sufficiency tier computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sufficiency {
    Low,
    Mid,
    High,
}

impl Sufficiency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sufficiency::Low => "LOW",
            Sufficiency::Mid => "MID",
            Sufficiency::High => "HIGH",
        }
    }
}

/// Result of the gating evaluator (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingVerdict {
    pub sufficiency: Sufficiency,
    pub blend_ratio: f64,
    pub total_days: u32,
    pub min_bucket_samples: u32,
    pub algorithm_label: String,
}

/// Which model won a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Champion {
    SeasonalNaive,
    Lgbm,
}

impl Champion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Champion::SeasonalNaive => "seasonal_naive",
            Champion::Lgbm => "lgbm",
        }
    }

    pub fn other(&self) -> Champion {
        match self {
            Champion::SeasonalNaive => Champion::Lgbm,
            Champion::Lgbm => Champion::SeasonalNaive,
        }
    }
}

/// Error metrics for one model on one bucket's holdout rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub wmape: f64,
    pub mase: f64,
    pub bias: f64,
    pub dir_acc: f64,
}

/// The per-bucket champion/challenger registry entry (spec.md §3, one of
/// 168 total).
#[derive(Debug, Clone)]
pub struct BucketDecision {
    pub day_of_week: u8,
    pub hour_of_day: u8,
    pub champion: Champion,
    pub champion_metrics: BucketMetrics,
    pub challenger: Champion,
    pub challenger_metrics: BucketMetrics,
    pub training_samples: u32,
    pub conformal_residual_95: f64,
}

/// One published hourly forecast row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub forecast_date: NaiveDate,
    pub hour_of_day: u8,
    pub forecast_sales: f64,
    pub forecast_sales_lower: f64,
    pub forecast_sales_upper: f64,
    pub forecast_orders: f64,
    /// Carried from the original implementation's `forecast_covers` field;
    /// equal to `forecast_orders` under the current one-cover-per-ticket
    /// assumption, kept as a distinct field so a future per-location party
    /// size can diverge from it without a schema change.
    pub forecast_covers: f64,
    pub model_used: String,
    pub bucket_wmape: f64,
    pub bucket_mase: f64,
}

/// One published daily roll-up row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub forecast_sales: f64,
    pub forecast_sales_lower: f64,
    pub forecast_sales_upper: f64,
    pub forecast_orders: f64,
    pub planned_labour_hours: f64,
    pub planned_labour_cost: f64,
}

/// Governs which hours of the day are masked to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenHoursSpec {
    pub open_hour: u8,
    pub close_hour: u8,
    pub prep_start_hour: u8,
    pub prep_end_hour: u8,
    pub timezone: String,
}

impl Default for OpenHoursSpec {
    fn default() -> Self {
        Self {
            open_hour: 12,
            close_hour: 23,
            prep_start_hour: 12,
            prep_end_hour: 12,
            timezone: "Europe/Madrid".to_string(),
        }
    }
}

impl OpenHoursSpec {
    /// `[open_hour, close_hour)`, supporting a window that crosses midnight.
    pub fn is_service_hour(&self, hour_of_day: u8) -> bool {
        if self.open_hour == self.close_hour {
            return true; // open 24h
        }
        if self.open_hour < self.close_hour {
            hour_of_day >= self.open_hour && hour_of_day < self.close_hour
        } else {
            hour_of_day >= self.open_hour || hour_of_day < self.close_hour
        }
    }
}

/// Which POS integration produced the input rows for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Demo,
    Pos,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Demo => "demo",
            DataSource::Pos => "pos",
        }
    }
}

/// Transport-agnostic invocation request (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub location_id: String,
    pub location_name: String,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    pub data_source: DataSource,
    #[serde(default)]
    pub open_hours: OpenHoursSpec,
}

fn default_horizon_days() -> u32 {
    14
}

/// Aggregate error metrics for a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub wmape: f64,
    pub mase: f64,
    pub bias: f64,
    pub directional_accuracy: f64,
}

/// Champion/challenger tally across all 168 buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub ml_wins: u32,
    pub baseline_wins: u32,
    pub total_buckets: u32,
}

/// Flattened per-bucket audit row (spec.md §6 Registry sink).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRow {
    pub location_id: String,
    pub day_of_week: u8,
    pub hour_of_day: u8,
    pub champion_model: String,
    pub champion_wmape: f64,
    pub champion_mase: f64,
    pub champion_bias: f64,
    pub champion_dir_acc: f64,
    pub challenger_model: String,
    pub challenger_wmape: f64,
    pub challenger_mase: f64,
    pub training_samples: u32,
    pub conformal_residual_95: f64,
    pub last_evaluated_at: DateTime<Utc>,
}

/// Single per-run audit row (spec.md §6 Audit sink).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRow {
    pub location_id: String,
    pub algorithm_label: String,
    pub sufficiency: Sufficiency,
    pub blend_ratio: f64,
    pub wmape: f64,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub horizon_days: u32,
    pub data_points: usize,
    /// Fraction of holdout actuals inside `[pred - conformal, pred +
    /// conformal]`; supplements spec.md's named audit fields with the
    /// `calibration_score` the original implementation tracked alongside
    /// WMAPE/MASE/bias/directional accuracy.
    pub interval_coverage: f64,
    pub generated_at: DateTime<Utc>,
}

/// Structured outcome of one [`crate::pipeline::run`] call (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub reason: Option<String>,
    pub location_id: String,
    pub gating: Option<GatingVerdict>,
    pub lgbm_used: bool,
    pub metrics: Option<RunMetrics>,
    pub registry_summary: Option<RegistrySummary>,
    pub hourly_forecasts: Vec<HourlyForecast>,
    pub daily_forecasts: Vec<DailyForecast>,
    pub registry_rows: Vec<RegistryRow>,
    pub audit_row: Option<AuditRow>,
    /// Small sample of stored rows for smoke tests (spec.md §6).
    pub sample_hourly: Vec<HourlyForecast>,
    pub sample_daily: Vec<DailyForecast>,
}

impl RunSummary {
    pub fn failed(location_id: &str, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            location_id: location_id.to_string(),
            gating: None,
            lgbm_used: false,
            metrics: None,
            registry_summary: None,
            hourly_forecasts: Vec::new(),
            daily_forecasts: Vec::new(),
            registry_rows: Vec::new(),
            audit_row: None,
            sample_hourly: Vec::new(),
            sample_daily: Vec::new(),
        }
    }
}
