//! Orchestration and the run state machine (spec.md §4.9).

use crate::baseline;
use crate::error::ForecastError;
use crate::evaluator;
use crate::features;
use crate::gating;
use crate::gbm::{GbmModel, GbmParams};
use crate::holidays::HolidayCalendar;
use crate::metrics;
use crate::predictor;
use crate::registry;
use crate::rollup;
use crate::types::{
    AuditRow, GatingVerdict, RawBucket, RegistrySummary, RunMetrics, RunRequest, RunSummary,
    Sufficiency,
};
use chrono::Utc;

/// Below this many distinct sale dates a run is aborted outright — there
/// isn't enough history even for the baseline-only tier.
const ABORT_MIN_DAYS: u32 = 7;

/// Minimum populated hours before a location's own average ticket value is
/// trusted over the spec default (spec.md §4.7 Open Question resolution).
const MIN_TICKETED_HOURS_FOR_AVG_TICKET: u32 = 30;
const DEFAULT_AVG_TICKET_VALUE: f64 = 25.0;

/// Stage markers `pipeline::run` advances through, logged at each
/// transition. `Gated -> Aborted` is the only terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    Aggregated,
    Featurized,
    Gated,
    Aborted,
    Trained,
    Evaluated,
    Predicted,
    Masked,
    RolledUp,
    Emitted,
}

/// Run the full forecast pipeline for one location's history.
///
/// Never returns `Err`: a history too short to forecast is a normal,
/// well-typed outcome (`RunSummary { success: false, .. }`), not an
/// exception (spec.md §7).
pub fn run(request: &RunRequest, rows: &[RawBucket]) -> RunSummary {
    let mut stage = RunStage::Start;
    tracing::debug!(stage = ?stage, location_id = %request.location_id, "starting forecast run");

    let grid = match crate::aggregator::aggregate(rows) {
        Ok(grid) => grid,
        Err(ForecastError::InsufficientData { needed, got }) => {
            tracing::warn!(needed, got, "no rows to aggregate, aborting run");
            return RunSummary::failed(
                &request.location_id,
                format!("insufficient data: need at least {needed} rows, got {got}"),
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "aggregation failed, aborting run");
            return RunSummary::failed(&request.location_id, e.to_string());
        }
    };
    stage = RunStage::Aggregated;
    tracing::debug!(stage = ?stage, cells = grid.len(), "grid densified");

    let holidays = HolidayCalendar::spain_2024_2027();
    let feature_rows = features::build(&grid, &holidays);
    stage = RunStage::Featurized;
    tracing::debug!(stage = ?stage, rows = feature_rows.len(), "features built");

    let gating_verdict: GatingVerdict = gating::evaluate(&grid);
    stage = RunStage::Gated;
    tracing::debug!(
        stage = ?stage,
        sufficiency = gating_verdict.sufficiency.as_str(),
        total_days = gating_verdict.total_days,
        "gating evaluated"
    );

    if gating_verdict.total_days < ABORT_MIN_DAYS {
        stage = RunStage::Aborted;
        tracing::warn!(stage = ?stage, total_days = gating_verdict.total_days, "history too short, aborting");
        let mut summary = RunSummary::failed(
            &request.location_id,
            format!(
                "insufficient data: need at least {ABORT_MIN_DAYS} days of history, got {}",
                gating_verdict.total_days
            ),
        );
        summary.gating = Some(gating_verdict);
        return summary;
    }

    let holdout_days = evaluator::holdout_days(gating_verdict.total_days);
    let (train_rows, holdout_rows) = evaluator::split_holdout(&feature_rows, holdout_days);
    let training_counts = evaluator::training_counts(&train_rows);
    let hourly_means = baseline::hourly_means(&train_rows);

    let eval_model = if gating_verdict.sufficiency != Sufficiency::Low {
        match GbmModel::fit(&train_rows, &GbmParams::default()) {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!(error = %e, "MLTrainingFailure on eval split, falling back to baseline-only");
                None
            }
        }
    } else {
        None
    };
    stage = RunStage::Trained;
    tracing::debug!(stage = ?stage, lgbm_trained = eval_model.is_some(), "models trained");

    let outcome = evaluator::evaluate(
        &holdout_rows,
        &training_counts,
        &hourly_means,
        eval_model.as_ref(),
        &gating_verdict,
    );
    let registry_summary: RegistrySummary = registry::summarize(&outcome.registry);
    let run_metrics = RunMetrics {
        wmape: metrics::wmape(&outcome.actual, &outcome.champion_pred).unwrap_or(0.0),
        mase: metrics::mase(&outcome.actual, &outcome.champion_pred, &outcome.seasonal_reference)
            .unwrap_or(0.0),
        bias: metrics::bias(&outcome.actual, &outcome.champion_pred).unwrap_or(0.0),
        directional_accuracy: metrics::directional_accuracy(&outcome.actual, &outcome.champion_pred)
            .unwrap_or(0.0),
    };
    let interval_coverage = metrics::coverage(&outcome.actual, &outcome.lower, &outcome.upper).unwrap_or(0.0);
    stage = RunStage::Evaluated;
    tracing::debug!(
        stage = ?stage,
        ml_wins = registry_summary.ml_wins,
        baseline_wins = registry_summary.baseline_wins,
        wmape = run_metrics.wmape,
        "evaluation complete"
    );

    // Production model retrained on the full trainable set, not just the
    // train split, so deployment-time predictions use everything observed.
    let final_model = if gating_verdict.sufficiency != Sufficiency::Low {
        GbmModel::fit(&feature_rows, &GbmParams::default()).ok()
    } else {
        None
    };

    let avg_ticket_value = average_ticket_value(rows);

    let history_end = grid.iter().map(|c| c.sale_date).max().unwrap();
    let forecast_start = history_end + chrono::Duration::days(1);

    let champion_run = predictor::predict_range(
        &grid,
        &outcome.registry,
        final_model.as_ref(),
        &hourly_means,
        &holidays,
        avg_ticket_value,
        forecast_start,
        request.horizon_days,
        false,
    );
    let blended = if gating_verdict.blend_ratio < 1.0 {
        let baseline_run = predictor::predict_range(
            &grid,
            &outcome.registry,
            final_model.as_ref(),
            &hourly_means,
            &holidays,
            avg_ticket_value,
            forecast_start,
            request.horizon_days,
            true,
        );
        predictor::blend(
            &champion_run,
            &baseline_run,
            gating_verdict.blend_ratio,
            &gating_verdict.algorithm_label,
        )
    } else {
        champion_run
    };
    stage = RunStage::Predicted;
    tracing::debug!(stage = ?stage, rows = blended.len(), "hourly forecasts predicted");

    let masked: Vec<_> = blended
        .into_iter()
        .map(|mut row| {
            if !request.open_hours.is_service_hour(row.hour_of_day) {
                row.forecast_sales = 0.0;
                row.forecast_sales_lower = 0.0;
                row.forecast_sales_upper = 0.0;
                row.forecast_orders = 0.0;
                row.forecast_covers = 0.0;
            }
            row
        })
        .collect();
    stage = RunStage::Masked;
    tracing::debug!(stage = ?stage, "non-service hours masked");

    let daily_forecasts = rollup::rollup(&masked);
    stage = RunStage::RolledUp;
    tracing::debug!(stage = ?stage, days = daily_forecasts.len(), "daily roll-up complete");

    let generated_at = Utc::now();
    let registry_rows = registry::build_rows(&request.location_id, &outcome.registry, generated_at);
    let history_start = grid.iter().map(|c| c.sale_date).min().unwrap();
    let audit_row: AuditRow = registry::build_audit_row(
        &request.location_id,
        &gating_verdict.algorithm_label,
        gating_verdict.sufficiency,
        gating_verdict.blend_ratio,
        run_metrics.wmape,
        history_start,
        history_end,
        request.horizon_days,
        grid.len(),
        interval_coverage,
        generated_at,
    );
    stage = RunStage::Emitted;
    tracing::debug!(stage = ?stage, "run emitted");

    let sample_hourly = masked.iter().take(24).cloned().collect();
    let sample_daily = daily_forecasts.iter().take(1).cloned().collect();

    RunSummary {
        success: true,
        reason: None,
        location_id: request.location_id.clone(),
        gating: Some(gating_verdict),
        lgbm_used: final_model.is_some(),
        metrics: Some(run_metrics),
        registry_summary: Some(registry_summary),
        hourly_forecasts: masked,
        daily_forecasts,
        registry_rows,
        audit_row: Some(audit_row),
        sample_hourly,
        sample_daily,
    }
}

/// Per-location average ticket value, derived from history when enough
/// ticketed hours exist, otherwise `None` so the predictor falls back to
/// the spec's hard-coded default.
fn average_ticket_value(rows: &[RawBucket]) -> f64 {
    let ticketed: Vec<&RawBucket> = rows.iter().filter(|r| r.tickets > 0).collect();
    if ticketed.len() < MIN_TICKETED_HOURS_FOR_AVG_TICKET as usize {
        return DEFAULT_AVG_TICKET_VALUE;
    }
    let total_sales: f64 = ticketed.iter().map(|r| r.sales_net.max(0.0)).sum();
    let total_tickets: u32 = ticketed.iter().map(|r| r.tickets).sum();
    if total_tickets == 0 {
        DEFAULT_AVG_TICKET_VALUE
    } else {
        total_sales / total_tickets as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSource, OpenHoursSpec};
    use chrono::{Duration, TimeZone, Utc as ChronoUtc};

    fn request(horizon_days: u32) -> RunRequest {
        RunRequest {
            location_id: "loc-1".to_string(),
            location_name: "Test Bistro".to_string(),
            horizon_days,
            data_source: DataSource::Demo,
            open_hours: OpenHoursSpec::default(),
        }
    }

    fn rows_for_days(days: i64) -> Vec<RawBucket> {
        let start = ChronoUtc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut rows = Vec::new();
        for d in 0..days {
            for h in 12..=22 {
                let wobble = ((d % 7) as f64) * 4.0;
                rows.push(RawBucket {
                    ts_bucket: start + Duration::days(d) + Duration::hours(h),
                    sales_net: 50.0 + h as f64 + wobble,
                    tickets: 6,
                });
            }
        }
        rows
    }

    #[test]
    fn empty_history_fails_cleanly() {
        let summary = run(&request(7), &[]);
        assert!(!summary.success);
        assert!(summary.reason.is_some());
        assert!(summary.hourly_forecasts.is_empty());
    }

    #[test]
    fn three_days_aborts_before_forecasting() {
        let rows = rows_for_days(3);
        let summary = run(&request(7), &rows);
        assert!(!summary.success);
        assert!(summary.gating.is_some());
    }

    #[test]
    fn thirty_days_runs_mid_tier_and_blends() {
        let rows = rows_for_days(30);
        let summary = run(&request(7), &rows);
        assert!(summary.success);
        let gating = summary.gating.unwrap();
        assert_eq!(gating.sufficiency, Sufficiency::Mid);
        assert_eq!(summary.hourly_forecasts.len(), 7 * 24);
        assert!(summary
            .hourly_forecasts
            .iter()
            .all(|h| h.model_used == "BLEND_Naive70_LightGBM30"));
    }

    #[test]
    fn sixty_days_runs_high_tier_champion_challenger() {
        let rows = rows_for_days(60);
        let summary = run(&request(5), &rows);
        assert!(summary.success);
        let gating = summary.gating.unwrap();
        assert_eq!(gating.sufficiency, Sufficiency::High);
        assert_eq!(summary.registry_rows.len(), 168);
    }

    #[test]
    fn non_service_hours_are_zeroed() {
        let rows = rows_for_days(20);
        let summary = run(&request(3), &rows);
        assert!(summary.success);
        for row in &summary.hourly_forecasts {
            if !OpenHoursSpec::default().is_service_hour(row.hour_of_day) {
                assert_eq!(row.forecast_sales, 0.0);
            }
        }
    }

    #[test]
    fn daily_forecasts_sum_their_hourly_rows() {
        let rows = rows_for_days(20);
        let summary = run(&request(2), &rows);
        assert!(summary.success);
        for daily in &summary.daily_forecasts {
            let expected: f64 = summary
                .hourly_forecasts
                .iter()
                .filter(|h| h.forecast_date == daily.date)
                .map(|h| h.forecast_sales)
                .sum();
            assert!((daily.forecast_sales - expected).abs() < 1e-6);
        }
    }
}
