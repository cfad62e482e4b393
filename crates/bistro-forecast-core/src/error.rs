//! Error types for the forecast engine.

use thiserror::Error;

/// Result type for forecast engine operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error types for forecast engine operations.
///
/// Most of spec's error kinds (MLTrainingFailure, MLPredictionNaN,
/// EmptyBucket, ClosedHourHeuristic) are internal degrade decisions, not
/// propagated `Err`s — they are logged and folded into a simpler forecast
/// path. Only [`ForecastError::InsufficientData`] reaches a caller, and even
/// then via [`crate::pipeline::run`]'s `success: false` summary rather than
/// as a hard error, since a short history is an expected, well-typed
/// outcome rather than a programming mistake.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("computation error: {0}")]
    ComputationError(String),

    #[error("insufficient data: need at least {needed} days, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
}
