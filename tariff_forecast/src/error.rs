//! Error types for the tariff_forecast crate

use crate::data::Metric;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the tariff_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Too few observations to fit a series
    #[error(
        "Insufficient data for {country} {metric}: {observations} observations, need {required}"
    )]
    InsufficientData {
        country: String,
        metric: Metric,
        observations: usize,
        required: usize,
    },

    /// Input rejected at ingestion
    #[error("Malformed input for {country} ({field}): {reason}")]
    MalformedInput {
        country: String,
        field: String,
        reason: String,
    },

    /// The fitting procedure failed or did not converge
    #[error("Model fit failed for {country} {metric}: {reason}")]
    ModelFitFailure {
        country: String,
        metric: Metric,
        reason: String,
    },

    /// The fit exceeded its time budget
    #[error("Model fit for {country} {metric} timed out after {elapsed_ms} ms")]
    FitTimeout {
        country: String,
        metric: Metric,
        elapsed_ms: u128,
    },

    /// The adjuster was called without any tariff table
    #[error("No tariff table was supplied; refusing to default every country")]
    MissingTariffTable,

    /// A tariff record's country code has no mapping to a country name
    #[error("Unknown country code: {0}")]
    UnknownCountryCode(String),

    /// The data source answered but had nothing to give
    #[error("No data available: {0}")]
    DataUnavailable(String),

    /// A data source call failed after exhausting its retries
    #[error("Data source failed after {attempts} attempt(s): {message}")]
    Source { attempts: u32, message: String },

    /// A transient data source failure that may be retried
    #[error("Transient data source failure: {0}")]
    Transient(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from configuration parsing
    #[error("Config error: {0}")]
    Config(String),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    Math(#[from] trade_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    /// Whether a data source call failing with this error should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, ForecastError::Transient(_) | ForecastError::IoError(_))
    }

    pub(crate) fn malformed(
        country: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ForecastError::MalformedInput {
            country: country.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
