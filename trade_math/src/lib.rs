//! # Trade Math
//!
//! Numeric building blocks for trade-flow forecasting: least-squares
//! regression, piecewise-linear trends with changepoints and dispersion
//! statistics.

use thiserror::Error;

pub mod dispersion;
pub mod regression;
pub mod trend;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
