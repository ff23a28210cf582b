//! Forecasting models for annual trade series

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Predicted values with uncertainty bounds, one entry per requested date
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    intervals: Vec<(f64, f64)>,
}

impl ForecastResult {
    /// Create a forecast result, checking that every value lies inside its interval
    pub fn new(
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        intervals: Vec<(f64, f64)>,
    ) -> Result<Self> {
        if values.len() != dates.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match dates length ({})",
                values.len(),
                dates.len()
            )));
        }
        if values.len() != intervals.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }
        if let Some((value, (lower, upper))) = values
            .iter()
            .zip(&intervals)
            .find(|(v, (l, u))| !(l <= *v && *v <= u))
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Value {} lies outside its interval [{}, {}]",
                value, lower, upper
            )));
        }

        Ok(Self {
            dates,
            values,
            intervals,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Facts about a completed fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Observation noise standard deviation, in the series' units
    pub noise_sigma: f64,
    /// Number of trend changepoints considered
    pub changepoints: usize,
    /// Iterations the fit needed to converge
    pub iterations: usize,
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Predict values and bounds at the given dates, historical or future
    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastResult>;

    /// Summary of how the fit went
    fn fit_summary(&self) -> FitSummary;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a time series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a series
    fn train(&self, series: &TimeSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod piecewise_trend;
