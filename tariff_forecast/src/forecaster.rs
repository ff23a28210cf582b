//! Baseline forecaster: one independent trend fit per (country, metric)
//!
//! Each output row covers a year in `[first observed year, last observed
//! year + periods]`. A row is a forecast row iff its year is later than the
//! last observed year; historical rows carry the observed value as `actual`.
//! Countries that cannot be forecast are skipped and reported in the batch
//! manifest instead of failing the run.

use crate::config::ForecastConfig;
use crate::data::{year_start, Metric, TimeSeries, TradeTable};
use crate::error::{ForecastError, Result};
use crate::metrics::{fit_accuracy, FitAccuracy};
use crate::models::piecewise_trend::PiecewiseTrend;
use crate::models::{FitSummary, ForecastModel, TrainedForecastModel};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// One year of a baseline forecast for one country and metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// January 1 of `year`
    pub ds: NaiveDate,
    pub year: i32,
    pub country_name: String,
    pub metric: Metric,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    /// Observed value, present only for historical years
    pub actual: Option<f64>,
    pub is_forecast: bool,
}

/// Rows of baseline forecasts, possibly spanning several countries and metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    points: Vec<ForecastPoint>,
}

impl ForecastTable {
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<ForecastPoint> {
        self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows for one country and metric
    pub fn for_series<'a>(
        &'a self,
        country_name: &'a str,
        metric: Metric,
    ) -> impl Iterator<Item = &'a ForecastPoint> {
        self.points
            .iter()
            .filter(move |p| p.country_name == country_name && p.metric == metric)
    }

    /// Only the projected rows
    pub fn forecast_rows(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.is_forecast)
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = ForecastPoint>) {
        self.points.extend(points);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.points)?)
    }
}

/// Diagnostics for one fitted series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub model: String,
    pub observations: usize,
    pub summary: FitSummary,
    pub accuracy: FitAccuracy,
}

/// A successful forecast for one series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub country_name: String,
    pub metric: Metric,
    pub points: Vec<ForecastPoint>,
    pub diagnostics: FitDiagnostics,
}

/// Why a series produced no rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    CountryAbsent,
    InsufficientData { observations: usize, required: usize },
    ModelFitFailure(String),
    FitTimeout { elapsed_ms: u128 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CountryAbsent => write!(f, "country absent from trade data"),
            SkipReason::InsufficientData {
                observations,
                required,
            } => write!(f, "{} observations, need {}", observations, required),
            SkipReason::ModelFitFailure(reason) => write!(f, "model fit failed: {}", reason),
            SkipReason::FitTimeout { elapsed_ms } => {
                write!(f, "fit timed out after {} ms", elapsed_ms)
            }
        }
    }
}

/// Outcome of forecasting one series
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Forecast(SeriesForecast),
    Skipped(SkipReason),
}

impl ForecastOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ForecastOutcome::Skipped(_))
    }

    pub fn forecast(&self) -> Option<&SeriesForecast> {
        match self {
            ForecastOutcome::Forecast(f) => Some(f),
            ForecastOutcome::Skipped(_) => None,
        }
    }
}

/// A series left out of a batch, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSeries {
    pub country_name: String,
    pub metric: Metric,
    pub reason: SkipReason,
}

/// Result of a multi-country run: every row that could be produced plus a
/// manifest of what was skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchForecast {
    pub table: ForecastTable,
    pub skipped: Vec<SkippedSeries>,
    pub diagnostics: Vec<(String, Metric, FitDiagnostics)>,
}

impl BatchForecast {
    /// Countries that produced rows for `metric`
    pub fn forecasted_countries(&self, metric: Metric) -> Vec<&str> {
        self.diagnostics
            .iter()
            .filter(|(_, m, _)| *m == metric)
            .map(|(c, _, _)| c.as_str())
            .collect()
    }

    fn absorb(&mut self, country_name: &str, metric: Metric, outcome: ForecastOutcome) {
        match outcome {
            ForecastOutcome::Forecast(forecast) => {
                self.diagnostics
                    .push((forecast.country_name.clone(), forecast.metric, forecast.diagnostics));
                self.table.extend(forecast.points);
            }
            ForecastOutcome::Skipped(reason) => self.skipped.push(SkippedSeries {
                country_name: country_name.trim().to_string(),
                metric,
                reason,
            }),
        }
    }
}

/// Fits one model per series and assembles baseline forecast rows
#[derive(Debug, Clone)]
pub struct BaselineForecaster<M: ForecastModel = PiecewiseTrend> {
    model: M,
    periods: usize,
    min_observations: usize,
}

impl BaselineForecaster<PiecewiseTrend> {
    /// Forecaster with the default piecewise trend model
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let model = PiecewiseTrend::new(config)?;
        Self::with_model(model, config)
    }
}

impl<M: ForecastModel> BaselineForecaster<M> {
    /// Forecaster with a caller-supplied model
    pub fn with_model(model: M, config: &ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            periods: config.periods,
            min_observations: config.min_observations,
        })
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    /// Fit a series and produce its rows, or the error explaining why not
    pub fn fit_series(&self, series: &TimeSeries) -> Result<SeriesForecast> {
        if series.len() < self.min_observations {
            return Err(ForecastError::InsufficientData {
                country: series.country_name().to_string(),
                metric: series.metric(),
                observations: series.len(),
                required: self.min_observations,
            });
        }

        let (first_year, last_year) = match (series.first_year(), series.last_year()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ForecastError::InsufficientData {
                    country: series.country_name().to_string(),
                    metric: series.metric(),
                    observations: 0,
                    required: self.min_observations,
                })
            }
        };

        let end_year = i32::try_from(self.periods)
            .ok()
            .and_then(|periods| last_year.checked_add(periods))
            .filter(|&year| year_start(year).is_some())
            .ok_or_else(|| {
                ForecastError::InvalidParameter(format!(
                    "forecast horizon of {} years from {} is out of range",
                    self.periods, last_year
                ))
            })?;

        let trained = self.model.train(series)?;

        let dates: Vec<NaiveDate> = (first_year..=end_year).filter_map(year_start).collect();
        let result = trained.predict(&dates)?;

        let points: Vec<ForecastPoint> = dates
            .iter()
            .zip(result.values())
            .zip(result.intervals())
            .map(|((&ds, &yhat), &(yhat_lower, yhat_upper))| {
                let year = ds.year();
                ForecastPoint {
                    ds,
                    year,
                    country_name: series.country_name().to_string(),
                    metric: series.metric(),
                    yhat,
                    yhat_lower,
                    yhat_upper,
                    actual: series.value_for(year),
                    is_forecast: year > last_year,
                }
            })
            .collect();

        let historical_fit: Vec<f64> = points
            .iter()
            .filter(|p| p.actual.is_some())
            .map(|p| p.yhat)
            .collect();
        let accuracy = fit_accuracy(&historical_fit, &series.values())?;

        Ok(SeriesForecast {
            country_name: series.country_name().to_string(),
            metric: series.metric(),
            points,
            diagnostics: FitDiagnostics {
                model: trained.name().to_string(),
                observations: series.len(),
                summary: trained.fit_summary(),
                accuracy,
            },
        })
    }

    /// Forecast a series, turning per-series failures into a skip
    pub fn forecast_series(&self, series: &TimeSeries) -> ForecastOutcome {
        match self.fit_series(series) {
            Ok(forecast) => ForecastOutcome::Forecast(forecast),
            Err(err) => {
                let reason = match err {
                    ForecastError::InsufficientData {
                        observations,
                        required,
                        ..
                    } => SkipReason::InsufficientData {
                        observations,
                        required,
                    },
                    ForecastError::FitTimeout { elapsed_ms, .. } => {
                        SkipReason::FitTimeout { elapsed_ms }
                    }
                    ForecastError::ModelFitFailure { reason, .. } => {
                        SkipReason::ModelFitFailure(reason)
                    }
                    other => SkipReason::ModelFitFailure(other.to_string()),
                };
                warn!(
                    country = series.country_name(),
                    metric = %series.metric(),
                    %reason,
                    "skipping series"
                );
                ForecastOutcome::Skipped(reason)
            }
        }
    }

    /// Forecast one country's metric from a trade table
    pub fn forecast_country(
        &self,
        table: &TradeTable,
        country_name: &str,
        metric: Metric,
    ) -> ForecastOutcome {
        debug!(country = country_name, %metric, "forecasting");
        match table.series(country_name, metric) {
            Some(series) => self.forecast_series(&series),
            None => {
                warn!(country = country_name, %metric, "country absent from trade data");
                ForecastOutcome::Skipped(SkipReason::CountryAbsent)
            }
        }
    }

    /// Forecast every listed country independently and concatenate the rows
    pub fn forecast_all<S: AsRef<str>>(
        &self,
        table: &TradeTable,
        countries: &[S],
        metric: Metric,
    ) -> BatchForecast {
        let mut batch = BatchForecast::default();
        for country in countries {
            let country = country.as_ref();
            let outcome = self.forecast_country(table, country, metric);
            batch.absorb(country, metric, outcome);
        }

        info!(
            %metric,
            requested = countries.len(),
            skipped = batch.skipped.len(),
            rows = batch.table.len(),
            "batch forecast complete"
        );
        batch
    }

    /// Forecast both exports and imports for every listed country
    pub fn forecast_all_metrics<S: AsRef<str>>(
        &self,
        table: &TradeTable,
        countries: &[S],
    ) -> BatchForecast {
        let mut batch = BatchForecast::default();
        for metric in Metric::ALL {
            let part = self.forecast_all(table, countries, metric);
            batch.table.extend(part.table.into_points());
            batch.skipped.extend(part.skipped);
            batch.diagnostics.extend(part.diagnostics);
        }
        batch
    }
}
