//! Additive trend model with changepoints for annual series
//!
//! Values are scaled by their largest magnitude and time is scaled so that
//! history spans `[0, 1]`. The trend is piecewise linear with candidate
//! changepoints spread over the first part of history; rate changes carry a
//! prior of scale `changepoint_prior_scale` and the offset and base slope a
//! weak prior of scale 5. The fit alternates between a penalised
//! least-squares solve and re-estimating the noise variance until the
//! variance settles.
//!
//! Uncertainty combines observation noise with, beyond history, the spread
//! of future trend changes: changepoints keep arriving at the historical rate
//! with magnitudes like the fitted ones. No seasonal component is fitted,
//! since the data is annual.

use crate::config::ForecastConfig;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{FitSummary, ForecastModel, ForecastResult, TrainedForecastModel};
use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};
use std::time::{Duration, Instant};
use trade_math::dispersion::{max_abs, mean_square, residuals};
use trade_math::regression::{linear_residual_variance, ridge_least_squares};
use trade_math::trend::{
    changepoint_locations, design_row, future_trend_variance, PiecewiseLinearTrend,
};
use tracing::debug;

/// Smallest noise variance, in scaled units, the fit will settle on
const NOISE_FLOOR: f64 = 1e-10;

/// Prior scale for the offset and base slope
const BASE_PRIOR_SCALE: f64 = 5.0;

/// Piecewise-linear trend model
#[derive(Debug, Clone)]
pub struct PiecewiseTrend {
    name: String,
    changepoint_prior_scale: f64,
    changepoint_range: f64,
    max_changepoints: usize,
    z_score: f64,
    max_iterations: usize,
    tolerance: f64,
    fit_timeout: Duration,
}

/// Trained piecewise-linear trend model
#[derive(Debug, Clone)]
pub struct TrainedPiecewiseTrend {
    name: String,
    trend: PiecewiseLinearTrend,
    origin: NaiveDate,
    span_days: f64,
    y_scale: f64,
    noise_variance: f64,
    z_score: f64,
    iterations: usize,
}

impl PiecewiseTrend {
    /// Create a model from forecaster settings
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        config.validate()?;

        let normal =
            Normal::new(0.0, 1.0).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let z_score = normal.inverse_cdf(0.5 + config.interval_width / 2.0);

        Ok(Self {
            name: format!(
                "Piecewise Trend (changepoint_prior_scale={}, interval_width={})",
                config.changepoint_prior_scale, config.interval_width
            ),
            changepoint_prior_scale: config.changepoint_prior_scale,
            changepoint_range: config.changepoint_range,
            max_changepoints: config.max_changepoints,
            z_score,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            fit_timeout: config.fit_timeout(),
        })
    }

    /// Half-width multiplier of the uncertainty band
    pub fn z_score(&self) -> f64 {
        self.z_score
    }

    fn fit_failure(series: &TimeSeries, reason: impl ToString) -> ForecastError {
        ForecastError::ModelFitFailure {
            country: series.country_name().to_string(),
            metric: series.metric(),
            reason: reason.to_string(),
        }
    }
}

impl ForecastModel for PiecewiseTrend {
    type Trained = TrainedPiecewiseTrend;

    fn train(&self, series: &TimeSeries) -> Result<Self::Trained> {
        let started = Instant::now();

        let dates = series.dates();
        if dates.len() < 2 {
            return Err(ForecastError::InsufficientData {
                country: series.country_name().to_string(),
                metric: series.metric(),
                observations: dates.len(),
                required: 2,
            });
        }

        let origin = dates[0];
        let span_days = (dates[dates.len() - 1] - origin).num_days() as f64;
        if span_days <= 0.0 {
            return Err(Self::fit_failure(series, "history spans no time"));
        }
        let t: Vec<f64> = dates
            .iter()
            .map(|d| (*d - origin).num_days() as f64 / span_days)
            .collect();

        let values = series.values();
        let y_scale = match max_abs(&values) {
            s if s > 0.0 => s,
            _ => 1.0,
        };
        let y: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

        let changepoints = changepoint_locations(&t, self.changepoint_range, self.max_changepoints)
            .map_err(|e| Self::fit_failure(series, e))?;
        let design: Vec<Vec<f64>> = t.iter().map(|&ti| design_row(ti, &changepoints)).collect();

        let mut noise_variance = linear_residual_variance(&t, &y)
            .unwrap_or(NOISE_FLOOR)
            .max(NOISE_FLOOR);
        let delta_precision = 1.0 / (2.0 * self.changepoint_prior_scale.powi(2));
        let base_precision = 1.0 / BASE_PRIOR_SCALE.powi(2);

        for iteration in 1..=self.max_iterations {
            let elapsed = started.elapsed();
            if elapsed >= self.fit_timeout {
                return Err(ForecastError::FitTimeout {
                    country: series.country_name().to_string(),
                    metric: series.metric(),
                    elapsed_ms: elapsed.as_millis(),
                });
            }

            let mut penalties = vec![noise_variance * delta_precision; changepoints.len() + 2];
            penalties[0] = noise_variance * base_precision;
            penalties[1] = noise_variance * base_precision;

            let coefficients = ridge_least_squares(&design, &y, &penalties)
                .map_err(|e| Self::fit_failure(series, e))?;
            let fitted: Vec<f64> = design
                .iter()
                .map(|row| row.iter().zip(&coefficients).map(|(x, b)| x * b).sum())
                .collect();
            let resid = residuals(&y, &fitted)?;
            let next_variance = mean_square(&resid)?.max(NOISE_FLOOR);
            if !next_variance.is_finite() {
                return Err(Self::fit_failure(series, "noise variance diverged"));
            }

            let converged =
                (next_variance - noise_variance).abs() <= self.tolerance * (1.0 + noise_variance);
            noise_variance = next_variance;

            if converged {
                let trend =
                    PiecewiseLinearTrend::from_coefficients(&coefficients, changepoints.clone())
                        .map_err(|e| Self::fit_failure(series, e))?;
                debug!(
                    country = series.country_name(),
                    metric = %series.metric(),
                    iterations = iteration,
                    changepoints = trend.changepoints().len(),
                    "trend fit converged"
                );
                return Ok(TrainedPiecewiseTrend {
                    name: self.name.clone(),
                    trend,
                    origin,
                    span_days,
                    y_scale,
                    noise_variance,
                    z_score: self.z_score,
                    iterations: iteration,
                });
            }
        }

        Err(Self::fit_failure(
            series,
            format!("did not converge within {} iterations", self.max_iterations),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedPiecewiseTrend {
    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64 / self.span_days
    }
}

impl TrainedForecastModel for TrainedPiecewiseTrend {
    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastResult> {
        let rate = self.trend.changepoints().len() as f64;
        let delta_scale = self.trend.mean_abs_delta();

        let mut values = Vec::with_capacity(dates.len());
        let mut intervals = Vec::with_capacity(dates.len());
        for &date in dates {
            let t = self.scaled_time(date);
            let yhat = self.trend.value_at(t) * self.y_scale;
            let variance = self.noise_variance + future_trend_variance(t, 1.0, rate, delta_scale);
            let half_width = self.z_score * variance.sqrt() * self.y_scale;

            values.push(yhat);
            intervals.push((yhat - half_width, yhat + half_width));
        }

        ForecastResult::new(dates.to_vec(), values, intervals)
    }

    fn fit_summary(&self) -> FitSummary {
        FitSummary {
            noise_sigma: self.noise_variance.sqrt() * self.y_scale,
            changepoints: self.trend.changepoints().len(),
            iterations: self.iterations,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{year_start, Metric};
    use approx::assert_relative_eq;

    fn series(values: &[f64]) -> TimeSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (2015 + i as i32, v))
            .collect();
        TimeSeries::new("China", Metric::Exports, points).unwrap()
    }

    fn years(from: i32, to: i32) -> Vec<NaiveDate> {
        (from..=to).filter_map(year_start).collect()
    }

    #[test]
    fn test_z_score_for_eighty_percent_band() {
        let model = PiecewiseTrend::new(&ForecastConfig::default()).unwrap();
        assert_relative_eq!(model.z_score(), 1.2816, epsilon = 1e-4);
    }

    #[test]
    fn test_linear_series_is_extended() {
        let model = PiecewiseTrend::new(&ForecastConfig::default()).unwrap();
        let trained = model.train(&series(&[100.0, 110.0, 120.0, 130.0, 140.0])).unwrap();

        let result = trained.predict(&years(2015, 2022)).unwrap();
        let values = result.values();
        assert_relative_eq!(values[0], 100.0, epsilon = 0.5);
        assert_relative_eq!(values[4], 140.0, epsilon = 0.5);
        assert!(values[5] > values[4]);
        assert!(values[6] > values[5]);
        assert!(values[7] > values[6]);
    }

    #[test]
    fn test_future_band_widens() {
        let model = PiecewiseTrend::new(&ForecastConfig::default()).unwrap();
        let trained = model
            .train(&series(&[100.0, 120.0, 105.0, 140.0, 130.0, 170.0, 150.0, 190.0]))
            .unwrap();

        let result = trained.predict(&years(2015, 2025)).unwrap();
        let widths: Vec<f64> = result.intervals().iter().map(|(l, u)| u - l).collect();
        assert!(widths[10] > widths[7]);
        for ((lower, upper), value) in result.intervals().iter().zip(result.values()) {
            assert!(lower <= value && value <= upper);
        }
    }

    #[test]
    fn test_flat_zero_series() {
        let model = PiecewiseTrend::new(&ForecastConfig::default()).unwrap();
        let trained = model.train(&series(&[0.0, 0.0, 0.0, 0.0])).unwrap();
        let result = trained.predict(&years(2015, 2020)).unwrap();
        assert!(result.values().iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_zero_timeout_aborts_fit() {
        let config = ForecastConfig {
            fit_timeout_ms: 0,
            ..ForecastConfig::default()
        };
        let model = PiecewiseTrend::new(&config).unwrap();
        let result = model.train(&series(&[1.0, 2.0, 3.0, 4.0]));
        assert!(matches!(result, Err(ForecastError::FitTimeout { .. })));
    }

    #[test]
    fn test_fit_summary() {
        let model = PiecewiseTrend::new(&ForecastConfig::default()).unwrap();
        let trained = model.train(&series(&[100.0, 110.0, 120.0, 130.0, 140.0])).unwrap();
        let summary = trained.fit_summary();
        assert_eq!(summary.changepoints, 3);
        assert!(summary.iterations >= 1);
        assert!(summary.noise_sigma >= 0.0);
    }
}
