//! Piecewise-linear trend with changepoints
//!
//! The trend is `offset + slope * t + sum_j delta_j * max(t - s_j, 0)`, where
//! `s_j` are changepoint locations on a scaled time axis. Fitting the
//! coefficients is left to the caller (see [`crate::regression`]); this module
//! owns changepoint placement, the design basis and evaluation.

use crate::{MathError, Result};

/// Place candidate changepoints evenly over the first `range` share of `t`.
///
/// `t` must be sorted ascending. At most `max_changepoints` are placed and
/// never more than one per observation inside the range, excluding the first.
pub fn changepoint_locations(t: &[f64], range: f64, max_changepoints: usize) -> Result<Vec<f64>> {
    if !(0.0..=1.0).contains(&range) || range == 0.0 {
        return Err(MathError::InvalidInput(
            "Changepoint range must be in (0, 1]".to_string(),
        ));
    }
    if t.windows(2).any(|w| w[1] < w[0]) {
        return Err(MathError::InvalidInput(
            "Time axis must be sorted ascending".to_string(),
        ));
    }

    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = max_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Ok(Vec::new());
    }

    let last = (hist_size - 1) as f64;
    let step = last / count as f64;
    let locations = (1..=count)
        .map(|i| (i as f64 * step).round() as usize)
        .map(|idx| t[idx])
        .collect();

    Ok(locations)
}

/// One design row for time `t`: `[1, t, (t - s_1)+, ..., (t - s_k)+]`
pub fn design_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(changepoints.len() + 2);
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&s| (t - s).max(0.0)));
    row
}

/// A fitted piecewise-linear trend
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearTrend {
    offset: f64,
    slope: f64,
    changepoints: Vec<f64>,
    deltas: Vec<f64>,
}

impl PiecewiseLinearTrend {
    /// Build a trend from a coefficient vector laid out like [`design_row`]
    pub fn from_coefficients(coefficients: &[f64], changepoints: Vec<f64>) -> Result<Self> {
        if coefficients.len() != changepoints.len() + 2 {
            return Err(MathError::InvalidInput(format!(
                "Expected {} coefficients, got {}",
                changepoints.len() + 2,
                coefficients.len()
            )));
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(MathError::CalculationError(
                "Trend coefficients must be finite".to_string(),
            ));
        }

        Ok(Self {
            offset: coefficients[0],
            slope: coefficients[1],
            deltas: coefficients[2..].to_vec(),
            changepoints,
        })
    }

    /// Trend value at time `t`
    pub fn value_at(&self, t: f64) -> f64 {
        self.offset
            + self.slope * t
            + self
                .changepoints
                .iter()
                .zip(&self.deltas)
                .map(|(&s, &d)| d * (t - s).max(0.0))
                .sum::<f64>()
    }

    /// Mean absolute rate change across changepoints, 0 when there are none
    pub fn mean_abs_delta(&self) -> f64 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }
}

/// Variance of the trend beyond the end of history.
///
/// Future changepoints arrive at `rate` per unit of scaled time with
/// Laplace(0, `scale`) deltas, so the deviation at `t` past `history_end`
/// has variance `rate * 2 scale^2 * h^3 / 3` with `h = t - history_end`.
pub fn future_trend_variance(t: f64, history_end: f64, rate: f64, scale: f64) -> f64 {
    let h = t - history_end;
    if h <= 0.0 || rate <= 0.0 {
        return 0.0;
    }
    rate * 2.0 * scale * scale * h.powi(3) / 3.0
}
