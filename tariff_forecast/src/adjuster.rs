//! Tariff impact adjuster
//!
//! Bends projected rows of a baseline forecast by a fixed elasticity: every
//! 10 percentage points of the *current* tariff rate removes 3% of projected
//! trade. Historical rows pass through untouched. Countries missing from the
//! tariff table fall back to the configured default rate, and each such row
//! is marked so consumers know the adjustment is approximate.

use crate::config::{NegativePolicy, TariffConfig};
use crate::data::TariffTable;
use crate::error::{ForecastError, Result};
use crate::forecaster::{ForecastPoint, ForecastTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Where the tariff rate applied to a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffSource {
    Table,
    Default,
}

/// A baseline row plus its tariff-adjusted projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedForecastPoint {
    #[serde(flatten)]
    pub forecast: ForecastPoint,
    pub yhat_tariff_adjusted: f64,
    /// `yhat - yhat_tariff_adjusted`
    pub tariff_drag_amount: f64,
    /// Current tariff rate, in percent, used for this country
    pub tariff_rate_applied: f64,
    pub tariff_source: TariffSource,
    /// Share of `yhat` removed; 0 on historical rows
    pub drag_factor: f64,
    /// Whether the raw factor exceeded 1 and was capped
    pub drag_clamped: bool,
}

/// Rows of tariff-adjusted forecasts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustedForecastTable {
    points: Vec<AdjustedForecastPoint>,
}

impl AdjustedForecastTable {
    pub fn points(&self) -> &[AdjustedForecastPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdjustedForecastPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Countries whose rows were adjusted with the default rate
    pub fn defaulted_countries(&self) -> Vec<&str> {
        self.points
            .iter()
            .filter(|p| p.tariff_source == TariffSource::Default)
            .map(|p| p.forecast.country_name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Total projected trade lost to tariffs across all rows
    pub fn total_drag(&self) -> f64 {
        self.points.iter().map(|p| p.tariff_drag_amount).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.points)?)
    }
}

/// Applies the tariff elasticity rule to baseline forecasts
#[derive(Debug, Clone, Default)]
pub struct TariffAdjuster {
    config: TariffConfig,
}

impl TariffAdjuster {
    pub fn new(config: TariffConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Drag factor for a tariff rate in percent, and whether it was capped
    pub fn drag_factor(&self, tariff_rate: f64) -> (f64, bool) {
        let raw = (tariff_rate / 10.0) * self.config.elasticity_per_ten_points;
        match self.config.negative_policy {
            NegativePolicy::Clamp if raw > 1.0 => (1.0, true),
            _ => (raw.max(0.0), false),
        }
    }

    /// Augment every row of `forecast` with its tariff-adjusted projection.
    ///
    /// Fails when no tariff table is supplied, or the table holds no
    /// countries; countries missing from a populated table use the default
    /// rate.
    pub fn adjust(
        &self,
        forecast: &ForecastTable,
        tariffs: Option<&TariffTable>,
    ) -> Result<AdjustedForecastTable> {
        let tariffs = match tariffs {
            Some(table) if !table.is_empty() => table,
            _ => return Err(ForecastError::MissingTariffTable),
        };

        let mut warned = BTreeSet::new();
        let mut points = Vec::with_capacity(forecast.len());

        for row in forecast.iter() {
            let (rate, source) = match tariffs.current_rate(&row.country_name) {
                Some(rate) => (rate, TariffSource::Table),
                None => {
                    if warned.insert(row.country_name.clone()) {
                        warn!(
                            country = row.country_name.as_str(),
                            default_rate = self.config.default_rate,
                            "no current tariff rate for country; using default rate"
                        );
                    }
                    (self.config.default_rate, TariffSource::Default)
                }
            };

            let (drag_factor, drag_clamped) = if row.is_forecast {
                let (factor, clamped) = self.drag_factor(rate);
                if clamped {
                    warn!(
                        country = row.country_name.as_str(),
                        year = row.year,
                        tariff_rate = rate,
                        "drag factor capped at 1; adjusted trade floors at zero"
                    );
                }
                (factor, clamped)
            } else {
                (0.0, false)
            };

            let yhat_tariff_adjusted = if row.is_forecast {
                row.yhat * (1.0 - drag_factor)
            } else {
                row.yhat
            };

            points.push(AdjustedForecastPoint {
                forecast: row.clone(),
                yhat_tariff_adjusted,
                tariff_drag_amount: row.yhat - yhat_tariff_adjusted,
                tariff_rate_applied: rate,
                tariff_source: source,
                drag_factor,
                drag_clamped,
            });
        }

        Ok(AdjustedForecastTable { points })
    }
}
