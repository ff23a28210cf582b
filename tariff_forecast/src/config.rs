//! Engine configuration loaded from TOML
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [forecast]
//! periods = 3
//! changepoint_prior_scale = 0.3
//! interval_width = 0.8
//!
//! [tariff]
//! default_rate = 10.0
//! negative_policy = "clamp"
//!
//! [source]
//! max_retries = 3
//! min_call_interval_ms = 500
//! ```

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlookConfig {
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

/// Longest forecast horizon, in years, a configuration may ask for
pub const MAX_PERIODS: usize = 200;

/// Baseline forecaster settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Number of future years to project
    #[serde(default = "default_periods")]
    pub periods: usize,
    /// Series shorter than this are skipped
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    /// Scale of the prior on trend rate changes; larger bends the trend more readily
    #[serde(default = "default_changepoint_prior_scale")]
    pub changepoint_prior_scale: f64,
    /// Share of history in which changepoints may be placed
    #[serde(default = "default_changepoint_range")]
    pub changepoint_range: f64,
    #[serde(default = "default_max_changepoints")]
    pub max_changepoints: usize,
    /// Coverage of the uncertainty band
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Per-fit time budget
    #[serde(default = "default_fit_timeout_ms")]
    pub fit_timeout_ms: u64,
}

fn default_periods() -> usize {
    3
}

fn default_min_observations() -> usize {
    4
}

fn default_changepoint_prior_scale() -> f64 {
    0.3
}

fn default_changepoint_range() -> f64 {
    0.8
}

fn default_max_changepoints() -> usize {
    25
}

fn default_interval_width() -> f64 {
    0.80
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_fit_timeout_ms() -> u64 {
    5_000
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            periods: default_periods(),
            min_observations: default_min_observations(),
            changepoint_prior_scale: default_changepoint_prior_scale(),
            changepoint_range: default_changepoint_range(),
            max_changepoints: default_max_changepoints(),
            interval_width: default_interval_width(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            fit_timeout_ms: default_fit_timeout_ms(),
        }
    }
}

impl ForecastConfig {
    pub fn fit_timeout(&self) -> Duration {
        Duration::from_millis(self.fit_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.periods > MAX_PERIODS {
            return Err(ForecastError::InvalidParameter(format!(
                "periods must be at most {}, got {}",
                MAX_PERIODS, self.periods
            )));
        }
        if self.min_observations < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_observations must be at least 2".to_string(),
            ));
        }
        if !(self.changepoint_prior_scale > 0.0 && self.changepoint_prior_scale.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "changepoint_prior_scale must be positive".to_string(),
            ));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "changepoint_range must be in (0, 1]".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "interval_width must be between 0 and 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "tolerance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// What to do when the drag factor exceeds 1 and would push trade below zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativePolicy {
    /// Cap the drag factor at 1 so adjusted trade bottoms out at zero
    #[default]
    Clamp,
    /// Keep the raw factor; negative adjusted trade signals trade ceasing
    Allow,
}

/// Tariff adjuster settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Assumed current tariff, in percent, for countries missing from the tariff table
    #[serde(default = "default_tariff_rate")]
    pub default_rate: f64,
    /// Share of projected trade lost per 10 percentage points of tariff
    #[serde(default = "default_elasticity")]
    pub elasticity_per_ten_points: f64,
    #[serde(default)]
    pub negative_policy: NegativePolicy,
}

fn default_tariff_rate() -> f64 {
    10.0
}

fn default_elasticity() -> f64 {
    0.03
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            default_rate: default_tariff_rate(),
            elasticity_per_ten_points: default_elasticity(),
            negative_policy: NegativePolicy::default(),
        }
    }
}

impl TariffConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.default_rate >= 0.0 && self.default_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "default_rate must be a non-negative percent".to_string(),
            ));
        }
        if !(self.elasticity_per_ten_points >= 0.0 && self.elasticity_per_ten_points.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "elasticity_per_ten_points must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry and rate-limit policy for data sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on any single backoff pause
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Minimum spacing between consecutive calls
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_min_call_interval_ms() -> u64 {
    500
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            min_call_interval_ms: default_min_call_interval_ms(),
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_multiplier >= 1.0 && self.backoff_multiplier.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "backoff_multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ForecastError::InvalidParameter(format!(
                "max_backoff_ms ({}) must not be below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        Ok(())
    }
}

impl OutlookConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: OutlookConfig =
            toml::from_str(contents).map_err(|e| ForecastError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ForecastError::Config(msg) => {
                ForecastError::Config(format!("{}: {}", path.as_ref().display(), msg))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.forecast.validate()?;
        self.tariff.validate()?;
        self.source.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = OutlookConfig::from_toml_str("").unwrap();
        assert_eq!(config, OutlookConfig::default());
        assert_eq!(config.forecast.periods, 3);
        assert_eq!(config.forecast.min_observations, 4);
        assert_eq!(config.forecast.changepoint_prior_scale, 0.3);
        assert_eq!(config.forecast.interval_width, 0.8);
        assert_eq!(config.tariff.default_rate, 10.0);
        assert_eq!(config.tariff.elasticity_per_ten_points, 0.03);
        assert_eq!(config.tariff.negative_policy, NegativePolicy::Clamp);
    }

    #[test]
    fn test_partial_override() {
        let config = OutlookConfig::from_toml_str(
            r#"
            [forecast]
            periods = 5

            [tariff]
            negative_policy = "allow"
            "#,
        )
        .unwrap();

        assert_eq!(config.forecast.periods, 5);
        assert_eq!(config.forecast.max_changepoints, 25);
        assert_eq!(config.tariff.negative_policy, NegativePolicy::Allow);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = OutlookConfig::from_toml_str("[forecast]\ninterval_width = 1.5\n");
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));

        let result = OutlookConfig::from_toml_str("[tariff]\ndefault_rate = \"ten\"\n");
        assert!(matches!(result, Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_oversized_horizon_rejected() {
        let result = OutlookConfig::from_toml_str("[forecast]\nperiods = 2147483647\n");
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));

        let config = ForecastConfig {
            periods: usize::MAX,
            ..ForecastConfig::default()
        };
        assert!(matches!(config.validate(), Err(ForecastError::InvalidParameter(_))));

        let config = ForecastConfig {
            periods: MAX_PERIODS,
            ..ForecastConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_cap_below_initial_rejected() {
        let result = OutlookConfig::from_toml_str(
            "[source]\ninitial_backoff_ms = 1000\nmax_backoff_ms = 10\n",
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }
}
