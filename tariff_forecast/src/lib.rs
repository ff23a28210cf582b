//! # Tariff Forecast
//!
//! Multi-year projections of bilateral trade with an adjustment for tariffs.
//!
//! ## Features
//!
//! - Validated trade and tariff tables, from records or polars DataFrames
//! - Per-country piecewise-linear trend forecasts with an 80% uncertainty band
//! - Tariff adjustment of projected years with a visible default-rate fallback
//! - Batch runs that skip and report countries that can't be forecast
//! - Injectable data sources with retry, backoff and call pacing
//! - TOML configuration with defaults for every setting
//!
//! ## Quick Start
//!
//! ```rust
//! use tariff_forecast::adjuster::TariffAdjuster;
//! use tariff_forecast::config::OutlookConfig;
//! use tariff_forecast::data::{
//!     CountryDirectory, Metric, TariffRecord, TariffTable, TradeRecord, TradeTable,
//! };
//! use tariff_forecast::forecaster::BaselineForecaster;
//!
//! # fn main() -> tariff_forecast::Result<()> {
//! let trade = TradeTable::from_records(
//!     (2020..=2024).map(|year| {
//!         TradeRecord::new("China", year, Some(100.0 + 10.0 * (year - 2020) as f64), None)
//!     }),
//! )?;
//! let tariffs = TariffTable::from_records(
//!     vec![TariffRecord::new("CHN", Some(30.0), Some(145.0))],
//!     &CountryDirectory::from_pairs([("CHN", "China")]),
//! )?;
//!
//! let config = OutlookConfig::default();
//! let forecaster = BaselineForecaster::new(&config.forecast)?;
//! let batch = forecaster.forecast_all(&trade, &["China"], Metric::Exports);
//!
//! let adjusted = TariffAdjuster::new(config.tariff)?.adjust(&batch.table, Some(&tariffs))?;
//! assert_eq!(adjusted.len(), 8);
//! # Ok(())
//! # }
//! ```

pub mod adjuster;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod forecaster;
pub mod frames;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod source;

// Re-export commonly used types
pub use crate::adjuster::{AdjustedForecastTable, TariffAdjuster};
pub use crate::config::OutlookConfig;
pub use crate::data::{Metric, TariffTable, TimeSeries, TradeTable};
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::{BaselineForecaster, BatchForecast, ForecastTable};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::pipeline::{OutlookReport, TradeOutlook};
pub use crate::source::{SourceData, TradeDataSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
