//! # Tariff Outlook
//!
//! `tariff_outlook` bundles the workspace crates: [`tariff_forecast`] for
//! baseline trade forecasts and tariff adjustment, and [`trade_math`] for the
//! numeric routines underneath.
//!
//! ## Example
//!
//! ```
//! use tariff_outlook::tariff_forecast::config::OutlookConfig;
//! use tariff_outlook::tariff_forecast::data::{
//!     CountryDirectory, Metric, TariffRecord, TradeRecord,
//! };
//! use tariff_outlook::tariff_forecast::pipeline::TradeOutlook;
//! use tariff_outlook::tariff_forecast::source::StaticSource;
//!
//! let trade = (2020..=2024)
//!     .map(|year| {
//!         let exports = 100.0 + 10.0 * (year - 2020) as f64;
//!         TradeRecord::new("China", year, Some(exports), None)
//!     })
//!     .collect();
//! let tariffs = vec![TariffRecord::new("CHN", Some(30.0), Some(145.0))];
//! let directory = CountryDirectory::from_pairs([("CHN", "China")]);
//!
//! let source = StaticSource::new(trade, tariffs);
//! let mut outlook = TradeOutlook::new(&OutlookConfig::default(), source, directory).unwrap();
//! let report = outlook.run(&["China"], Metric::Exports).unwrap();
//!
//! let projected: Vec<_> = report.adjusted.iter().filter(|p| p.forecast.is_forecast).collect();
//! assert_eq!(projected.len(), 3);
//! assert!(projected.iter().all(|p| p.yhat_tariff_adjusted < p.forecast.yhat));
//! ```

pub use tariff_forecast;
pub use trade_math;

pub use tariff_forecast::{
    BaselineForecaster, ForecastError, Metric, OutlookConfig, OutlookReport, TariffAdjuster,
    TradeOutlook,
};
