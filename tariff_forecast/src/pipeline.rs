//! End-to-end outlook: load tables, forecast the baseline, apply tariffs

use crate::adjuster::{AdjustedForecastTable, TariffAdjuster};
use crate::cache::TableCache;
use crate::config::OutlookConfig;
use crate::data::{CountryDirectory, Metric, TariffTable};
use crate::error::{ForecastError, Result};
use crate::forecaster::{BaselineForecaster, BatchForecast};
use crate::source::TradeDataSource;
use tracing::info;

/// Baseline and tariff-adjusted forecasts from one run
#[derive(Debug, Clone, PartialEq)]
pub struct OutlookReport {
    pub batch: BatchForecast,
    pub adjusted: AdjustedForecastTable,
}

/// Forecasting pipeline over a cached data source
#[derive(Debug)]
pub struct TradeOutlook<S> {
    forecaster: BaselineForecaster,
    adjuster: TariffAdjuster,
    cache: TableCache<S>,
}

impl<S: TradeDataSource> TradeOutlook<S> {
    pub fn new(config: &OutlookConfig, source: S, directory: CountryDirectory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            forecaster: BaselineForecaster::new(&config.forecast)?,
            adjuster: TariffAdjuster::new(config.tariff.clone())?,
            cache: TableCache::new(source, directory),
        })
    }

    /// Forecast `metric` for each country and adjust the result for tariffs
    pub fn run<C: AsRef<str>>(&mut self, countries: &[C], metric: Metric) -> Result<OutlookReport> {
        let batch = {
            let trade = self.cache.trade_table()?;
            self.forecaster.forecast_all(trade, countries, metric)
        };
        self.finish(batch)
    }

    /// Same as [`TradeOutlook::run`] for exports and imports together
    pub fn run_all_metrics<C: AsRef<str>>(&mut self, countries: &[C]) -> Result<OutlookReport> {
        let batch = {
            let trade = self.cache.trade_table()?;
            self.forecaster.forecast_all_metrics(trade, countries)
        };
        self.finish(batch)
    }

    fn finish(&mut self, batch: BatchForecast) -> Result<OutlookReport> {
        let tariffs = required_tariffs(&mut self.cache)?;
        let adjusted = self.adjuster.adjust(&batch.table, Some(tariffs))?;

        info!(
            rows = adjusted.len(),
            skipped = batch.skipped.len(),
            defaulted = adjusted.defaulted_countries().len(),
            total_drag = adjusted.total_drag(),
            "outlook complete"
        );
        Ok(OutlookReport { batch, adjusted })
    }

    /// Drop cached tables so the next run reloads from the source
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn cache(&self) -> &TableCache<S> {
        &self.cache
    }
}

/// The adjuster needs a tariff table; a source with none is a hard failure
fn required_tariffs<S: TradeDataSource>(cache: &mut TableCache<S>) -> Result<&TariffTable> {
    match cache.tariff_table() {
        Ok(table) => Ok(table),
        Err(ForecastError::DataUnavailable(_)) => Err(ForecastError::MissingTariffTable),
        Err(err) => Err(err),
    }
}
