//! Explicit cache of validated tables
//!
//! Each table is fetched from the source and validated on first access, then
//! served from memory until [`TableCache::invalidate`] is called. A source
//! answering [`SourceData::Empty`](crate::source::SourceData::Empty) or failing
//! is reported to the caller and nothing is cached, so the next access asks the
//! source again.

use crate::data::{CountryDirectory, TariffTable, TradeTable};
use crate::error::Result;
use crate::source::TradeDataSource;
use tracing::{debug, info};

#[derive(Debug)]
pub struct TableCache<S> {
    source: S,
    directory: CountryDirectory,
    trade: Option<TradeTable>,
    tariffs: Option<TariffTable>,
    loads: usize,
}

impl<S: TradeDataSource> TableCache<S> {
    /// Cache over `source`; tariff codes are resolved through `directory`
    pub fn new(source: S, directory: CountryDirectory) -> Self {
        Self {
            source,
            directory,
            trade: None,
            tariffs: None,
            loads: 0,
        }
    }

    /// Historical trade table, loading it on first use
    pub fn trade_table(&mut self) -> Result<&TradeTable> {
        let table = match self.trade.take() {
            Some(table) => table,
            None => {
                let records = self.source.trade_records()?.require("trade records")?;
                let table = TradeTable::from_records(records)?;
                self.loads += 1;
                info!(
                    rows = table.len(),
                    countries = table.countries().count(),
                    "trade table loaded"
                );
                table
            }
        };
        Ok(self.trade.insert(table))
    }

    /// Tariff table, loading it on first use
    pub fn tariff_table(&mut self) -> Result<&TariffTable> {
        let table = match self.tariffs.take() {
            Some(table) => table,
            None => {
                let records = self.source.tariff_records()?.require("tariff records")?;
                let table = TariffTable::from_records(records, &self.directory)?;
                self.loads += 1;
                info!(countries = table.len(), "tariff table loaded");
                table
            }
        };
        Ok(self.tariffs.insert(table))
    }

    /// Drop both tables so the next access reloads them
    pub fn invalidate(&mut self) {
        debug!("table cache invalidated");
        self.trade = None;
        self.tariffs = None;
    }

    /// Whether both tables are currently held
    pub fn is_populated(&self) -> bool {
        self.trade.is_some() && self.tariffs.is_some()
    }

    /// Number of successful table loads since creation
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
