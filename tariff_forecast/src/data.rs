//! Trade and tariff data model
//!
//! Everything entering the engine passes through the constructors here, which
//! reject malformed input (negative or non-finite values, duplicate years,
//! unmapped country codes) with an error naming the offending country and
//! field. Missing metric values are kept as `None` and dropped only when a
//! series is extracted for fitting.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Trade flow direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Exports,
    Imports,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Exports, Metric::Imports];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Exports => "exports",
            Metric::Imports => "imports",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exports" => Ok(Metric::Exports),
            "imports" => Ok(Metric::Imports),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown metric: {}",
                other
            ))),
        }
    }
}

/// January 1 of `year`, the date every annual observation is pinned to
pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// One row of the historical trade table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub country_name: String,
    pub year: i32,
    pub exports: Option<f64>,
    pub imports: Option<f64>,
}

impl TradeRecord {
    pub fn new(
        country_name: impl Into<String>,
        year: i32,
        exports: Option<f64>,
        imports: Option<f64>,
    ) -> Self {
        Self {
            country_name: country_name.into(),
            year,
            exports,
            imports,
        }
    }

    /// Value of the given metric, if present
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Exports => self.exports,
            Metric::Imports => self.imports,
        }
    }
}

/// A single annual observation of one metric for one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub country_name: String,
    pub year: i32,
    pub metric: Metric,
    pub value: f64,
}

fn validate_value(country: &str, field: &str, year: i32, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ForecastError::malformed(
            country,
            field,
            format!("non-numeric value in {}", year),
        ));
    }
    if value < 0.0 {
        return Err(ForecastError::malformed(
            country,
            field,
            format!("negative value {} in {}", value, year),
        ));
    }
    Ok(())
}

fn validate_year(country: &str, year: i32) -> Result<()> {
    if year_start(year).is_none() {
        return Err(ForecastError::malformed(
            country,
            "year",
            format!("year {} is out of range", year),
        ));
    }
    Ok(())
}

/// Ordered observations for one (country, metric) pair, strictly increasing by year
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    country_name: String,
    metric: Metric,
    observations: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series from (year, value) pairs in any order
    pub fn new(
        country_name: impl Into<String>,
        metric: Metric,
        points: Vec<(i32, f64)>,
    ) -> Result<Self> {
        let country_name = country_name.into().trim().to_string();
        let mut points = points;
        points.sort_by_key(|(year, _)| *year);

        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ForecastError::malformed(
                &country_name,
                metric.as_str(),
                format!("duplicate year {}", w[0].0),
            ));
        }
        for &(year, value) in &points {
            validate_year(&country_name, year)?;
            validate_value(&country_name, metric.as_str(), year, value)?;
        }

        Ok(Self::from_sorted(country_name, metric, points))
    }

    fn from_sorted(country_name: String, metric: Metric, points: Vec<(i32, f64)>) -> Self {
        let observations = points
            .into_iter()
            .map(|(year, value)| Observation {
                country_name: country_name.clone(),
                year,
                metric,
                value,
            })
            .collect();

        Self {
            country_name,
            metric,
            observations,
        }
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.observations.iter().map(|o| o.year).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Observation dates on the January 1 axis
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations
            .iter()
            .filter_map(|o| year_start(o.year))
            .collect()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.observations.first().map(|o| o.year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.observations.last().map(|o| o.year)
    }

    /// Observed value for `year`, if any
    pub fn value_for(&self, year: i32) -> Option<f64> {
        self.observations
            .binary_search_by_key(&year, |o| o.year)
            .ok()
            .map(|idx| self.observations[idx].value)
    }
}

/// Validated historical trade table keyed by country name and year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeTable {
    countries: BTreeMap<String, BTreeMap<i32, TradeRecord>>,
}

impl TradeTable {
    /// Validate and index trade records
    pub fn from_records(records: impl IntoIterator<Item = TradeRecord>) -> Result<Self> {
        let mut countries: BTreeMap<String, BTreeMap<i32, TradeRecord>> = BTreeMap::new();

        for mut record in records {
            let name = record.country_name.trim().to_string();
            if name.is_empty() {
                return Err(ForecastError::malformed(
                    "<unnamed>",
                    "country_name",
                    format!("empty country name in {}", record.year),
                ));
            }
            validate_year(&name, record.year)?;
            for metric in Metric::ALL {
                if let Some(value) = record.value(metric) {
                    validate_value(&name, metric.as_str(), record.year, value)?;
                }
            }

            record.country_name = name.clone();
            let years = countries.entry(name.clone()).or_default();
            if years.contains_key(&record.year) {
                return Err(ForecastError::malformed(
                    name,
                    "year",
                    format!("duplicate year {}", record.year),
                ));
            }
            years.insert(record.year, record);
        }

        Ok(Self { countries })
    }

    /// Number of (country, year) rows
    pub fn len(&self) -> usize {
        self.countries.values().map(|years| years.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Country names in sorted order
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(String::as_str)
    }

    pub fn contains_country(&self, country_name: &str) -> bool {
        self.countries.contains_key(country_name.trim())
    }

    /// All records, ordered by country then year
    pub fn records(&self) -> impl Iterator<Item = &TradeRecord> {
        self.countries.values().flat_map(|years| years.values())
    }

    /// Extract the series for one country and metric, dropping missing values.
    ///
    /// Returns `None` when the country is absent from the table.
    pub fn series(&self, country_name: &str, metric: Metric) -> Option<TimeSeries> {
        let name = country_name.trim();
        let years = self.countries.get(name)?;
        let points = years
            .values()
            .filter_map(|r| r.value(metric).map(|v| (r.year, v)))
            .collect();

        Some(TimeSeries::from_sorted(name.to_string(), metric, points))
    }
}

/// Maps tariff country codes onto the canonical country names used by the trade table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryDirectory {
    names_by_code: HashMap<String, String>,
    identity: bool,
}

impl CountryDirectory {
    /// An empty directory that only resolves explicitly registered codes
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory that treats any unregistered code as the country name itself
    pub fn identity() -> Self {
        Self {
            names_by_code: HashMap::new(),
            identity: true,
        }
    }

    /// Build a strict directory from (code, name) pairs
    pub fn from_pairs<I, C, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: AsRef<str>,
        N: Into<String>,
    {
        let mut directory = Self::new();
        for (code, name) in pairs {
            directory.insert(code.as_ref(), name);
        }
        directory
    }

    pub fn insert(&mut self, code: &str, name: impl Into<String>) {
        self.names_by_code
            .insert(code.trim().to_uppercase(), name.into().trim().to_string());
    }

    pub fn with_entry(mut self, code: &str, name: impl Into<String>) -> Self {
        self.insert(code, name);
        self
    }

    /// Canonical country name for a code
    pub fn resolve(&self, code: &str) -> Option<String> {
        let code = code.trim();
        match self.names_by_code.get(&code.to_uppercase()) {
            Some(name) => Some(name.clone()),
            None if self.identity && !code.is_empty() => Some(code.to_string()),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.names_by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_by_code.is_empty()
    }
}

/// One row of the tariff reference table, rates in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub country_code: String,
    pub tariff_current: Option<f64>,
    pub tariff_peak: Option<f64>,
}

impl TariffRecord {
    pub fn new(
        country_code: impl Into<String>,
        tariff_current: Option<f64>,
        tariff_peak: Option<f64>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            tariff_current,
            tariff_peak,
        }
    }
}

/// Tariff records re-keyed by canonical country name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TariffTable {
    by_country: BTreeMap<String, TariffRecord>,
}

impl TariffTable {
    /// Validate tariff records and resolve their codes through `directory`
    pub fn from_records(
        records: impl IntoIterator<Item = TariffRecord>,
        directory: &CountryDirectory,
    ) -> Result<Self> {
        let mut by_country = BTreeMap::new();

        for mut record in records {
            let code = record.country_code.trim().to_string();
            if code.is_empty() {
                return Err(ForecastError::malformed(
                    "<unnamed>",
                    "country_code",
                    "empty country code",
                ));
            }
            for (field, rate) in [
                ("tariff_current_rate", record.tariff_current),
                ("tariff_peak_rate", record.tariff_peak),
            ] {
                if let Some(rate) = rate {
                    if !rate.is_finite() || rate < 0.0 {
                        return Err(ForecastError::malformed(
                            &code,
                            field,
                            format!("tariff rate must be a non-negative percent, got {}", rate),
                        ));
                    }
                }
            }

            let name = directory
                .resolve(&code)
                .ok_or_else(|| ForecastError::UnknownCountryCode(code.clone()))?;
            record.country_code = code;
            if by_country.insert(name.clone(), record).is_some() {
                return Err(ForecastError::malformed(
                    name,
                    "country_code",
                    "duplicate tariff record",
                ));
            }
        }

        Ok(Self { by_country })
    }

    pub fn get(&self, country_name: &str) -> Option<&TariffRecord> {
        self.by_country.get(country_name.trim())
    }

    /// Current tariff rate for a country, `None` when absent or missing
    pub fn current_rate(&self, country_name: &str) -> Option<f64> {
        self.get(country_name).and_then(|r| r.tariff_current)
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.by_country.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_country.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metric_parsing() {
        assert_eq!("Exports".parse::<Metric>().unwrap(), Metric::Exports);
        assert_eq!(" imports ".parse::<Metric>().unwrap(), Metric::Imports);
        assert!("gdp".parse::<Metric>().is_err());
        assert_eq!(Metric::Imports.to_string(), "imports");
    }

    #[test]
    fn test_time_series_sorts_points() {
        let points = vec![(2022, 3.0), (2020, 1.0), (2021, 2.0)];
        let series = TimeSeries::new("China", Metric::Exports, points).unwrap();

        assert_eq!(series.years(), vec![2020, 2021, 2022]);
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.value_for(2021), Some(2.0));
        assert_eq!(series.value_for(2023), None);
        assert_eq!(series.dates()[0], NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }

    #[test]
    fn test_time_series_rejects_duplicates_and_negatives() {
        let dup = TimeSeries::new("China", Metric::Exports, vec![(2020, 1.0), (2020, 2.0)]);
        assert!(matches!(dup, Err(ForecastError::MalformedInput { .. })));

        let neg = TimeSeries::new("China", Metric::Exports, vec![(2020, -1.0)]);
        let err = neg.unwrap_err().to_string();
        assert!(err.contains("China"));
        assert!(err.contains("exports"));

        let nan = TimeSeries::new("China", Metric::Imports, vec![(2020, f64::NAN)]);
        assert!(matches!(nan, Err(ForecastError::MalformedInput { .. })));
    }

    #[test]
    fn test_trade_table_series_drops_missing_values() {
        let table = TradeTable::from_records(vec![
            TradeRecord::new(" China ", 2021, Some(110.0), None),
            TradeRecord::new("China", 2020, Some(100.0), Some(50.0)),
            TradeRecord::new("Mexico", 2020, None, Some(10.0)),
        ])
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.countries().collect::<Vec<_>>(), vec!["China", "Mexico"]);

        let exports = table.series("China", Metric::Exports).unwrap();
        assert_eq!(exports.years(), vec![2020, 2021]);
        let imports = table.series("China", Metric::Imports).unwrap();
        assert_eq!(imports.years(), vec![2020]);
        assert!(table.series("Mexico", Metric::Exports).unwrap().is_empty());
        assert!(table.series("Brazil", Metric::Exports).is_none());
    }

    #[test]
    fn test_trade_table_rejects_duplicate_years() {
        let result = TradeTable::from_records(vec![
            TradeRecord::new("China", 2020, Some(1.0), None),
            TradeRecord::new("China", 2020, Some(2.0), None),
        ]);
        match result {
            Err(ForecastError::MalformedInput { country, field, .. }) => {
                assert_eq!(country, "China");
                assert_eq!(field, "year");
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_tariff_table_resolves_codes() {
        let directory = CountryDirectory::from_pairs([("CHN", "China"), ("MEX", "Mexico")]);
        let table = TariffTable::from_records(
            vec![
                TariffRecord::new("chn", Some(30.0), Some(145.0)),
                TariffRecord::new("MEX", None, Some(25.0)),
            ],
            &directory,
        )
        .unwrap();

        assert_eq!(table.current_rate("China"), Some(30.0));
        assert_eq!(table.current_rate("Mexico"), None);
        assert!(table.get("Mexico").is_some());
        assert!(table.get("CHN").is_none());
    }

    #[test]
    fn test_tariff_table_rejects_unknown_code_and_negative_rate() {
        let directory = CountryDirectory::new().with_entry("CHN", "China");

        let unknown =
            TariffTable::from_records(vec![TariffRecord::new("VNM", Some(20.0), None)], &directory);
        assert!(matches!(unknown, Err(ForecastError::UnknownCountryCode(code)) if code == "VNM"));

        let negative =
            TariffTable::from_records(vec![TariffRecord::new("CHN", Some(-5.0), None)], &directory);
        assert!(matches!(negative, Err(ForecastError::MalformedInput { .. })));
    }

    #[test]
    fn test_identity_directory() {
        let directory = CountryDirectory::identity();
        assert_eq!(directory.resolve(" China "), Some("China".to_string()));
        assert_eq!(directory.resolve(""), None);
        assert_eq!(CountryDirectory::new().resolve("China"), None);
    }
}
