//! Conversions between engine tables and polars DataFrames
//!
//! Incoming column names are matched after trimming and lowercasing, the way
//! loaded CSV headers usually need. Metric and rate columns must be numeric;
//! null cells are treated as missing values rather than rejected.

use crate::adjuster::{AdjustedForecastTable, TariffSource};
use crate::data::{CountryDirectory, TariffRecord, TariffTable, TradeRecord, TradeTable};
use crate::error::{ForecastError, Result};
use crate::forecaster::ForecastTable;
use polars::prelude::*;

/// Find a column by normalized name, trying each alias in order
fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Result<&'a Series> {
    let names = df.get_column_names();
    for alias in aliases {
        if let Some(name) = names.iter().find(|n| n.trim().to_lowercase() == *alias) {
            return Ok(df.column(name)?);
        }
    }
    Err(ForecastError::malformed(
        "<table>",
        aliases[0],
        format!("missing column (looked for {})", aliases.join(", ")),
    ))
}

fn string_column(series: &Series, field: &str) -> Result<Vec<Option<String>>> {
    match series.dtype() {
        DataType::Utf8 => Ok(series
            .utf8()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect()),
        other => Err(ForecastError::malformed(
            "<table>",
            field,
            format!("expected text column, found {}", other),
        )),
    }
}

fn numeric_column(series: &Series, field: &str) -> Result<Vec<Option<f64>>> {
    if !series.dtype().is_numeric() {
        return Err(ForecastError::malformed(
            "<table>",
            field,
            format!("expected numeric column, found {}", series.dtype()),
        ));
    }
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn year_column(series: &Series) -> Result<Vec<Option<i32>>> {
    if !series.dtype().is_numeric() {
        return Err(ForecastError::malformed(
            "<table>",
            "year",
            format!("expected integer years, found {}", series.dtype()),
        ));
    }
    let cast = series.cast(&DataType::Int32)?;
    Ok(cast.i32()?.into_iter().collect())
}

impl TradeTable {
    /// Build a validated trade table from a frame with
    /// `country_name`, `year`, `exports` and `imports` columns
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let names = string_column(find_column(df, &["country_name"])?, "country_name")?;
        let years = year_column(find_column(df, &["year"])?)?;
        let exports = numeric_column(find_column(df, &["exports"])?, "exports")?;
        let imports = numeric_column(find_column(df, &["imports"])?, "imports")?;

        let mut records = Vec::with_capacity(df.height());
        let rows = names.into_iter().zip(years).zip(exports).zip(imports);
        for (((name, year), exports), imports) in rows {
            let name = name.unwrap_or_default();
            let year = year.ok_or_else(|| ForecastError::malformed(&name, "year", "missing year"))?;
            records.push(TradeRecord::new(name, year, exports, imports));
        }

        Self::from_records(records)
    }
}

impl TariffTable {
    /// Build a validated tariff table from a frame with `country_code`,
    /// `tariff_current_rate` and `tariff_peak_rate` columns
    pub fn from_dataframe(df: &DataFrame, directory: &CountryDirectory) -> Result<Self> {
        let codes = string_column(find_column(df, &["country_code"])?, "country_code")?;
        let current = numeric_column(
            find_column(df, &["tariff_current_rate", "tariff_current_feb2026", "tariff_current"])?,
            "tariff_current_rate",
        )?;
        let peak = numeric_column(
            find_column(df, &["tariff_peak_rate", "tariff_peak"])?,
            "tariff_peak_rate",
        )?;

        let records: Vec<TariffRecord> = codes
            .into_iter()
            .zip(current)
            .zip(peak)
            .map(|((code, current), peak)| {
                TariffRecord::new(code.unwrap_or_default(), current, peak)
            })
            .collect();

        Self::from_records(records, directory)
    }
}

impl ForecastTable {
    /// Render as a frame with the baseline forecast columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let points = self.points();
        let df = DataFrame::new(vec![
            Series::new(
                "ds",
                points.iter().map(|p| p.ds.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
            ),
            Series::new("year", points.iter().map(|p| p.year).collect::<Vec<_>>()),
            Series::new(
                "country_name",
                points.iter().map(|p| p.country_name.as_str()).collect::<Vec<_>>(),
            ),
            Series::new("metric", points.iter().map(|p| p.metric.as_str()).collect::<Vec<_>>()),
            Series::new("yhat", points.iter().map(|p| p.yhat).collect::<Vec<_>>()),
            Series::new("yhat_lower", points.iter().map(|p| p.yhat_lower).collect::<Vec<_>>()),
            Series::new("yhat_upper", points.iter().map(|p| p.yhat_upper).collect::<Vec<_>>()),
            Series::new("actual", points.iter().map(|p| p.actual).collect::<Vec<_>>()),
            Series::new("is_forecast", points.iter().map(|p| p.is_forecast).collect::<Vec<_>>()),
        ])?;
        Ok(df)
    }
}

impl AdjustedForecastTable {
    /// Render as a frame with the baseline columns plus the adjustment columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let base = ForecastTable::new(self.iter().map(|p| p.forecast.clone()).collect());
        let mut df = base.to_dataframe()?;
        let points = self.points();

        let extra = [
            Series::new(
                "yhat_tariff_adjusted",
                points.iter().map(|p| p.yhat_tariff_adjusted).collect::<Vec<_>>(),
            ),
            Series::new(
                "tariff_drag_amount",
                points.iter().map(|p| p.tariff_drag_amount).collect::<Vec<_>>(),
            ),
            Series::new(
                "tariff_rate_applied",
                points.iter().map(|p| p.tariff_rate_applied).collect::<Vec<_>>(),
            ),
            Series::new(
                "drag_factor",
                points.iter().map(|p| p.drag_factor).collect::<Vec<_>>(),
            ),
            Series::new(
                "drag_clamped",
                points.iter().map(|p| p.drag_clamped).collect::<Vec<_>>(),
            ),
            Series::new(
                "tariff_source",
                points
                    .iter()
                    .map(|p| match p.tariff_source {
                        TariffSource::Table => "table",
                        TariffSource::Default => "default",
                    })
                    .collect::<Vec<_>>(),
            ),
        ];
        for series in extra {
            df.with_column(series)?;
        }
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjuster::TariffAdjuster;
    use crate::data::{year_start, Metric};
    use crate::forecaster::ForecastPoint;

    #[test]
    fn test_trade_table_from_dataframe() {
        let df = df!(
            " Country_Name " => &["China", "China", "Mexico"],
            "year" => &[2020i64, 2021, 2020],
            "exports" => &[Some(100.0), None, Some(50.0)],
            "imports" => &[80i64, 85, 40]
        )
        .unwrap();

        let table = TradeTable::from_dataframe(&df).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.series("China", Metric::Exports).unwrap().len(), 1);
        assert_eq!(table.series("China", Metric::Imports).unwrap().values(), vec![80.0, 85.0]);
    }

    #[test]
    fn test_trade_table_rejects_text_metric() {
        let df = df!(
            "country_name" => &["China"],
            "year" => &[2020i32],
            "exports" => &["lots"],
            "imports" => &[1.0]
        )
        .unwrap();

        let result = TradeTable::from_dataframe(&df);
        assert!(matches!(
            result,
            Err(ForecastError::MalformedInput { field, .. }) if field == "exports"
        ));
    }

    #[test]
    fn test_tariff_table_accepts_source_column_names() {
        let df = df!(
            "country_code" => &["CHN", "MEX"],
            "tariff_current_feb2026" => &[Some(30.0), None],
            "tariff_peak" => &[145.0, 25.0]
        )
        .unwrap();
        let directory = CountryDirectory::from_pairs([("CHN", "China"), ("MEX", "Mexico")]);

        let table = TariffTable::from_dataframe(&df, &directory).unwrap();
        assert_eq!(table.current_rate("China"), Some(30.0));
        assert_eq!(table.current_rate("Mexico"), None);
    }

    #[test]
    fn test_missing_column() {
        let df = df!("country_code" => &["CHN"]).unwrap();
        let result = TariffTable::from_dataframe(&df, &CountryDirectory::identity());
        assert!(matches!(result, Err(ForecastError::MalformedInput { .. })));
    }

    #[test]
    fn test_adjusted_frame_carries_drag_columns() {
        let forecast = ForecastTable::new(vec![ForecastPoint {
            ds: year_start(2025).unwrap(),
            year: 2025,
            country_name: "China".to_string(),
            metric: Metric::Exports,
            yhat: 100.0,
            yhat_lower: 90.0,
            yhat_upper: 110.0,
            actual: None,
            is_forecast: true,
        }]);
        let tariffs = TariffTable::from_records(
            vec![TariffRecord::new("China", Some(400.0), None)],
            &CountryDirectory::identity(),
        )
        .unwrap();
        let adjusted = TariffAdjuster::default().adjust(&forecast, Some(&tariffs)).unwrap();

        let df = adjusted.to_dataframe().unwrap();
        assert_eq!(df.column("drag_factor").unwrap().f64().unwrap().get(0), Some(1.0));
        assert_eq!(df.column("drag_clamped").unwrap().bool().unwrap().get(0), Some(true));
        assert_eq!(
            df.column("yhat_tariff_adjusted").unwrap().f64().unwrap().get(0),
            Some(0.0)
        );
    }
}
