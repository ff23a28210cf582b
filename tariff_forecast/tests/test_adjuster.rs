use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tariff_forecast::adjuster::{TariffAdjuster, TariffSource};
use tariff_forecast::config::{ForecastConfig, NegativePolicy, TariffConfig};
use tariff_forecast::data::{
    CountryDirectory, Metric, TariffRecord, TariffTable, TradeRecord, TradeTable,
};
use tariff_forecast::error::ForecastError;
use tariff_forecast::forecaster::{BaselineForecaster, ForecastTable};

fn baseline(countries: &[&str]) -> ForecastTable {
    let records = countries.iter().enumerate().flat_map(|(i, country)| {
        (2020..=2024).map(move |year| {
            let level = 100.0 * (i + 1) as f64 + 10.0 * (year - 2020) as f64;
            TradeRecord::new(*country, year, Some(level), Some(level / 2.0))
        })
    });
    let table = TradeTable::from_records(records).unwrap();
    let forecaster = BaselineForecaster::new(&ForecastConfig::default()).unwrap();
    forecaster.forecast_all(&table, countries, Metric::Exports).table
}

fn tariff_table(rates: &[(&str, f64)]) -> TariffTable {
    let records = rates
        .iter()
        .map(|(code, rate)| TariffRecord::new(*code, Some(*rate), Some(rate * 2.0)));
    TariffTable::from_records(records, &CountryDirectory::identity()).unwrap()
}

#[test]
fn test_china_thirty_percent_tariff() {
    let forecast = baseline(&["China"]);
    let adjusted = TariffAdjuster::default()
        .adjust(&forecast, Some(&tariff_table(&[("China", 30.0)])))
        .unwrap();

    assert_eq!(adjusted.len(), 8);
    for point in adjusted.iter() {
        let base = &point.forecast;
        assert_eq!(point.tariff_rate_applied, 30.0);
        assert_eq!(point.tariff_source, TariffSource::Table);
        if base.is_forecast {
            assert_relative_eq!(point.yhat_tariff_adjusted, base.yhat * 0.91, epsilon = 1e-9);
            assert_relative_eq!(point.drag_factor, 0.09, epsilon = 1e-12);
        } else {
            assert_eq!(point.yhat_tariff_adjusted, base.yhat);
            assert_eq!(point.tariff_drag_amount, 0.0);
        }
        assert_relative_eq!(
            point.tariff_drag_amount,
            base.yhat - point.yhat_tariff_adjusted,
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_adjustment_keeps_baseline_columns() {
    let forecast = baseline(&["China"]);
    let adjusted = TariffAdjuster::default()
        .adjust(&forecast, Some(&tariff_table(&[("China", 30.0)])))
        .unwrap();

    let carried: Vec<_> = adjusted.iter().map(|p| p.forecast.clone()).collect();
    assert_eq!(carried, forecast.points());
}

#[test]
fn test_absent_country_defaults_to_ten_percent() {
    let forecast = baseline(&["China", "Mexico"]);
    let adjusted = TariffAdjuster::default()
        .adjust(&forecast, Some(&tariff_table(&[("China", 30.0)])))
        .unwrap();

    assert_eq!(adjusted.defaulted_countries(), vec!["Mexico"]);
    for point in adjusted.iter().filter(|p| p.forecast.country_name == "Mexico") {
        assert_eq!(point.tariff_source, TariffSource::Default);
        assert_eq!(point.tariff_rate_applied, 10.0);
        if point.forecast.is_forecast {
            assert_relative_eq!(
                point.yhat_tariff_adjusted,
                point.forecast.yhat * 0.97,
                epsilon = 1e-9
            );
        }
    }
}

#[test]
fn test_configured_default_rate() {
    let adjuster = TariffAdjuster::new(TariffConfig {
        default_rate: 20.0,
        ..TariffConfig::default()
    })
    .unwrap();
    let adjusted = adjuster
        .adjust(&baseline(&["Mexico"]), Some(&tariff_table(&[("China", 30.0)])))
        .unwrap();

    let projected = adjusted.iter().find(|p| p.forecast.is_forecast).unwrap();
    assert_relative_eq!(projected.drag_factor, 0.06, epsilon = 1e-12);
}

#[test]
fn test_missing_tariff_table() {
    let result = TariffAdjuster::default().adjust(&baseline(&["China"]), None);
    assert!(matches!(result, Err(ForecastError::MissingTariffTable)));
}

#[test]
fn test_empty_tariff_table_is_missing() {
    let empty = TariffTable::from_records(Vec::new(), &CountryDirectory::identity()).unwrap();
    assert!(empty.is_empty());

    let result = TariffAdjuster::default().adjust(&baseline(&["China"]), Some(&empty));
    assert!(matches!(result, Err(ForecastError::MissingTariffTable)));
}

#[test]
fn test_adjustment_is_idempotent() {
    let forecast = baseline(&["China", "Mexico"]);
    let tariffs = tariff_table(&[("China", 30.0), ("Mexico", 25.0)]);
    let adjuster = TariffAdjuster::default();

    let first = adjuster.adjust(&forecast, Some(&tariffs)).unwrap();
    let second = adjuster.adjust(&forecast, Some(&tariffs)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_zero_rate_leaves_forecast_unchanged() {
    let forecast = baseline(&["Canada"]);
    let adjusted = TariffAdjuster::default()
        .adjust(&forecast, Some(&tariff_table(&[("Canada", 0.0)])))
        .unwrap();

    for point in adjusted.iter() {
        assert_eq!(point.yhat_tariff_adjusted, point.forecast.yhat);
    }
    assert_eq!(adjusted.total_drag(), 0.0);
}

#[rstest]
#[case(NegativePolicy::Clamp, 0.0, true)]
#[case(NegativePolicy::Allow, -0.5, false)]
fn test_extreme_tariff_policy(
    #[case] policy: NegativePolicy,
    #[case] share_kept: f64,
    #[case] clamped: bool,
) {
    let adjuster = TariffAdjuster::new(TariffConfig {
        negative_policy: policy,
        ..TariffConfig::default()
    })
    .unwrap();
    let adjusted = adjuster
        .adjust(&baseline(&["China"]), Some(&tariff_table(&[("China", 500.0)])))
        .unwrap();

    for point in adjusted.iter().filter(|p| p.forecast.is_forecast) {
        assert_relative_eq!(
            point.yhat_tariff_adjusted,
            point.forecast.yhat * share_kept,
            epsilon = 1e-9
        );
        assert_eq!(point.drag_clamped, clamped);
    }
}

#[test]
fn test_codes_are_resolved_to_country_names() {
    let directory = CountryDirectory::from_pairs([("CHN", "China")]);
    let tariffs =
        TariffTable::from_records(vec![TariffRecord::new("CHN", Some(30.0), None)], &directory)
            .unwrap();

    let adjusted = TariffAdjuster::default()
        .adjust(&baseline(&["China"]), Some(&tariffs))
        .unwrap();
    assert!(adjusted.defaulted_countries().is_empty());
}

#[test]
fn test_adjusted_table_to_json() {
    let adjusted = TariffAdjuster::default()
        .adjust(&baseline(&["China"]), Some(&tariff_table(&[("China", 30.0)])))
        .unwrap();

    let json = adjusted.to_json().unwrap();
    assert!(json.contains("\"yhat_tariff_adjusted\""));
    assert!(json.contains("\"tariff_source\":\"table\""));
    assert!(json.contains("\"country_name\":\"China\""));
}
