use tariff_forecast::config::OutlookConfig;
use tariff_forecast::data::{CountryDirectory, Metric, TariffRecord, TradeRecord};
use tariff_forecast::pipeline::TradeOutlook;
use tariff_forecast::source::{SourcePolicy, StaticSource, ThrottledSource};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Tariff Forecast: China and Vietnam outlook");
    println!("==========================================\n");

    // Exports in billions of USD; Vietnam has no tariff entry and falls back to the default rate
    let trade = vec![
        TradeRecord::new("China", 2019, Some(2499.0), Some(2077.0)),
        TradeRecord::new("China", 2020, Some(2590.0), Some(2057.0)),
        TradeRecord::new("China", 2021, Some(3316.0), Some(2688.0)),
        TradeRecord::new("China", 2022, Some(3544.0), Some(2716.0)),
        TradeRecord::new("China", 2023, Some(3380.0), Some(2557.0)),
        TradeRecord::new("China", 2024, Some(3577.0), Some(2586.0)),
        TradeRecord::new("Vietnam", 2019, Some(264.0), Some(253.0)),
        TradeRecord::new("Vietnam", 2020, Some(281.0), Some(261.0)),
        TradeRecord::new("Vietnam", 2021, Some(336.0), Some(332.0)),
        TradeRecord::new("Vietnam", 2022, Some(371.0), Some(359.0)),
        TradeRecord::new("Vietnam", 2023, Some(354.0), Some(326.0)),
        TradeRecord::new("Vietnam", 2024, Some(405.0), Some(380.0)),
        TradeRecord::new("Peru", 2023, Some(67.0), Some(50.0)),
    ];
    let tariffs = vec![TariffRecord::new("CHN", Some(30.0), Some(145.0))];
    let directory = CountryDirectory::from_pairs([("CHN", "China"), ("VNM", "Vietnam")]);

    let config = OutlookConfig::default();
    let source = ThrottledSource::new(
        StaticSource::new(trade, tariffs),
        SourcePolicy::from(&config.source),
    );
    let mut outlook = TradeOutlook::new(&config, source, directory)?;

    let report = outlook.run(&["China", "Vietnam", "Peru"], Metric::Exports)?;

    println!("Skipped:");
    for skipped in &report.batch.skipped {
        println!("  {} {}: {}", skipped.country_name, skipped.metric, skipped.reason);
    }

    println!("\nFit diagnostics:");
    for (country, metric, diagnostics) in &report.batch.diagnostics {
        println!(
            "  {} {}: MAE {:.1}, MAPE {:.2}% (sigma {:.1}, {} changepoints)",
            country,
            metric,
            diagnostics.accuracy.mae,
            diagnostics.accuracy.mape,
            diagnostics.summary.noise_sigma,
            diagnostics.summary.changepoints
        );
    }

    println!(
        "\n{:<8} {:>5} {:>10} {:>10} {:>22} {:>8}",
        "country", "year", "yhat", "adjusted", "80% band", "source"
    );
    for point in report.adjusted.iter() {
        let row = &point.forecast;
        println!(
            "{:<8} {:>5} {:>10.1} {:>10.1} {:>10.1} .. {:>8.1} {:>8}{}",
            row.country_name,
            row.year,
            row.yhat,
            point.yhat_tariff_adjusted,
            row.yhat_lower,
            row.yhat_upper,
            format!("{:?}", point.tariff_source),
            if row.is_forecast { "  *" } else { "" }
        );
    }

    println!(
        "\nProjected exports lost to tariffs: {:.1} (default rate used for {:?})",
        report.adjusted.total_drag(),
        report.adjusted.defaulted_countries()
    );

    Ok(())
}
