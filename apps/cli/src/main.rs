#![deny(warnings)]

//! Headless CLI: loads a dataset file, runs the yearly strategy analysis,
//! and optionally prints historical series or scenario simulations.

use analysis::{Analyst, DataStore, Scenario, SeriesField};
use anyhow::{bail, Context, Result};
use market_core::Firm;
use persistence::MemoryStore;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    data: Option<PathBuf>,
    year: Option<i32>,
    series: Option<String>,
    scenarios: Option<PathBuf>,
    export: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args {
        data: None,
        year: None,
        series: None,
        scenarios: None,
        export: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data" => args.data = it.next().map(PathBuf::from),
            "--year" => args.year = it.next().and_then(|s| s.parse().ok()),
            "--series" => args.series = it.next(),
            "--scenarios" => args.scenarios = it.next().map(PathBuf::from),
            "--export" => args.export = it.next().map(PathBuf::from),
            _ => {}
        }
    }
    args
}

fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenarios from {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match extension {
        "json" => Ok(serde_json::from_str(&text)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&text)?),
        other => bail!("unsupported scenarios format: {other}"),
    }
}

fn print_series(analyst: &Analyst<MemoryStore>, field_name: &str) -> Result<()> {
    let field: SeriesField = field_name
        .parse()
        .map_err(|e| anyhow::anyhow!("{e} (expected size, price, price-per-unit, market-share, or profit-margin)"))?;
    let fmt = |v: Option<f64>| match v {
        Some(v) => format!("{v}"),
        None => "-".to_string(),
    };
    for point in analyst.historical_series(field) {
        println!(
            "{} | {}: {} | {}: {} | {}: {}",
            point.year,
            Firm::MilkBikis,
            fmt(point.values[0]),
            Firm::GoodDay,
            fmt(point.values[1]),
            Firm::ParleG,
            fmt(point.values[2]),
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    let Some(data) = args.data else {
        bail!(
            "usage: cli --data <dataset.{{json,yaml}}> [--year <year>] [--series <field>] \
             [--scenarios <file>] [--export <file>]"
        );
    };

    let store = MemoryStore::from_path(&data)
        .with_context(|| format!("loading dataset from {}", data.display()))?;
    let mut analyst = Analyst::new(store);

    if let Some(field) = args.series {
        return print_series(&analyst, &field);
    }

    let year = match args.year {
        Some(year) => year,
        None => match analyst.store().years().last() {
            Some(year) => *year,
            None => bail!("dataset contains no firm states"),
        },
    };
    info!(year, data = %data.display(), "analyzing");

    let record = analyst.get_or_run_analysis(year)?;

    println!("Year {year}");
    for equilibrium in &record.equilibria {
        println!("Equilibrium | {equilibrium}");
    }
    for metrics in &record.firm_metrics {
        println!(
            "{} | size: {}g ({}%) | price: ₹{} ({}%) | margin: {}% | share: {:.1}% | \
             ₹{} per 100g | recommendation: {}",
            metrics.firm,
            metrics.current_size_g,
            metrics.size_change_pct,
            metrics.current_price,
            metrics.price_change_pct,
            metrics.profit_margin_pct,
            metrics.market_share_pct,
            metrics.price_per_100g,
            metrics.recommendation,
        );
    }
    for insight in &record.insights {
        println!("Insight | {insight}");
    }

    if let Some(path) = args.scenarios {
        let scenarios = load_scenarios(&path)?;
        let results = analyst.simulate(year, &scenarios)?;
        for result in &results {
            println!("Scenario | {}", serde_json::to_string(&result.scenario)?);
            for equilibrium in &result.equilibria {
                println!("  Equilibrium | {equilibrium}");
            }
            for firm in Firm::ALL {
                println!("  {} -> {}", firm, result.recommendations.for_firm(firm));
            }
        }
    }

    if let Some(path) = args.export {
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)
            .with_context(|| format!("writing analysis export to {}", path.display()))?;
        info!(path = %path.display(), "analysis exported");
    }

    Ok(())
}
