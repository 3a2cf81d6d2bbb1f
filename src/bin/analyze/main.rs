mod cli;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::{prelude::*, EnvFilter};

use cli::Cli;
use mabounce::config::AnalysisConfig;
use mabounce::data;
use mabounce::prelude::*;

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing: {err}"))
}

fn list_params() {
    println!("{:<16} {:>10} {:>22}  description", "name", "default", "range");
    for meta in AnalysisConfig::param_meta() {
        println!(
            "{:<16} {:>10} {:>22}  {}",
            meta.name,
            meta.default,
            meta.range_label(),
            meta.description
        );
    }
}

#[derive(Debug, Default)]
struct Datasets {
    series: Vec<CandleSeries>,
    skipped_daily: usize,
    failed: usize,
}

/// Daily files are skipped on their name alone, before the file is opened.
fn load_datasets(paths: &[PathBuf], include_daily: bool) -> Datasets {
    let mut out = Datasets::default();
    for path in paths {
        let name = match data::DatasetName::from_path(path) {
            Ok(name) => name,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping dataset");
                out.failed += 1;
                continue;
            }
        };
        if name.timeframe.is_daily() && !include_daily {
            tracing::info!(path = %path.display(), timeframe = %name.timeframe, "skipping daily dataset");
            out.skipped_daily += 1;
            continue;
        }
        match data::load_named(path, &name) {
            Ok(s) => {
                tracing::info!(path = %path.display(), series = %s.key(), candles = s.len(), "loaded dataset");
                out.series.push(s);
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping dataset");
                out.failed += 1;
            }
        }
    }
    out
}

fn print_top(report: &Report, top: usize) {
    let ranked = report.ranked_by_win_rate();
    if ranked.is_empty() {
        println!("No rows met the minimum event count.");
        return;
    }

    println!(
        "{:<14} {:>4} {:>4} {:>6} {:>7} {:>5} {:>8} {:>8}",
        "symbol", "tf", "type", "period", "events", "wins", "win %", "med t"
    );
    for row in ranked.into_iter().take(top) {
        let median = row
            .median_time_to_target
            .map_or_else(|| "-".to_string(), |m| format!("{m:.1}"));
        println!(
            "{:<14} {:>4} {:>4} {:>6} {:>7} {:>5} {:>8.2} {:>8}",
            row.symbol,
            row.timeframe,
            row.ma_type.as_str(),
            row.period,
            row.total_events,
            row.wins,
            row.win_rate,
            median
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    if cli.list_params {
        list_params();
        return Ok(());
    }

    let config = cli.analysis_config()?;
    let engine = BounceEngine::new(config).context("invalid analysis configuration")?;

    let datasets = load_datasets(&cli.dataset_paths()?, cli.include_daily);
    tracing::info!(
        loaded = datasets.series.len(),
        skipped_daily = datasets.skipped_daily,
        failed = datasets.failed,
        "datasets discovered"
    );
    if datasets.series.is_empty() {
        return Err(anyhow!("no usable datasets found"));
    }

    let report = engine.analyze(&datasets.series);
    for unit in &report.skipped {
        tracing::warn!(
            series = %unit.series,
            period = unit.period.get(),
            ma_type = unit.ma_type.as_str(),
            error = %unit.error,
            "unit skipped"
        );
    }

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    data::write_report(BufWriter::new(file), &report.rows)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    tracing::info!(path = %cli.output.display(), rows = report.rows.len(), "report written");

    print_top(&report, cli.top);
    Ok(())
}
