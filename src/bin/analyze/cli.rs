use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use mabounce::config::AnalysisConfig;
use mabounce::detectors::WickMeasure;
use mabounce::indicators::MaType;

#[derive(Parser, Debug)]
#[command(
    name = "mabounce-analyze",
    about = "Measure how reliably price bounces off moving averages after wick-only touches"
)]
pub struct Cli {
    /// Candle CSV files or directories holding them (`<exchange>_<BASE>_<QUOTE>_<tf>.csv`)
    #[arg(value_name = "PATH", value_hint = clap::ValueHint::AnyPath, default_value = "data")]
    pub data: Vec<PathBuf>,

    /// JSON configuration file; flags given on the command line override it
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Smallest moving-average period
    #[arg(long = "ma-min")]
    pub ma_min: Option<usize>,

    /// Largest moving-average period (inclusive)
    #[arg(long = "ma-max")]
    pub ma_max: Option<usize>,

    /// Moving-average types to evaluate
    #[arg(long = "ma-types", value_delimiter = ',')]
    pub ma_types: Option<Vec<MaTypeValue>>,

    /// Minimum wick length as a fraction of the candle range
    #[arg(long = "alpha-wick")]
    pub alpha_wick: Option<f64>,

    /// What the wick threshold is measured against
    #[arg(long = "wick-measure")]
    pub wick_measure: Option<WickMeasureValue>,

    /// Touch-free candles required before an event
    #[arg(long = "n-pre")]
    pub n_pre: Option<usize>,

    /// Touch-free candles required after an event
    #[arg(long = "n-post")]
    pub n_post: Option<usize>,

    /// Target move as a fraction of the touch close
    #[arg(long)]
    pub target: Option<f64>,

    /// Forward candles scanned for the target, or `none` to scan to the end of the series
    #[arg(long = "max-lookahead", value_name = "BARS|none")]
    pub max_lookahead: Option<Lookahead>,

    /// Rows with fewer events are left out of the report
    #[arg(long = "min-events")]
    pub min_events: Option<usize>,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Report CSV path
    #[arg(long, default_value = "results/analysis_results.csv", value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Number of best rows printed after the run
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Also analyze daily and weekly datasets
    #[arg(long = "include-daily", default_value_t = false)]
    pub include_daily: bool,

    /// Print the tunable parameters with their defaults and ranges, then exit
    #[arg(long = "list-params", default_value_t = false)]
    pub list_params: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MaTypeValue {
    Sma,
    Ema,
}

impl From<MaTypeValue> for MaType {
    fn from(value: MaTypeValue) -> Self {
        match value {
            MaTypeValue::Sma => MaType::Sma,
            MaTypeValue::Ema => MaType::Ema,
        }
    }
}

/// `--max-lookahead` value: a candle count or `none`/`unbounded`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookahead {
    Bars(usize),
    Unbounded,
}

impl std::str::FromStr for Lookahead {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "unbounded" => Ok(Lookahead::Unbounded),
            other => other
                .parse::<usize>()
                .map(Lookahead::Bars)
                .map_err(|_| format!("expected a candle count or `none`, got `{s}`")),
        }
    }
}

impl From<Lookahead> for Option<usize> {
    fn from(value: Lookahead) -> Self {
        match value {
            Lookahead::Bars(n) => Some(n),
            Lookahead::Unbounded => None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum WickMeasureValue {
    Penetration,
    Shadow,
}

impl From<WickMeasureValue> for WickMeasure {
    fn from(value: WickMeasureValue) -> Self {
        match value {
            WickMeasureValue::Penetration => WickMeasure::Penetration,
            WickMeasureValue::Shadow => WickMeasure::Shadow,
        }
    }
}

impl Cli {
    /// Configuration from the optional file, overridden by explicit flags.
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(v) = self.ma_min {
            config.ma_period_min = v;
        }
        if let Some(v) = self.ma_max {
            config.ma_period_max = v;
        }
        if let Some(types) = &self.ma_types {
            config.ma_types = types.iter().copied().map(MaType::from).collect();
        }
        if let Some(v) = self.alpha_wick {
            config.alpha_wick = v;
        }
        if let Some(v) = self.wick_measure {
            config.wick_measure = v.into();
        }
        if let Some(v) = self.n_pre {
            config.n_pre = v;
        }
        if let Some(v) = self.n_post {
            config.n_post = v;
        }
        if let Some(v) = self.target {
            config.target_pct = v;
        }
        if let Some(v) = self.max_lookahead {
            config.max_lookahead = v.into();
        }
        if let Some(v) = self.min_events {
            config.min_events = v;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        Ok(config)
    }

    /// Every `.csv` file named on the command line or found directly inside a named directory,
    /// sorted.
    pub fn dataset_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for path in &self.data {
            if path.is_dir() {
                let entries = std::fs::read_dir(path)
                    .with_context(|| format!("failed to read directory {}", path.display()))?;
                for entry in entries {
                    let entry = entry
                        .with_context(|| format!("failed to read directory {}", path.display()))?;
                    let candidate = entry.path();
                    if candidate.is_file() && is_csv(&candidate) {
                        paths.push(candidate);
                    }
                }
            } else {
                paths.push(path.clone());
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}

fn read_config(path: &Path) -> Result<AnalysisConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}
