//! # mabounce - Moving-Average Wick Bounce Analyzer
//!
//! Measures how reliably price bounces off a moving average after touching it with a candle's
//! wick only, and whether those bounces go on to reach a target move.
//!
//! For every candle series and every `(period, type)` moving average the engine:
//!
//! 1. computes the moving average ([`MovingAverageSeries`]),
//! 2. flags wick-only touches ([`WickTouchDetector`]),
//! 3. keeps touches that are isolated from their neighbours ([`TouchFlags::is_isolated`]),
//! 4. resolves each isolated touch into an [`Outcome`] ([`TargetEvaluator`]),
//! 5. folds the outcomes into one [`SummaryRow`] ([`aggregate`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use mabounce::prelude::*;
//!
//! let candles: Vec<Candle> = (0..50)
//!     .map(|i| {
//!         let base = 100.0 + (i as f64 * 0.7).sin() * 3.0;
//!         Candle::new(i * 60_000, base, base + 1.0, base - 1.5, base + 0.2, 10.0)
//!     })
//!     .collect();
//! let series = CandleSeries::new("BTC/USDT", "1m", candles).unwrap();
//!
//! let engine = EngineBuilder::new()
//!     .ma_periods(5, 20)
//!     .min_events(0)
//!     .build()
//!     .unwrap();
//!
//! let report = engine.analyze(std::slice::from_ref(&series));
//! for row in &report.rows {
//!     assert_eq!(row.wins + row.losses, row.total_events);
//! }
//! ```

pub mod config;
pub mod data;
pub mod detectors;
pub mod evaluator;
pub mod indicators;
pub mod metrics;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{AnalysisConfig, ParamMeta, ParamType},
        // Detection
        detectors::*,
        // Evaluation
        evaluator::{evaluate, Outcome, OutcomeReason, TargetEvaluator},
        // Indicators
        indicators::*,
        // Metrics
        metrics::{aggregate, SummaryRow},
        // Data
        series::{Candle, CandleSeries, SeriesKey},
        // Engine
        BounceEngine,
        EngineBuilder,
        // Errors
        BounceError,
        OHLCVExt,
        Period,
        Ratio,
        Report,
        Result,
        UnitError,
        OHLCV,
    };
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use config::AnalysisConfig;
use detectors::{IsolationWindow, TouchFlags, WickMeasure, WickTouchDetector};
use evaluator::{Outcome, TargetEvaluator};
use indicators::{MaType, MovingAverageSeries};
use metrics::SummaryRow;
use series::{CandleSeries, SeriesKey};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, BounceError>;

/// Errors that can occur while configuring or running an analysis
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BounceError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("Insufficient data: need {need} candles, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl BounceError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for BounceError {
    fn from(err: csv::Error) -> Self {
        Self::Data(err.to_string())
    }
}

impl From<std::io::Error> for BounceError {
    fn from(err: std::io::Error) -> Self {
        Self::Data(err.to_string())
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Strictly positive fraction in range (0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in (0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(BounceError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if value <= 0.0 || value > 1.0 {
            return Err(BounceError::InvalidValue("Ratio must be in (0, 1]"));
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Moving-average period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(BounceError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (**self).timestamp()
    }
}

/// Extension trait with computed candle geometry
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body_low(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_high(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.body_high()
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.body_low() - self.low()
    }

    /// Single-price candle: no range, so no wick geometry.
    #[inline]
    fn is_degenerate(&self) -> bool {
        self.high() == self.low()
    }

    /// Validate OHLC consistency
    fn validate(&self) -> Result<()> {
        let (o, h, l, c) = (self.open(), self.high(), self.low(), self.close());
        if o.is_nan() || h.is_nan() || l.is_nan() || c.is_nan() {
            return Err(BounceError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if o.is_infinite() || h.is_infinite() || l.is_infinite() || c.is_infinite() {
            return Err(BounceError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if l < 0.0 {
            return Err(BounceError::InvalidCandle {
                index: 0,
                reason: "negative price",
            });
        }
        if h < l {
            return Err(BounceError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        if o < l || o > h || c < l || c > h {
            return Err(BounceError::InvalidCandle {
                index: 0,
                reason: "open/close outside [low, high]",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

// ============================================================
// BOUNCE ENGINE
// ============================================================

/// One unit of work that could not produce events
#[derive(Debug, Clone, PartialEq)]
pub struct UnitError {
    pub series: SeriesKey,
    pub period: Period,
    pub ma_type: MaType,
    pub error: BounceError,
}

/// Result of an analysis run, in deterministic order
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Rows ordered by symbol, timeframe, period, then MA type
    pub rows: Vec<SummaryRow>,
    /// Units that were skipped, e.g. for insufficient data
    pub skipped: Vec<UnitError>,
    /// Rows dropped for having fewer than `min_events` events
    pub suppressed: usize,
    /// True when a cancellation request stopped dispatch early
    pub cancelled: bool,
}

impl Report {
    fn collect(
        results: Vec<std::result::Result<SummaryRow, UnitError>>,
        min_events: usize,
        cancelled: bool,
    ) -> Self {
        let mut report = Report {
            cancelled,
            ..Report::default()
        };

        for result in results {
            match result {
                Ok(row) if row.total_events > 0 && row.total_events >= min_events => {
                    report.rows.push(row)
                }
                Ok(_) => report.suppressed += 1,
                Err(e) => report.skipped.push(e),
            }
        }

        report.rows.sort_by(|a, b| {
            (&a.symbol, &a.timeframe, a.period, a.ma_type.as_str()).cmp(&(
                &b.symbol,
                &b.timeframe,
                b.period,
                b.ma_type.as_str(),
            ))
        });
        report.skipped.sort_by(|a, b| {
            (&a.series, a.period, a.ma_type.as_str()).cmp(&(
                &b.series,
                b.period,
                b.ma_type.as_str(),
            ))
        });
        report
    }

    /// Rows ranked by win rate, best first. Ties keep report order.
    pub fn ranked_by_win_rate(&self) -> Vec<&SummaryRow> {
        let mut ranked: Vec<&SummaryRow> = self.rows.iter().collect();
        ranked.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
        ranked
    }
}

/// Main analysis engine. Holds a validated configuration and no mutable state,
/// so one engine can be shared by every worker.
pub struct BounceEngine {
    config: AnalysisConfig,
    units: Vec<(Period, MaType)>,
    detector: WickTouchDetector,
    evaluator: TargetEvaluator,
    isolation: IsolationWindow,
    pool: Option<rayon::ThreadPool>,
    cancel: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for BounceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BounceEngine")
            .field("config", &self.config)
            .field("units", &self.units.len())
            .field("workers", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .finish()
    }
}

impl BounceEngine {
    /// Build an engine from a configuration value.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        EngineBuilder::from_config(config).build()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The `(period, type)` combinations evaluated for every series.
    pub fn units(&self) -> &[(Period, MaType)] {
        &self.units
    }

    // ===========================================
    // LOW-LEVEL: Primitives
    // ===========================================

    /// Flag every wick touch against one moving average.
    #[inline]
    pub fn touch_flags<T: OHLCV>(&self, bars: &[T], ma: &MovingAverageSeries) -> TouchFlags {
        self.detector.touch_flags(bars, ma)
    }

    /// Resolve every isolated touch of one moving average.
    pub fn evaluate_events<T: OHLCV>(&self, bars: &[T], ma: &MovingAverageSeries) -> Vec<Outcome> {
        let flags = self.touch_flags(bars, ma);
        flags
            .isolated_events(self.isolation)
            .map(|event| {
                let outcome = self.evaluator.evaluate(bars, event);
                tracing::trace!(
                    index = event.index,
                    side = event.side.as_str(),
                    reason = outcome.reason.as_str(),
                    bars_scanned = outcome.bars_scanned,
                    "event resolved"
                );
                outcome
            })
            .collect()
    }

    // ===========================================
    // MID-LEVEL: One unit of work
    // ===========================================

    /// Compute outcomes for one `(period, type)` over raw bars.
    pub fn evaluate_unit<T: OHLCV>(
        &self,
        bars: &[T],
        period: Period,
        ma_type: MaType,
    ) -> Result<Vec<Outcome>> {
        if bars.is_empty() {
            return Err(BounceError::InsufficientData { need: 1, got: 0 });
        }
        if ma_type == MaType::Sma && bars.len() < period.get() {
            return Err(BounceError::InsufficientData {
                need: period.get(),
                got: bars.len(),
            });
        }

        let ma = MovingAverageSeries::compute(bars, period, ma_type);
        Ok(self.evaluate_events(bars, &ma))
    }

    /// Compute the summary row for one `(series, period, type)` unit.
    pub fn analyze_unit(
        &self,
        series: &CandleSeries,
        period: Period,
        ma_type: MaType,
    ) -> std::result::Result<SummaryRow, UnitError> {
        match self.evaluate_unit(series.candles(), period, ma_type) {
            Ok(outcomes) => {
                let row = metrics::aggregate(series.key(), period, ma_type, &outcomes);
                tracing::debug!(
                    series = %series.key(),
                    period = period.get(),
                    ma_type = ma_type.as_str(),
                    events = row.total_events,
                    win_rate = row.win_rate,
                    "unit evaluated"
                );
                Ok(row)
            }
            Err(error) => {
                tracing::debug!(
                    series = %series.key(),
                    period = period.get(),
                    ma_type = ma_type.as_str(),
                    %error,
                    "unit skipped"
                );
                Err(UnitError {
                    series: series.key().clone(),
                    period,
                    ma_type,
                    error,
                })
            }
        }
    }

    // ===========================================
    // HIGH-LEVEL: Batch processing
    // ===========================================

    /// Analyze a single series sequentially.
    pub fn analyze_series(&self, series: &CandleSeries) -> Report {
        let results = self
            .units
            .iter()
            .map(|&(period, ma_type)| self.analyze_unit(series, period, ma_type))
            .collect();
        Report::collect(results, self.config.min_events, false)
    }

    /// Analyze every `(series, period, type)` unit on the worker pool.
    ///
    /// Units run in no particular order; the report is sorted afterwards.
    pub fn analyze(&self, series: &[CandleSeries]) -> Report {
        use rayon::prelude::*;

        let work: Vec<(&CandleSeries, Period, MaType)> = series
            .iter()
            .flat_map(|s| self.units.iter().map(move |&(p, t)| (s, p, t)))
            .collect();

        tracing::info!(
            series = series.len(),
            units = work.len(),
            "starting bounce analysis"
        );

        let run = || -> Vec<_> {
            work.par_iter()
                .filter_map(|&(s, period, ma_type)| {
                    if self.is_cancelled() {
                        return None;
                    }
                    Some(self.analyze_unit(s, period, ma_type))
                })
                .collect()
        };

        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let cancelled = self.is_cancelled();
        let report = Report::collect(results, self.config.min_events, cancelled);

        if cancelled {
            tracing::warn!("analysis cancelled before all units were dispatched");
        }
        tracing::info!(
            rows = report.rows.len(),
            suppressed = report.suppressed,
            skipped = report.skipped.len(),
            "bounce analysis complete"
        );
        report
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating BounceEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: AnalysisConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl EngineBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration value
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Inclusive range of moving-average periods
    pub fn ma_periods(mut self, min: usize, max: usize) -> Self {
        self.config.ma_period_min = min;
        self.config.ma_period_max = max;
        self
    }

    /// Moving-average types to evaluate
    pub fn ma_types(mut self, types: impl IntoIterator<Item = MaType>) -> Self {
        self.config.ma_types = types.into_iter().collect();
        self
    }

    /// Minimum wick length as a fraction of candle range
    pub fn alpha_wick(mut self, alpha: f64) -> Self {
        self.config.alpha_wick = alpha;
        self
    }

    pub fn wick_measure(mut self, measure: WickMeasure) -> Self {
        self.config.wick_measure = measure;
        self
    }

    /// Touch-free candles required before and after an event
    pub fn isolation(mut self, n_pre: usize, n_post: usize) -> Self {
        self.config.n_pre = n_pre;
        self.config.n_post = n_post;
        self
    }

    /// Target move and forward scan bound
    pub fn target(mut self, target_pct: f64, max_lookahead: usize) -> Self {
        self.config.target_pct = target_pct;
        self.config.max_lookahead = Some(max_lookahead);
        self
    }

    /// Scan to the end of the series instead of a fixed number of candles
    pub fn unbounded_lookahead(mut self) -> Self {
        self.config.max_lookahead = None;
        self
    }

    /// Rows with fewer events are left out of the report
    pub fn min_events(mut self, min_events: usize) -> Self {
        self.config.min_events = min_events;
        self
    }

    /// Fixed worker pool size. Without it the global rayon pool is used.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = Some(workers);
        self
    }

    /// Stop dispatching further units once `flag` is set
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<BounceEngine> {
        let config = self.config;
        config.validate()?;

        let pool = match config.workers {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("mabounce-worker-{i}"))
                    .build()
                    .map_err(|e| BounceError::WorkerPool(e.to_string()))?,
            ),
            None => None,
        };

        Ok(BounceEngine {
            units: config.units(),
            detector: config.detector()?,
            evaluator: config.evaluator()?,
            isolation: config.isolation(),
            config,
            pool,
            cancel: self.cancel,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
