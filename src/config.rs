//! Analysis configuration and parameter metadata
//!
//! [`AnalysisConfig`] is a plain value passed into each entry point; nothing in the crate reads
//! global state. Every numeric field is described by a [`ParamMeta`], which drives validation and
//! lets front-ends list the tunable parameters with their defaults and valid ranges.
//!
//! # Example
//!
//! ```rust
//! use mabounce::config::AnalysisConfig;
//!
//! let config = AnalysisConfig { ma_period_min: 10, ma_period_max: 50, ..Default::default() };
//! assert!(config.validate().is_ok());
//!
//! for param in AnalysisConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::detectors::{IsolationWindow, WickMeasure, WickTouchDetector};
use crate::evaluator::TargetEvaluator;
use crate::indicators::MaType;
use crate::{BounceError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in (min, max]; both bounds enforced
  Ratio,
  /// Real number strictly above the lower bound, unbounded above
  Positive,
  /// Positive integer
  Period,
  /// Non-negative integer
  Count,
}

impl ParamType {
  #[inline]
  fn lower_exclusive(self) -> bool {
    matches!(self, ParamType::Ratio | ParamType::Positive)
  }

  #[inline]
  fn is_integer(self) -> bool {
    matches!(self, ParamType::Period | ParamType::Count)
  }
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name, as used in config files (e.g. "alpha_wick")
  pub name: &'static str,
  /// Parameter type
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range: (min, max). The lower bound is always enforced; the upper bound only for
  /// [`ParamType::Ratio`], elsewhere it is `f64::INFINITY`.
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a value that must exceed `min`
  pub const fn positive(
    name: &'static str,
    default: f64,
    min: f64,
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Positive, default, range: (min, f64::INFINITY), description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(name: &'static str, default: f64, description: &'static str) -> Self {
    Self { name, param_type: ParamType::Period, default, range: (1.0, f64::INFINITY), description }
  }

  /// Create a new ParamMeta for a Count parameter
  pub const fn count(name: &'static str, default: f64, description: &'static str) -> Self {
    Self { name, param_type: ParamType::Count, default, range: (0.0, f64::INFINITY), description }
  }

  /// Interval notation for the accepted values, e.g. `(0, 1]` or `[1, inf)`
  pub fn range_label(&self) -> String {
    let (min, max) = self.range;
    let open = if self.param_type.lower_exclusive() { '(' } else { '[' };
    if max.is_infinite() {
      format!("{open}{min}, inf)")
    } else {
      format!("{open}{min}, {max}]")
    }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(BounceError::config(self.name, "must be finite"));
    }
    let (min, max) = self.range;
    let below = if self.param_type.lower_exclusive() { value <= min } else { value < min };
    if below || value > max {
      return Err(BounceError::config(
        self.name,
        format!("{value} out of range {}", self.range_label()),
      ));
    }
    if self.param_type.is_integer() && value.fract() != 0.0 {
      return Err(BounceError::config(self.name, "must be an integer"));
    }
    Ok(())
  }
}

const PARAMS: &[ParamMeta] = &[
  ParamMeta::period("ma_period_min", 5.0, "Smallest moving-average period"),
  ParamMeta::period("ma_period_max", 233.0, "Largest moving-average period"),
  ParamMeta::ratio(
    "alpha_wick",
    0.30,
    (0.0, 1.0),
    "Minimum touching wick length as a fraction of the candle range",
  ),
  ParamMeta::count("n_pre", 5.0, "Touch-free candles required before an event"),
  ParamMeta::count("n_post", 5.0, "Touch-free candles required after an event"),
  ParamMeta::positive("target_pct", 0.03, 0.0, "Target move as a fraction of the anchor close"),
  ParamMeta::period(
    "max_lookahead",
    200.0,
    "Forward candles scanned to resolve an event; null scans to the series end",
  ),
  ParamMeta::count("min_events", 10.0, "Rows with fewer events are left out of the report"),
];

// ============================================================
// ANALYSIS CONFIG
// ============================================================

/// Parameters of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
  pub ma_period_min: usize,
  pub ma_period_max: usize,
  pub ma_types: Vec<MaType>,
  pub alpha_wick: f64,
  pub wick_measure: WickMeasure,
  pub n_pre: usize,
  pub n_post: usize,
  pub target_pct: f64,
  /// Forward scan bound; `None` scans to the end of the series
  pub max_lookahead: Option<usize>,
  pub min_events: usize,
  /// Worker pool size; `None` uses the global rayon pool
  pub workers: Option<usize>,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      ma_period_min: 5,
      ma_period_max: 233,
      ma_types: vec![MaType::Sma, MaType::Ema],
      alpha_wick: 0.30,
      wick_measure: WickMeasure::default(),
      n_pre: 5,
      n_post: 5,
      target_pct: 0.03,
      max_lookahead: Some(200),
      min_events: 10,
      workers: None,
    }
  }
}

impl AnalysisConfig {
  /// Metadata for all numeric parameters
  pub fn param_meta() -> &'static [ParamMeta] {
    PARAMS
  }

  /// Current value of a numeric parameter, by metadata name
  pub fn value_of(&self, name: &str) -> Option<f64> {
    let value = match name {
      "ma_period_min" => self.ma_period_min as f64,
      "ma_period_max" => self.ma_period_max as f64,
      "alpha_wick" => self.alpha_wick,
      "n_pre" => self.n_pre as f64,
      "n_post" => self.n_post as f64,
      "target_pct" => self.target_pct,
      "max_lookahead" => return self.max_lookahead.map(|v| v as f64),
      "min_events" => self.min_events as f64,
      _ => return None,
    };
    Some(value)
  }

  /// Check every field. Called before any work is scheduled.
  pub fn validate(&self) -> Result<()> {
    for meta in PARAMS {
      if let Some(value) = self.value_of(meta.name) {
        meta.validate(value)?;
      }
    }
    if self.ma_period_min > self.ma_period_max {
      return Err(BounceError::config(
        "ma_period_min",
        format!(
          "{} is greater than ma_period_max {}",
          self.ma_period_min, self.ma_period_max
        ),
      ));
    }
    if self.ma_types.is_empty() {
      return Err(BounceError::config("ma_types", "at least one MA type is required"));
    }
    if self.workers == Some(0) {
      return Err(BounceError::config("workers", "must be at least 1"));
    }
    Ok(())
  }

  /// Every `(period, type)` combination, periods ascending, duplicate types removed
  pub fn units(&self) -> Vec<(Period, MaType)> {
    let mut types = self.ma_types.clone();
    types.sort();
    types.dedup();

    (self.ma_period_min.max(1)..=self.ma_period_max)
      .flat_map(|p| types.iter().map(move |&t| (Period::new_const(p), t)))
      .collect()
  }

  pub fn isolation(&self) -> IsolationWindow {
    IsolationWindow { n_pre: self.n_pre, n_post: self.n_post }
  }

  pub fn detector(&self) -> Result<WickTouchDetector> {
    let alpha = Ratio::new(self.alpha_wick)
      .map_err(|e| BounceError::config("alpha_wick", e.to_string()))?;
    Ok(WickTouchDetector::new(alpha).with_measure(self.wick_measure))
  }

  pub fn evaluator(&self) -> Result<TargetEvaluator> {
    match self.max_lookahead {
      Some(bars) => TargetEvaluator::new(self.target_pct, bars),
      None => TargetEvaluator::unbounded(self.target_pct),
    }
  }
}

// ============================================================
// TESTS
// ============================================================
