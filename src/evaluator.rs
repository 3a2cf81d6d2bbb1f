//! Forward resolution of a touch event into a win or a loss.
//!
//! From the touch candle's close (the anchor), the evaluator scans up to `max_lookahead`
//! candles, or to the end of the series when unbounded, for the target move in the bounce
//! direction, tracking the worst excursion against that direction along the way. A target
//! that is reached and then given back (price revisits the anchor before the window ends)
//! is not a win.

use serde::{Deserialize, Serialize};

use crate::detectors::{Side, TouchEvent};
use crate::{BounceError, Result, OHLCV};

/// How an event was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    TargetReached,
    ReturnedBeforeConfirmed,
    Timeout,
}

impl OutcomeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeReason::TargetReached => "target_reached",
            OutcomeReason::ReturnedBeforeConfirmed => "returned_before_confirmed",
            OutcomeReason::Timeout => "timeout",
        }
    }
}

/// Resolution of one touch event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub event: TouchEvent,
    pub success: bool,
    /// Candles from the touch to the first target hit; wins only
    pub time_to_target: Option<usize>,
    /// Worst move against the bounce, as a fraction of the anchor; never negative
    pub adverse_max_pct: f64,
    pub reason: OutcomeReason,
    /// Forward candles examined up to the resolving one
    pub bars_scanned: usize,
}

/// Target test parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEvaluator {
    target_pct: f64,
    max_lookahead: Option<usize>,
}

impl TargetEvaluator {
    /// `target_pct` must be finite and > 0, `max_lookahead` >= 1.
    pub fn new(target_pct: f64, max_lookahead: usize) -> Result<Self> {
        if max_lookahead < 1 {
            return Err(BounceError::config("max_lookahead", "must be at least 1"));
        }
        Self::with_lookahead(target_pct, Some(max_lookahead))
    }

    /// Scan every remaining candle of the series.
    pub fn unbounded(target_pct: f64) -> Result<Self> {
        Self::with_lookahead(target_pct, None)
    }

    fn with_lookahead(target_pct: f64, max_lookahead: Option<usize>) -> Result<Self> {
        if !target_pct.is_finite() || target_pct <= 0.0 {
            return Err(BounceError::config("target_pct", "must be a finite value > 0"));
        }
        Ok(Self {
            target_pct,
            max_lookahead,
        })
    }

    #[inline]
    pub fn target_pct(&self) -> f64 {
        self.target_pct
    }

    /// `None` when the scan runs to the end of the series
    #[inline]
    pub fn max_lookahead(&self) -> Option<usize> {
        self.max_lookahead
    }

    /// Price level that counts as a hit for `side` from `anchor`
    #[inline]
    pub fn target_level(&self, anchor: f64, side: Side) -> f64 {
        match side {
            Side::Bull => anchor * (1.0 + self.target_pct),
            Side::Bear => anchor * (1.0 - self.target_pct),
        }
    }

    /// Resolve `event` against the bars after it.
    ///
    /// The window is truncated at the end of `bars`; running out of candles is a timeout.
    ///
    /// # Panics
    ///
    /// Panics if `event.index` is out of bounds.
    pub fn evaluate<T: OHLCV>(&self, bars: &[T], event: TouchEvent) -> Outcome {
        let side = event.side;
        let anchor = bars[event.index].close();
        let target = self.target_level(anchor, side);
        let last = bars.len() - 1;
        let stop = match self.max_lookahead {
            Some(n) => last.min(event.index.saturating_add(n)),
            None => last,
        };

        let mut adverse_max = 0.0_f64;

        for j in event.index + 1..=stop {
            let bar = &bars[j];

            if anchor > 0.0 {
                let excursion = match side {
                    Side::Bull => (anchor - bar.low()) / anchor,
                    Side::Bear => (bar.high() - anchor) / anchor,
                };
                adverse_max = adverse_max.max(excursion);
            }

            let reached = match side {
                Side::Bull => bar.high() >= target,
                Side::Bear => bar.low() <= target,
            };
            if !reached {
                continue;
            }

            // Confirm: price must stay off the anchor from the hit to the end of the window.
            let returned = bars[j..=stop].iter().any(|b| match side {
                Side::Bull => b.low() <= anchor,
                Side::Bear => b.high() >= anchor,
            });
            let bars_scanned = j - event.index;

            return if returned {
                Outcome {
                    event,
                    success: false,
                    time_to_target: None,
                    adverse_max_pct: adverse_max,
                    reason: OutcomeReason::ReturnedBeforeConfirmed,
                    bars_scanned,
                }
            } else {
                Outcome {
                    event,
                    success: true,
                    time_to_target: Some(bars_scanned),
                    adverse_max_pct: adverse_max,
                    reason: OutcomeReason::TargetReached,
                    bars_scanned,
                }
            };
        }

        Outcome {
            event,
            success: false,
            time_to_target: None,
            adverse_max_pct: adverse_max,
            reason: OutcomeReason::Timeout,
            bars_scanned: stop - event.index,
        }
    }
}

/// One-shot form of [`TargetEvaluator::evaluate`] that validates its parameters.
pub fn evaluate<T: OHLCV>(
    bars: &[T],
    event: TouchEvent,
    target_pct: f64,
    max_lookahead: usize,
) -> Result<Outcome> {
    Ok(TargetEvaluator::new(target_pct, max_lookahead)?.evaluate(bars, event))
}
