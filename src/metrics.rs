//! Per-unit summary statistics over resolved outcomes

use serde::{Deserialize, Serialize};

use crate::evaluator::{Outcome, OutcomeReason};
use crate::indicators::MaType;
use crate::series::SeriesKey;
use crate::Period;

/// Quality metrics for one `(series, period, type)` unit.
///
/// Flat so it serializes straight to one CSV record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub timeframe: String,
    pub ma_type: MaType,
    pub period: usize,
    pub total_events: usize,
    pub wins: usize,
    pub losses: usize,
    /// Losses where the target was hit and then given back
    pub returned: usize,
    pub timeouts: usize,
    pub bull_events: usize,
    pub bear_events: usize,
    /// Percentage of wins, rounded to 2 decimals; 0 when there are no events
    pub win_rate: f64,
    pub avg_time_to_target: Option<f64>,
    pub median_time_to_target: Option<f64>,
    pub avg_adverse_pct: Option<f64>,
}

/// Fold the outcomes of one unit into its summary row.
pub fn aggregate(
    key: &SeriesKey,
    period: Period,
    ma_type: MaType,
    outcomes: &[Outcome],
) -> SummaryRow {
    let total_events = outcomes.len();
    let wins = outcomes.iter().filter(|o| o.success).count();
    let returned = count_reason(outcomes, OutcomeReason::ReturnedBeforeConfirmed);
    let timeouts = count_reason(outcomes, OutcomeReason::Timeout);
    let bull_events = outcomes.iter().filter(|o| o.event.side.is_bull()).count();

    let mut times: Vec<usize> = outcomes.iter().filter_map(|o| o.time_to_target).collect();
    times.sort_unstable();

    let adverse: Vec<f64> = outcomes.iter().map(|o| o.adverse_max_pct).collect();

    SummaryRow {
        symbol: key.symbol.clone(),
        timeframe: key.timeframe.clone(),
        ma_type,
        period: period.get(),
        total_events,
        wins,
        losses: total_events - wins,
        returned,
        timeouts,
        bull_events,
        bear_events: total_events - bull_events,
        win_rate: win_rate(wins, total_events),
        avg_time_to_target: mean(times.iter().map(|&t| t as f64)),
        median_time_to_target: median(&times),
        avg_adverse_pct: mean(adverse.iter().copied()),
    }
}

/// `100 * wins / total`, rounded to 2 decimals
pub fn win_rate(wins: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(100.0 * wins as f64 / total as f64)
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn count_reason(outcomes: &[Outcome], reason: OutcomeReason) -> usize {
    outcomes.iter().filter(|o| o.reason == reason).count()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Median of an already sorted slice
fn median(sorted: &[usize]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2] as f64),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0),
    }
}
