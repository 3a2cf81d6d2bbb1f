//! Wick-only touches of a moving average.
//!
//! A candle qualifies when the MA lies inside its high-low range but outside its
//! open-close body, and the touching wick is long enough relative to the whole range.
//! The side says which way the bounce is expected to go: MA under the body is a bull
//! touch, MA over the body is a bear touch.

use serde::{Deserialize, Serialize};

use super::isolation::TouchFlags;
use crate::indicators::MovingAverageSeries;
use crate::{OHLCVExt, Ratio, OHLCV};

/// Direction of the expected bounce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Wick dipped down to the MA; bounce expected upward
    Bull,
    /// Wick reached up to the MA; bounce expected downward
    Bear,
}

impl Side {
    #[inline]
    pub fn is_bull(self) -> bool {
        matches!(self, Side::Bull)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Bull => "bull",
            Side::Bear => "bear",
        }
    }
}

/// A qualifying touch at a bar index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchEvent {
    pub index: usize,
    pub side: Side,
}

/// What the wick-length threshold is measured against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WickMeasure {
    /// Distance from the body edge to the MA
    #[default]
    Penetration,
    /// Full shadow on the touching side, from the body edge to the extreme
    Shadow,
}

/// Classify one candle against one MA value using the penetration measure.
///
/// Returns the touch side, or `None` when the MA is undefined, misses the candle,
/// sits inside the body, the candle has no range, or the wick is shorter than
/// `alpha_wick * (high - low)`. The threshold is inclusive.
#[inline]
pub fn classify<T: OHLCV>(candle: &T, ma_value: Option<f64>, alpha_wick: f64) -> Option<Side> {
    classify_with(candle, ma_value, alpha_wick, WickMeasure::Penetration)
}

/// [`classify`] with an explicit [`WickMeasure`].
#[inline]
pub fn classify_with<T: OHLCV>(
    candle: &T,
    ma_value: Option<f64>,
    alpha_wick: f64,
    measure: WickMeasure,
) -> Option<Side> {
    let ma = ma_value.filter(|v| v.is_finite())?;
    let (high, low) = (candle.high(), candle.low());

    if candle.is_degenerate() || ma < low || ma > high {
        return None;
    }

    let body_low = candle.body_low();
    let body_high = candle.body_high();

    let (side, wick) = if ma > body_high {
        let wick = match measure {
            WickMeasure::Penetration => ma - body_high,
            WickMeasure::Shadow => high - body_high,
        };
        (Side::Bear, wick)
    } else if ma < body_low {
        let wick = match measure {
            WickMeasure::Penetration => body_low - ma,
            WickMeasure::Shadow => body_low - low,
        };
        (Side::Bull, wick)
    } else {
        // body touch
        return None;
    };

    if wick < alpha_wick * (high - low) {
        return None;
    }
    Some(side)
}

/// Wick touch detector bound to a threshold and measure
#[derive(Debug, Clone, Copy)]
pub struct WickTouchDetector {
    pub alpha_wick: Ratio,
    pub measure: WickMeasure,
}

impl Default for WickTouchDetector {
    fn default() -> Self {
        Self {
            alpha_wick: Ratio::new_const(0.30),
            measure: WickMeasure::Penetration,
        }
    }
}

impl WickTouchDetector {
    pub fn new(alpha_wick: Ratio) -> Self {
        Self {
            alpha_wick,
            measure: WickMeasure::Penetration,
        }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn with_measure(mut self, measure: WickMeasure) -> Self {
        self.measure = measure;
        self
    }

    #[inline]
    pub fn classify<T: OHLCV>(&self, candle: &T, ma_value: Option<f64>) -> Option<Side> {
        classify_with(candle, ma_value, self.alpha_wick.get(), self.measure)
    }

    /// Detect a touch at `index` against an aligned MA series.
    #[inline]
    pub fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        ma: &MovingAverageSeries,
        index: usize,
    ) -> Option<TouchEvent> {
        let bar = bars.get(index)?;
        let side = self.classify(bar, ma.get(index))?;
        Some(TouchEvent { index, side })
    }

    /// Classify every bar once.
    pub fn touch_flags<T: OHLCV>(&self, bars: &[T], ma: &MovingAverageSeries) -> TouchFlags {
        TouchFlags::from_sides(
            bars.iter()
                .enumerate()
                .map(|(i, bar)| self.classify(bar, ma.get(i)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(0, o, h, l, c, 1000.0)
    }

    #[test]
    fn test_ma_outside_candle() {
        let b = bar(100.0, 102.0, 99.0, 101.0);
        assert_eq!(classify(&b, Some(110.0), 0.3), None);
        assert_eq!(classify(&b, Some(98.9), 0.3), None);
    }

    #[test]
    fn test_ma_inside_body() {
        let b = bar(100.0, 102.0, 99.0, 101.0);
        assert_eq!(classify(&b, Some(100.5), 0.3), None);
        // body edges count as body
        assert_eq!(classify(&b, Some(100.0), 0.01), None);
        assert_eq!(classify(&b, Some(101.0), 0.01), None);
    }

    #[test]
    fn test_undefined_ma() {
        let b = bar(98.0, 99.0, 96.0, 99.0);
        assert_eq!(classify(&b, None, 0.3), None);
        assert_eq!(classify(&b, Some(f64::NAN), 0.3), None);
    }

    #[test]
    fn test_bull_touch() {
        // body [98, 99], low 96, range 3, threshold 0.9
        let b = bar(98.0, 99.0, 96.0, 99.0);
        assert_eq!(classify(&b, Some(96.5), 0.3), Some(Side::Bull));
        // penetration 0.5 < 0.9
        assert_eq!(classify(&b, Some(97.5), 0.3), None);
    }

    #[test]
    fn test_bear_touch() {
        // body [100, 101], high 104, range 5, threshold 1.5
        let b = bar(101.0, 104.0, 99.0, 100.0);
        assert_eq!(classify(&b, Some(103.0), 0.3), Some(Side::Bear));
        assert_eq!(classify(&b, Some(102.0), 0.3), None);
    }

    #[test]
    fn test_shadow_measure() {
        // body [98, 99], low 96: shadow 2.0 >= 0.9 even though penetration is only 0.5
        let b = bar(98.0, 99.0, 96.0, 99.0);
        assert_eq!(
            classify_with(&b, Some(97.5), 0.3, WickMeasure::Shadow),
            Some(Side::Bull)
        );
        let detector = WickTouchDetector::with_defaults().with_measure(WickMeasure::Shadow);
        assert_eq!(detector.classify(&b, Some(97.5)), Some(Side::Bull));
    }

    #[test]
    fn test_degenerate_candle_never_touches() {
        let flat = bar(100.0, 100.0, 100.0, 100.0);
        for ma in [99.0, 100.0, 101.0] {
            for alpha in [0.01, 0.5, 1.0] {
                assert_eq!(classify(&flat, Some(ma), alpha), None);
                assert_eq!(classify_with(&flat, Some(ma), alpha, WickMeasure::Shadow), None);
            }
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // body at 10, range [8, 12], alpha 0.5: threshold exactly 2.0
        let b = bar(10.0, 12.0, 8.0, 10.0);
        assert_eq!(classify(&b, Some(8.0), 0.5), Some(Side::Bull));
        assert_eq!(classify(&b, Some(12.0), 0.5), Some(Side::Bear));

        // one ulp less penetration
        let just_above_low = f64::from_bits(8.0f64.to_bits() + 1);
        assert_eq!(classify(&b, Some(just_above_low), 0.5), None);

        // one ulp larger alpha
        let alpha_up = f64::from_bits(0.5f64.to_bits() + 1);
        assert_eq!(classify(&b, Some(8.0), alpha_up), None);
    }

    #[test]
    fn test_detect_uses_aligned_ma() {
        use crate::indicators::MaType;
        use crate::Period;

        let bars = vec![
            Candle::new(0, 10.0, 10.0, 10.0, 10.0, 1.0),
            Candle::new(1, 10.0, 10.0, 10.0, 10.0, 1.0),
            // sma(3) at index 2 = (10 + 10 + 11) / 3 = 10.333...
            Candle::new(2, 11.0, 11.2, 10.0, 11.0, 1.0),
        ];
        let ma = MovingAverageSeries::compute(&bars, Period::new(3).unwrap(), MaType::Sma);
        let detector = WickTouchDetector::with_defaults();

        assert_eq!(detector.detect(&bars, &ma, 0), None);
        assert_eq!(
            detector.detect(&bars, &ma, 2),
            Some(TouchEvent {
                index: 2,
                side: Side::Bull
            })
        );
        assert_eq!(detector.detect(&bars, &ma, 3), None);
    }
}
