//! Simple and exponential moving averages over closing prices.
//!
//! Both are built in a single pass. The SMA keeps a compensated running sum of the
//! current window and evicts the oldest close each step, so cost stays O(n) per period
//! regardless of the period length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BounceError, Period, OHLCV};

/// Moving-average flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaType {
    Sma,
    Ema,
}

impl MaType {
    pub const ALL: [MaType; 2] = [MaType::Sma, MaType::Ema];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            MaType::Sma => "SMA",
            MaType::Ema => "EMA",
        }
    }
}

impl fmt::Display for MaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaType {
    type Err = BounceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("sma") {
            Ok(MaType::Sma)
        } else if s.eq_ignore_ascii_case("ema") {
            Ok(MaType::Ema)
        } else {
            Err(BounceError::InvalidValue("MA type must be SMA or EMA"))
        }
    }
}

/// Neumaier-compensated running sum. Adding then removing the same value
/// leaves almost no residue, which keeps long SMA runs close to a fresh sum.
#[derive(Debug, Default, Clone, Copy)]
struct RunningSum {
    sum: f64,
    compensation: f64,
}

impl RunningSum {
    #[inline]
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline]
    fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Moving-average values aligned by index with the bars they were computed from.
///
/// Undefined entries (SMA warm-up) are stored as NaN and surface as `None` through [`get`].
///
/// [`get`]: MovingAverageSeries::get
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageSeries {
    period: Period,
    ma_type: MaType,
    values: Vec<f64>,
}

impl MovingAverageSeries {
    /// Compute the moving average of `bars` closes.
    pub fn compute<T: OHLCV>(bars: &[T], period: Period, ma_type: MaType) -> Self {
        match ma_type {
            MaType::Sma => Self::sma(bars, period),
            MaType::Ema => Self::ema(bars, period),
        }
    }

    /// Simple moving average. The first `period - 1` entries are undefined.
    pub fn sma<T: OHLCV>(bars: &[T], period: Period) -> Self {
        let p = period.get();
        let mut values = vec![f64::NAN; bars.len()];
        let mut window = RunningSum::default();

        for (i, bar) in bars.iter().enumerate() {
            window.add(bar.close());
            if i >= p {
                window.add(-bars[i - p].close());
            }
            if i + 1 >= p {
                values[i] = window.value() / p as f64;
            }
        }

        Self {
            period,
            ma_type: MaType::Sma,
            values,
        }
    }

    /// Exponential moving average seeded with the first close, `alpha = 2 / (period + 1)`.
    pub fn ema<T: OHLCV>(bars: &[T], period: Period) -> Self {
        let alpha = 2.0 / (period.get() as f64 + 1.0);
        let mut values = Vec::with_capacity(bars.len());
        let mut prev: Option<f64> = None;

        for bar in bars {
            let close = bar.close();
            let ema = match prev {
                None => close,
                Some(e) => alpha * close + (1.0 - alpha) * e,
            };
            values.push(ema);
            prev = Some(ema);
        }

        Self {
            period,
            ma_type: MaType::Ema,
            values,
        }
    }

    #[inline]
    pub fn period(&self) -> Period {
        self.period
    }

    #[inline]
    pub fn ma_type(&self) -> MaType {
        self.ma_type
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, or `None` when undefined or out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().filter(|v| !v.is_nan())
    }

    /// Index of the first defined value
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_nan())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values.iter().map(|&v| (!v.is_nan()).then_some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Candle;

    fn closes(values: &[f64]) -> Vec<Candle> {
        values
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64, c, c, c, c, 1.0))
            .collect()
    }

    fn naive_sma(values: &[f64], p: usize, i: usize) -> f64 {
        values[i + 1 - p..=i].iter().sum::<f64>() / p as f64
    }

    #[test]
    fn test_sma_warmup_and_values() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ma = MovingAverageSeries::sma(&closes(&data), Period::new(3).unwrap());

        assert_eq!(ma.len(), 6);
        assert_eq!(ma.get(0), None);
        assert_eq!(ma.get(1), None);
        assert_eq!(ma.get(2), Some(2.0));
        assert_eq!(ma.get(5), Some(5.0));
        assert_eq!(ma.first_defined(), Some(2));
    }

    #[test]
    fn test_sma_matches_naive_window() {
        let data: Vec<f64> = (0..500)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 7.0 + i as f64 * 0.01)
            .collect();
        let bars = closes(&data);

        for p in [1usize, 2, 7, 20, 99] {
            let ma = MovingAverageSeries::sma(&bars, Period::new(p).unwrap());
            for i in 0..data.len() {
                match ma.get(i) {
                    None => assert!(i + 1 < p),
                    Some(v) => assert!((v - naive_sma(&data, p, i)).abs() < 1e-9, "p={p} i={i}"),
                }
            }
        }
    }

    #[test]
    fn test_sma_period_longer_than_series() {
        let ma = MovingAverageSeries::sma(&closes(&[1.0, 2.0]), Period::new(5).unwrap());
        assert_eq!(ma.len(), 2);
        assert_eq!(ma.first_defined(), None);
        assert!(ma.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_ema_seed_and_recursion() {
        let data = [10.0, 11.0, 12.0];
        let ma = MovingAverageSeries::ema(&closes(&data), Period::new(3).unwrap());

        // alpha = 0.5
        assert_eq!(ma.get(0), Some(10.0));
        assert_eq!(ma.get(1), Some(10.5));
        assert_eq!(ma.get(2), Some(11.25));
    }

    #[test]
    fn test_ema_defined_everywhere() {
        let data: Vec<f64> = (0..50).map(|i| 20.0 + i as f64).collect();
        for p in [1usize, 5, 200] {
            let ma = MovingAverageSeries::compute(&closes(&data), Period::new(p).unwrap(), MaType::Ema);
            assert_eq!(ma.get(0), Some(20.0));
            assert!(ma.iter().all(|v| v.is_some()));
            assert_eq!(ma.ma_type(), MaType::Ema);
            assert_eq!(ma.period().get(), p);
        }
    }

    #[test]
    fn test_compute_is_bit_identical() {
        let data: Vec<f64> = (0..300).map(|i| 1.0 + (i as f64).sqrt()).collect();
        let bars = closes(&data);
        for t in MaType::ALL {
            let a = MovingAverageSeries::compute(&bars, Period::new(13).unwrap(), t);
            let b = MovingAverageSeries::compute(&bars, Period::new(13).unwrap(), t);
            let bits = |m: &MovingAverageSeries| m.values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&a), bits(&b));
        }
    }

    #[test]
    fn test_ma_type_parse() {
        assert_eq!("sma".parse::<MaType>().unwrap(), MaType::Sma);
        assert_eq!("EMA".parse::<MaType>().unwrap(), MaType::Ema);
        assert!("WMA".parse::<MaType>().is_err());
        assert_eq!(MaType::Ema.to_string(), "EMA");
    }
}
