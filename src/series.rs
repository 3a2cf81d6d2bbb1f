//! Candle records and the immutable series they form

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BounceError, OHLCVExt, Result, OHLCV};

/// One OHLCV record. `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Candle {
    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Instrument and timeframe a series belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: String,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

/// Ordered candles for one instrument and timeframe.
///
/// Immutable once built. Timestamps strictly increase; gaps are allowed and every
/// downstream computation works on indices, not on time distance.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    key: SeriesKey,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, checking every candle and the timestamp order.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        candles: Vec<Candle>,
    ) -> Result<Self> {
        for (index, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|e| match e {
                BounceError::InvalidCandle { reason, .. } => {
                    BounceError::InvalidCandle { index, reason }
                }
                other => other,
            })?;
        }

        if let Some(pos) = candles
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(BounceError::InvalidCandle {
                index: pos + 1,
                reason: "timestamp does not increase",
            });
        }

        Ok(Self {
            key: SeriesKey::new(symbol, timeframe),
            candles,
        })
    }

    #[inline]
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn symbol(&self) -> &str {
        &self.key.symbol
    }

    pub fn timeframe(&self) -> &str {
        &self.key.timeframe
    }

    #[inline]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

impl AsRef<[Candle]> for CandleSeries {
    fn as_ref(&self) -> &[Candle] {
        &self.candles
    }
}
