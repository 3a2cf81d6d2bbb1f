//! CSV candle files and CSV reports.
//!
//! Candle files carry a header with `open, high, low, close, volume` and a time column,
//! either `ts` / `timestamp` in epoch milliseconds or a `datetime` string. Files are named
//! `<exchange>_<BASE>_<QUOTE>_<timeframe>.csv`, which is where a series gets its symbol and
//! timeframe from.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::metrics::SummaryRow;
use crate::series::{Candle, CandleSeries};
use crate::{BounceError, Result};

// ============================================================
// CANDLE FILES
// ============================================================

#[derive(Debug, Deserialize)]
struct CandleRecord {
    #[serde(default)]
    ts: Option<i64>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    datetime: Option<String>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CandleRecord {
    fn into_candle(self, row: usize) -> Result<Candle> {
        let timestamp = match (self.ts.or(self.timestamp), self.datetime.as_deref()) {
            (Some(ms), _) => ms,
            (None, Some(text)) => parse_datetime_ms(text)
                .ok_or_else(|| BounceError::Data(format!("row {row}: bad datetime {text:?}")))?,
            (None, None) => {
                return Err(BounceError::Data(format!("row {row}: no time column")));
            }
        };
        Ok(Candle::new(
            timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ))
    }
}

/// Epoch milliseconds of an RFC 3339, `%Y-%m-%d %H:%M:%S%:z` or naive UTC datetime.
pub fn parse_datetime_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}

/// Read candles from CSV. Rows keep file order; validation happens in [`CandleSeries::new`].
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles = Vec::new();
    for (row, record) in rdr.deserialize::<CandleRecord>().enumerate() {
        candles.push(record?.into_candle(row)?);
    }
    Ok(candles)
}

/// Read candles from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let file = File::open(path.as_ref())?;
    read_candles(file)
}

/// Load a candle file as a series named after its file stem.
pub fn load_series(path: impl AsRef<Path>) -> Result<(DatasetName, CandleSeries)> {
    let path = path.as_ref();
    let name = DatasetName::from_path(path)?;
    let series = load_named(path, &name)?;
    Ok((name, series))
}

/// Load a candle file whose name has already been parsed.
pub fn load_named(path: impl AsRef<Path>, name: &DatasetName) -> Result<CandleSeries> {
    CandleSeries::new(name.symbol.clone(), name.timeframe.label(), load_csv(path)?)
}

// ============================================================
// DATASET NAMES
// ============================================================

/// Candle timeframe such as `15m` or `4h`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timeframe {
    label: String,
    seconds: u64,
}

impl Timeframe {
    const DAY: u64 = 86_400;

    /// Parse `<count><unit>` with unit `m`, `h`, `d` or `w`.
    pub fn parse(label: &str) -> Result<Self> {
        let bad = || BounceError::InvalidDatasetName(format!("bad timeframe {label:?}"));

        let split = label.find(|c: char| !c.is_ascii_digit()).ok_or_else(bad)?;
        let (count, unit) = label.split_at(split);
        let count: u64 = count.parse().map_err(|_| bad())?;
        if count == 0 {
            return Err(bad());
        }
        let unit_seconds = match unit {
            "m" => 60,
            "h" => 3_600,
            "d" => Self::DAY,
            "w" => 7 * Self::DAY,
            _ => return Err(bad()),
        };

        Ok(Self {
            label: label.to_string(),
            seconds: count.checked_mul(unit_seconds).ok_or_else(bad)?,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// One day or longer
    pub fn is_daily(&self) -> bool {
        self.seconds >= Self::DAY
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Parts of a `<exchange>_<BASE>_<QUOTE>_<timeframe>` file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetName {
    pub exchange: String,
    /// `BASE/QUOTE`
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl DatasetName {
    pub fn parse(stem: &str) -> Result<Self> {
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(BounceError::InvalidDatasetName(stem.to_string()));
        }
        let (exchange, rest) = (parts[0], &parts[1..]);
        let (timeframe, pair) = rest.split_last().ok_or_else(|| {
            BounceError::InvalidDatasetName(stem.to_string())
        })?;

        Ok(Self {
            exchange: exchange.to_string(),
            symbol: pair.join("/"),
            timeframe: Timeframe::parse(timeframe)?,
        })
    }

    /// Parse the file stem of `path`. The file is not opened.
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BounceError::InvalidDatasetName(path.display().to_string()))?;
        Self::parse(stem)
    }
}

// ============================================================
// REPORTS
// ============================================================

/// Write summary rows as CSV with a header.
pub fn write_report<'a, W: Write>(
    writer: W,
    rows: impl IntoIterator<Item = &'a SummaryRow>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_ts_column() {
        let csv = "ts,open,high,low,close,volume\n\
                   1000,1.0,2.0,0.5,1.5,10\n\
                   2000,1.5,2.5,1.0,2.0,12\n";
        let candles = read_candles(csv.as_bytes()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0], Candle::new(1000, 1.0, 2.0, 0.5, 1.5, 10.0));
        assert_eq!(candles[1].timestamp, 2000);
    }

    #[test]
    fn test_read_datetime_column() {
        let csv = "datetime,open,high,low,close,volume\n\
                   2024-01-01 00:00:00+00:00,1,2,0.5,1.5,10\n\
                   2024-01-01T00:15:00Z,1,2,0.5,1.5,10\n\
                   2024-01-01 00:30:00,1,2,0.5,1.5,10\n";
        let candles = read_candles(csv.as_bytes()).unwrap();
        let base = 1_704_067_200_000;
        assert_eq!(candles[0].timestamp, base);
        assert_eq!(candles[1].timestamp, base + 900_000);
        assert_eq!(candles[2].timestamp, base + 1_800_000);
    }

    #[test]
    fn test_ts_wins_over_datetime_and_extra_columns_ignored() {
        let csv = "datetime,ts,open,high,low,close,volume,trades\n\
                   2024-01-01 00:00:00+00:00,5,1,2,0.5,1.5,10,99\n";
        let candles = read_candles(csv.as_bytes()).unwrap();
        assert_eq!(candles[0].timestamp, 5);
    }

    #[test]
    fn test_read_errors() {
        let no_time = "open,high,low,close,volume\n1,2,0.5,1.5,10\n";
        assert!(matches!(read_candles(no_time.as_bytes()), Err(BounceError::Data(_))));

        let bad_price = "ts,open,high,low,close,volume\n1,x,2,0.5,1.5,10\n";
        assert!(read_candles(bad_price.as_bytes()).is_err());

        let bad_time = "datetime,open,high,low,close,volume\nyesterday,1,2,0.5,1.5,10\n";
        assert!(read_candles(bad_time.as_bytes()).is_err());
    }

    #[test]
    fn test_timeframe_parse() {
        let tf = Timeframe::parse("15m").unwrap();
        assert_eq!(tf.seconds(), 900);
        assert!(!tf.is_daily());
        assert!(Timeframe::parse("4h").is_ok());
        assert!(Timeframe::parse("1d").unwrap().is_daily());
        assert!(Timeframe::parse("1w").unwrap().is_daily());
        assert!(Timeframe::parse("0m").is_err());
        assert!(Timeframe::parse("m").is_err());
        assert!(Timeframe::parse("15").is_err());
        assert!(Timeframe::parse("15s").is_err());
    }

    #[test]
    fn test_dataset_name() {
        let name = DatasetName::parse("binance_BTC_USDT_15m").unwrap();
        assert_eq!(name.exchange, "binance");
        assert_eq!(name.symbol, "BTC/USDT");
        assert_eq!(name.timeframe.label(), "15m");

        let long = DatasetName::parse("okx_BTC_USDT_SWAP_1h").unwrap();
        assert_eq!(long.symbol, "BTC/USDT/SWAP");

        assert!(DatasetName::parse("binance_BTCUSDT_15m").is_err());
        assert!(DatasetName::parse("binance__USDT_15m").is_err());
        assert!(DatasetName::parse("binance_BTC_USDT_fast").is_err());
    }

    #[test]
    fn test_write_report() {
        use crate::indicators::MaType;
        use crate::series::SeriesKey;
        use crate::Period;

        let row = crate::metrics::aggregate(
            &SeriesKey::new("ETH/USDT", "1h"),
            Period::new(21).unwrap(),
            MaType::Ema,
            &[],
        );
        let mut out = Vec::new();
        write_report(&mut out, [&row]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "symbol,timeframe,ma_type,period,total_events,wins,losses,returned,timeouts,\
             bull_events,bear_events,win_rate,avg_time_to_target,median_time_to_target,avg_adverse_pct"
        );
        assert_eq!(lines.next().unwrap(), "ETH/USDT,1h,EMA,21,0,0,0,0,0,0,0,0.0,,,");
    }
}
