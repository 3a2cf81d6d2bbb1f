//! Indicators computed over a whole candle series
//!
//! - **Moving averages**: simple (SMA) and exponential (EMA), aligned 1:1 with the input bars.

pub mod moving_average;

pub use moving_average::*;
