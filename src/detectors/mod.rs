//! Touch detection against a moving average
//!
//! - **Wick touch**: classifies a single candle against one MA value.
//! - **Isolation**: keeps only touches with no other touch nearby.

pub mod isolation;
pub mod wick_touch;

pub use isolation::*;
pub use wick_touch::*;
