//! Canonical in-memory representation of a time-series bar (OHLCV + open interest).
//!
//! This struct is the standard unit exchanged between feeds, the bar store,
//! the aggregator, and the signal engine, regardless of vendor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one interval.
///
/// The instrument and timeframe live on the enclosing
/// [`BarSeries`](crate::models::bar_series::BarSeries); within a series a bar
/// is identified by its timestamp. Bars are immutable once their period has
/// closed; the still-forming current bar is replaced wholesale on upsert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: Decimal,

    /// Highest price during the interval.
    pub high: Decimal,

    /// Lowest price during the interval.
    pub low: Decimal,

    /// Closing price.
    pub close: Decimal,

    /// Volume traded during the interval.
    pub volume: Decimal,

    /// Open interest at the end of the interval.
    pub open_interest: Decimal,
}
