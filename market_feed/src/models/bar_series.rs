//! A collection of time-series bars for one instrument and timeframe.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{bar::Bar, timeframe::Timeframe};

/// An ordered, gap-tolerant sequence of [`Bar`]s for one (instrument,
/// timeframe) pair.
///
/// Freshly constructed series make no ordering promise; [`BarSeries::normalize`]
/// establishes the invariant consumers rely on: strictly ascending timestamps
/// with no duplicates (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    /// The instrument this data represents (e.g., "RB2510").
    pub instrument: String,
    /// The time interval of each bar in the series.
    pub timeframe: Timeframe,
    /// The bars themselves.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// Create a series from already-collected bars. No ordering is assumed.
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
            bars,
        }
    }

    /// An empty series.
    pub fn empty(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::new(instrument, timeframe, Vec::new())
    }

    /// Sort the bars ascending by timestamp and drop duplicate timestamps,
    /// keeping the bar that appeared last in insertion order.
    pub fn normalize(&mut self) {
        let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
        for bar in self.bars.drain(..) {
            by_ts.insert(bar.timestamp, bar);
        }
        self.bars = by_ts.into_values().collect();
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series holds no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices in series order.
    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(ts_min: u32, close: &str) -> Bar {
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 9, ts_min, 0).unwrap();
        let px: Decimal = close.parse().unwrap();
        Bar {
            timestamp: ts,
            open: px,
            high: px,
            low: px,
            close: px,
            volume: Decimal::from(100),
            open_interest: Decimal::from(1000),
        }
    }

    #[test]
    fn normalize_sorts_and_keeps_last_write() {
        let mut series = BarSeries::new(
            "RB2510",
            Timeframe::M1,
            vec![bar(32, "10.2"), bar(30, "10.0"), bar(32, "10.9")],
        );
        series.normalize();

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].timestamp.to_rfc3339(), "2025-03-10T09:30:00+00:00");
        // the second 09:32 write wins
        assert_eq!(series.bars[1].close, "10.9".parse::<Decimal>().unwrap());
    }

    #[test]
    fn closes_follow_series_order() {
        let mut series = BarSeries::new("RB2510", Timeframe::M1, vec![bar(31, "2"), bar(30, "1")]);
        series.normalize();
        let closes = series.closes();
        assert_eq!(closes, vec![Decimal::from(1), Decimal::from(2)]);
    }

    #[test]
    fn empty_series_reports_empty() {
        let series = BarSeries::empty("RB2510", Timeframe::M5);
        assert!(series.is_empty());
        assert!(series.closes().is_empty());
    }
}
