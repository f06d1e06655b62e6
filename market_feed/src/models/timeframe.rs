//! The fixed set of bar intervals the engine produces and evaluates.
//!
//! Unlike an open amount×unit pair, this is a closed enum: the system only
//! ever deals in 1/3/5/15-minute bars and daily bars, and the derived
//! timeframes (3m/5m/15m) are built exclusively from 1-minute input.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A bar interval. Ordered by width, daily last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// One minute.
    #[serde(rename = "1m")]
    M1,
    /// Three minutes, derived from 1m.
    #[serde(rename = "3m")]
    M3,
    /// Five minutes, derived from 1m.
    #[serde(rename = "5m")]
    M5,
    /// Fifteen minutes, derived from 1m.
    #[serde(rename = "15m")]
    M15,
    /// One trading day, ingested as an already-complete series.
    #[serde(rename = "1d")]
    D1,
}

/// Error returned when parsing an unknown timeframe token.
#[derive(Debug, Error)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(String);

impl Timeframe {
    /// Minute width of the interval, `None` for the daily timeframe.
    pub const fn minutes(self) -> Option<u32> {
        match self {
            Timeframe::M1 => Some(1),
            Timeframe::M3 => Some(3),
            Timeframe::M5 => Some(5),
            Timeframe::M15 => Some(15),
            Timeframe::D1 => None,
        }
    }

    /// Whether this is a sub-daily timeframe.
    pub const fn is_intraday(self) -> bool {
        !matches!(self, Timeframe::D1)
    }

    /// Canonical lowercase token (`"1m"`, `"3m"`, `"5m"`, `"15m"`, `"1d"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::D1 => "1d",
        }
    }

    /// All five timeframes, intraday first.
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::D1,
    ];

    /// Timeframes derived from 1-minute bars by aggregation.
    pub const DERIVED: [Timeframe; 3] = [Timeframe::M3, Timeframe::M5, Timeframe::M15];
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1d" => Ok(Timeframe::D1),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn unknown_token_is_an_error() {
        assert!("2m".parse::<Timeframe>().is_err());
        assert!("".parse::<Timeframe>().is_err());
    }

    #[test]
    fn ordered_by_width_daily_last() {
        // Composite map keys rely on this total order.
        let mut shuffled = vec![Timeframe::D1, Timeframe::M5, Timeframe::M1, Timeframe::M15];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Timeframe::M1, Timeframe::M5, Timeframe::M15, Timeframe::D1]
        );
    }

    #[test]
    fn minute_widths() {
        assert_eq!(Timeframe::M15.minutes(), Some(15));
        assert_eq!(Timeframe::D1.minutes(), None);
        assert!(Timeframe::M1.is_intraday());
        assert!(!Timeframe::D1.is_intraday());
    }

    #[test]
    fn serde_uses_display_token() {
        let json = serde_json::to_string(&Timeframe::M15).unwrap();
        assert_eq!(json, "\"15m\"");
        let back: Timeframe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Timeframe::M15);
    }
}
