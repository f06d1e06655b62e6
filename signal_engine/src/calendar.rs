//! Trading-calendar seam.
//!
//! The source of truth for trading days lives outside the engine; this module
//! defines the lookup contract the drivers depend on and a sorted-list
//! implementation for wiring it in-process. Offset lookups that walk off the
//! known range are errors — a run without a resolved date has nothing safe to
//! do and aborts.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors from calendar resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    /// An offset lookup left the known calendar range.
    #[error("no trading date at offset {offset} from {date}")]
    OutOfRange {
        /// The anchor date of the lookup.
        date: NaiveDate,
        /// The requested offset in trading days (negative = backwards).
        offset: i64,
    },

    /// The calendar holds no trading dates at all.
    #[error("trading calendar is empty")]
    Empty,
}

/// Date lookups against the trading calendar.
pub trait TradingCalendar: Send + Sync {
    /// Trading dates in `[start, end]`, ascending.
    fn trading_dates_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, CalendarError>;

    /// The `n`-th trading date strictly before `date`.
    fn previous_trading_date(&self, date: NaiveDate, n: u32) -> Result<NaiveDate, CalendarError>;

    /// The `n`-th trading date strictly after `date`.
    fn next_trading_date(&self, date: NaiveDate, n: u32) -> Result<NaiveDate, CalendarError>;

    /// The most recent known trading date.
    fn latest_trading_date(&self) -> Result<NaiveDate, CalendarError>;

    /// Whether `date` itself is a trading day.
    fn is_trading_date(&self, date: NaiveDate) -> Result<bool, CalendarError> {
        Ok(self.trading_dates_between(date, date)?.first() == Some(&date))
    }
}

/// A [`TradingCalendar`] over an explicit, finite set of dates.
#[derive(Debug, Clone)]
pub struct FixedCalendar {
    dates: Vec<NaiveDate>,
}

impl FixedCalendar {
    /// Build from any collection of dates; they are sorted and deduplicated.
    pub fn new(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }
}

impl TradingCalendar for FixedCalendar {
    fn trading_dates_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        Ok(self
            .dates
            .iter()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect())
    }

    fn previous_trading_date(&self, date: NaiveDate, n: u32) -> Result<NaiveDate, CalendarError> {
        let err = || CalendarError::OutOfRange {
            date,
            offset: -i64::from(n),
        };
        // Index of the last trading date strictly before `date`.
        let before = match self.dates.binary_search(&date) {
            Ok(0) | Err(0) => return Err(err()),
            Ok(i) | Err(i) => i - 1,
        };
        let steps = (n.max(1) - 1) as usize;
        before.checked_sub(steps).map(|i| self.dates[i]).ok_or_else(err)
    }

    fn next_trading_date(&self, date: NaiveDate, n: u32) -> Result<NaiveDate, CalendarError> {
        let err = || CalendarError::OutOfRange {
            date,
            offset: i64::from(n),
        };
        // Index of the first trading date strictly after `date`.
        let after = match self.dates.binary_search(&date) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        let idx = after + (n.max(1) - 1) as usize;
        self.dates.get(idx).copied().ok_or_else(err)
    }

    fn latest_trading_date(&self) -> Result<NaiveDate, CalendarError> {
        self.dates.last().copied().ok_or(CalendarError::Empty)
    }

    fn is_trading_date(&self, date: NaiveDate) -> Result<bool, CalendarError> {
        Ok(self.dates.binary_search(&date).is_ok())
    }
}
