//! Trading-session windows.
//!
//! A [`SessionWindow`] is the active interval the scheduler runs over: the
//! day session (09:00–15:00 exchange time) of a trading date, or the night
//! session (21:00–23:00) held the evening before the next trading date. The
//! window is derived from the trading calendar plus fixed clock constants and
//! converted to UTC instants up front; all scheduling math happens in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::TradingCalendar;

/// Day-session open, exchange-local.
pub const DAY_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// Day-session close, exchange-local.
pub const DAY_CLOSE: NaiveTime = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
/// Night-session open, exchange-local.
pub const NIGHT_OPEN: NaiveTime = NaiveTime::from_hms_opt(21, 0, 0).unwrap();
/// Night-session close, exchange-local.
pub const NIGHT_CLOSE: NaiveTime = NaiveTime::from_hms_opt(23, 0, 0).unwrap();

/// Which session of the trading day a window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    /// The 09:00–15:00 day session.
    Day,
    /// The 21:00–23:00 night session, held the evening before its trading date.
    Night,
}

/// Errors in session-window resolution. All of these are fatal at setup: the
/// scheduler refuses to enter its running state without a valid window.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The current date is not a trading day, so there is no session to run.
    #[error("{0} is not a trading day")]
    NotTradingDay(NaiveDate),

    /// A local wall time could not be mapped to a UTC instant.
    #[error("cannot resolve local time {time} on {date} in {tz}")]
    UnresolvableLocalTime {
        /// Calendar date of the wall time.
        date: NaiveDate,
        /// The wall time that failed to resolve.
        time: NaiveTime,
        /// The exchange time zone.
        tz: Tz,
    },

    /// Open does not precede close.
    #[error("malformed session window: open {open} >= close {close}")]
    MalformedWindow {
        /// Window open (UTC).
        open: DateTime<Utc>,
        /// Window close (UTC).
        close: DateTime<Utc>,
    },
}

/// The active interval for one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    /// The trading date this session's bars belong to.
    pub trading_date: NaiveDate,
    /// Day or night session.
    pub kind: SessionKind,
    /// Session open (UTC).
    pub open: DateTime<Utc>,
    /// Session close (UTC).
    pub close: DateTime<Utc>,
}

/// Map an exchange-local wall time to UTC. Ambiguous times take the earliest
/// instant; nonexistent ones are errors.
fn local_to_utc(
    date: NaiveDate,
    time: NaiveTime,
    tz: Tz,
) -> Result<DateTime<Utc>, SessionError> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(SessionError::UnresolvableLocalTime { date, time, tz })
}

impl SessionWindow {
    /// Build a window from explicit parts, validating open < close.
    pub fn new(
        trading_date: NaiveDate,
        kind: SessionKind,
        open: DateTime<Utc>,
        close: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if open >= close {
            return Err(SessionError::MalformedWindow { open, close });
        }
        Ok(Self {
            trading_date,
            kind,
            open,
            close,
        })
    }

    /// Build the window for a session held on calendar date `held_on`.
    ///
    /// For the day session `held_on` is the trading date itself; for the
    /// night session it is the evening before `trading_date`.
    pub fn at(
        trading_date: NaiveDate,
        held_on: NaiveDate,
        kind: SessionKind,
        tz: Tz,
    ) -> Result<Self, SessionError> {
        let (open_time, close_time) = match kind {
            SessionKind::Day => (DAY_OPEN, DAY_CLOSE),
            SessionKind::Night => (NIGHT_OPEN, NIGHT_CLOSE),
        };
        Self::new(
            trading_date,
            kind,
            local_to_utc(held_on, open_time, tz)?,
            local_to_utc(held_on, close_time, tz)?,
        )
    }

    /// Resolve the session to run right now.
    ///
    /// Mirrors the realtime driver's rule: sessions only run on trading days;
    /// before the futures close the window is today's day session, after it
    /// the window is tonight's night session, whose bars belong to the next
    /// trading date.
    pub fn resolve(
        calendar: &dyn TradingCalendar,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Self, crate::errors::EngineError> {
        let local = now.with_timezone(&tz);
        let today = local.date_naive();
        if !calendar.is_trading_date(today)? {
            return Err(SessionError::NotTradingDay(today).into());
        }
        if local.time() > DAY_CLOSE {
            let next = calendar.next_trading_date(today, 1)?;
            Ok(Self::at(next, today, SessionKind::Night, tz)?)
        } else {
            Ok(Self::at(today, today, SessionKind::Day, tz)?)
        }
    }
}
