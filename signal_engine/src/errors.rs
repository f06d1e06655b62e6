//! Engine-level error type.
//!
//! Module-local errors ([`AggregateError`](crate::aggregate::AggregateError),
//! [`SessionError`](crate::session::SessionError), ...) stay close to the code
//! that produces them; this enum is the seam the scheduler and jobs layer see,
//! and it carries the fatal/transient split that drives their handling.

use thiserror::Error;

use crate::aggregate::AggregateError;
use crate::calendar::CalendarError;
use crate::session::SessionError;
use crate::store::StoreError;
use market_feed::feed::FeedError;

/// Anything that can go wrong while running signal jobs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Trading-calendar lookup failed. Fatal: without calendar answers no
    /// session or lookback window can be computed.
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// Session-window resolution failed. Fatal for the same reason.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A storage read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The market-data feed failed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Bar re-aggregation failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl EngineError {
    /// Whether the error invalidates the whole run rather than one unit of
    /// work. Fatal errors abort the session; transient ones are logged and
    /// the remaining instrument/timeframe units proceed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Calendar(_) | Self::Session(_))
    }
}
