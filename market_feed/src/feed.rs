//! Feed abstraction for live market data.
//!
//! This module defines the [`MarketDataFeed`] trait, the narrow interface the
//! signal engine's scheduler uses to pull the currently-forming minute bar for
//! a set of instruments. Vendor specifics (HTTP, auth, rate limits) live
//! behind implementations of this trait and are out of scope here.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn MarketDataFeed`) so the scheduler can be wired against any vendor at
//! runtime.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::bar_series::BarSeries;

/// Errors surfaced by a [`MarketDataFeed`] implementation.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The vendor rejected or failed the request.
    #[error("vendor error: {0}")]
    Vendor(String),

    /// A transport-level I/O failure.
    #[error("feed I/O error")]
    Io(#[from] std::io::Error),
}

/// Trait for pulling the live, possibly partial, current-minute bar.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Fetch the currently-forming 1-minute bar for each requested instrument.
    ///
    /// Returns one series per instrument that has data; instruments with no
    /// current bar are simply absent from the result. Returned bars may be
    /// partial and will be superseded by later pulls for the same minute.
    async fn latest_minute(&self, instruments: &[String]) -> Result<Vec<BarSeries>, FeedError>;
}

/// A feed that always reports no data.
///
/// Useful in tests and as a stand-in when running the session driver without
/// a live vendor connection.
#[derive(Debug, Default)]
pub struct NullFeed;

#[async_trait]
impl MarketDataFeed for NullFeed {
    async fn latest_minute(&self, _instruments: &[String]) -> Result<Vec<BarSeries>, FeedError> {
        Ok(Vec::new())
    }
}
