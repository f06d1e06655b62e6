//! Multi-timeframe bar aggregation and moving-average trend signals.
//!
//! The crate ingests per-minute OHLCV bars, derives 3m/5m/15m bars from them,
//! classifies a BUY/SELL/UNKNOWN regime per instrument and timeframe from
//! simple moving averages, and persists the resulting signal state. A
//! session-aware scheduler drives the whole pipeline through a trading day
//! (day session and, for some instruments, a night session); a batch driver
//! replays the same pipeline over historical trading dates.
//!
//! Storage, trading-calendar lookup, and the market-data vendor are external
//! collaborators reached through the narrow seams in [`store`], [`calendar`],
//! and [`market_feed::feed`].

#![deny(missing_docs)]

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod scheduler;
pub mod series;
pub mod session;
pub mod signal;
pub mod store;
