//! Vendor-agnostic market data model and feed abstraction.
//!
//! This crate defines the canonical in-memory types for OHLCV bars
//! ([`models::bar::Bar`], [`models::bar_series::BarSeries`]), the fixed set of
//! timeframes the engine works with ([`models::timeframe::Timeframe`]), and the
//! [`feed::MarketDataFeed`] trait for pulling the currently-forming minute bar
//! from whatever vendor sits behind it.

pub mod feed;
pub mod models;
