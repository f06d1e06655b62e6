//! Persistence seams for bars and signals.
//!
//! The engine never talks to a database directly: it goes through the
//! [`BarStore`] and [`SignalStore`] traits, whose contract is upsert-by-
//! natural-key plus (for bars) a timestamp-ranged ascending read. Every write
//! is keyed by identity, so concurrent writers converge last-write-wins.
//!
//! [`MemoryBarStore`] and [`MemorySignalStore`] are the in-process reference
//! implementations used by the drivers and tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use market_feed::models::{Bar, BarSeries, Timeframe};
use thiserror::Error;

use crate::signal::MaSignal;

/// Errors surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed a read or write.
    #[error("store backend error: {0}")]
    Backend(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Durable table of OHLCV bars keyed by (instrument, timeframe, timestamp).
pub trait BarStore: Send + Sync {
    /// Upsert every bar of the series under its natural key. Re-writing an
    /// existing key replaces the bar wholesale (last write wins).
    fn upsert(&self, series: &BarSeries) -> Result<(), StoreError>;

    /// Read bars for one (instrument, timeframe) with timestamps in
    /// `[start, end]`, ascending. The result may be empty.
    fn range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BarSeries, StoreError>;
}

/// Table holding exactly one [`MaSignal`] per (instrument, timeframe).
pub trait SignalStore: Send + Sync {
    /// Overwrite the signal for its (instrument, timeframe) identity.
    fn upsert(&self, signal: &MaSignal) -> Result<(), StoreError>;

    /// Read the current signal for an (instrument, timeframe), if any.
    fn get(&self, instrument: &str, timeframe: Timeframe) -> Result<Option<MaSignal>, StoreError>;
}

type BarKey = (String, Timeframe);

/// In-memory [`BarStore`] backed by nested ordered maps.
#[derive(Debug, Default)]
pub struct MemoryBarStore {
    inner: RwLock<BTreeMap<BarKey, BTreeMap<DateTime<Utc>, Bar>>>,
}

impl MemoryBarStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BarStore for MemoryBarStore {
    fn upsert(&self, series: &BarSeries) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let table = inner
            .entry((series.instrument.clone(), series.timeframe))
            .or_default();
        for bar in &series.bars {
            table.insert(bar.timestamp, *bar);
        }
        Ok(())
    }

    fn range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BarSeries, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let bars = inner
            .get(&(instrument.to_string(), timeframe))
            .map(|table| table.range(start..=end).map(|(_, bar)| *bar).collect())
            .unwrap_or_default();
        Ok(BarSeries::new(instrument, timeframe, bars))
    }
}

/// In-memory [`SignalStore`].
#[derive(Debug, Default)]
pub struct MemorySignalStore {
    inner: RwLock<BTreeMap<BarKey, MaSignal>>,
}

impl MemorySignalStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for MemorySignalStore {
    fn upsert(&self, signal: &MaSignal) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner.insert(
            (signal.instrument.clone(), signal.timeframe),
            signal.clone(),
        );
        Ok(())
    }

    fn get(&self, instrument: &str, timeframe: Timeframe) -> Result<Option<MaSignal>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.get(&(instrument.to_string(), timeframe)).cloned())
    }
}
