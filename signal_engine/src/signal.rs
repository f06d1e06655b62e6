//! Moving-average trend classification.
//!
//! One algorithm, parametrized by the timeframe's window set, replaces the
//! five near-identical per-timeframe strategy bodies the system grew out of.
//! Intraday timeframes track MA5/MA20 plus auxiliary MA60/MA120/MA250; the
//! daily timeframe tracks MA5/MA20/MA60 only and reports the deeper
//! auxiliaries as not applicable.

use chrono::{DateTime, Utc};
use market_feed::models::{BarSeries, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::series::rolling_mean_at;

/// Trend regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Short average above long with upward confirmation.
    #[serde(rename = "BUY")]
    Buy,
    /// Short average below long with downward confirmation.
    #[serde(rename = "SELL")]
    Sell,
    /// Neither regime confirmed.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Transaction {
    /// Persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Transaction::Buy => "BUY",
            Transaction::Sell => "SELL",
            Transaction::Unknown => "UNKNOWN",
        }
    }
}

/// Per-average slope flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rising {
    /// The average moved in the direction of the classified transaction.
    #[serde(rename = "Y")]
    Yes,
    /// It did not (or the transaction is UNKNOWN).
    #[serde(rename = "N")]
    No,
    /// The average is not tracked for this timeframe.
    #[serde(rename = "X")]
    NotApplicable,
}

impl Rising {
    /// Persisted string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Rising::Yes => "Y",
            Rising::No => "N",
            Rising::NotApplicable => "X",
        }
    }
}

/// The per-(instrument, timeframe) trend signal record.
///
/// Exactly one signal exists per identity; recomputation overwrites it in
/// place, it is never versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaSignal {
    /// Instrument code.
    pub instrument: String,
    /// Timeframe the signal was computed on.
    pub timeframe: Timeframe,
    /// Classified regime.
    pub transaction: Transaction,
    /// Slope flag for the short average (MA5).
    pub short_ma_rising: Rising,
    /// Slope flag for the long average (MA20).
    pub long_ma_rising: Rising,
    /// Slope flag for MA60.
    pub ma60_rising: Rising,
    /// Slope flag for MA120 (intraday only).
    pub ma120_rising: Rising,
    /// Slope flag for MA250 (intraday only).
    pub ma250_rising: Rising,
    /// When this signal was computed.
    pub updated_at: DateTime<Utc>,
}

/// Moving-average windows evaluated for a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSet {
    /// Short average window (5).
    pub short: usize,
    /// Long average window (20).
    pub long: usize,
    /// First auxiliary window (60), tracked on every timeframe.
    pub ma60: usize,
    /// Deeper auxiliary windows (120, 250); `None` on the daily timeframe.
    pub aux: Option<(usize, usize)>,
}

impl WindowSet {
    /// The window set for a timeframe.
    pub const fn for_timeframe(tf: Timeframe) -> Self {
        WindowSet {
            short: 5,
            long: 20,
            ma60: 60,
            aux: if tf.is_intraday() { Some((120, 250)) } else { None },
        }
    }
}

/// Values of one tracked average at the last two bars.
#[derive(Debug, Clone, Copy)]
struct Pair {
    latest: Decimal,
    before_last: Decimal,
}

impl Pair {
    fn read(closes: &[Decimal], window: usize) -> Option<Pair> {
        let n = closes.len();
        if n < 2 {
            return None;
        }
        Some(Pair {
            latest: rolling_mean_at(closes, window, n - 1)?,
            before_last: rolling_mean_at(closes, window, n - 2)?,
        })
    }

    fn rising_flag(&self, transaction: Transaction) -> Rising {
        match transaction {
            Transaction::Buy if self.latest > self.before_last => Rising::Yes,
            Transaction::Sell if self.latest < self.before_last => Rising::Yes,
            _ => Rising::No,
        }
    }
}

/// Evaluate the trend signal over a bar series.
///
/// Returns `None` when the history is insufficient: fewer than two bars, or
/// any tracked window not yet full at either of the two most recent bars.
/// That case is a silent skip, not an error — no signal is written for it.
///
/// The input is normalized (sorted, deduplicated) before evaluation.
pub fn evaluate(series: &BarSeries, updated_at: DateTime<Utc>) -> Option<MaSignal> {
    let windows = WindowSet::for_timeframe(series.timeframe);

    let mut series = series.clone();
    series.normalize();
    let closes = series.closes();

    let short = Pair::read(&closes, windows.short)?;
    let long = Pair::read(&closes, windows.long)?;
    let ma60 = Pair::read(&closes, windows.ma60)?;
    let aux = match windows.aux {
        Some((w120, w250)) => Some((Pair::read(&closes, w120)?, Pair::read(&closes, w250)?)),
        None => None,
    };

    // The four conditions overwrite in this exact order; when a BUY and a
    // SELL condition both hold, the later SELL wins.
    let mut transaction = Transaction::Unknown;
    if short.latest > long.latest && ma60.latest > ma60.before_last {
        transaction = Transaction::Buy;
    }
    if short.latest > long.latest
        && short.latest > short.before_last
        && long.latest > long.before_last
    {
        transaction = Transaction::Buy;
    }
    if short.latest < long.latest && ma60.latest < ma60.before_last {
        transaction = Transaction::Sell;
    }
    if short.latest < long.latest
        && short.latest < short.before_last
        && long.latest < long.before_last
    {
        transaction = Transaction::Sell;
    }

    let (ma120_rising, ma250_rising) = match aux {
        Some((ma120, ma250)) => (ma120.rising_flag(transaction), ma250.rising_flag(transaction)),
        None => (Rising::NotApplicable, Rising::NotApplicable),
    };

    Some(MaSignal {
        instrument: series.instrument.clone(),
        timeframe: series.timeframe,
        transaction,
        short_ma_rising: short.rising_flag(transaction),
        long_ma_rising: long.rising_flag(transaction),
        ma60_rising: ma60.rising_flag(transaction),
        ma120_rising,
        ma250_rising,
        updated_at,
    })
}
