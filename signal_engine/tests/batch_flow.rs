//! End-to-end batch pass: seed 1m bars spanning a night and day session,
//! run the full pass, and check derived bars and signals in the stores.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use rust_decimal::Decimal;

use market_feed::feed::NullFeed;
use market_feed::models::{Bar, BarSeries, Timeframe};

use signal_engine::calendar::FixedCalendar;
use signal_engine::config::LookbackConfig;
use signal_engine::jobs::{Deps, run_batch};
use signal_engine::signal::{Rising, Transaction};
use signal_engine::store::{MemoryBarStore, MemorySignalStore};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn bar(timestamp: DateTime<Utc>, close: i64) -> Bar {
    let p = Decimal::from(close);
    Bar {
        timestamp,
        open: p,
        high: p,
        low: p,
        close: p,
        volume: Decimal::from(10),
        open_interest: Decimal::from(500),
    }
}

fn deps() -> Deps {
    Deps {
        bars: Arc::new(MemoryBarStore::new()),
        signals: Arc::new(MemorySignalStore::new()),
        calendar: Arc::new(FixedCalendar::new(vec![day(10), day(11)])),
        feed: Arc::new(NullFeed),
    }
}

/// A full session of rising 1m closes for trading date 2025-03-11: the night
/// session held on the 10th (21:00-23:00 Shanghai = 13:00-15:00 UTC) and the
/// day session on the 11th (09:00-15:00 Shanghai = 01:00-07:00 UTC).
fn seed_minutes(d: &Deps) -> usize {
    let night_open = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap();
    let day_open = Utc.with_ymd_and_hms(2025, 3, 11, 1, 0, 0).unwrap();

    let mut bars = Vec::new();
    for i in 0..120 {
        bars.push(bar(night_open + Duration::minutes(i), 1000 + i));
    }
    for i in 0..360 {
        bars.push(bar(day_open + Duration::minutes(i), 1120 + i));
    }
    let n = bars.len();
    d.bars
        .upsert(&BarSeries {
            instrument: "rb2510".to_string(),
            timeframe: Timeframe::M1,
            bars,
        })
        .unwrap();
    n
}

fn whole_day(d: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).unwrap() - Duration::days(1),
        Utc.with_ymd_and_hms(2025, 3, d, 23, 59, 59).unwrap(),
    )
}

#[test]
fn batch_pass_derives_bars_and_signals() {
    let d = deps();
    let seeded = seed_minutes(&d);
    assert_eq!(seeded, 480);

    let lookback = LookbackConfig::default();
    let now = Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap();
    run_batch(&d, &["rb2510".to_string()], day(11), &lookback, Shanghai, now).unwrap();

    // 480 minutes condense to 160 three-minute bars with right-edge labels,
    // anchored at the night open.
    let (start, end) = whole_day(11);
    let threes = d.bars.range("rb2510", Timeframe::M3, start, end).unwrap();
    assert_eq!(threes.len(), 160);
    assert_eq!(
        threes.bars[0].timestamp,
        Utc.with_ymd_and_hms(2025, 3, 10, 13, 2, 0).unwrap()
    );
    // First bucket of the day session keeps the same grid: 09:02 Shanghai.
    let first_day = threes
        .bars
        .iter()
        .find(|b| b.timestamp >= Utc.with_ymd_and_hms(2025, 3, 11, 1, 0, 0).unwrap())
        .unwrap();
    assert_eq!(
        first_day.timestamp,
        Utc.with_ymd_and_hms(2025, 3, 11, 1, 2, 0).unwrap()
    );
    // OHLCV of the first night bucket: three rising closes of 10 lots each.
    let first = threes.bars[0];
    assert_eq!(first.open, Decimal::from(1000));
    assert_eq!(first.close, Decimal::from(1002));
    assert_eq!(first.volume, Decimal::from(30));
    assert_eq!(first.open_interest, Decimal::from(500));

    let fives = d.bars.range("rb2510", Timeframe::M5, start, end).unwrap();
    assert_eq!(fives.len(), 96);
    let fifteens = d.bars.range("rb2510", Timeframe::M15, start, end).unwrap();
    assert_eq!(fifteens.len(), 32);

    // 480 rising 1m closes clear every window including MA250: a BUY with
    // all slopes rising.
    let sig = d.signals.get("rb2510", Timeframe::M1).unwrap().unwrap();
    assert_eq!(sig.transaction, Transaction::Buy);
    assert_eq!(sig.short_ma_rising, Rising::Yes);
    assert_eq!(sig.ma250_rising, Rising::Yes);
    assert_eq!(sig.updated_at, now);

    // 160 three-minute bars fall short of MA250: silently skipped.
    assert!(d.signals.get("rb2510", Timeframe::M3).unwrap().is_none());
    // No daily bars were seeded.
    assert!(d.signals.get("rb2510", Timeframe::D1).unwrap().is_none());
}

#[test]
fn rerunning_the_batch_is_idempotent() {
    let d = deps();
    seed_minutes(&d);

    let lookback = LookbackConfig::default();
    let now = Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap();
    let instruments = ["rb2510".to_string()];
    run_batch(&d, &instruments, day(11), &lookback, Shanghai, now).unwrap();

    let (start, end) = whole_day(11);
    let before = d.bars.range("rb2510", Timeframe::M3, start, end).unwrap();
    let sig_before = d.signals.get("rb2510", Timeframe::M1).unwrap().unwrap();

    run_batch(&d, &instruments, day(11), &lookback, Shanghai, now).unwrap();

    let after = d.bars.range("rb2510", Timeframe::M3, start, end).unwrap();
    assert_eq!(before.bars, after.bars);
    let sig_after = d.signals.get("rb2510", Timeframe::M1).unwrap().unwrap();
    assert_eq!(sig_before.transaction, sig_after.transaction);
    assert_eq!(sig_before.ma60_rising, sig_after.ma60_rising);
}

#[test]
fn late_minute_data_is_folded_in_on_the_next_pass() {
    let d = deps();
    seed_minutes(&d);

    let lookback = LookbackConfig::default();
    let now = Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap();
    let instruments = ["rb2510".to_string()];
    run_batch(&d, &instruments, day(11), &lookback, Shanghai, now).unwrap();

    // A corrected 1m bar arrives for 13:01 UTC with a new high.
    d.bars
        .upsert(&BarSeries {
            instrument: "rb2510".to_string(),
            timeframe: Timeframe::M1,
            bars: vec![Bar {
                high: Decimal::from(2000),
                ..bar(Utc.with_ymd_and_hms(2025, 3, 10, 13, 1, 0).unwrap(), 1001)
            }],
        })
        .unwrap();
    run_batch(&d, &instruments, day(11), &lookback, Shanghai, now).unwrap();

    let (start, end) = whole_day(11);
    let threes = d.bars.range("rb2510", Timeframe::M3, start, end).unwrap();
    assert_eq!(threes.bars[0].high, Decimal::from(2000));
}
