//! Job units: fetch, re-aggregate, evaluate.
//!
//! Everything the drivers run is composed from the units here. A batch run
//! covers one trading date and walks timeframes from coarse to fine (daily,
//! 15m, 5m, 3m, 1m); the live scheduler invokes the same units on its minute
//! ticks. Unit failures are logged per instrument/timeframe and skipped;
//! fatal errors (calendar, session) abort the whole run.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use market_feed::feed::MarketDataFeed;
use market_feed::models::Timeframe;

use crate::aggregate::aggregate_from_1m;
use crate::calendar::{CalendarError, TradingCalendar};
use crate::config::LookbackConfig;
use crate::errors::EngineError;
use crate::session::{DAY_CLOSE, NIGHT_OPEN};
use crate::signal;
use crate::store::{BarStore, SignalStore};

/// Evaluation order for a batch pass over one trading date.
pub const BATCH_ORDER: [Timeframe; 5] = [
    Timeframe::D1,
    Timeframe::M15,
    Timeframe::M5,
    Timeframe::M3,
    Timeframe::M1,
];

/// Shared handles every job unit needs.
#[derive(Clone)]
pub struct Deps {
    /// Bar persistence.
    pub bars: Arc<dyn BarStore>,
    /// Signal persistence.
    pub signals: Arc<dyn SignalStore>,
    /// Trading-calendar lookups.
    pub calendar: Arc<dyn TradingCalendar>,
    /// Live minute-bar source.
    pub feed: Arc<dyn MarketDataFeed>,
}

/// First trading date of the evaluation window ending at `date`.
///
/// Walks back `days - 1` trading days; a window deeper than the known
/// calendar clamps to the earliest known date rather than erroring, so a
/// freshly seeded calendar can still evaluate its early dates.
fn lookback_start(
    calendar: &dyn TradingCalendar,
    date: NaiveDate,
    days: u32,
) -> Result<NaiveDate, EngineError> {
    let dates = calendar.trading_dates_between(NaiveDate::MIN, date)?;
    match dates.len().checked_sub(days as usize) {
        Some(idx) => Ok(dates[idx]),
        None => dates.first().copied().ok_or_else(|| {
            EngineError::Calendar(CalendarError::OutOfRange {
                date,
                offset: -i64::from(days),
            })
        }),
    }
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    // Midnight and the session clock times never fall in a DST gap for the
    // exchange zones we run against; earliest() covers ambiguity.
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&date.and_time(time)).with_timezone(&tz))
        .with_timezone(&Utc)
}

/// UTC bounds of the 1m bars that feed `date`'s re-aggregation: from the
/// prior evening's night open through just after the day close. The left
/// bound doubles as the bucket-grid anchor, so it must sit exactly on the
/// session open; the gaps from there to the day session divide evenly by
/// every derived width, keeping day buckets on their natural boundaries.
fn aggregation_span(
    calendar: &dyn TradingCalendar,
    date: NaiveDate,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), EngineError> {
    let end = local_instant(date, DAY_CLOSE, tz) + Duration::minutes(1);
    let anchor = match calendar.previous_trading_date(date, 1) {
        Ok(prev) => local_instant(prev, NIGHT_OPEN, tz),
        // The first date on record has no prior evening; anchor at midnight.
        Err(CalendarError::OutOfRange { .. }) => local_instant(date, NaiveTime::MIN, tz),
        Err(e) => return Err(e.into()),
    };
    Ok((anchor, end))
}

/// UTC bounds of the bars an evaluation at `date` reads, per the configured
/// lookback depth. The right edge extends to end of day so a night session
/// in progress (whose bars belong to the next trading date) is covered when
/// that date is evaluated.
fn evaluation_span(
    calendar: &dyn TradingCalendar,
    date: NaiveDate,
    days: u32,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), EngineError> {
    let start_date = lookback_start(calendar, date, days)?;
    let start = local_instant(start_date, NaiveTime::MIN, tz);
    let end = local_instant(date + Duration::days(1), NaiveTime::MIN, tz);
    Ok((start, end))
}

/// Pull the newest minute bars for `instruments` and upsert them, dropping
/// any stale rows timestamped before `not_before` (vendors occasionally
/// replay an old minute alongside the forming one).
pub async fn fetch_latest(
    deps: &Deps,
    instruments: &[String],
    not_before: DateTime<Utc>,
) -> Result<(), EngineError> {
    let series = deps.feed.latest_minute(instruments).await?;
    for mut s in series {
        let fetched = s.len();
        s.bars.retain(|b| b.timestamp >= not_before);
        if s.len() < fetched {
            debug!(
                instrument = %s.instrument,
                dropped = fetched - s.len(),
                "dropped stale fetched rows"
            );
        }
        if s.is_empty() {
            continue;
        }
        debug!(instrument = %s.instrument, bars = s.len(), "storing fetched minute bars");
        deps.bars.upsert(&s)?;
    }
    Ok(())
}

/// Rebuild `target` bars for one instrument's trading date from stored 1m
/// bars and upsert the result. The bucket grid is anchored at the session
/// open, so re-running is idempotent and late 1m data — even minutes earlier
/// than anything seen before — folds into the same labeled buckets on the
/// next pass.
pub fn reaggregate(
    deps: &Deps,
    instrument: &str,
    target: Timeframe,
    date: NaiveDate,
    tz: Tz,
) -> Result<(), EngineError> {
    let (anchor, end) = aggregation_span(deps.calendar.as_ref(), date, tz)?;
    let minutes = deps.bars.range(instrument, Timeframe::M1, anchor, end)?;
    if minutes.is_empty() {
        debug!(instrument, %target, %date, "no 1m bars to aggregate");
        return Ok(());
    }
    let derived = aggregate_from_1m(&minutes, target, anchor)?;
    deps.bars.upsert(&derived)?;
    Ok(())
}

/// Evaluate one instrument/timeframe pair at `date` and store the signal.
///
/// Insufficient history is a silent skip, not an error.
pub fn evaluate_and_store(
    deps: &Deps,
    instrument: &str,
    timeframe: Timeframe,
    date: NaiveDate,
    lookback: &LookbackConfig,
    tz: Tz,
    updated_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    let days = lookback.trading_days(timeframe);
    let (start, end) = evaluation_span(deps.calendar.as_ref(), date, days, tz)?;
    let series = deps.bars.range(instrument, timeframe, start, end)?;
    match signal::evaluate(&series, updated_at) {
        Some(sig) => {
            info!(
                instrument,
                %timeframe,
                transaction = sig.transaction.as_str(),
                "signal updated"
            );
            deps.signals.upsert(&sig)?;
        }
        None => {
            debug!(instrument, %timeframe, %date, "insufficient history, skipped");
        }
    }
    Ok(())
}

/// Run one unit: re-aggregate if the timeframe is derived, then evaluate.
fn run_unit(
    deps: &Deps,
    instrument: &str,
    timeframe: Timeframe,
    date: NaiveDate,
    lookback: &LookbackConfig,
    tz: Tz,
    updated_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    if Timeframe::DERIVED.contains(&timeframe) {
        reaggregate(deps, instrument, timeframe, date, tz)?;
    }
    evaluate_and_store(deps, instrument, timeframe, date, lookback, tz, updated_at)
}

/// Full batch pass over one trading date: every instrument, every timeframe
/// in [`BATCH_ORDER`]. Transient unit failures are logged and skipped.
pub fn run_batch(
    deps: &Deps,
    instruments: &[String],
    date: NaiveDate,
    lookback: &LookbackConfig,
    tz: Tz,
    updated_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    info!(%date, instruments = instruments.len(), "batch pass started");
    for instrument in instruments {
        for timeframe in BATCH_ORDER {
            if let Err(e) = run_unit(deps, instrument, timeframe, date, lookback, tz, updated_at) {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(instrument, %timeframe, %date, error = %e, "unit failed, skipped");
            }
        }
    }
    info!(%date, "batch pass finished");
    Ok(())
}

/// Batch passes over every trading date in `[start, end]`, ascending.
pub fn run_batch_range(
    deps: &Deps,
    instruments: &[String],
    start: NaiveDate,
    end: NaiveDate,
    lookback: &LookbackConfig,
    tz: Tz,
    updated_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    for date in deps.calendar.trading_dates_between(start, end)? {
        run_batch(deps, instruments, date, lookback, tz, updated_at)?;
    }
    Ok(())
}

/// Run the re-aggregation + evaluation units due for a set of timeframes,
/// typically chosen by the scheduler's minute gating.
pub fn run_due(
    deps: &Deps,
    instruments: &[String],
    timeframes: &[Timeframe],
    date: NaiveDate,
    lookback: &LookbackConfig,
    tz: Tz,
    updated_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    for instrument in instruments {
        for &timeframe in timeframes {
            if let Err(e) = run_unit(deps, instrument, timeframe, date, lookback, tz, updated_at) {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(instrument, %timeframe, %date, error = %e, "unit failed, skipped");
            }
        }
    }
    Ok(())
}
