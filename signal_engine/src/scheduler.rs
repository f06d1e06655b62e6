//! Live session driver.
//!
//! Runs one trading session end to end: resolve the session window, do a
//! catch-up pass, then tick once a minute — fetching fresh 1m bars shortly
//! after each minute boundary and re-evaluating the timeframes whose cadence
//! divides the wall-clock minute shortly after that. Sixty seconds past the
//! session close the scheduler stops itself. State is published on a watch
//! channel so callers can observe Idle -> Running -> Stopped.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use market_feed::models::Timeframe;

use crate::config::LookbackConfig;
use crate::errors::EngineError;
use crate::jobs::{self, BATCH_ORDER, Deps};
use crate::session::SessionWindow;

/// Seconds past each minute boundary at which the fetch task fires.
pub const FETCH_OFFSET_SECS: i64 = 1;
/// Seconds past each minute boundary at which evaluation fires, leaving the
/// fetch time to land its bars first.
pub const EVAL_OFFSET_SECS: i64 = 3;
/// Grace period after the session close before the scheduler stops.
pub const STOP_GRACE_SECS: i64 = 60;

/// Scheduler lifecycle, published on the watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started.
    Idle,
    /// Ticking inside a session window.
    Running(SessionWindow),
    /// The session ended (or was already over at startup).
    Stopped,
}

/// Timeframes due for re-evaluation at a given exchange-local wall minute.
///
/// 1m runs every minute; the derived timeframes run when their width divides
/// the minute. Coarse timeframes come first, matching the batch order.
pub fn due_timeframes(minute: u32) -> Vec<Timeframe> {
    let mut due: Vec<Timeframe> = [Timeframe::M15, Timeframe::M5, Timeframe::M3]
        .into_iter()
        .filter(|tf| tf.minutes().is_some_and(|w| minute % w == 0))
        .collect();
    due.push(Timeframe::M1);
    due
}

/// Earliest instant strictly after `now` on a minute boundary plus `offset`
/// seconds.
fn next_tick(now: DateTime<Utc>, offset: i64) -> DateTime<Utc> {
    let minute_start = now.timestamp().div_euclid(60) * 60;
    let mut at = minute_start + offset;
    if at <= now.timestamp() {
        at += 60;
    }
    DateTime::from_timestamp(at, 0).unwrap_or_else(|| now + Duration::seconds(60))
}

async fn sleep_until(target: DateTime<Utc>) {
    if let Ok(d) = (target - Utc::now()).to_std() {
        tokio::time::sleep(d).await;
    }
}

/// Drives one session's fetch and evaluation ticks.
pub struct SessionScheduler {
    deps: Deps,
    instruments: Vec<String>,
    lookback: LookbackConfig,
    tz: Tz,
    state: watch::Sender<SessionState>,
}

impl SessionScheduler {
    /// Build a scheduler over the shared dependencies.
    pub fn new(deps: Deps, instruments: Vec<String>, lookback: LookbackConfig, tz: Tz) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            deps,
            instruments,
            lookback,
            tz,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the session for the current wall clock and run it.
    pub async fn run_now(&self) -> Result<(), EngineError> {
        let window = SessionWindow::resolve(self.deps.calendar.as_ref(), self.tz, Utc::now())?;
        self.run(window).await
    }

    /// Run one session window to completion.
    ///
    /// A window whose stop time has already passed transitions straight to
    /// Stopped without doing any work.
    pub async fn run(&self, window: SessionWindow) -> Result<(), EngineError> {
        let stop_at = window.close + Duration::seconds(STOP_GRACE_SECS);
        if Utc::now() >= stop_at {
            info!(trading_date = %window.trading_date, "session already over, stopping");
            self.state.send_replace(SessionState::Stopped);
            return Ok(());
        }

        info!(
            trading_date = %window.trading_date,
            kind = ?window.kind,
            open = %window.open,
            close = %window.close,
            "session starting"
        );
        self.state.send_replace(SessionState::Running(window));

        // Catch-up: bring derived bars and signals current before ticking, so
        // a mid-session restart does not wait a full cadence cycle.
        if let Err(e) = self.catch_up(&window) {
            self.state.send_replace(SessionState::Stopped);
            return Err(e);
        }

        while Utc::now() < stop_at {
            let fetch_at = next_tick(Utc::now(), FETCH_OFFSET_SECS).min(stop_at);
            sleep_until(fetch_at).await;
            let now = Utc::now();
            if now >= stop_at {
                break;
            }
            if self.in_window(&window, now) {
                let minute_start = DateTime::from_timestamp(now.timestamp().div_euclid(60) * 60, 0)
                    .unwrap_or(now);
                if let Err(e) =
                    jobs::fetch_latest(&self.deps, &self.instruments, minute_start).await
                {
                    if e.is_fatal() {
                        self.state.send_replace(SessionState::Stopped);
                        return Err(e);
                    }
                    warn!(error = %e, "minute fetch failed");
                }
            }

            let eval_at = next_tick(now, EVAL_OFFSET_SECS).min(stop_at);
            sleep_until(eval_at).await;
            let now = Utc::now();
            if now >= stop_at {
                break;
            }
            if self.in_window(&window, now) {
                let minute = now.with_timezone(&self.tz).minute();
                let due = due_timeframes(minute);
                debug!(minute, ?due, "evaluation tick");
                if let Err(e) = jobs::run_due(
                    &self.deps,
                    &self.instruments,
                    &due,
                    window.trading_date,
                    &self.lookback,
                    self.tz,
                    now,
                ) {
                    self.state.send_replace(SessionState::Stopped);
                    return Err(e);
                }
            }
        }

        info!(trading_date = %window.trading_date, "session stopped");
        self.state.send_replace(SessionState::Stopped);
        Ok(())
    }

    /// Ticks fire a few seconds past the minute boundary, so the closing
    /// minute's tick lands just after the close; gate on the tick's minute
    /// start so that final fetch and evaluation still run.
    fn in_window(&self, window: &SessionWindow, now: DateTime<Utc>) -> bool {
        let minute_start = now.timestamp().div_euclid(60) * 60;
        now >= window.open && minute_start <= window.close.timestamp()
    }

    fn catch_up(&self, window: &SessionWindow) -> Result<(), EngineError> {
        let intraday: Vec<Timeframe> = BATCH_ORDER
            .into_iter()
            .filter(|tf| tf.is_intraday())
            .collect();
        jobs::run_due(
            &self.deps,
            &self.instruments,
            &intraday,
            window.trading_date,
            &self.lookback,
            self.tz,
            Utc::now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::FixedCalendar;
    use crate::session::SessionKind;
    use crate::store::{MemoryBarStore, MemorySignalStore};
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Asia::Shanghai;
    use market_feed::feed::NullFeed;
    use std::sync::Arc;

    #[test]
    fn cadence_gating_follows_wall_minute() {
        assert_eq!(
            due_timeframes(0),
            vec![
                Timeframe::M15,
                Timeframe::M5,
                Timeframe::M3,
                Timeframe::M1
            ]
        );
        assert_eq!(due_timeframes(7), vec![Timeframe::M1]);
        assert_eq!(due_timeframes(9), vec![Timeframe::M3, Timeframe::M1]);
        assert_eq!(due_timeframes(10), vec![Timeframe::M5, Timeframe::M1]);
        assert_eq!(
            due_timeframes(45),
            vec![Timeframe::M15, Timeframe::M5, Timeframe::M3, Timeframe::M1]
        );
    }

    #[test]
    fn next_tick_lands_after_now_on_the_offset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 0).unwrap();
        assert_eq!(
            next_tick(now, 1),
            Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 1).unwrap()
        );
        // Already past this minute's offset: roll to the next minute.
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 2).unwrap();
        assert_eq!(
            next_tick(now, 1),
            Utc.with_ymd_and_hms(2025, 3, 10, 1, 31, 1).unwrap()
        );
        // Exactly on the offset counts as passed.
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 30, 3).unwrap();
        assert_eq!(
            next_tick(now, 3),
            Utc.with_ymd_and_hms(2025, 3, 10, 1, 31, 3).unwrap()
        );
    }

    #[tokio::test]
    async fn past_window_stops_without_work() {
        let deps = Deps {
            bars: Arc::new(MemoryBarStore::new()),
            signals: Arc::new(MemorySignalStore::new()),
            calendar: Arc::new(FixedCalendar::new(vec![
                NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            ])),
            feed: Arc::new(NullFeed),
        };
        let scheduler = SessionScheduler::new(
            deps,
            vec!["rb2510".to_string()],
            LookbackConfig::default(),
            Shanghai,
        );
        let mut state = scheduler.subscribe();
        assert_eq!(*state.borrow(), SessionState::Idle);

        let window = SessionWindow::new(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            SessionKind::Day,
            Utc.with_ymd_and_hms(2025, 3, 10, 1, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap(),
        )
        .unwrap();
        scheduler.run(window).await.unwrap();

        state.changed().await.unwrap();
        assert_eq!(*state.borrow(), SessionState::Stopped);
    }
}
