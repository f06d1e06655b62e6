//! Signal jobs CLI.
//!
//! `batch` replays aggregation and evaluation over historical trading dates
//! from CSV bar files; `session` drives a live trading session against the
//! configured feed.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use market_feed::feed::NullFeed;
use market_feed::models::{Bar, BarSeries, Timeframe};

use signal_engine::calendar::FixedCalendar;
use signal_engine::config::{EngineConfig, load_config_path};
use signal_engine::jobs::{self, Deps};
use signal_engine::scheduler::SessionScheduler;
use signal_engine::store::{BarStore, MemoryBarStore, MemorySignalStore, SignalStore};

#[derive(Parser)]
#[command(version, about = "Bar aggregation and MA signal jobs")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Replay batch passes over one trading date or a date range.
    Batch {
        /// Engine config TOML.
        #[arg(long, value_name = "FILE")]
        config: String,
        /// Single trading date to process; defaults to the latest known.
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<NaiveDate>,
        /// First trading date of a range (requires --end).
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        /// Last trading date of a range (requires --start).
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// CSV bar files to seed the store with; repeatable.
        #[arg(long = "bars", value_name = "FILE")]
        bars: Vec<String>,
    },
    /// Run the live session scheduler until the session stops itself.
    Session {
        /// Engine config TOML.
        #[arg(long, value_name = "FILE")]
        config: String,
        /// Optional CSV bar files for warm-up history.
        #[arg(long = "bars", value_name = "FILE")]
        bars: Vec<String>,
    },
}

/// One CSV row: instrument, timeframe, RFC 3339 timestamp, then OHLCV + OI.
#[derive(Debug, Deserialize)]
struct BarRecord {
    instrument: String,
    timeframe: Timeframe,
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    open_interest: Decimal,
}

fn load_bars(store: &dyn BarStore, paths: &[String]) -> Result<usize> {
    let mut total = 0usize;
    for path in paths {
        let mut reader =
            csv::Reader::from_path(path).with_context(|| format!("open bar file {path}"))?;
        // Group rows into per-series batches so each upsert is one store call.
        let mut batches: indexmap::IndexMap<(String, Timeframe), Vec<Bar>> =
            indexmap::IndexMap::new();
        for row in reader.deserialize() {
            let rec: BarRecord = row.with_context(|| format!("parse bar row in {path}"))?;
            batches
                .entry((rec.instrument.clone(), rec.timeframe))
                .or_default()
                .push(Bar {
                    timestamp: rec.timestamp,
                    open: rec.open,
                    high: rec.high,
                    low: rec.low,
                    close: rec.close,
                    volume: rec.volume,
                    open_interest: rec.open_interest,
                });
            total += 1;
        }
        for ((instrument, timeframe), bars) in batches {
            store.upsert(&BarSeries {
                instrument,
                timeframe,
                bars,
            })?;
        }
    }
    Ok(total)
}

fn build_deps(cfg: &EngineConfig) -> Deps {
    Deps {
        bars: Arc::new(MemoryBarStore::new()),
        signals: Arc::new(MemorySignalStore::new()),
        calendar: Arc::new(FixedCalendar::new(cfg.calendar.trading_dates.clone())),
        feed: Arc::new(NullFeed),
    }
}

fn print_signals(cfg: &EngineConfig, signals: &dyn SignalStore) -> Result<()> {
    for instrument in &cfg.instruments {
        for timeframe in Timeframe::ALL {
            if let Some(sig) = signals.get(instrument, timeframe)? {
                println!(
                    "{instrument} {timeframe} {} ma5={} ma20={} ma60={} ma120={} ma250={}",
                    sig.transaction.as_str(),
                    sig.short_ma_rising.as_str(),
                    sig.long_ma_rising.as_str(),
                    sig.ma60_rising.as_str(),
                    sig.ma120_rising.as_str(),
                    sig.ma250_rising.as_str(),
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Batch {
            config,
            date,
            start,
            end,
            bars,
        } => {
            let cfg = load_config_path(&config)?;
            let tz = cfg.tz()?;
            let deps = build_deps(&cfg);
            let loaded = load_bars(deps.bars.as_ref(), &bars)?;
            info!(loaded, files = bars.len(), "bar files loaded");

            let now = Utc::now();
            match (date, start, end) {
                (_, Some(start), Some(end)) => {
                    jobs::run_batch_range(
                        &deps,
                        &cfg.instruments,
                        start,
                        end,
                        &cfg.lookback,
                        tz,
                        now,
                    )?;
                }
                (date, _, _) => {
                    let date = match date {
                        Some(d) => d,
                        None => deps.calendar.latest_trading_date()?,
                    };
                    jobs::run_batch(&deps, &cfg.instruments, date, &cfg.lookback, tz, now)?;
                }
            }
            print_signals(&cfg, deps.signals.as_ref())?;
        }
        Cmd::Session { config, bars } => {
            let cfg = load_config_path(&config)?;
            let tz = cfg.tz()?;
            let deps = build_deps(&cfg);
            let loaded = load_bars(deps.bars.as_ref(), &bars)?;
            info!(loaded, files = bars.len(), "bar files loaded");

            let scheduler =
                SessionScheduler::new(deps, cfg.instruments.clone(), cfg.lookback.clone(), tz);
            scheduler.run_now().await?;
        }
    }
    Ok(())
}
