//! Derivation of N-minute bars from 1-minute bars.
//!
//! Bucketing is right-closed and right-labeled: the bucket covering the
//! interval `(t - d, t]` is labeled `t`, with buckets laid out on a grid
//! anchored at a caller-supplied origin (the session open). Anchoring at a
//! fixed origin rather than at whatever bar happens to come first keeps the
//! grid stable when earlier minutes are backfilled later, so re-derived
//! buckets land on the same labels and overwrite their previous rows. For
//! each bucket the output bar takes the first open, last close, max high,
//! min low, summed volume, and last open interest. Buckets with at least one
//! constituent bar are emitted even when partial; buckets that received no
//! input at all are dropped.
//!
//! Aggregation is a pure function of its input: re-running it over the same
//! window re-derives identical bars, which makes repeated upserts over a
//! still-filling live bucket safe.

use chrono::{DateTime, Duration, Utc};
use market_feed::models::{Bar, BarSeries, Timeframe};
use thiserror::Error;

use crate::series::round5;

/// Errors from [`aggregate_from_1m`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// The input series is not a 1-minute series.
    #[error("aggregation input must be 1m bars, got {0}")]
    SourceNotMinute(Timeframe),

    /// The requested target is not one of the derived timeframes.
    #[error("cannot derive {0} bars from 1m input")]
    UnsupportedTarget(Timeframe),
}

/// Aggregate a 1-minute series into `target` bars (3m, 5m, or 15m).
///
/// `anchor` is the origin of the bucket grid — the bucket covering
/// `(anchor, anchor + d]` is labeled `anchor + d`, and every label sits
/// `d`-minutes apart from there. Bars before the anchor land on the same
/// grid extended backwards. Pass the session open so the grid does not move
/// when earlier minutes are backfilled.
///
/// The input is normalized first (sorted ascending, duplicate timestamps
/// resolved last-write-wins), so callers need not pre-sort. An empty input
/// yields an empty output, not an error.
pub fn aggregate_from_1m(
    series: &BarSeries,
    target: Timeframe,
    anchor: DateTime<Utc>,
) -> Result<BarSeries, AggregateError> {
    if series.timeframe != Timeframe::M1 {
        return Err(AggregateError::SourceNotMinute(series.timeframe));
    }
    let width = match target.minutes() {
        Some(w) if Timeframe::DERIVED.contains(&target) => i64::from(w),
        _ => return Err(AggregateError::UnsupportedTarget(target)),
    };

    let mut source = series.clone();
    source.normalize();

    let mut out = BarSeries::empty(series.instrument.clone(), target);
    if source.bars.is_empty() {
        return Ok(out);
    }
    let width_secs = width * 60;

    let mut current: Option<(i64, Bar)> = None;
    for bar in &source.bars {
        let offset = (bar.timestamp - anchor).num_seconds();
        let slot = offset.div_euclid(width_secs);
        match &mut current {
            Some((open_slot, acc)) if *open_slot == slot => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
                acc.open_interest = bar.open_interest;
            }
            _ => {
                if let Some((open_slot, acc)) = current.take() {
                    out.bars.push(finish(acc, anchor, open_slot, width));
                }
                current = Some((slot, *bar));
            }
        }
    }
    if let Some((open_slot, acc)) = current.take() {
        out.bars.push(finish(acc, anchor, open_slot, width));
    }

    Ok(out)
}

/// Stamp the accumulated bucket with its right-edge label and round the
/// emitted fields at five decimals.
fn finish(mut acc: Bar, anchor: DateTime<Utc>, slot: i64, width: i64) -> Bar {
    acc.timestamp = anchor + Duration::minutes(slot * width + width - 1);
    acc.open = round5(acc.open);
    acc.high = round5(acc.high);
    acc.low = round5(acc.low);
    acc.close = round5(acc.close);
    acc.volume = round5(acc.volume);
    acc.open_interest = round5(acc.open_interest);
    acc
}
