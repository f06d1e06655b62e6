//! Shared numeric helpers for bar series.

use rust_decimal::{Decimal, RoundingStrategy};

/// Price precision used everywhere a value is derived by arithmetic.
pub const PRICE_DECIMALS: u32 = 5;

/// Round half-to-even at five decimal places.
pub fn round5(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointNearestEven)
}

/// Rolling mean of `values` over `window`, read at index `idx`.
///
/// Returns `None` while the window is not yet full at `idx` (the average is
/// undefined there, mirroring a rolling mean that yields no value until it
/// has `window` observations). The result is rounded via [`round5`].
pub fn rolling_mean_at(values: &[Decimal], window: usize, idx: usize) -> Option<Decimal> {
    if window == 0 || idx >= values.len() || idx + 1 < window {
        return None;
    }
    let sum: Decimal = values[idx + 1 - window..=idx].iter().copied().sum();
    Some(round5(sum / Decimal::from(window as u64)))
}
