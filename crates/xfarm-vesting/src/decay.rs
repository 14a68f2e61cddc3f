//! The unlock law shared by every stream read and write.
//!
//! A stream's curve is anchored on its period grid: `last` is always
//! `start_height + k * period`, and `base` is the principal the curve runs
//! from at `last`. With `e = now - last`, `n = e / period` and
//! `m = e % period`:
//!
//! ```text
//! r_n    = base * (1 - ratio)^n
//! r_{n+1} = base * (1 - ratio)^(n+1)
//! curve  = r_n - (r_n - r_{n+1}) * m / period
//! ```
//!
//! `remaining` is lowered to `curve` and the difference moves to
//! `withdrawable`. A commit advances `last` by whole periods only and stores
//! `r_n` as the new base, so committing mid-period never shifts the grid and
//! the release over a span does not depend on how often the stream is
//! written. All arithmetic is integer-only with u128 intermediates; every
//! division truncates toward the locked side.

use tracing::trace;

use xfarm_core::constants::RATIO_PRECISION;
use xfarm_core::error::VestingError;
use xfarm_core::types::{Amount, Height};

use crate::stream::{Stream, StreamStatus};

/// Result of applying decay to a stream at some height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecaySnapshot {
    pub remaining: Amount,
    pub withdrawable: Amount,
    /// Grid point the curve is anchored at after the commit.
    pub last_accrual_height: Height,
    /// Curve principal at `last_accrual_height`.
    pub period_base: Amount,
}

/// Share of principal still locked after `periods` whole periods, in parts
/// per billion: `retention^periods` by square-and-multiply.
fn retention_pow(retention: u64, periods: u64) -> Result<u64, VestingError> {
    let p = RATIO_PRECISION as u128;
    let mut acc = p;
    let mut factor = retention as u128;
    let mut left = periods;

    while left > 0 && acc > 0 {
        if left & 1 == 1 {
            acc = acc.checked_mul(factor).ok_or(VestingError::ArithmeticOverflow)? / p;
        }
        left >>= 1;
        if left > 0 {
            factor = factor.checked_mul(factor).ok_or(VestingError::ArithmeticOverflow)? / p;
        }
    }

    Ok(acc as u64)
}

/// `value * num / den` with a checked multiplication.
fn mul_div(value: Amount, num: u128, den: u128) -> Result<Amount, VestingError> {
    // Split to keep the product in range for very large balances.
    let whole = value / den;
    let rest = value % den;
    let a = whole.checked_mul(num).ok_or(VestingError::ArithmeticOverflow)?;
    let b = rest.checked_mul(num).ok_or(VestingError::ArithmeticOverflow)? / den;
    a.checked_add(b).ok_or(VestingError::ArithmeticOverflow)
}

fn check_terms(stream: &Stream) -> Result<(), VestingError> {
    if stream.period == 0 || stream.unlock_ratio == 0 || stream.unlock_ratio > RATIO_PRECISION {
        return Err(VestingError::InvalidConfig(format!(
            "{} has unusable terms: period {}, ratio {}",
            stream.id, stream.period, stream.unlock_ratio
        )));
    }
    Ok(())
}

/// Compute the stream's balances at `now` without mutating it.
///
/// Returns the stored values unchanged when `now` is at or before the
/// anchor (which is never earlier than `start_height`), and for canceled
/// streams.
pub fn apply_decay(stream: &Stream, now: Height) -> Result<DecaySnapshot, VestingError> {
    let unchanged = DecaySnapshot {
        remaining: stream.remaining,
        withdrawable: stream.withdrawable,
        last_accrual_height: stream.last_accrual_height,
        period_base: stream.period_base,
    };
    if stream.status == StreamStatus::Canceled || now <= stream.last_accrual_height {
        return Ok(unchanged);
    }
    check_terms(stream)?;

    let elapsed = now - stream.last_accrual_height;
    let periods = elapsed / stream.period;
    let partial = elapsed % stream.period;
    let precision = RATIO_PRECISION as u128;

    let retention = RATIO_PRECISION - stream.unlock_ratio;
    let r_n = mul_div(stream.period_base, retention_pow(retention, periods)? as u128, precision)?;
    let curve = if partial == 0 {
        r_n
    } else {
        // Both snapshots come from the same power series so the curve stays
        // continuous across period boundaries.
        let r_next = mul_div(
            stream.period_base,
            retention_pow(retention, periods + 1)? as u128,
            precision,
        )?;
        let step = r_n.saturating_sub(r_next);
        r_n - mul_div(step, partial as u128, stream.period as u128)?
    };

    let remaining = stream.remaining.min(curve);
    let released = stream.remaining - remaining;
    let withdrawable = stream
        .withdrawable
        .checked_add(released)
        .ok_or(VestingError::ArithmeticOverflow)?;

    trace!(stream = %stream.id, periods, partial, released, "decay applied");

    Ok(DecaySnapshot {
        remaining,
        withdrawable,
        // periods * period <= elapsed, so this cannot pass `now`.
        last_accrual_height: stream.last_accrual_height + periods * stream.period,
        period_base: r_n,
    })
}

/// Curve principal to add at the anchor so that `amount` funded at `now`
/// sits on the curve at `now` and starts decaying from there.
///
/// Expects a stream already committed at `now`. Rounds up so new principal
/// never unlocks on arrival.
pub fn base_for_funding(stream: &Stream, now: Height, amount: Amount) -> Result<Amount, VestingError> {
    check_terms(stream)?;
    let partial = now.saturating_sub(stream.last_accrual_height) % stream.period;
    if partial == 0 {
        return Ok(amount);
    }
    let precision = RATIO_PRECISION as u128;
    // Fraction of the anchor principal still on the curve `partial` heights in.
    let on_curve = precision
        - stream.unlock_ratio as u128 * partial as u128 / stream.period as u128;
    let scaled = mul_div(amount, precision, on_curve)?;
    let exact = mul_div(scaled, on_curve, precision)? == amount;
    if exact {
        Ok(scaled)
    } else {
        scaled.checked_add(1).ok_or(VestingError::ArithmeticOverflow)
    }
}
