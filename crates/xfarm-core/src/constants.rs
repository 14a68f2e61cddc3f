//! Protocol constants. All amounts in base units (1 token = 10^18 base units).

use crate::types::{Amount, Height};

/// Base units per whole token.
pub const ONE: Amount = 1_000_000_000_000_000_000;

/// Denominator for fractional ratios (parts per billion).
///
/// An unlock ratio of `0.8` is stored as `800_000_000`.
pub const RATIO_PRECISION: u64 = 1_000_000_000;

/// Fixed-point scale of the pool accumulator `acc_reward_per_weight`.
pub const ACC_PRECISION: u128 = 1_000_000_000_000;

/// One-time reward credited to an account's normal stream on its first deposit.
pub const FIRST_DEPOSIT_BONUS: Amount = 10 * ONE;

/// Every stage boundary of the emission schedule is a multiple of this.
pub const DEFAULT_STAGE_INTERVAL: Height = 40_000;

/// Default emission table as `(until_height, reward_per_block)`.
///
/// Stage `i` covers `[until_{i-1}, until_i)`; the first stage starts at height 0.
/// Emission is zero from the last boundary on.
pub const DEFAULT_STAGES: [(Height, Amount); 5] = [
    (40_000, 360 * ONE),
    (200_000, 180 * ONE),
    (400_000, 54 * ONE),
    (600_000, 27 * ONE),
    (1_000_000, 27 * ONE / 2),
];

/// Period (heights between unlock events) of normal reward streams.
pub const NORMAL_STREAM_PERIOD: Height = 40;

/// Period of voting reward streams, sized to the governance lock horizon.
pub const VOTING_STREAM_PERIOD: Height = 1_800;

/// Default unlock ratio of bridge-created streams: 0.001 per period.
pub const DEFAULT_UNLOCK_RATIO: u64 = 1_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_boundaries_are_interval_multiples() {
        for (until, _) in DEFAULT_STAGES {
            assert_eq!(until % DEFAULT_STAGE_INTERVAL, 0, "boundary {until}");
        }
    }

    #[test]
    fn stage_rates_never_increase() {
        for pair in DEFAULT_STAGES.windows(2) {
            assert!(pair[1].1 <= pair[0].1);
            assert!(pair[1].0 > pair[0].0);
        }
    }

    #[test]
    fn default_unlock_ratio_is_one_per_mille() {
        assert_eq!(DEFAULT_UNLOCK_RATIO * 1_000, RATIO_PRECISION);
    }

    #[test]
    fn voting_period_longer_than_normal() {
        assert!(VOTING_STREAM_PERIOD > NORMAL_STREAM_PERIOD);
    }
}
