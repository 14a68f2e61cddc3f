//! Staged reward-emission schedule.
//!
//! The per-height reward steps down at fixed stage boundaries. Every
//! boundary is a multiple of the schedule's `interval`, and stage `i` covers
//! heights `[until_{i-1}, until_i)`, with the first stage starting at 0.
//! With the default table:
//!
//! - heights 0–39,999: 360 tokens per height
//! - heights 40,000–199,999: 180 tokens per height
//! - heights 200,000–399,999: 54 tokens per height
//! - heights 400,000–599,999: 27 tokens per height
//! - heights 600,000–999,999: 13.5 tokens per height
//! - heights 1,000,000+: 0 (emission exhausted)
//!
//! Nothing is emitted before the farming start height. Emission over a range
//! is computed per stage with exact integer arithmetic.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STAGES, DEFAULT_STAGE_INTERVAL};
use crate::error::ScheduleError;
use crate::types::{Amount, Height};

/// One row of the emission table.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Stage {
    /// First height (exclusive end) no longer covered by this stage.
    pub until: Height,
    /// Reward emitted per height while the stage is active.
    #[serde(with = "crate::types::serde_amount")]
    pub reward_per_block: Amount,
}

/// Emission table plus the farming start height.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct RewardSchedule {
    start_height: Height,
    interval: Height,
    stages: Vec<Stage>,
}

impl RewardSchedule {
    /// Build a schedule from an explicit stage table.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidConfig`] if `interval` is zero, the table is
    /// empty, or any boundary is not a strictly increasing positive multiple
    /// of `interval`.
    pub fn new(start_height: Height, interval: Height, stages: Vec<Stage>) -> Result<Self, ScheduleError> {
        if interval == 0 {
            return Err(ScheduleError::InvalidConfig("stage interval must be positive".into()));
        }
        if stages.is_empty() {
            return Err(ScheduleError::InvalidConfig("stage table is empty".into()));
        }
        let mut previous = 0;
        for (i, stage) in stages.iter().enumerate() {
            if stage.until <= previous {
                return Err(ScheduleError::InvalidConfig(format!(
                    "stage {i} ends at {} which is not after {previous}",
                    stage.until
                )));
            }
            if stage.until % interval != 0 {
                return Err(ScheduleError::InvalidConfig(format!(
                    "stage {i} boundary {} is not a multiple of {interval}",
                    stage.until
                )));
            }
            previous = stage.until;
        }
        Ok(Self {
            start_height,
            interval,
            stages,
        })
    }

    /// Build a schedule whose stages are each exactly one `interval` long.
    pub fn uniform(start_height: Height, interval: Height, rates: &[Amount]) -> Result<Self, ScheduleError> {
        let mut stages = Vec::with_capacity(rates.len());
        for (i, &reward_per_block) in rates.iter().enumerate() {
            let until = interval
                .checked_mul(i as u64 + 1)
                .ok_or(ScheduleError::ArithmeticOverflow)?;
            stages.push(Stage {
                until,
                reward_per_block,
            });
        }
        Self::new(start_height, interval, stages)
    }

    /// The default emission table starting at `start_height`.
    pub fn with_start(start_height: Height) -> Self {
        Self {
            start_height,
            interval: DEFAULT_STAGE_INTERVAL,
            stages: DEFAULT_STAGES
                .iter()
                .map(|&(until, reward_per_block)| Stage {
                    until,
                    reward_per_block,
                })
                .collect(),
        }
    }

    pub fn start_height(&self) -> Height {
        self.start_height
    }

    pub fn interval(&self) -> Height {
        self.interval
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Index of the stage covering `height`, or `None` past the final stage.
    pub fn stage_index(&self, height: Height) -> Option<usize> {
        self.stages.iter().position(|s| height < s.until)
    }

    /// First height covered by stage `index`.
    pub fn stage_start(&self, index: usize) -> Height {
        match index {
            0 => 0,
            i => self.stages.get(i - 1).map_or(Height::MAX, |s| s.until),
        }
    }

    /// Reward emitted at a single height. Zero before the start height and
    /// after the final stage.
    pub fn reward_per_block(&self, height: Height) -> Amount {
        if height < self.start_height {
            return 0;
        }
        self.stage_index(height)
            .map_or(0, |i| self.stages[i].reward_per_block)
    }

    /// The height at which the rate next changes after `height`.
    ///
    /// Returns `None` once the schedule is exhausted.
    pub fn next_stage_height(&self, height: Height) -> Option<Height> {
        self.stage_index(height).map(|i| self.stages[i].until)
    }

    /// Total reward emitted over `[from, to)`.
    ///
    /// `from` is clipped to the start height; an empty range yields zero.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::InvalidConfig`] if `from > to`
    /// - [`ScheduleError::ArithmeticOverflow`] if the sum exceeds `u128`
    pub fn emission(&self, from: Height, to: Height) -> Result<Amount, ScheduleError> {
        if from > to {
            return Err(ScheduleError::InvalidConfig(format!(
                "emission range is reversed: {from} > {to}"
            )));
        }
        let mut cursor = from.max(self.start_height);
        let mut total: Amount = 0;

        for stage in &self.stages {
            if cursor >= to {
                break;
            }
            if cursor >= stage.until {
                continue;
            }
            let end = to.min(stage.until);
            let blocks = (end - cursor) as Amount;
            let part = blocks
                .checked_mul(stage.reward_per_block)
                .ok_or(ScheduleError::ArithmeticOverflow)?;
            total = total
                .checked_add(part)
                .ok_or(ScheduleError::ArithmeticOverflow)?;
            cursor = end;
        }

        Ok(total)
    }

    /// Everything the schedule will ever emit from its start height.
    pub fn total_emission(&self) -> Result<Amount, ScheduleError> {
        let end = self.stages.last().map_or(0, |s| s.until);
        self.emission(self.start_height.min(end), end)
    }

    /// The last height that emits a non-zero reward, if any.
    pub fn last_reward_height(&self) -> Option<Height> {
        let (index, stage) = self
            .stages
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.reward_per_block > 0)?;
        let last = stage.until - 1;
        (last >= self.start_height && last >= self.stage_start(index)).then_some(last)
    }
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self::with_start(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ONE;
    use proptest::prelude::*;

    fn schedule_from(start: Height) -> RewardSchedule {
        RewardSchedule::with_start(start)
    }

    // ------------------------------------------------------------------
    // emission: audited figures
    // ------------------------------------------------------------------

    #[test]
    fn emission_clips_at_start_height() {
        // 900 heights of stage 0 after clipping [10, 1000) to start 100.
        let s = schedule_from(100);
        assert_eq!(s.emission(10, 1_000).unwrap(), 324_000 * ONE);
    }

    #[test]
    fn emission_within_second_stage() {
        let s = schedule_from(100);
        assert_eq!(s.emission(40_000, 120_300).unwrap(), 14_454_000 * ONE);
    }

    #[test]
    fn emission_fractional_rate_stage() {
        let s = schedule_from(100);
        assert_eq!(s.emission(600_000, 601_000).unwrap(), 13_500 * ONE);
    }

    #[test]
    fn emission_of_thirty_five_heights() {
        let s = schedule_from(50);
        assert_eq!(s.emission(50, 85).unwrap(), 12_600 * ONE);
    }

    // ------------------------------------------------------------------
    // emission: edges
    // ------------------------------------------------------------------

    #[test]
    fn emission_before_start_is_zero() {
        let s = schedule_from(1_000);
        assert_eq!(s.emission(0, 999).unwrap(), 0);
        assert_eq!(s.emission(0, 1_000).unwrap(), 0);
    }

    #[test]
    fn emission_empty_range_is_zero() {
        let s = schedule_from(0);
        assert_eq!(s.emission(500, 500).unwrap(), 0);
    }

    #[test]
    fn emission_reversed_range_rejected() {
        let s = schedule_from(0);
        assert!(matches!(
            s.emission(10, 9),
            Err(ScheduleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn emission_straddling_a_boundary() {
        let s = schedule_from(0);
        let expected = 10 * 360 * ONE + 5 * 180 * ONE;
        assert_eq!(s.emission(39_990, 40_005).unwrap(), expected);
    }

    #[test]
    fn emission_saturates_after_final_stage() {
        let s = schedule_from(0);
        let total = s.total_emission().unwrap();
        assert_eq!(s.emission(0, 5_000_000).unwrap(), total);
        assert_eq!(s.emission(1_000_000, u64::MAX).unwrap(), 0);
    }

    // ------------------------------------------------------------------
    // construction
    // ------------------------------------------------------------------

    #[test]
    fn new_rejects_zero_interval() {
        let err = RewardSchedule::new(0, 0, vec![Stage { until: 10, reward_per_block: 1 }]);
        assert!(err.is_err());
    }

    #[test]
    fn new_rejects_empty_table() {
        assert!(RewardSchedule::new(0, 10, vec![]).is_err());
    }

    #[test]
    fn new_rejects_unaligned_boundary() {
        let stages = vec![
            Stage { until: 10, reward_per_block: 5 },
            Stage { until: 25, reward_per_block: 1 },
        ];
        assert!(RewardSchedule::new(0, 10, stages).is_err());
    }

    #[test]
    fn new_rejects_non_increasing_boundaries() {
        let stages = vec![
            Stage { until: 20, reward_per_block: 5 },
            Stage { until: 20, reward_per_block: 1 },
        ];
        assert!(RewardSchedule::new(0, 10, stages).is_err());
    }

    #[test]
    fn uniform_builds_consecutive_intervals() {
        let s = RewardSchedule::uniform(0, 100, &[8, 4, 2]).unwrap();
        assert_eq!(s.stages().len(), 3);
        assert_eq!(s.stages()[2].until, 300);
        assert_eq!(s.emission(0, 300).unwrap(), 100 * (8 + 4 + 2));
    }

    #[test]
    fn default_is_the_constant_table() {
        let s = RewardSchedule::default();
        assert_eq!(s.interval(), DEFAULT_STAGE_INTERVAL);
        assert_eq!(s.stages().len(), DEFAULT_STAGES.len());
        assert_eq!(s.start_height(), 0);
    }

    // ------------------------------------------------------------------
    // per-height queries
    // ------------------------------------------------------------------

    #[test]
    fn reward_per_block_by_stage() {
        let s = schedule_from(100);
        assert_eq!(s.reward_per_block(99), 0);
        assert_eq!(s.reward_per_block(100), 360 * ONE);
        assert_eq!(s.reward_per_block(39_999), 360 * ONE);
        assert_eq!(s.reward_per_block(40_000), 180 * ONE);
        assert_eq!(s.reward_per_block(999_999), 27 * ONE / 2);
        assert_eq!(s.reward_per_block(1_000_000), 0);
    }

    #[test]
    fn stage_index_and_start() {
        let s = schedule_from(0);
        assert_eq!(s.stage_index(0), Some(0));
        assert_eq!(s.stage_index(40_000), Some(1));
        assert_eq!(s.stage_index(1_000_000), None);
        assert_eq!(s.stage_start(0), 0);
        assert_eq!(s.stage_start(1), 40_000);
    }

    #[test]
    fn next_stage_height_walks_boundaries() {
        let s = schedule_from(0);
        assert_eq!(s.next_stage_height(0), Some(40_000));
        assert_eq!(s.next_stage_height(40_000), Some(200_000));
        assert_eq!(s.next_stage_height(999_999), Some(1_000_000));
        assert_eq!(s.next_stage_height(1_000_000), None);
    }

    #[test]
    fn last_reward_height_value() {
        let s = schedule_from(0);
        assert_eq!(s.last_reward_height(), Some(999_999));
        assert!(s.reward_per_block(999_999) > 0);
        assert_eq!(s.reward_per_block(1_000_000), 0);
    }

    #[test]
    fn last_reward_height_none_when_start_past_end() {
        let s = schedule_from(2_000_000);
        assert_eq!(s.last_reward_height(), None);
        assert_eq!(s.total_emission().unwrap(), 0);
    }

    #[test]
    fn total_emission_matches_stage_sum() {
        let s = schedule_from(0);
        let mut manual = 0;
        let mut lower = 0;
        for stage in s.stages() {
            manual += (stage.until - lower) as Amount * stage.reward_per_block;
            lower = stage.until;
        }
        assert_eq!(s.total_emission().unwrap(), manual);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn emission_is_additive(
            start in 0u64..50_000,
            a in 0u64..1_200_000,
            b in 0u64..1_200_000,
            c in 0u64..1_200_000,
        ) {
            let mut hs = [a, b, c];
            hs.sort_unstable();
            let [a, b, c] = hs;
            let s = schedule_from(start);
            let whole = s.emission(a, c).unwrap();
            let split = s.emission(a, b).unwrap() + s.emission(b, c).unwrap();
            prop_assert_eq!(whole, split);
        }

        #[test]
        fn emission_matches_per_height_sum(from in 39_900u64..40_100, len in 0u64..200) {
            let s = schedule_from(0);
            let to = from + len;
            let manual: Amount = (from..to).map(|h| s.reward_per_block(h)).sum();
            prop_assert_eq!(s.emission(from, to).unwrap(), manual);
        }

        #[test]
        fn emission_monotone_in_upper_bound(from in 0u64..1_000_000, a in 0u64..500_000, b in 0u64..500_000) {
            let s = schedule_from(0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.emission(from, from + lo).unwrap() <= s.emission(from, from + hi).unwrap());
        }
    }
}
