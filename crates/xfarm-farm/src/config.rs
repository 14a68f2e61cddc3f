//! Farm configuration.
//!
//! Provides [`FarmConfig`] with defaults for the admin role, reward asset,
//! emission table and stream terms. Every field can be overridden from a
//! config file or the environment by the CLI loader.

use serde::{Deserialize, Serialize};

use xfarm_core::constants::{
    DEFAULT_STAGES, DEFAULT_STAGE_INTERVAL, FIRST_DEPOSIT_BONUS, RATIO_PRECISION,
};
use xfarm_core::error::{FarmError, PoolError, VestingError};
use xfarm_core::schedule::{RewardSchedule, Stage};
use xfarm_core::types::{serde_amount, AccountId, Amount, AssetId, Height, StreamKind, StreamTerms};

/// Configuration for a farm instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FarmConfig {
    /// Account allowed to add pools and change weights.
    pub admin: AccountId,
    /// Asset minted as reward and paid into streams.
    pub reward_asset: AssetId,
    /// First height that emits reward.
    pub start_height: Height,
    /// Every stage boundary must be a multiple of this.
    pub stage_interval: Height,
    pub stages: Vec<Stage>,
    /// One-time reward on an account's first deposit. Zero disables it.
    #[serde(with = "serde_amount")]
    pub first_deposit_bonus: Amount,
    pub normal_terms: StreamTerms,
    pub voting_terms: StreamTerms,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            admin: AccountId::derive(b"admin"),
            reward_asset: AssetId::derive(b"xdex"),
            start_height: 0,
            stage_interval: DEFAULT_STAGE_INTERVAL,
            stages: DEFAULT_STAGES
                .iter()
                .map(|&(until, reward_per_block)| Stage {
                    until,
                    reward_per_block,
                })
                .collect(),
            first_deposit_bonus: FIRST_DEPOSIT_BONUS,
            normal_terms: StreamTerms::default_for(StreamKind::Normal),
            voting_terms: StreamTerms::default_for(StreamKind::Voting),
        }
    }
}

impl FarmConfig {
    /// Build the emission schedule described by this config.
    pub fn schedule(&self) -> Result<RewardSchedule, FarmError> {
        Ok(RewardSchedule::new(
            self.start_height,
            self.stage_interval,
            self.stages.clone(),
        )?)
    }

    /// Reject malformed configuration before any state is built.
    pub fn validate(&self) -> Result<(), FarmError> {
        if self.admin.is_zero() {
            return Err(PoolError::InvalidConfig("admin is the zero account".into()).into());
        }
        self.schedule()?;
        for (kind, terms) in [
            (StreamKind::Normal, self.normal_terms),
            (StreamKind::Voting, self.voting_terms),
        ] {
            if terms.period == 0 {
                return Err(VestingError::InvalidConfig(format!("{kind} period must be positive")).into());
            }
            if terms.unlock_ratio == 0 || terms.unlock_ratio > RATIO_PRECISION {
                return Err(VestingError::InvalidConfig(format!(
                    "{kind} unlock ratio {} outside (0, {RATIO_PRECISION}]",
                    terms.unlock_ratio
                ))
                .into());
            }
        }
        Ok(())
    }
}
