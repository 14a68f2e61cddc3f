//! Stream records.

use serde::{Deserialize, Serialize};

use xfarm_core::error::VestingError;
use xfarm_core::types::{AccountId, Amount, AssetId, Height, StreamId, StreamTerms};

use crate::decay::{apply_decay, base_for_funding};

/// Lifecycle state of a stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    /// Paid out and refunded; accepts no further funding.
    Canceled,
}

/// One vesting stream.
///
/// Balance fields partition everything ever deposited:
/// `deposit_amount == remaining + withdrawable + withdrawn + refunded`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Stream {
    pub id: StreamId,
    pub asset: AssetId,
    pub sender: AccountId,
    pub recipient: AccountId,
    /// Cumulative total ever deposited, including lazy funding.
    pub deposit_amount: Amount,
    pub start_height: Height,
    pub period: Height,
    /// Fraction of `remaining` unlocked per period, in parts per billion.
    pub unlock_ratio: u64,
    /// Still-locked principal as of the last commit.
    pub remaining: Amount,
    /// Unlocked and not yet paid out.
    pub withdrawable: Amount,
    pub withdrawn: Amount,
    pub refunded: Amount,
    /// Start of the current period: `start_height` plus whole periods.
    pub last_accrual_height: Height,
    /// Principal the decay curve runs from at `last_accrual_height`.
    pub period_base: Amount,
    pub status: StreamStatus,
}

/// Point-in-time view of a stream's balances.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamBalance {
    pub remaining: Amount,
    pub withdrawable: Amount,
}

impl Stream {
    pub fn terms(&self) -> StreamTerms {
        StreamTerms {
            period: self.period,
            unlock_ratio: self.unlock_ratio,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StreamStatus::Active
    }

    /// Balances as of `now`, computed without touching the record.
    pub fn balance_at(&self, now: Height) -> Result<StreamBalance, VestingError> {
        let snap = apply_decay(self, now)?;
        Ok(StreamBalance {
            remaining: snap.remaining,
            withdrawable: snap.withdrawable,
        })
    }

    /// Commit decay up to `now`.
    pub fn commit(&mut self, now: Height) -> Result<(), VestingError> {
        let snap = apply_decay(self, now)?;
        self.remaining = snap.remaining;
        self.withdrawable = snap.withdrawable;
        self.last_accrual_height = snap.last_accrual_height;
        self.period_base = snap.period_base;
        Ok(())
    }

    /// Add `amount` of locked principal that starts decaying at `now`.
    /// Expects the stream to be committed at `now`.
    pub(crate) fn add_principal(&mut self, now: Height, amount: Amount) -> Result<(), VestingError> {
        let base = base_for_funding(self, now, amount)?;
        self.grow(amount, base)
    }

    /// Add `amount` of locked principal at the anchor, without a commit: it
    /// decays from `last_accrual_height` as if it had been there since.
    pub(crate) fn add_principal_at_anchor(&mut self, amount: Amount) -> Result<(), VestingError> {
        self.grow(amount, amount)
    }

    fn grow(&mut self, amount: Amount, base: Amount) -> Result<(), VestingError> {
        self.remaining = self
            .remaining
            .checked_add(amount)
            .ok_or(VestingError::ArithmeticOverflow)?;
        self.period_base = self
            .period_base
            .checked_add(base)
            .ok_or(VestingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Sum of every balance bucket; equals `deposit_amount` on a consistent record.
    pub fn accounted(&self) -> Amount {
        self.remaining
            .saturating_add(self.withdrawable)
            .saturating_add(self.withdrawn)
            .saturating_add(self.refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfarm_core::constants::RATIO_PRECISION;

    fn stream(deposit: Amount) -> Stream {
        Stream {
            id: StreamId(1),
            asset: AssetId::derive(b"xdex"),
            sender: AccountId::derive(b"bridge"),
            recipient: AccountId::derive(b"alice"),
            deposit_amount: deposit,
            start_height: 100,
            period: 10,
            unlock_ratio: RATIO_PRECISION / 2,
            remaining: deposit,
            withdrawable: 0,
            withdrawn: 0,
            refunded: 0,
            last_accrual_height: 100,
            period_base: deposit,
            status: StreamStatus::Active,
        }
    }

    #[test]
    fn principal_added_at_anchor_decays_from_the_anchor() {
        let mut s = stream(1_000);
        s.add_principal_at_anchor(200).unwrap();
        s.deposit_amount += 200;
        let b = s.balance_at(105).unwrap();
        assert_eq!(b.remaining, 900);
        assert_eq!(b.withdrawable, 300);
        assert_eq!(s.balance_at(110).unwrap().remaining, 600);
    }

    #[test]
    fn commit_keeps_the_period_grid() {
        let mut s = stream(1_000);
        s.commit(127).unwrap();
        assert_eq!(s.last_accrual_height, 120);
        assert_eq!(s.period_base, 250);
        assert_eq!(s.remaining, 163);
        assert_eq!(s.accounted(), s.deposit_amount);
    }

    #[test]
    fn principal_added_mid_period_starts_decaying_now() {
        let mut s = stream(1_000);
        s.commit(105).unwrap();
        assert_eq!((s.remaining, s.withdrawable), (750, 250));
        s.add_principal(105, 400).unwrap();
        s.deposit_amount += 400;
        assert_eq!(s.period_base, 1_534);
        // Nothing unlocks on arrival.
        assert_eq!(s.balance_at(105).unwrap().remaining, 1_150);
        // 750 -> 500 and 400 -> 266.67 over the rest of the period.
        let b = s.balance_at(110).unwrap();
        assert_eq!(b.remaining, 767);
        assert_eq!(b.remaining + b.withdrawable, 1_400);
    }

    #[test]
    fn commit_matches_prior_read() {
        let mut s = stream(10_000);
        let read = s.balance_at(127).unwrap();
        s.commit(127).unwrap();
        assert_eq!(s.remaining, read.remaining);
        assert_eq!(s.withdrawable, read.withdrawable);
    }

    #[test]
    fn terms_reflect_fields() {
        let s = stream(1);
        assert_eq!(s.terms().period, 10);
        assert!(s.is_active());
    }
}
