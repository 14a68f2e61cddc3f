//! Weighted multi-asset staking pools.
//!
//! Each pool carries an ordered table of `(asset, weight)` entries and a
//! pool-level accumulator `acc_reward_per_weight`, scaled by
//! [`ACC_PRECISION`]. A position's staked weight is the sum over the pool's
//! active entries of `stake * weight`; its pending reward is
//!
//! ```text
//! accrued + staked_weight * (acc_reward_per_weight - reward_debt) / ACC_PRECISION
//! ```
//!
//! The pool's share of each emission is `weight_sum / total_x_factor`, where
//! `total_x_factor` sums the active weights of every pool. Any change to
//! that table settles every pool first, and any change to an entry's weight
//! checkpoints every position of the pool, so stakers never see reward that
//! already accrued move under them.
//!
//! Settlement mints the pool's share to the ledger's custody account. Payouts
//! are returned to the caller as [`Payout`]s for routing into vesting streams.
//!
//! As a [`Journal`], the ledger saves the pool table once when a transaction
//! opens (it is bounded by the admin) and records each position or bonus
//! write after that.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use xfarm_core::constants::ACC_PRECISION;
use xfarm_core::error::PoolError;
use xfarm_core::schedule::RewardSchedule;
use xfarm_core::traits::{AssetLedger, Journal};
use xfarm_core::types::{AccountId, Amount, AssetId, Height, PoolId, StreamKind};

/// Whether an asset entry still earns reward.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "lowercase")]
pub enum WeightStatus {
    Active,
    /// Weight set to zero. Stakes stay withdrawable but earn nothing.
    Disabled,
}

/// One asset of a pool and its weight.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct AssetWeight {
    pub asset: AssetId,
    pub weight: u64,
    pub status: WeightStatus,
    /// Sum of every position's stake of this asset in the pool.
    pub total_staked: Amount,
}

impl AssetWeight {
    fn new(asset: AssetId, weight: u64) -> Self {
        Self {
            asset,
            weight,
            status: status_for(weight),
            total_staked: 0,
        }
    }

    /// Weight counted toward reward shares; zero when disabled.
    pub fn effective_weight(&self) -> u64 {
        match self.status {
            WeightStatus::Active => self.weight,
            WeightStatus::Disabled => 0,
        }
    }
}

fn status_for(weight: u64) -> WeightStatus {
    if weight == 0 {
        WeightStatus::Disabled
    } else {
        WeightStatus::Active
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Pool {
    pub id: PoolId,
    pub assets: Vec<AssetWeight>,
    pub acc_reward_per_weight: u128,
    pub last_accrual_height: Height,
    /// `Σ total_staked * effective_weight` over the pool's entries.
    pub total_staked_weight: u128,
}

impl Pool {
    /// Sum of the active weights: this pool's numerator in `total_x_factor`.
    pub fn weight_sum(&self) -> u128 {
        self.assets.iter().map(|a| a.effective_weight() as u128).sum()
    }

    pub fn entry(&self, asset: &AssetId) -> Option<&AssetWeight> {
        self.assets.iter().find(|a| a.asset == *asset)
    }

    fn entry_mut(&mut self, asset: &AssetId) -> Option<&mut AssetWeight> {
        self.assets.iter_mut().find(|a| a.asset == *asset)
    }

    fn recompute_staked_weight(&mut self) -> Result<(), PoolError> {
        let mut total: u128 = 0;
        for a in &self.assets {
            let w = a
                .total_staked
                .checked_mul(a.effective_weight() as u128)
                .ok_or(PoolError::ArithmeticOverflow)?;
            total = total.checked_add(w).ok_or(PoolError::ArithmeticOverflow)?;
        }
        self.total_staked_weight = total;
        Ok(())
    }

    /// Staked weight of `position` under this pool's current weights.
    pub fn staked_weight(&self, position: &UserPosition) -> Result<u128, PoolError> {
        let mut total: u128 = 0;
        for (asset, stake) in &position.stakes {
            let weight = self.entry(asset).map_or(0, AssetWeight::effective_weight);
            let w = stake
                .checked_mul(weight as u128)
                .ok_or(PoolError::ArithmeticOverflow)?;
            total = total.checked_add(w).ok_or(PoolError::ArithmeticOverflow)?;
        }
        Ok(total)
    }

    fn pending_at(&self, position: &UserPosition, acc: u128) -> Result<Amount, PoolError> {
        let weight = self.staked_weight(position)?;
        let delta = acc.saturating_sub(position.reward_debt);
        let fresh = weight
            .checked_mul(delta)
            .ok_or(PoolError::ArithmeticOverflow)?
            / ACC_PRECISION;
        position
            .accrued
            .checked_add(fresh)
            .ok_or(PoolError::ArithmeticOverflow)
    }
}

/// Stakes and accrual checkpoint of one account in one pool.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct UserPosition {
    pub stakes: BTreeMap<AssetId, Amount>,
    /// Accumulator value at the last settlement of this position.
    pub reward_debt: u128,
    /// Reward checkpointed by a weight change and not yet paid out.
    pub accrued: Amount,
}

impl UserPosition {
    pub fn stake(&self, asset: &AssetId) -> Amount {
        self.stakes.get(asset).copied().unwrap_or(0)
    }
}

/// Reward owed to an account, to be routed into a vesting stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub account: AccountId,
    pub kind: StreamKind,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
enum PoolUndo {
    Tables {
        pools: Vec<Pool>,
        total_x_factor: u128,
        voting_pool: Option<PoolId>,
    },
    Position((PoolId, AccountId), Option<UserPosition>),
    Bonus(AccountId),
}

/// The pool table, position table and global weight state.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct PoolLedger {
    account: AccountId,
    admin: AccountId,
    reward_asset: AssetId,
    schedule: RewardSchedule,
    first_deposit_bonus: Amount,
    pools: Vec<Pool>,
    positions: BTreeMap<(PoolId, AccountId), UserPosition>,
    total_x_factor: u128,
    voting_pool: Option<PoolId>,
    bonus_claimed: BTreeSet<AccountId>,
    undo: Option<Vec<PoolUndo>>,
}

impl PoolLedger {
    /// Create an empty ledger.
    ///
    /// `account` holds staked assets and minted rewards and must be a minter
    /// of `reward_asset` on the asset collaborator.
    pub fn new(
        account: AccountId,
        admin: AccountId,
        reward_asset: AssetId,
        schedule: RewardSchedule,
        first_deposit_bonus: Amount,
    ) -> Self {
        Self {
            account,
            admin,
            reward_asset,
            schedule,
            first_deposit_bonus,
            pools: Vec::new(),
            positions: BTreeMap::new(),
            total_x_factor: 0,
            voting_pool: None,
            bonus_claimed: BTreeSet::new(),
            undo: None,
        }
    }

    // --- reads ---

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    pub fn reward_asset(&self) -> AssetId {
        self.reward_asset
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, id: PoolId) -> Result<&Pool, PoolError> {
        self.pools.get(id.0 as usize).ok_or(PoolError::PoolNotFound(id))
    }

    fn pool_mut(&mut self, id: PoolId) -> Result<&mut Pool, PoolError> {
        self.pools.get_mut(id.0 as usize).ok_or(PoolError::PoolNotFound(id))
    }

    pub fn position(&self, pool: PoolId, account: &AccountId) -> Option<&UserPosition> {
        self.positions.get(&(pool, *account))
    }

    /// Every position of `pool`, ordered by account.
    pub fn positions_in(&self, pool: PoolId) -> impl Iterator<Item = (&AccountId, &UserPosition)> {
        self.positions
            .range((pool, AccountId::ZERO)..=(pool, AccountId::MAX))
            .map(|((_, account), position)| (account, position))
    }

    pub fn positions(&self) -> impl Iterator<Item = (&(PoolId, AccountId), &UserPosition)> {
        self.positions.iter()
    }

    pub fn total_x_factor(&self) -> u128 {
        self.total_x_factor
    }

    pub fn voting_pool(&self) -> Option<PoolId> {
        self.voting_pool
    }

    pub fn first_deposit_bonus(&self) -> Amount {
        self.first_deposit_bonus
    }

    pub fn has_claimed_bonus(&self, account: &AccountId) -> bool {
        self.bonus_claimed.contains(account)
    }

    /// Stream kind rewards of `pool` are routed to.
    pub fn stream_kind(&self, pool: PoolId) -> StreamKind {
        if self.voting_pool == Some(pool) {
            StreamKind::Voting
        } else {
            StreamKind::Normal
        }
    }

    /// Reward `pool` would mint for `[last_accrual_height, now)`.
    fn pool_reward(&self, pool: &Pool, now: Height) -> Result<Amount, PoolError> {
        if now <= pool.last_accrual_height
            || pool.total_staked_weight == 0
            || self.total_x_factor == 0
        {
            return Ok(0);
        }
        let weight_sum = pool.weight_sum();
        if weight_sum == 0 {
            return Ok(0);
        }
        let emission = self.schedule.emission(pool.last_accrual_height, now)?;
        Ok(mul_div(emission, weight_sum, self.total_x_factor)?)
    }

    /// Accumulator value `pool` would reach at `now`.
    fn accumulator_at(&self, pool: &Pool, now: Height) -> Result<u128, PoolError> {
        let reward = self.pool_reward(pool, now)?;
        if reward == 0 {
            return Ok(pool.acc_reward_per_weight);
        }
        let step = reward
            .checked_mul(ACC_PRECISION)
            .ok_or(PoolError::ArithmeticOverflow)?
            / pool.total_staked_weight;
        pool.acc_reward_per_weight
            .checked_add(step)
            .ok_or(PoolError::ArithmeticOverflow)
    }

    /// Reward `account` could harvest from `pool` at `now`. Never mutates.
    ///
    /// # Errors
    ///
    /// [`PoolError::PositionNotFound`] if the pool or the position is unknown.
    pub fn pending_reward(&self, pool: PoolId, account: &AccountId, now: Height) -> Result<Amount, PoolError> {
        let not_found = || PoolError::PositionNotFound { pool, account: *account };
        let p = self.pool(pool).map_err(|_| not_found())?;
        let position = self.position(pool, account).ok_or_else(not_found)?;
        let acc = self.accumulator_at(p, now)?;
        p.pending_at(position, acc)
    }

    // --- settlement ---

    /// Bring `pool` up to `now`, minting its share of emission.
    fn settle_pool<L: AssetLedger>(&mut self, assets: &mut L, id: PoolId, now: Height) -> Result<(), PoolError> {
        let pool = self.pool(id)?;
        if now <= pool.last_accrual_height {
            return Ok(());
        }
        let reward = self.pool_reward(pool, now)?;
        let acc = self.accumulator_at(pool, now)?;
        if reward > 0 {
            assets.mint(&self.reward_asset, &self.account, &self.account, reward)?;
        }
        let pool = self.pool_mut(id)?;
        pool.acc_reward_per_weight = acc;
        pool.last_accrual_height = now;
        debug!(pool = %id, reward, acc, height = now, "pool settled");
        Ok(())
    }

    /// Settle every pool up to `now`.
    pub fn mass_update_pools<L: AssetLedger>(&mut self, assets: &mut L, now: Height) -> Result<(), PoolError> {
        for i in 0..self.pools.len() {
            self.settle_pool(assets, PoolId(i as u32), now)?;
        }
        Ok(())
    }

    /// Save the current value of a position before it is written.
    fn record_position(&mut self, key: (PoolId, AccountId)) {
        if let Some(undo) = &mut self.undo {
            undo.push(PoolUndo::Position(key, self.positions.get(&key).cloned()));
        }
    }

    /// Move every position's pending reward in `pool` into `accrued`.
    fn checkpoint_positions(&mut self, id: PoolId) -> Result<(), PoolError> {
        let range = (id, AccountId::ZERO)..=(id, AccountId::MAX);
        if let Some(undo) = &mut self.undo {
            undo.extend(
                self.positions
                    .range(range.clone())
                    .map(|(key, position)| PoolUndo::Position(*key, Some(position.clone()))),
            );
        }
        let pool = self.pools.get(id.0 as usize).ok_or(PoolError::PoolNotFound(id))?;
        let acc = pool.acc_reward_per_weight;
        for (_, position) in self.positions.range_mut(range) {
            position.accrued = pool.pending_at(position, acc)?;
            position.reward_debt = acc;
        }
        Ok(())
    }

    fn recompute_x_factor(&mut self) {
        self.total_x_factor = self.pools.iter().map(Pool::weight_sum).sum();
    }

    fn require_admin(&self, caller: &AccountId) -> Result<(), PoolError> {
        if *caller != self.admin {
            return Err(PoolError::Unauthorized(format!("{caller} is not the pool admin")));
        }
        Ok(())
    }

    // --- administration ---

    /// Append a pool with the given asset weights.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unauthorized`] if `caller` is not the admin
    /// - [`PoolError::InvalidConfig`] for an empty or duplicated asset list
    pub fn add_pool<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        entries: &[(AssetId, u64)],
        is_voting: bool,
    ) -> Result<PoolId, PoolError> {
        self.require_admin(caller)?;
        if entries.is_empty() {
            return Err(PoolError::InvalidConfig("pool needs at least one asset".into()));
        }
        let mut seen = BTreeSet::new();
        for (asset, _) in entries {
            if !seen.insert(*asset) {
                return Err(PoolError::InvalidConfig(format!("asset {asset} listed twice")));
            }
        }
        let id = PoolId(
            u32::try_from(self.pools.len())
                .map_err(|_| PoolError::InvalidConfig("pool table is full".into()))?,
        );

        self.mass_update_pools(assets, now)?;
        self.pools.push(Pool {
            id,
            assets: entries.iter().map(|&(a, w)| AssetWeight::new(a, w)).collect(),
            acc_reward_per_weight: 0,
            last_accrual_height: now,
            total_staked_weight: 0,
        });
        self.recompute_x_factor();
        if is_voting {
            self.voting_pool = Some(id);
        }

        info!(pool = %id, assets = entries.len(), is_voting, total_x_factor = self.total_x_factor, "pool added");
        Ok(id)
    }

    /// Register another asset in an existing pool.
    pub fn add_asset_to_pool<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
        asset: AssetId,
        weight: u64,
    ) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        if self.pool(id)?.entry(&asset).is_some() {
            return Err(PoolError::InvalidConfig(format!("asset {asset} already in {id}")));
        }
        self.mass_update_pools(assets, now)?;
        self.pool_mut(id)?.assets.push(AssetWeight::new(asset, weight));
        self.recompute_x_factor();
        info!(pool = %id, %asset, weight, "asset added to pool");
        Ok(())
    }

    /// Change the weight of `asset` in pool `id`. Zero disables the entry.
    ///
    /// Every pool is settled under the old weights and every position of the
    /// pool is checkpointed before the new weight takes effect.
    pub fn set_weight<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
        asset: AssetId,
        weight: u64,
    ) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        let old = self
            .pool(id)?
            .entry(&asset)
            .map(|e| e.weight)
            .ok_or_else(|| PoolError::InvalidConfig(format!("asset {asset} not in {id}")))?;

        self.mass_update_pools(assets, now)?;
        self.checkpoint_positions(id)?;

        let pool = self.pool_mut(id)?;
        if let Some(entry) = pool.entry_mut(&asset) {
            entry.weight = weight;
            entry.status = status_for(weight);
        }
        pool.recompute_staked_weight()?;
        self.recompute_x_factor();

        info!(pool = %id, %asset, old, new = weight, total_x_factor = self.total_x_factor, "weight changed");
        Ok(())
    }

    /// Designate the pool whose rewards route to voting streams.
    pub fn set_voting_pool(&mut self, caller: &AccountId, id: Option<PoolId>) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        if let Some(id) = id {
            self.pool(id)?;
        }
        self.voting_pool = id;
        info!(pool = ?id.map(|p| p.0), "voting pool set");
        Ok(())
    }

    // --- staking ---

    /// Settle `pool` and the caller's position, returning the pending reward
    /// as a payout and resetting the checkpoint.
    fn harvest_position<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        account: &AccountId,
        id: PoolId,
    ) -> Result<Option<Payout>, PoolError> {
        self.settle_pool(assets, id, now)?;
        let kind = self.stream_kind(id);
        let pool = self.pool(id)?;
        let acc = pool.acc_reward_per_weight;
        let Some(position) = self.positions.get(&(id, *account)) else {
            return Ok(None);
        };
        let pending = pool.pending_at(position, acc)?;
        self.record_position((id, *account));
        if let Some(position) = self.positions.get_mut(&(id, *account)) {
            position.accrued = 0;
            position.reward_debt = acc;
        }
        Ok((pending > 0).then_some(Payout {
            account: *account,
            kind,
            amount: pending,
        }))
    }

    fn entry_of(&self, id: PoolId, asset: &AssetId) -> Result<&AssetWeight, PoolError> {
        self.pool(id)?
            .entry(asset)
            .ok_or_else(|| PoolError::InvalidConfig(format!("asset {asset} not in {id}")))
    }

    /// Stake `amount` of `asset` into pool `id`. A zero amount only harvests.
    ///
    /// The first non-zero deposit of an account into any pool also yields the
    /// first-deposit bonus as a normal-stream payout.
    pub fn deposit<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Vec<Payout>, PoolError> {
        if self.entry_of(id, &asset)?.status == WeightStatus::Disabled && amount > 0 {
            return Err(PoolError::InvalidConfig(format!("asset {asset} is disabled in {id}")));
        }

        let mut payouts: Vec<Payout> = self.harvest_position(assets, now, caller, id)?.into_iter().collect();
        let acc = self.pool(id)?.acc_reward_per_weight;

        if amount > 0 {
            assets.transfer_from(&asset, &self.account, caller, &self.account, amount)?;
        }
        self.record_position((id, *caller));
        let position = self.positions.entry((id, *caller)).or_default();
        position.reward_debt = acc;
        let stake = position.stakes.entry(asset).or_insert(0);
        *stake = stake.checked_add(amount).ok_or(PoolError::ArithmeticOverflow)?;

        let pool = self.pool_mut(id)?;
        if let Some(entry) = pool.entry_mut(&asset) {
            entry.total_staked = entry
                .total_staked
                .checked_add(amount)
                .ok_or(PoolError::ArithmeticOverflow)?;
        }
        pool.recompute_staked_weight()?;

        if amount > 0 && self.first_deposit_bonus > 0 && self.bonus_claimed.insert(*caller) {
            if let Some(undo) = &mut self.undo {
                undo.push(PoolUndo::Bonus(*caller));
            }
            assets.mint(&self.reward_asset, &self.account, &self.account, self.first_deposit_bonus)?;
            payouts.push(Payout {
                account: *caller,
                kind: StreamKind::Normal,
                amount: self.first_deposit_bonus,
            });
            debug!(account = %caller, bonus = self.first_deposit_bonus, "first-deposit bonus");
        }

        debug!(pool = %id, account = %caller, %asset, amount, "deposit");
        Ok(payouts)
    }

    /// Unstake `amount` of `asset` from pool `id`, harvesting pending reward.
    pub fn withdraw<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Vec<Payout>, PoolError> {
        self.entry_of(id, &asset)?;
        let have = self
            .position(id, caller)
            .ok_or(PoolError::PositionNotFound { pool: id, account: *caller })?
            .stake(&asset);
        if have < amount {
            return Err(PoolError::InsufficientStake { have, need: amount });
        }

        let payouts: Vec<Payout> = self.harvest_position(assets, now, caller, id)?.into_iter().collect();

        self.record_position((id, *caller));
        if let Some(position) = self.positions.get_mut(&(id, *caller)) {
            position.stakes.insert(asset, have - amount);
        }
        let pool = self.pool_mut(id)?;
        if let Some(entry) = pool.entry_mut(&asset) {
            entry.total_staked = entry.total_staked.saturating_sub(amount);
        }
        pool.recompute_staked_weight()?;

        if amount > 0 {
            assets.transfer(&asset, &self.account, caller, amount)?;
        }
        debug!(pool = %id, account = %caller, %asset, amount, "withdraw");
        Ok(payouts)
    }

    /// Harvest pending reward from pool `id` without changing stakes.
    pub fn harvest<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
    ) -> Result<Vec<Payout>, PoolError> {
        self.pool(id)?;
        if self.position(id, caller).is_none() {
            return Err(PoolError::PositionNotFound { pool: id, account: *caller });
        }
        Ok(self.harvest_position(assets, now, caller, id)?.into_iter().collect())
    }

    /// Return every stake the caller holds in pool `id`, forfeiting reward.
    ///
    /// Returns the `(asset, amount)` pairs paid back.
    pub fn emergency_withdraw<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: &AccountId,
        id: PoolId,
    ) -> Result<Vec<(AssetId, Amount)>, PoolError> {
        self.pool(id)?;
        if self.position(id, caller).is_none() {
            return Err(PoolError::PositionNotFound { pool: id, account: *caller });
        }
        // Other stakers' share up to now must be fixed before the weight leaves.
        self.settle_pool(assets, id, now)?;
        self.record_position((id, *caller));
        let position = self
            .positions
            .remove(&(id, *caller))
            .ok_or(PoolError::PositionNotFound { pool: id, account: *caller })?;

        let pool = self.pool_mut(id)?;
        let mut returned = Vec::new();
        for (asset, stake) in position.stakes {
            if stake == 0 {
                continue;
            }
            if let Some(entry) = pool.entry_mut(&asset) {
                entry.total_staked = entry.total_staked.saturating_sub(stake);
            }
            returned.push((asset, stake));
        }
        pool.recompute_staked_weight()?;

        for (asset, stake) in &returned {
            assets.transfer(asset, &self.account, caller, *stake)?;
        }
        info!(pool = %id, account = %caller, assets = returned.len(), "emergency withdraw");
        Ok(returned)
    }
}

impl Journal for PoolLedger {
    fn begin(&mut self) {
        self.undo = Some(vec![PoolUndo::Tables {
            pools: self.pools.clone(),
            total_x_factor: self.total_x_factor,
            voting_pool: self.voting_pool,
        }]);
    }

    fn commit(&mut self) {
        self.undo = None;
    }

    fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for entry in undo.into_iter().rev() {
            match entry {
                PoolUndo::Tables {
                    pools,
                    total_x_factor,
                    voting_pool,
                } => {
                    self.pools = pools;
                    self.total_x_factor = total_x_factor;
                    self.voting_pool = voting_pool;
                }
                PoolUndo::Position(key, Some(position)) => {
                    self.positions.insert(key, position);
                }
                PoolUndo::Position(key, None) => {
                    self.positions.remove(&key);
                }
                PoolUndo::Bonus(account) => {
                    self.bonus_claimed.remove(&account);
                }
            }
        }
    }
}

/// `value * num / den`, split to keep the product in range.
fn mul_div(value: Amount, num: u128, den: u128) -> Result<Amount, PoolError> {
    let whole = value / den;
    let rest = value % den;
    let a = whole.checked_mul(num).ok_or(PoolError::ArithmeticOverflow)?;
    let b = rest.checked_mul(num).ok_or(PoolError::ArithmeticOverflow)? / den;
    a.checked_add(b).ok_or(PoolError::ArithmeticOverflow)
}
