//! The farm facade.
//!
//! [`Farm`] owns the height counter, the asset collaborator, the pool ledger,
//! the vesting ledger and the stream bridge, and exposes every public
//! operation with an explicit caller. Each mutating call runs inside
//! [`Farm::transact`]: the ledgers journal their writes while it runs and
//! replay the journals backwards if the operation fails.

use tracing::{debug, info, warn};

use xfarm_core::error::FarmError;
use xfarm_core::schedule::RewardSchedule;
use xfarm_core::traits::{AssetLedger, Journal};
use xfarm_core::types::{AccountId, Amount, AssetId, Height, PoolId, StreamId, StreamKind};
use xfarm_core::MemoryAssetLedger;
use xfarm_vesting::{CancelReceipt, Stream, StreamBalance, StreamParams, VestingLedger};

use crate::bridge::StreamBridge;
use crate::config::FarmConfig;
use crate::pool::{Payout, PoolLedger, UserPosition};

/// Custody account of the pool ledger: holds stakes and minted rewards.
pub fn pool_account() -> AccountId {
    AccountId::derive(b"xfarm/pool-ledger")
}

/// Custody account of the vesting ledger.
pub fn vesting_account() -> AccountId {
    AccountId::derive(b"xfarm/vesting-ledger")
}

/// Account of the stream bridge, sender of every reward stream.
pub fn bridge_account() -> AccountId {
    AccountId::derive(b"xfarm/stream-bridge")
}

#[derive(Clone, Debug)]
pub struct Farm<L: AssetLedger + Journal> {
    height: Height,
    assets: L,
    pools: PoolLedger,
    vesting: VestingLedger,
    bridge: StreamBridge,
    /// Set while a transaction is open.
    in_transaction: bool,
}

impl<L: AssetLedger + Journal> Farm<L> {
    /// Build a farm over an existing asset collaborator.
    ///
    /// The collaborator must already grant [`pool_account`] the minter role
    /// for the reward asset; otherwise settlements fail with `Unauthorized`.
    pub fn new(config: &FarmConfig, mut assets: L) -> Result<Self, FarmError> {
        config.validate()?;
        let schedule = config.schedule()?;
        // The bridge pulls settled reward out of pool custody.
        assets.approve(&config.reward_asset, &pool_account(), &bridge_account(), Amount::MAX)?;

        info!(
            admin = %config.admin,
            start = config.start_height,
            stages = config.stages.len(),
            "farm initialised"
        );
        Ok(Self {
            height: 0,
            assets,
            pools: PoolLedger::new(
                pool_account(),
                config.admin,
                config.reward_asset,
                schedule,
                config.first_deposit_bonus,
            ),
            vesting: VestingLedger::new(vesting_account()),
            bridge: StreamBridge::new(
                bridge_account(),
                config.reward_asset,
                config.normal_terms,
                config.voting_terms,
            ),
            in_transaction: false,
        })
    }

    // --- height ---

    pub fn height(&self) -> Height {
        self.height
    }

    /// Move the height counter to `height`. Staying put is allowed.
    pub fn advance_to(&mut self, height: Height) -> Result<(), FarmError> {
        if height < self.height {
            return Err(FarmError::HeightRegression {
                current: self.height,
                requested: height,
            });
        }
        self.height = height;
        Ok(())
    }

    // --- component access ---

    pub fn assets(&self) -> &L {
        &self.assets
    }

    /// Direct access to the collaborator, e.g. to fund accounts in tests.
    pub fn assets_mut(&mut self) -> &mut L {
        &mut self.assets
    }

    pub fn pools(&self) -> &PoolLedger {
        &self.pools
    }

    pub fn vesting(&self) -> &VestingLedger {
        &self.vesting
    }

    pub fn bridge(&self) -> &StreamBridge {
        &self.bridge
    }

    pub fn schedule(&self) -> &RewardSchedule {
        self.pools.schedule()
    }

    pub fn reward_asset(&self) -> AssetId {
        self.pools.reward_asset()
    }

    /// Run `op` as one all-or-nothing operation.
    ///
    /// Every ledger journals its writes while `op` runs. On error the
    /// journals are replayed newest first and the height is restored, so a
    /// rollback costs what the operation touched. A `transact` inside `op`
    /// joins the enclosing transaction.
    pub fn transact<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, FarmError>,
    ) -> Result<T, FarmError> {
        if self.in_transaction {
            return op(self);
        }
        let height = self.height;
        self.in_transaction = true;
        for journal in self.journals() {
            journal.begin();
        }
        let result = op(self);
        self.in_transaction = false;

        match result {
            Ok(value) => {
                for journal in self.journals() {
                    journal.commit();
                }
                Ok(value)
            }
            Err(e) => {
                for journal in self.journals() {
                    journal.rollback();
                }
                self.height = height;
                warn!(op = name, height = self.height, error = %e, "operation rolled back");
                Err(e)
            }
        }
    }

    fn journals(&mut self) -> [&mut dyn Journal; 4] {
        [&mut self.assets, &mut self.pools, &mut self.vesting, &mut self.bridge]
    }

    fn route(&mut self, payouts: Vec<Payout>) -> Result<(), FarmError> {
        let funder = self.pools.account();
        for p in payouts {
            self.bridge.route_reward(
                &mut self.assets,
                &mut self.vesting,
                self.height,
                &funder,
                &p.account,
                p.kind,
                p.amount,
            )?;
        }
        Ok(())
    }

    // --- pool administration ---

    pub fn add_pool(&mut self, caller: &AccountId, entries: &[(AssetId, u64)], is_voting: bool) -> Result<PoolId, FarmError> {
        self.transact("add_pool", |f| {
            Ok(f.pools.add_pool(&mut f.assets, f.height, caller, entries, is_voting)?)
        })
    }

    pub fn add_asset_to_pool(&mut self, caller: &AccountId, pool: PoolId, asset: AssetId, weight: u64) -> Result<(), FarmError> {
        self.transact("add_asset_to_pool", |f| {
            Ok(f.pools.add_asset_to_pool(&mut f.assets, f.height, caller, pool, asset, weight)?)
        })
    }

    pub fn set_weight(&mut self, caller: &AccountId, pool: PoolId, asset: AssetId, weight: u64) -> Result<(), FarmError> {
        self.transact("set_weight", |f| {
            Ok(f.pools.set_weight(&mut f.assets, f.height, caller, pool, asset, weight)?)
        })
    }

    pub fn set_voting_pool(&mut self, caller: &AccountId, pool: Option<PoolId>) -> Result<(), FarmError> {
        self.transact("set_voting_pool", |f| Ok(f.pools.set_voting_pool(caller, pool)?))
    }

    pub fn mass_update_pools(&mut self) -> Result<(), FarmError> {
        self.transact("mass_update_pools", |f| {
            Ok(f.pools.mass_update_pools(&mut f.assets, f.height)?)
        })
    }

    // --- staking ---

    pub fn deposit(&mut self, caller: &AccountId, pool: PoolId, asset: AssetId, amount: Amount) -> Result<(), FarmError> {
        self.transact("deposit", |f| {
            let payouts = f.pools.deposit(&mut f.assets, f.height, caller, pool, asset, amount)?;
            f.route(payouts)
        })
    }

    pub fn withdraw(&mut self, caller: &AccountId, pool: PoolId, asset: AssetId, amount: Amount) -> Result<(), FarmError> {
        self.transact("withdraw", |f| {
            let payouts = f.pools.withdraw(&mut f.assets, f.height, caller, pool, asset, amount)?;
            f.route(payouts)
        })
    }

    pub fn harvest(&mut self, caller: &AccountId, pool: PoolId) -> Result<(), FarmError> {
        self.transact("harvest", |f| {
            let payouts = f.pools.harvest(&mut f.assets, f.height, caller, pool)?;
            f.route(payouts)
        })
    }

    pub fn emergency_withdraw(&mut self, caller: &AccountId, pool: PoolId) -> Result<Vec<(AssetId, Amount)>, FarmError> {
        self.transact("emergency_withdraw", |f| {
            Ok(f.pools.emergency_withdraw(&mut f.assets, f.height, caller, pool)?)
        })
    }

    // --- queries ---

    pub fn pending_reward(&self, pool: PoolId, account: &AccountId) -> Result<Amount, FarmError> {
        Ok(self.pools.pending_reward(pool, account, self.height)?)
    }

    pub fn position(&self, pool: PoolId, account: &AccountId) -> Option<&UserPosition> {
        self.pools.position(pool, account)
    }

    pub fn emission(&self, from: Height, to: Height) -> Result<Amount, FarmError> {
        Ok(self.schedule().emission(from, to)?)
    }

    pub fn stream(&self, id: StreamId) -> Result<&Stream, FarmError> {
        Ok(self.vesting.stream(id)?)
    }

    pub fn stream_balance(&self, id: StreamId) -> Result<StreamBalance, FarmError> {
        Ok(self.vesting.balance_of(id, self.height)?)
    }

    pub fn stream_of(&self, account: &AccountId, kind: StreamKind) -> Option<StreamId> {
        self.bridge.stream_id(account, kind)
    }

    // --- vesting ---

    pub fn create_stream(&mut self, caller: &AccountId, params: StreamParams) -> Result<StreamId, FarmError> {
        self.transact("create_stream", |f| {
            Ok(f.vesting.create_stream(&mut f.assets, f.height, *caller, params)?)
        })
    }

    pub fn fund_stream(&mut self, caller: &AccountId, id: StreamId, amount: Amount) -> Result<(), FarmError> {
        self.transact("fund_stream", |f| {
            Ok(f.vesting.fund_stream(&mut f.assets, f.height, *caller, id, amount)?)
        })
    }

    pub fn lazy_fund_stream(&mut self, caller: &AccountId, id: StreamId, amount: Amount) -> Result<(), FarmError> {
        self.transact("lazy_fund_stream", |f| {
            Ok(f.vesting.lazy_fund_stream(&mut f.assets, f.height, *caller, id, amount)?)
        })
    }

    pub fn single_fund_stream(&mut self, caller: &AccountId, id: StreamId, amount: Amount) -> Result<(), FarmError> {
        self.transact("single_fund_stream", |f| {
            Ok(f.vesting.single_fund_stream(&mut f.assets, f.height, *caller, id, amount)?)
        })
    }

    pub fn withdraw_from_stream(&mut self, caller: &AccountId, id: StreamId, amount: Amount) -> Result<(), FarmError> {
        self.transact("withdraw_from_stream", |f| {
            Ok(f.vesting.withdraw_from_stream(&mut f.assets, f.height, *caller, id, amount)?)
        })
    }

    pub fn cancel_stream(&mut self, caller: &AccountId, id: StreamId) -> Result<CancelReceipt, FarmError> {
        self.transact("cancel_stream", |f| {
            Ok(f.vesting.cancel_stream(&mut f.assets, f.height, *caller, id)?)
        })
    }

    // --- bridge ---

    /// Open a bridge-owned `kind` stream for `recipient`, funded by `caller`.
    pub fn create_reward_stream(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        kind: StreamKind,
        deposit: Amount,
        start_height: Height,
    ) -> Result<StreamId, FarmError> {
        self.transact("create_reward_stream", |f| {
            Ok(f.bridge.create_stream(
                &mut f.assets,
                &mut f.vesting,
                f.height,
                caller,
                recipient,
                kind,
                deposit,
                start_height,
            )?)
        })
    }

    pub fn fund_reward_stream(&mut self, caller: &AccountId, id: StreamId, amount: Amount) -> Result<(), FarmError> {
        self.transact("fund_reward_stream", |f| {
            Ok(f.bridge.fund_stream(&mut f.assets, &mut f.vesting, f.height, caller, id, amount)?)
        })
    }

    /// Withdraw from the caller's own `kind` reward stream.
    pub fn withdraw_reward(&mut self, caller: &AccountId, kind: StreamKind, amount: Amount) -> Result<(), FarmError> {
        self.transact("withdraw_reward", |f| {
            Ok(f.bridge.withdraw(&mut f.assets, &mut f.vesting, f.height, caller, kind, amount)?)
        })
    }
}

/// Everything a [`Farm`] over [`MemoryAssetLedger`] owns, in encodable form.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Snapshot {
    pub height: Height,
    pub assets: MemoryAssetLedger,
    pub pools: PoolLedger,
    pub vesting: VestingLedger,
    pub bridge: StreamBridge,
}

impl Snapshot {
    pub fn encode(&self) -> Result<Vec<u8>, FarmError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| FarmError::Snapshot(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FarmError> {
        let (snapshot, read) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| FarmError::Snapshot(e.to_string()))?;
        if read != bytes.len() {
            return Err(FarmError::Snapshot(format!(
                "{} trailing bytes after snapshot",
                bytes.len() - read
            )));
        }
        Ok(snapshot)
    }
}

impl Farm<MemoryAssetLedger> {
    /// Build a farm over a fresh in-memory asset ledger, granting the pool
    /// ledger the reward minter role.
    pub fn in_memory(config: &FarmConfig) -> Result<Self, FarmError> {
        let mut assets = MemoryAssetLedger::new();
        assets.add_minter(config.reward_asset, pool_account());
        Self::new(config, assets)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            height: self.height,
            assets: self.assets.clone(),
            pools: self.pools.clone(),
            vesting: self.vesting.clone(),
            bridge: self.bridge.clone(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            height: snapshot.height,
            assets: snapshot.assets,
            pools: snapshot.pools,
            vesting: snapshot.vesting,
            bridge: snapshot.bridge,
            in_transaction: false,
        }
    }

    /// Encode the full farm state with bincode.
    pub fn snapshot(&self) -> Result<Vec<u8>, FarmError> {
        let bytes = self.to_snapshot().encode()?;
        debug!(height = self.height, bytes = bytes.len(), "snapshot encoded");
        Ok(bytes)
    }

    /// Rebuild a farm from [`Farm::snapshot`] output.
    pub fn restore(bytes: &[u8]) -> Result<Self, FarmError> {
        Ok(Self::from_snapshot(Snapshot::decode(bytes)?))
    }
}
