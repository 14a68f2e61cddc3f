//! Scenario files: a JSON list of farm operations replayed in order.
//!
//! ```json
//! { "steps": [
//!     { "op": "mint", "asset": "lp-a", "to": "alice", "amount": "1000000000000000000" },
//!     { "op": "approve", "owner": "alice", "asset": "lp-a" },
//!     { "op": "add_pool", "caller": "admin", "assets": [{ "asset": "lp-a", "weight": 100 }] },
//!     { "op": "deposit", "caller": "alice", "pool": 0, "asset": "lp-a", "amount": "1000000000000000000" },
//!     { "op": "advance", "to": 40 },
//!     { "op": "pending", "pool": 0, "account": "alice" }
//! ] }
//! ```
//!
//! Accounts and assets are labels (or 64 hex characters). Amounts are base
//! units, as integers or decimal strings.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use xfarm_core::traits::AssetLedger;
use xfarm_core::types::{serde_amount, AccountId, Amount, AssetId, Height, PoolId, StreamId, StreamKind, StreamTerms};
use xfarm_core::MemoryAssetLedger;
use xfarm_farm::{bridge_account, pool_account, vesting_account, Farm, FarmConfig};
use xfarm_vesting::StreamParams;

/// Account that holds the minter role for every non-reward asset.
const FAUCET: &[u8] = b"xfarm/faucet";

#[derive(Deserialize, Debug)]
pub struct Scenario {
    /// Replaces the loaded configuration when present.
    #[serde(default)]
    pub config: Option<FarmConfig>,
    pub steps: Vec<Step>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct PoolAsset {
    pub asset: AssetId,
    pub weight: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FundMode {
    #[default]
    Eager,
    Lazy,
    Single,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Advance {
        to: Height,
    },
    Mint {
        asset: AssetId,
        to: AccountId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    /// Approve the pool ledger, vesting ledger and bridge for `asset`.
    Approve {
        owner: AccountId,
        asset: AssetId,
    },
    AddPool {
        caller: AccountId,
        assets: Vec<PoolAsset>,
        #[serde(default)]
        voting: bool,
    },
    AddAsset {
        caller: AccountId,
        pool: PoolId,
        asset: AssetId,
        weight: u64,
    },
    SetWeight {
        caller: AccountId,
        pool: PoolId,
        asset: AssetId,
        weight: u64,
    },
    SetVotingPool {
        caller: AccountId,
        pool: Option<PoolId>,
    },
    MassUpdate,
    Deposit {
        caller: AccountId,
        pool: PoolId,
        asset: AssetId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Withdraw {
        caller: AccountId,
        pool: PoolId,
        asset: AssetId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Harvest {
        caller: AccountId,
        pool: PoolId,
    },
    EmergencyWithdraw {
        caller: AccountId,
        pool: PoolId,
    },
    CreateStream {
        caller: AccountId,
        asset: AssetId,
        recipient: AccountId,
        #[serde(with = "serde_amount")]
        deposit: Amount,
        start_height: Height,
        period: Height,
        unlock_ratio: u64,
    },
    FundStream {
        caller: AccountId,
        stream: StreamId,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(default)]
        mode: FundMode,
    },
    WithdrawStream {
        caller: AccountId,
        stream: StreamId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    CancelStream {
        caller: AccountId,
        stream: StreamId,
    },
    CreateRewardStream {
        caller: AccountId,
        recipient: AccountId,
        kind: StreamKind,
        #[serde(with = "serde_amount")]
        deposit: Amount,
        start_height: Height,
    },
    FundRewardStream {
        caller: AccountId,
        stream: StreamId,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    WithdrawReward {
        caller: AccountId,
        kind: StreamKind,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Pending {
        pool: PoolId,
        account: AccountId,
    },
    Stream {
        stream: StreamId,
    },
    Balance {
        asset: AssetId,
        account: AccountId,
    },
    Emission {
        from: Height,
        to: Height,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Mint { .. } => "mint",
            Self::Approve { .. } => "approve",
            Self::AddPool { .. } => "add_pool",
            Self::AddAsset { .. } => "add_asset",
            Self::SetWeight { .. } => "set_weight",
            Self::SetVotingPool { .. } => "set_voting_pool",
            Self::MassUpdate => "mass_update",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Harvest { .. } => "harvest",
            Self::EmergencyWithdraw { .. } => "emergency_withdraw",
            Self::CreateStream { .. } => "create_stream",
            Self::FundStream { .. } => "fund_stream",
            Self::WithdrawStream { .. } => "withdraw_stream",
            Self::CancelStream { .. } => "cancel_stream",
            Self::CreateRewardStream { .. } => "create_reward_stream",
            Self::FundRewardStream { .. } => "fund_reward_stream",
            Self::WithdrawReward { .. } => "withdraw_reward",
            Self::Pending { .. } => "pending",
            Self::Stream { .. } => "stream",
            Self::Balance { .. } => "balance",
            Self::Emission { .. } => "emission",
        }
    }
}

/// Amounts go out as strings so consumers never truncate a `u128`.
fn amount(value: Amount) -> Value {
    Value::String(value.to_string())
}

/// Apply one step, returning its JSON result.
pub fn apply(farm: &mut Farm<MemoryAssetLedger>, step: &Step) -> Result<Value> {
    let value = match step.clone() {
        Step::Advance { to } => {
            farm.advance_to(to)?;
            json!({ "height": to })
        }
        Step::Mint { asset, to, amount: value } => {
            let faucet = AccountId::derive(FAUCET);
            let minter = if asset == farm.reward_asset() { pool_account() } else { faucet };
            let assets = farm.assets_mut();
            if minter == faucet {
                assets.add_minter(asset, faucet);
            }
            assets.mint(&asset, &minter, &to, value)?;
            json!({ "balance": amount(assets.balance_of(&asset, &to)) })
        }
        Step::Approve { owner, asset } => {
            let assets = farm.assets_mut();
            for spender in [pool_account(), vesting_account(), bridge_account()] {
                assets.approve(&asset, &owner, &spender, Amount::MAX)?;
            }
            Value::Null
        }
        Step::AddPool { caller, assets, voting } => {
            let entries: Vec<(AssetId, u64)> = assets.iter().map(|a| (a.asset, a.weight)).collect();
            let id = farm.add_pool(&caller, &entries, voting)?;
            json!({ "pool": id.0 })
        }
        Step::AddAsset { caller, pool, asset, weight } => {
            farm.add_asset_to_pool(&caller, pool, asset, weight)?;
            Value::Null
        }
        Step::SetWeight { caller, pool, asset, weight } => {
            farm.set_weight(&caller, pool, asset, weight)?;
            Value::Null
        }
        Step::SetVotingPool { caller, pool } => {
            farm.set_voting_pool(&caller, pool)?;
            Value::Null
        }
        Step::MassUpdate => {
            farm.mass_update_pools()?;
            Value::Null
        }
        Step::Deposit { caller, pool, asset, amount } => {
            farm.deposit(&caller, pool, asset, amount)?;
            Value::Null
        }
        Step::Withdraw { caller, pool, asset, amount } => {
            farm.withdraw(&caller, pool, asset, amount)?;
            Value::Null
        }
        Step::Harvest { caller, pool } => {
            farm.harvest(&caller, pool)?;
            Value::Null
        }
        Step::EmergencyWithdraw { caller, pool } => {
            let returned = farm.emergency_withdraw(&caller, pool)?;
            let returned: Vec<Value> = returned
                .into_iter()
                .map(|(asset, value)| json!({ "asset": asset, "amount": amount(value) }))
                .collect();
            json!({ "returned": returned })
        }
        Step::CreateStream { caller, asset, recipient, deposit, start_height, period, unlock_ratio } => {
            let params = StreamParams {
                asset,
                recipient,
                deposit,
                start_height,
                terms: StreamTerms { period, unlock_ratio },
            };
            let id = farm.create_stream(&caller, params)?;
            json!({ "stream": id.0 })
        }
        Step::FundStream { caller, stream, amount, mode } => {
            match mode {
                FundMode::Eager => farm.fund_stream(&caller, stream, amount)?,
                FundMode::Lazy => farm.lazy_fund_stream(&caller, stream, amount)?,
                FundMode::Single => farm.single_fund_stream(&caller, stream, amount)?,
            }
            Value::Null
        }
        Step::WithdrawStream { caller, stream, amount } => {
            farm.withdraw_from_stream(&caller, stream, amount)?;
            Value::Null
        }
        Step::CancelStream { caller, stream } => {
            let receipt = farm.cancel_stream(&caller, stream)?;
            json!({
                "to_recipient": amount(receipt.to_recipient),
                "to_sender": amount(receipt.to_sender),
            })
        }
        Step::CreateRewardStream { caller, recipient, kind, deposit, start_height } => {
            let id = farm.create_reward_stream(&caller, &recipient, kind, deposit, start_height)?;
            json!({ "stream": id.0 })
        }
        Step::FundRewardStream { caller, stream, amount } => {
            farm.fund_reward_stream(&caller, stream, amount)?;
            Value::Null
        }
        Step::WithdrawReward { caller, kind, amount } => {
            farm.withdraw_reward(&caller, kind, amount)?;
            Value::Null
        }
        Step::Pending { pool, account } => {
            json!({ "pending": amount(farm.pending_reward(pool, &account)?) })
        }
        Step::Stream { stream } => {
            let balance = farm.stream_balance(stream)?;
            let record = farm.stream(stream)?;
            json!({
                "status": record.status,
                "deposit": amount(record.deposit_amount),
                "remaining": amount(balance.remaining),
                "withdrawable": amount(balance.withdrawable),
                "withdrawn": amount(record.withdrawn),
            })
        }
        Step::Balance { asset, account } => {
            json!({ "balance": amount(farm.assets().balance_of(&asset, &account)) })
        }
        Step::Emission { from, to } => json!({ "emission": amount(farm.emission(from, to)?) }),
    };
    Ok(value)
}

/// Counts of a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub ok: usize,
    pub failed: usize,
}

/// Replay every step, emitting one JSON line per step through `emit`.
///
/// A failed step is reported and skipped; the farm has already rolled it back.
pub fn run(
    farm: &mut Farm<MemoryAssetLedger>,
    steps: &[Step],
    mut emit: impl FnMut(Value),
) -> Summary {
    let mut summary = Summary::default();
    for (index, step) in steps.iter().enumerate() {
        let line = match apply(farm, step) {
            Ok(result) => {
                summary.ok += 1;
                json!({ "step": index, "op": step.name(), "height": farm.height(), "ok": true, "result": result })
            }
            Err(e) => {
                summary.failed += 1;
                warn!(step = index, op = step.name(), error = %e, "step failed");
                json!({ "step": index, "op": step.name(), "height": farm.height(), "ok": false, "error": e.to_string() })
            }
        };
        emit(line);
    }
    summary
}

/// Parse a scenario file's contents.
pub fn parse(text: &str) -> Result<Scenario> {
    serde_json::from_str(text).context("Invalid scenario file")
}
