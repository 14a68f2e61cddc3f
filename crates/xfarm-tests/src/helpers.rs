//! Shared helpers for scenario and property tests.

use xfarm_core::constants::ONE;
use xfarm_core::traits::AssetLedger;
use xfarm_core::types::{AccountId, Amount, AssetId, Height, PoolId, StreamKind};
use xfarm_core::MemoryAssetLedger;
use xfarm_farm::{pool_account, vesting_account, Farm, FarmConfig};

/// Farming start height used by every scenario.
pub const START: Height = 1_000;

/// Account derived from a label.
pub fn acct(label: &str) -> AccountId {
    AccountId::derive(label.as_bytes())
}

/// Stakeable asset derived from a label.
pub fn lp(label: &str) -> AssetId {
    AssetId::derive(label.as_bytes())
}

/// Default config starting at [`START`], with or without the deposit bonus.
pub fn config(bonus: bool) -> FarmConfig {
    FarmConfig {
        start_height: START,
        first_deposit_bonus: if bonus { 10 * ONE } else { 0 },
        ..FarmConfig::default()
    }
}

pub fn admin() -> AccountId {
    FarmConfig::default().admin
}

/// In-memory farm at height [`START`].
pub fn farm(bonus: bool) -> Farm<MemoryAssetLedger> {
    let mut farm = Farm::in_memory(&config(bonus)).expect("default config is valid");
    farm.advance_to(START).expect("fresh farm starts at 0");
    farm
}

/// Mint `amount` of `asset` to `who` and approve both custody accounts.
pub fn fund(farm: &mut Farm<MemoryAssetLedger>, who: &AccountId, asset: AssetId, amount: Amount) {
    let faucet = acct("faucet");
    let assets = farm.assets_mut();
    assets.add_minter(asset, faucet);
    assets.mint(&asset, &faucet, who, amount).expect("faucet mint");
    assets
        .approve(&asset, who, &pool_account(), Amount::MAX)
        .expect("approve pool");
    assets
        .approve(&asset, who, &vesting_account(), Amount::MAX)
        .expect("approve vesting");
}

/// Farm with one pool holding `lp-a` at `weight`, and `stakers` funded.
pub fn single_pool_farm(weight: u64, stakers: &[&str], bonus: bool) -> (Farm<MemoryAssetLedger>, PoolId) {
    let mut farm = farm(bonus);
    let pool = farm
        .add_pool(&admin(), &[(lp("lp-a"), weight)], false)
        .expect("admin adds pool");
    for who in stakers {
        fund(&mut farm, &acct(who), lp("lp-a"), 1_000_000 * ONE);
    }
    (farm, pool)
}

/// Sum of deposits into `account`'s `kind` stream, or zero if none exists.
pub fn streamed(farm: &Farm<MemoryAssetLedger>, account: &AccountId, kind: StreamKind) -> Amount {
    farm.stream_of(account, kind)
        .and_then(|id| farm.stream(id).ok())
        .map_or(0, |s| s.deposit_amount)
}

/// Total reward-asset balance held by every custody account and `holders`.
pub fn reward_held(farm: &Farm<MemoryAssetLedger>, holders: &[AccountId]) -> Amount {
    let asset = farm.reward_asset();
    holders
        .iter()
        .chain([pool_account(), vesting_account(), xfarm_farm::bridge_account()].iter())
        .map(|a| farm.assets().balance_of(&asset, a))
        .sum()
}
