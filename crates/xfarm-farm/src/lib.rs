//! # xfarm-farm: Weighted staking pools and reward routing.
//!
//! - [`PoolLedger`]: pools, asset weights, positions and reward accrual.
//! - [`StreamBridge`]: maps `(account, kind)` to a vesting stream and routes
//!   settled reward into it.
//! - [`Farm`]: composes both with the vesting ledger, a height counter and an
//!   asset collaborator, and makes every operation all-or-nothing.

pub mod bridge;
pub mod config;
pub mod farm;
pub mod pool;

pub use bridge::StreamBridge;
pub use config::FarmConfig;
pub use farm::{bridge_account, pool_account, vesting_account, Farm, Snapshot};
pub use pool::{AssetWeight, Payout, Pool, PoolLedger, UserPosition, WeightStatus};
