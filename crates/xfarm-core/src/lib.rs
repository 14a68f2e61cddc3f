//! # xfarm-core
//! Foundation types, the asset-ledger collaborator interface and the
//! reward-emission schedule shared by the XFarm crates.

pub mod asset_ledger;
pub mod constants;
pub mod error;
pub mod schedule;
pub mod traits;
pub mod types;

pub use asset_ledger::MemoryAssetLedger;
pub use schedule::{RewardSchedule, Stage};
pub use traits::{AssetLedger, Journal};
pub use types::{AccountId, Amount, AssetId, Height, PoolId, StreamId, StreamKind, StreamTerms};
