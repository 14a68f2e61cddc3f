//! Trait interfaces for the XFarm protocol.
//!
//! The fungible-asset ledger is an external collaborator: the pool ledger,
//! the stream bridge and the vesting ledger only ever reach balances through
//! [`AssetLedger`]. [`MemoryAssetLedger`](crate::asset_ledger::MemoryAssetLedger)
//! is the in-process implementation used by the farm facade and tests.

use crate::error::AssetError;
use crate::types::{AccountId, Amount, AssetId};

/// Custody primitives of a fungible-asset ledger.
///
/// Every mutating call is all-or-nothing: on error no balance, allowance or
/// supply has changed.
pub trait AssetLedger: Send + Sync {
    /// Balance of `account` in `asset`. Unknown pairs hold zero.
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount;

    /// Amount `spender` may still move out of `owner`'s balance.
    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount;

    /// Total minted supply of `asset`.
    fn total_supply(&self, asset: &AssetId) -> Amount;

    /// Whether `account` holds the minter role for `asset`.
    fn is_minter(&self, asset: &AssetId, account: &AccountId) -> bool;

    /// Move `amount` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// - [`AssetError::InsufficientBalance`] if `from` holds less than `amount`
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError>;

    /// Set the allowance of `spender` over `owner`'s balance to `amount`.
    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    ///
    /// # Errors
    ///
    /// - [`AssetError::InsufficientAllowance`] if the allowance is below `amount`
    /// - [`AssetError::InsufficientBalance`] if `from` holds less than `amount`
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError>;

    /// Create `amount` new units credited to `to`.
    ///
    /// # Errors
    ///
    /// - [`AssetError::Unauthorized`] if `minter` lacks the minter role
    fn mint(
        &mut self,
        asset: &AssetId,
        minter: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError>;

    /// Whether `account` holds at least `amount` of `asset`.
    ///
    /// Default implementation compares against [`balance_of`](Self::balance_of).
    fn has_balance(&self, asset: &AssetId, account: &AccountId, amount: Amount) -> bool {
        self.balance_of(asset, account) >= amount
    }
}

/// Undo logging for state that takes part in an all-or-nothing operation.
///
/// Between [`begin`](Self::begin) and [`commit`](Self::commit) or
/// [`rollback`](Self::rollback), every write records the value it replaces.
/// Rolling back replays those records newest first, so reverting costs time
/// proportional to what the operation touched rather than to the whole state.
pub trait Journal {
    /// Start recording. A second `begin` without `commit` or `rollback`
    /// discards the earlier records.
    fn begin(&mut self);

    /// Keep every write since `begin` and stop recording.
    fn commit(&mut self);

    /// Revert every write since `begin` and stop recording. Does nothing if
    /// not recording.
    fn rollback(&mut self);
}
