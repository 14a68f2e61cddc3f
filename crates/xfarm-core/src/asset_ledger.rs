//! In-memory fungible-asset ledger.
//!
//! [`MemoryAssetLedger`] implements [`AssetLedger`] over ordered maps with no
//! persistence beyond what the owning farm snapshots. Minting is restricted
//! to accounts registered with [`MemoryAssetLedger::add_minter`].
//!
//! While a [`Journal`] transaction is open, every balance, allowance and
//! supply write records the value it replaced.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::error::AssetError;
use crate::traits::{AssetLedger, Journal};
use crate::types::{AccountId, Amount, AssetId};

/// A replaced entry; `None` means the key was absent.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
enum AssetUndo {
    Balance((AssetId, AccountId), Option<Amount>),
    Allowance((AssetId, AccountId, AccountId), Option<Amount>),
    Supply(AssetId, Option<Amount>),
}

/// Balances, allowances, supply and minter roles held in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct MemoryAssetLedger {
    balances: BTreeMap<(AssetId, AccountId), Amount>,
    allowances: BTreeMap<(AssetId, AccountId, AccountId), Amount>,
    supply: BTreeMap<AssetId, Amount>,
    minters: BTreeSet<(AssetId, AccountId)>,
    /// Open transaction, if any.
    undo: Option<Vec<AssetUndo>>,
}

impl MemoryAssetLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `account` the minter role for `asset`.
    pub fn add_minter(&mut self, asset: AssetId, account: AccountId) {
        self.minters.insert((asset, account));
    }

    /// Revoke the minter role.
    pub fn remove_minter(&mut self, asset: &AssetId, account: &AccountId) {
        self.minters.remove(&(*asset, *account));
    }

    /// Number of (asset, account) pairs with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|v| **v > 0).count()
    }

    fn set_balance(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        let key = (*asset, *account);
        let old = self.balances.insert(key, amount);
        if let Some(undo) = &mut self.undo {
            undo.push(AssetUndo::Balance(key, old));
        }
    }

    fn set_allowance(&mut self, asset: &AssetId, owner: &AccountId, spender: &AccountId, amount: Amount) {
        let key = (*asset, *owner, *spender);
        let old = self.allowances.insert(key, amount);
        if let Some(undo) = &mut self.undo {
            undo.push(AssetUndo::Allowance(key, old));
        }
    }

    fn set_supply(&mut self, asset: &AssetId, amount: Amount) {
        let old = self.supply.insert(*asset, amount);
        if let Some(undo) = &mut self.undo {
            undo.push(AssetUndo::Supply(*asset, old));
        }
    }

    /// Debit `from` and credit `to` after both checks have passed.
    fn move_balance(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let have = self.balance_of(asset, from);
        if have < amount {
            return Err(AssetError::InsufficientBalance { have, need: amount });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(AssetError::ArithmeticOverflow)?;
        self.set_balance(asset, from, have - amount);
        self.set_balance(asset, to, credited);
        Ok(())
    }
}

impl AssetLedger for MemoryAssetLedger {
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }

    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, asset: &AssetId) -> Amount {
        self.supply.get(asset).copied().unwrap_or(0)
    }

    fn is_minter(&self, asset: &AssetId, account: &AccountId) -> bool {
        self.minters.contains(&(*asset, *account))
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        self.move_balance(asset, from, to, amount)?;
        trace!(%asset, %from, %to, amount, "transfer");
        Ok(())
    }

    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        self.set_allowance(asset, owner, spender, amount);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            return Err(AssetError::InsufficientAllowance { have: allowed, need: amount });
        }
        self.move_balance(asset, from, to, amount)?;
        // An allowance of Amount::MAX is treated as unlimited.
        if allowed != Amount::MAX {
            self.set_allowance(asset, from, spender, allowed - amount);
        }
        trace!(%asset, %spender, %from, %to, amount, "transfer_from");
        Ok(())
    }

    fn mint(
        &mut self,
        asset: &AssetId,
        minter: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), AssetError> {
        if !self.is_minter(asset, minter) {
            return Err(AssetError::Unauthorized(format!(
                "{minter} is not a minter of {asset}"
            )));
        }
        let supply = self
            .total_supply(asset)
            .checked_add(amount)
            .ok_or(AssetError::ArithmeticOverflow)?;
        let balance = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(AssetError::ArithmeticOverflow)?;
        self.set_supply(asset, supply);
        self.set_balance(asset, to, balance);
        trace!(%asset, %to, amount, "mint");
        Ok(())
    }
}

fn restore<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, old: Option<V>) {
    match old {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl Journal for MemoryAssetLedger {
    fn begin(&mut self) {
        self.undo = Some(Vec::new());
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
                AssetUndo::Balance(key, old) => restore(&mut self.balances, key, old),
                AssetUndo::Allowance(key, old) => restore(&mut self.allowances, key, old),
                AssetUndo::Supply(key, old) => restore(&mut self.supply, key, old),
            }
        }
    }
}
