//! The stream table and its operations.
//!
//! Streams live in an arena indexed by `id - 1`. The ledger holds custody of
//! every deposited asset under its own account on the asset collaborator;
//! funding pulls through `transfer_from` with the ledger as spender, so
//! funders must approve the ledger account first.
//!
//! Outgoing transfers (withdraw, cancel) run after the stream record is
//! final. If the collaborator refuses one, the record is restored.
//!
//! Inside a [`Journal`] transaction, creating a stream and taking a stream
//! for writing both leave an undo record.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use xfarm_core::constants::RATIO_PRECISION;
use xfarm_core::error::{AssetError, VestingError};
use xfarm_core::traits::{AssetLedger, Journal};
use xfarm_core::types::{AccountId, Amount, AssetId, Height, StreamId, StreamTerms};

use crate::stream::{Stream, StreamBalance, StreamStatus};

/// Parameters of a new stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamParams {
    pub asset: AssetId,
    pub recipient: AccountId,
    pub deposit: Amount,
    pub start_height: Height,
    pub terms: StreamTerms,
}

/// Amounts paid out by a cancellation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CancelReceipt {
    pub to_recipient: Amount,
    pub to_sender: Amount,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Funding {
    Eager,
    Lazy,
    Single,
}

#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
enum StreamUndo {
    Created,
    Replaced(u64, Stream),
}

/// Owns every stream record.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct VestingLedger {
    account: AccountId,
    streams: Vec<Stream>,
    undo: Option<Vec<StreamUndo>>,
}

impl VestingLedger {
    /// Create an empty ledger holding custody under `account`.
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            streams: Vec::new(),
            undo: None,
        }
    }

    /// Custody account on the asset collaborator.
    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Id the next created stream will receive.
    pub fn next_stream_id(&self) -> StreamId {
        StreamId(self.streams.len() as u64 + 1)
    }

    pub fn stream(&self, id: StreamId) -> Result<&Stream, VestingError> {
        Self::index(id)
            .and_then(|i| self.streams.get(i))
            .ok_or(VestingError::StreamNotFound(id))
    }

    fn stream_mut(&mut self, id: StreamId) -> Result<&mut Stream, VestingError> {
        let stream = Self::index(id)
            .and_then(|i| self.streams.get_mut(i))
            .ok_or(VestingError::StreamNotFound(id))?;
        if let Some(undo) = &mut self.undo {
            undo.push(StreamUndo::Replaced(id.0, stream.clone()));
        }
        Ok(stream)
    }

    fn index(id: StreamId) -> Option<usize> {
        id.0.checked_sub(1).map(|i| i as usize)
    }

    /// Open a stream from `sender` to `params.recipient`, pulling the deposit
    /// into custody.
    ///
    /// # Errors
    ///
    /// - [`VestingError::InvalidConfig`] for a zero deposit, a zero, self or
    ///   ledger recipient, a start height in the past, a zero period, or a
    ///   ratio outside `(0, 1]`
    /// - [`VestingError::Asset`] if the deposit cannot be pulled
    pub fn create_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        sender: AccountId,
        params: StreamParams,
    ) -> Result<StreamId, VestingError> {
        validate_params(&params, &sender, &self.account, now)?;

        assets.transfer_from(
            &params.asset,
            &self.account,
            &sender,
            &self.account,
            params.deposit,
        )?;

        let id = self.next_stream_id();
        if let Some(undo) = &mut self.undo {
            undo.push(StreamUndo::Created);
        }
        self.streams.push(Stream {
            id,
            asset: params.asset,
            sender,
            recipient: params.recipient,
            deposit_amount: params.deposit,
            start_height: params.start_height,
            period: params.terms.period,
            unlock_ratio: params.terms.unlock_ratio,
            remaining: params.deposit,
            withdrawable: 0,
            withdrawn: 0,
            refunded: 0,
            last_accrual_height: params.start_height,
            period_base: params.deposit,
            status: StreamStatus::Active,
        });

        info!(
            stream = %id,
            %sender,
            recipient = %params.recipient,
            deposit = params.deposit,
            start = params.start_height,
            period = params.terms.period,
            "stream created"
        );
        Ok(id)
    }

    /// Balances of `id` as of `now`. Never mutates.
    pub fn balance_of(&self, id: StreamId, now: Height) -> Result<StreamBalance, VestingError> {
        self.stream(id)?.balance_at(now)
    }

    /// Commit decay, then add `amount` to the locked principal. Sender only.
    pub fn fund_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        funder: AccountId,
        id: StreamId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        self.fund(assets, now, funder, id, amount, Funding::Eager)
    }

    /// Add `amount` without committing decay. The amount joins the principal
    /// at the stream's last accrual height and decays from there, so it may
    /// partly unlock immediately. Sender only.
    pub fn lazy_fund_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        funder: AccountId,
        id: StreamId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        self.fund(assets, now, funder, id, amount, Funding::Lazy)
    }

    /// One-shot top-up from any funder. Commits decay first.
    pub fn single_fund_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        funder: AccountId,
        id: StreamId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        self.fund(assets, now, funder, id, amount, Funding::Single)
    }

    fn fund<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        funder: AccountId,
        id: StreamId,
        amount: Amount,
        mode: Funding,
    ) -> Result<(), VestingError> {
        if amount == 0 {
            return Err(VestingError::InvalidConfig("funding amount must be positive".into()));
        }
        let custody = self.account;
        let current = self.stream(id)?;
        if !current.is_active() {
            return Err(VestingError::StreamTerminated(id));
        }
        if mode != Funding::Single && funder != current.sender {
            return Err(VestingError::Unauthorized(format!(
                "{funder} is not the sender of {id}"
            )));
        }

        let mut updated = current.clone();
        updated.deposit_amount = updated
            .deposit_amount
            .checked_add(amount)
            .ok_or(VestingError::ArithmeticOverflow)?;
        match mode {
            Funding::Lazy => updated.add_principal_at_anchor(amount)?,
            Funding::Eager | Funding::Single => {
                updated.commit(now)?;
                updated.add_principal(now, amount)?;
            }
        }

        assets.transfer_from(&updated.asset, &custody, &funder, &custody, amount)?;
        *self.stream_mut(id)? = updated;

        debug!(stream = %id, %funder, amount, lazy = (mode == Funding::Lazy), "stream funded");
        Ok(())
    }

    /// Pay `amount` of unlocked balance to the recipient.
    ///
    /// # Errors
    ///
    /// - [`VestingError::Unauthorized`] if `caller` is not the recipient
    /// - [`VestingError::InsufficientWithdrawable`] if `amount` exceeds the
    ///   unlocked balance at `now`
    pub fn withdraw_from_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: AccountId,
        id: StreamId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        if amount == 0 {
            return Err(VestingError::InvalidConfig("withdraw amount must be positive".into()));
        }
        let custody = self.account;
        let stream = self.stream_mut(id)?;
        if caller != stream.recipient {
            return Err(VestingError::Unauthorized(format!(
                "{caller} is not the recipient of {id}"
            )));
        }
        if !stream.is_active() {
            return Err(VestingError::StreamTerminated(id));
        }

        let saved = stream.clone();
        stream.commit(now)?;
        if amount > stream.withdrawable {
            let have = stream.withdrawable;
            *stream = saved;
            return Err(VestingError::InsufficientWithdrawable { have, need: amount });
        }
        stream.withdrawable -= amount;
        stream.withdrawn += amount;
        let (asset, recipient) = (stream.asset, stream.recipient);

        if let Err(e) = assets.transfer(&asset, &custody, &recipient, amount) {
            *self.stream_mut(id)? = saved;
            return Err(e.into());
        }
        debug!(stream = %id, amount, "stream withdrawal");
        Ok(())
    }

    /// Terminate `id`: unlocked balance to the recipient, locked principal
    /// back to the sender.
    pub fn cancel_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        now: Height,
        caller: AccountId,
        id: StreamId,
    ) -> Result<CancelReceipt, VestingError> {
        let custody = self.account;
        let stream = self.stream_mut(id)?;
        if caller != stream.sender && caller != stream.recipient {
            return Err(VestingError::Unauthorized(format!(
                "{caller} is neither sender nor recipient of {id}"
            )));
        }
        if !stream.is_active() {
            return Err(VestingError::StreamTerminated(id));
        }

        let saved = stream.clone();
        stream.commit(now)?;
        let receipt = CancelReceipt {
            to_recipient: stream.withdrawable,
            to_sender: stream.remaining,
        };
        stream.withdrawn += receipt.to_recipient;
        stream.refunded += receipt.to_sender;
        stream.withdrawable = 0;
        stream.remaining = 0;
        stream.period_base = 0;
        stream.status = StreamStatus::Canceled;
        let (asset, sender, recipient) = (stream.asset, stream.sender, stream.recipient);

        let paid = pay(assets, &asset, &custody, &recipient, receipt.to_recipient)
            .and_then(|()| pay(assets, &asset, &custody, &sender, receipt.to_sender));
        if let Err(e) = paid {
            *self.stream_mut(id)? = saved;
            return Err(e.into());
        }

        info!(
            stream = %id,
            to_recipient = receipt.to_recipient,
            to_sender = receipt.to_sender,
            "stream canceled"
        );
        Ok(receipt)
    }
}

impl Journal for VestingLedger {
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
                StreamUndo::Created => {
                    self.streams.pop();
                }
                StreamUndo::Replaced(id, stream) => {
                    if let Some(slot) = Self::index(StreamId(id)).and_then(|i| self.streams.get_mut(i)) {
                        *slot = stream;
                    }
                }
            }
        }
    }
}

fn pay<L: AssetLedger>(
    assets: &mut L,
    asset: &AssetId,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
) -> Result<(), AssetError> {
    if amount == 0 {
        return Ok(());
    }
    assets.transfer(asset, from, to, amount)
}

fn validate_params(
    params: &StreamParams,
    sender: &AccountId,
    custody: &AccountId,
    now: Height,
) -> Result<(), VestingError> {
    let reject = |msg: &str| -> Result<(), VestingError> { Err(VestingError::InvalidConfig(msg.into())) };
    if params.deposit == 0 {
        return reject("deposit must be positive");
    }
    if params.recipient.is_zero() {
        return reject("recipient is the zero account");
    }
    if params.recipient == *sender {
        return reject("recipient equals sender");
    }
    if params.recipient == *custody {
        return reject("recipient is the vesting ledger");
    }
    if params.start_height < now {
        return reject("start height is in the past");
    }
    if params.terms.period == 0 {
        return reject("period must be positive");
    }
    if params.terms.unlock_ratio == 0 || params.terms.unlock_ratio > RATIO_PRECISION {
        return reject("unlock ratio must be in (0, 1]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfarm_core::MemoryAssetLedger;

    const START: Height = 100;

    fn asset() -> AssetId {
        AssetId::derive(b"xdex")
    }

    fn acct(label: &str) -> AccountId {
        AccountId::derive(label.as_bytes())
    }

    fn vault() -> AccountId {
        acct("vesting")
    }

    /// Ledger plus an asset book where `sender` holds `balance` and has
    /// approved the vault without limit.
    fn setup(balance: Amount) -> (VestingLedger, MemoryAssetLedger) {
        let mut assets = MemoryAssetLedger::new();
        assets.add_minter(asset(), acct("minter"));
        assets
            .mint(&asset(), &acct("minter"), &acct("sender"), balance)
            .unwrap();
        assets
            .approve(&asset(), &acct("sender"), &vault(), Amount::MAX)
            .unwrap();
        (VestingLedger::new(vault()), assets)
    }

    fn params(deposit: Amount, period: Height, ratio: u64) -> StreamParams {
        StreamParams {
            asset: asset(),
            recipient: acct("recipient"),
            deposit,
            start_height: START,
            terms: StreamTerms {
                period,
                unlock_ratio: ratio,
            },
        }
    }

    fn open(deposit: Amount, period: Height, ratio: u64) -> (VestingLedger, MemoryAssetLedger, StreamId) {
        let (mut ledger, mut assets) = setup(deposit * 10);
        let id = ledger
            .create_stream(&mut assets, START, acct("sender"), params(deposit, period, ratio))
            .unwrap();
        (ledger, assets, id)
    }

    fn assert_conserved(ledger: &VestingLedger, id: StreamId) {
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.accounted(), s.deposit_amount, "conservation broken: {s:?}");
    }

    // ------------------------------------------------------------------
    // create_stream
    // ------------------------------------------------------------------

    #[test]
    fn create_pulls_deposit_into_custody() {
        let (ledger, assets, id) = open(1_000, 10, 500_000_000);
        assert_eq!(id, StreamId(1));
        assert_eq!(assets.balance_of(&asset(), &vault()), 1_000);
        assert_eq!(assets.balance_of(&asset(), &acct("sender")), 9_000);
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.remaining, 1_000);
        assert_eq!(s.last_accrual_height, START);
        assert_eq!(ledger.next_stream_id(), StreamId(2));
    }

    #[test]
    fn create_rejects_bad_params() {
        let (mut ledger, mut assets) = setup(1_000);
        let sender = acct("sender");
        let cases = [
            StreamParams { deposit: 0, ..params(1, 10, 1) },
            StreamParams { recipient: AccountId::ZERO, ..params(1, 10, 1) },
            StreamParams { recipient: sender, ..params(1, 10, 1) },
            StreamParams { recipient: vault(), ..params(1, 10, 1) },
            StreamParams { start_height: START - 1, ..params(1, 10, 1) },
            params(1, 0, 1),
            params(1, 10, 0),
            params(1, 10, RATIO_PRECISION + 1),
        ];
        for p in cases {
            let err = ledger.create_stream(&mut assets, START, sender, p).unwrap_err();
            assert!(matches!(err, VestingError::InvalidConfig(_)), "{p:?} -> {err:?}");
        }
        assert_eq!(ledger.stream_count(), 0);
    }

    #[test]
    fn create_without_allowance_fails() {
        let (mut ledger, mut assets) = setup(1_000);
        assets.approve(&asset(), &acct("sender"), &vault(), 10).unwrap();
        let err = ledger
            .create_stream(&mut assets, START, acct("sender"), params(11, 10, 1))
            .unwrap_err();
        assert_eq!(err, VestingError::Asset(AssetError::InsufficientAllowance { have: 10, need: 11 }));
        assert_eq!(ledger.stream_count(), 0);
    }

    #[test]
    fn create_without_balance_fails() {
        let (mut ledger, mut assets) = setup(1_000);
        let err = ledger
            .create_stream(&mut assets, START, acct("sender"), params(1_001, 10, 1))
            .unwrap_err();
        assert!(matches!(err, VestingError::Asset(AssetError::InsufficientBalance { .. })));
    }

    // ------------------------------------------------------------------
    // balance_of
    // ------------------------------------------------------------------

    #[test]
    fn balance_before_start_is_stored_values() {
        let (mut ledger, mut assets) = setup(1_000);
        let p = StreamParams { start_height: 500, ..params(1_000, 10, 800_000_000) };
        let id = ledger.create_stream(&mut assets, START, acct("sender"), p).unwrap();
        let b = ledger.balance_of(id, 499).unwrap();
        assert_eq!(b, StreamBalance { remaining: 1_000, withdrawable: 0 });
    }

    #[test]
    fn balance_after_one_period_at_eighty_percent() {
        let (ledger, _, id) = open(1_000_000, 10, 800_000_000);
        let b = ledger.balance_of(id, START + 10).unwrap();
        assert_eq!(b.withdrawable, 800_000);
        assert_eq!(b.remaining, 200_000);
    }

    #[test]
    fn balance_of_unknown_stream() {
        let (ledger, _, _) = open(1, 10, 1);
        assert_eq!(ledger.balance_of(StreamId(9), START), Err(VestingError::StreamNotFound(StreamId(9))));
        assert!(ledger.stream(StreamId(0)).is_err());
    }

    // ------------------------------------------------------------------
    // withdraw_from_stream
    // ------------------------------------------------------------------

    #[test]
    fn withdraw_pays_recipient() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("recipient"), id, 300)
            .unwrap();
        assert_eq!(assets.balance_of(&asset(), &acct("recipient")), 300);
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.withdrawable, 200);
        assert_eq!(s.remaining, 500);
        assert_eq!(s.withdrawn, 300);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn withdraw_more_than_unlocked_fails_unchanged() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let before = ledger.clone();
        let err = ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("recipient"), id, 501)
            .unwrap_err();
        assert_eq!(err, VestingError::InsufficientWithdrawable { have: 500, need: 501 });
        assert_eq!(ledger, before);
    }

    #[test]
    fn withdraw_by_non_recipient_rejected() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let err = ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("sender"), id, 1)
            .unwrap_err();
        assert!(matches!(err, VestingError::Unauthorized(_)));
    }

    #[test]
    fn withdraw_restores_record_when_transfer_fails() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        // Drain custody behind the ledger's back.
        assets
            .transfer(&asset(), &vault(), &acct("thief"), 1_000)
            .unwrap();
        let before = ledger.clone();
        let err = ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("recipient"), id, 100)
            .unwrap_err();
        assert!(matches!(err, VestingError::Asset(AssetError::InsufficientBalance { .. })));
        assert_eq!(ledger, before);
    }

    // ------------------------------------------------------------------
    // funding
    // ------------------------------------------------------------------

    #[test]
    fn eager_fund_commits_then_adds() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .fund_stream(&mut assets, START + 10, acct("sender"), id, 400)
            .unwrap();
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.remaining, 900);
        assert_eq!(s.withdrawable, 500);
        assert_eq!(s.deposit_amount, 1_400);
        assert_eq!(s.last_accrual_height, START + 10);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn eager_fund_mid_period_starts_new_principal_now() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .fund_stream(&mut assets, START + 5, acct("sender"), id, 400)
            .unwrap();
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.last_accrual_height, START);
        assert_eq!((s.remaining, s.withdrawable), (1_150, 250));
        assert_eq!(ledger.balance_of(id, START + 5).unwrap().remaining, 1_150);
        assert_eq!(ledger.balance_of(id, START + 10).unwrap().remaining, 767);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn lazy_funding_unlocks_without_further_writes() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .lazy_fund_stream(&mut assets, START + 1, acct("sender"), id, 1_000)
            .unwrap();
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.last_accrual_height, START);
        assert_eq!(s.remaining, 2_000);
        assert_conserved(&ledger, id);

        let b = ledger.balance_of(id, START + 10).unwrap();
        assert_eq!(b, StreamBalance { remaining: 1_000, withdrawable: 1_000 });
        let b = ledger.balance_of(id, START + 40).unwrap();
        assert_eq!(b, StreamBalance { remaining: 125, withdrawable: 1_875 });
        let b = ledger.balance_of(id, START + 100).unwrap();
        assert!(b.remaining <= 2, "still locked: {b:?}");
        assert_eq!(b.remaining + b.withdrawable, 2_000);
    }

    #[test]
    fn lazy_funding_decays_from_the_last_accrual_height() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .lazy_fund_stream(&mut assets, START + 5, acct("sender"), id, 400)
            .unwrap();
        // The 400 is treated as present since START.
        let b = ledger.balance_of(id, START + 5).unwrap();
        assert_eq!(b, StreamBalance { remaining: 1_050, withdrawable: 350 });

        ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("recipient"), id, 700)
            .unwrap();
        let s = ledger.stream(id).unwrap();
        assert_eq!(s.remaining, 700);
        assert_eq!(s.withdrawable, 0);
        assert_eq!(s.last_accrual_height, START + 10);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn withdrawals_mid_period_do_not_change_the_boundary_balance() {
        let (direct, _, direct_id) = open(1_000, 10, 500_000_000);
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        for h in START + 1..START + 10 {
            ledger
                .withdraw_from_stream(&mut assets, h, acct("recipient"), id, 1)
                .unwrap();
        }
        let boundary = START + 10;
        assert_eq!(
            ledger.balance_of(id, boundary).unwrap().remaining,
            direct.balance_of(direct_id, boundary).unwrap().remaining
        );
        assert_eq!(ledger.balance_of(id, boundary).unwrap().remaining, 500);
        assert_eq!(ledger.stream(id).unwrap().withdrawn, 9);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn eager_and_lazy_funding_are_sender_only() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        for lazy in [false, true] {
            let res = if lazy {
                ledger.lazy_fund_stream(&mut assets, START, acct("stranger"), id, 1)
            } else {
                ledger.fund_stream(&mut assets, START, acct("stranger"), id, 1)
            };
            assert!(matches!(res, Err(VestingError::Unauthorized(_))));
        }
    }

    #[test]
    fn single_fund_accepts_any_funder() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        assets.mint(&asset(), &acct("minter"), &acct("patron"), 50).unwrap();
        assets.approve(&asset(), &acct("patron"), &vault(), 50).unwrap();
        ledger
            .single_fund_stream(&mut assets, START + 3, acct("patron"), id, 50)
            .unwrap();
        assert_eq!(ledger.stream(id).unwrap().deposit_amount, 1_050);
        assert_eq!(assets.balance_of(&asset(), &acct("patron")), 0);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn funding_without_balance_leaves_stream_untouched() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let before = ledger.clone();
        let err = ledger
            .fund_stream(&mut assets, START + 10, acct("sender"), id, 1_000_000)
            .unwrap_err();
        assert!(matches!(err, VestingError::Asset(_)));
        assert_eq!(ledger, before);
    }

    #[test]
    fn zero_funding_rejected() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let err = ledger
            .single_fund_stream(&mut assets, START, acct("sender"), id, 0)
            .unwrap_err();
        assert!(matches!(err, VestingError::InvalidConfig(_)));
    }

    // ------------------------------------------------------------------
    // cancel_stream
    // ------------------------------------------------------------------

    #[test]
    fn cancel_mid_decay_splits_balances() {
        let (mut ledger, mut assets, id) = open(1_000_000, 10, 800_000_000);
        let at = START + 15;
        let expected = ledger.balance_of(id, at).unwrap();
        let receipt = ledger
            .cancel_stream(&mut assets, at, acct("recipient"), id)
            .unwrap();
        assert_eq!(receipt.to_recipient, expected.withdrawable);
        assert_eq!(receipt.to_sender, expected.remaining);
        assert_eq!(assets.balance_of(&asset(), &acct("recipient")), expected.withdrawable);
        assert_eq!(assets.balance_of(&asset(), &vault()), 0);

        let s = ledger.stream(id).unwrap();
        assert_eq!(s.status, StreamStatus::Canceled);
        assert_eq!(s.withdrawn + s.refunded, s.deposit_amount);
        assert_conserved(&ledger, id);
    }

    #[test]
    fn canceled_stream_rejects_funding_and_second_cancel() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger.cancel_stream(&mut assets, START + 1, acct("sender"), id).unwrap();
        assert_eq!(
            ledger.fund_stream(&mut assets, START + 2, acct("sender"), id, 1),
            Err(VestingError::StreamTerminated(id))
        );
        assert_eq!(
            ledger.cancel_stream(&mut assets, START + 2, acct("sender"), id),
            Err(VestingError::StreamTerminated(id))
        );
        assert_eq!(
            ledger.withdraw_from_stream(&mut assets, START + 2, acct("recipient"), id, 1),
            Err(VestingError::StreamTerminated(id))
        );
    }

    #[test]
    fn cancel_by_stranger_rejected() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let err = ledger
            .cancel_stream(&mut assets, START + 1, acct("stranger"), id)
            .unwrap_err();
        assert!(matches!(err, VestingError::Unauthorized(_)));
        assert!(ledger.stream(id).unwrap().is_active());
    }

    #[test]
    fn cancel_unknown_stream() {
        let (mut ledger, mut assets, _) = open(1_000, 10, 1);
        assert_eq!(
            ledger.cancel_stream(&mut assets, START, acct("sender"), StreamId(42)),
            Err(VestingError::StreamNotFound(StreamId(42)))
        );
    }

    #[test]
    fn cancel_includes_lazy_funding_in_refund() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger
            .lazy_fund_stream(&mut assets, START + 1, acct("sender"), id, 300)
            .unwrap();
        let receipt = ledger
            .cancel_stream(&mut assets, START + 10, acct("sender"), id)
            .unwrap();
        // 1_300 on the curve from START: half unlocked after one period.
        assert_eq!(receipt, CancelReceipt { to_recipient: 650, to_sender: 650 });
        assert_conserved(&ledger, id);
    }

    // ------------------------------------------------------------------
    // journal
    // ------------------------------------------------------------------

    #[test]
    fn rollback_undoes_creation_and_writes() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        let before = ledger.clone();
        ledger.begin();
        ledger
            .withdraw_from_stream(&mut assets, START + 10, acct("recipient"), id, 100)
            .unwrap();
        ledger
            .create_stream(&mut assets, START + 10, acct("sender"), params(50, 10, 1))
            .unwrap();
        ledger
            .cancel_stream(&mut assets, START + 12, acct("sender"), id)
            .unwrap();
        ledger.rollback();
        assert_eq!(ledger, before);
        assert_eq!(ledger.next_stream_id(), StreamId(2));
    }

    #[test]
    fn commit_keeps_writes_and_stops_recording() {
        let (mut ledger, mut assets, id) = open(1_000, 10, 500_000_000);
        ledger.begin();
        ledger
            .lazy_fund_stream(&mut assets, START + 1, acct("sender"), id, 10)
            .unwrap();
        ledger.commit();
        ledger.rollback();
        assert_eq!(ledger.stream(id).unwrap().deposit_amount, 1_010);
    }
}
