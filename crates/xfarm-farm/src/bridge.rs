//! Routing of rewards into per-account vesting streams.
//!
//! The bridge is the sender of every stream it opens. It keeps an explicit
//! `(account, kind) -> stream` table: the first routed reward for a pair
//! opens a stream starting one height later, later rewards fund it eagerly.
//! A canceled stream is replaced by a fresh one on the next routing.

use std::collections::BTreeMap;

use tracing::debug;

use xfarm_core::error::VestingError;
use xfarm_core::traits::{AssetLedger, Journal};
use xfarm_core::types::{AccountId, Amount, AssetId, Height, StreamId, StreamKind, StreamTerms};
use xfarm_vesting::{StreamParams, VestingLedger};

#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct StreamBridge {
    account: AccountId,
    asset: AssetId,
    normal_terms: StreamTerms,
    voting_terms: StreamTerms,
    streams: BTreeMap<(AccountId, StreamKind), StreamId>,
    /// Replaced table entries of the open transaction.
    undo: Option<Vec<((AccountId, StreamKind), Option<StreamId>)>>,
}

impl StreamBridge {
    pub fn new(account: AccountId, asset: AssetId, normal_terms: StreamTerms, voting_terms: StreamTerms) -> Self {
        Self {
            account,
            asset,
            normal_terms,
            voting_terms,
            streams: BTreeMap::new(),
            undo: None,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn terms(&self, kind: StreamKind) -> StreamTerms {
        match kind {
            StreamKind::Voting => self.voting_terms,
            StreamKind::Normal => self.normal_terms,
        }
    }

    pub fn stream_id(&self, account: &AccountId, kind: StreamKind) -> Option<StreamId> {
        self.streams.get(&(*account, kind)).copied()
    }

    pub fn streams(&self) -> impl Iterator<Item = (&(AccountId, StreamKind), &StreamId)> {
        self.streams.iter()
    }

    fn bind(&mut self, account: &AccountId, kind: StreamKind, id: StreamId) {
        let key = (*account, kind);
        let old = self.streams.insert(key, id);
        if let Some(undo) = &mut self.undo {
            undo.push((key, old));
        }
    }

    /// Active stream of the pair, if the table holds one.
    fn live_stream(&self, vesting: &VestingLedger, account: &AccountId, kind: StreamKind) -> Option<StreamId> {
        self.stream_id(account, kind)
            .filter(|id| vesting.stream(*id).is_ok_and(|s| s.is_active()))
    }

    /// Pull `amount` from `funder` and hand it to the vesting ledger.
    fn pull<L: AssetLedger>(
        &self,
        assets: &mut L,
        vesting: &VestingLedger,
        funder: &AccountId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        assets.transfer_from(&self.asset, &self.account, funder, &self.account, amount)?;
        assets.approve(&self.asset, &self.account, &vesting.account(), amount)?;
        Ok(())
    }

    /// Deposit `amount` of reward for `account` into its `kind` stream,
    /// opening one if needed. `funder` must have approved the bridge.
    pub fn route_reward<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        vesting: &mut VestingLedger,
        now: Height,
        funder: &AccountId,
        account: &AccountId,
        kind: StreamKind,
        amount: Amount,
    ) -> Result<StreamId, VestingError> {
        let start_height = now.checked_add(1).ok_or(VestingError::ArithmeticOverflow)?;
        self.pull(assets, vesting, funder, amount)?;
        let id = match self.live_stream(vesting, account, kind) {
            Some(id) => {
                vesting.fund_stream(assets, now, self.account, id, amount)?;
                id
            }
            None => {
                let params = StreamParams {
                    asset: self.asset,
                    recipient: *account,
                    deposit: amount,
                    start_height,
                    terms: self.terms(kind),
                };
                let id = vesting.create_stream(assets, now, self.account, params)?;
                self.bind(account, kind, id);
                id
            }
        };
        debug!(%account, %kind, stream = %id, amount, "reward routed");
        Ok(id)
    }

    /// Open a `kind` stream for `recipient` funded by an external `funder`.
    ///
    /// # Errors
    ///
    /// [`VestingError::StreamExists`] if the pair already has a live stream.
    pub fn create_stream<L: AssetLedger>(
        &mut self,
        assets: &mut L,
        vesting: &mut VestingLedger,
        now: Height,
        funder: &AccountId,
        recipient: &AccountId,
        kind: StreamKind,
        deposit: Amount,
        start_height: Height,
    ) -> Result<StreamId, VestingError> {
        if self.live_stream(vesting, recipient, kind).is_some() {
            return Err(VestingError::StreamExists { account: *recipient, kind });
        }
        self.pull(assets, vesting, funder, deposit)?;
        let params = StreamParams {
            asset: self.asset,
            recipient: *recipient,
            deposit,
            start_height,
            terms: self.terms(kind),
        };
        let id = vesting.create_stream(assets, now, self.account, params)?;
        self.bind(recipient, kind, id);
        Ok(id)
    }

    /// Top up a bridge-owned stream from any funder.
    pub fn fund_stream<L: AssetLedger>(
        &self,
        assets: &mut L,
        vesting: &mut VestingLedger,
        now: Height,
        funder: &AccountId,
        id: StreamId,
        amount: Amount,
    ) -> Result<(), VestingError> {
        let sender = vesting.stream(id)?.sender;
        if sender != self.account {
            return Err(VestingError::Unauthorized(format!("{id} is not owned by the bridge")));
        }
        self.pull(assets, vesting, funder, amount)?;
        vesting.fund_stream(assets, now, self.account, id, amount)
    }

    /// Withdraw from the caller's own `kind` stream.
    pub fn withdraw<L: AssetLedger>(
        &self,
        assets: &mut L,
        vesting: &mut VestingLedger,
        now: Height,
        caller: &AccountId,
        kind: StreamKind,
        amount: Amount,
    ) -> Result<(), VestingError> {
        let id = self
            .stream_id(caller, kind)
            .ok_or(VestingError::NoStreamForKind { account: *caller, kind })?;
        vesting.withdraw_from_stream(assets, now, *caller, id, amount)
    }
}

impl Journal for StreamBridge {
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
        for (key, old) in undo.into_iter().rev() {
            match old {
                Some(id) => {
                    self.streams.insert(key, id);
                }
                None => {
                    self.streams.remove(&key);
                }
            }
        }
    }
}
