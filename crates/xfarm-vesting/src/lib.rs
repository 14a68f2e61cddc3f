//! # xfarm-vesting: Decay-vesting stream ledger.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! A stream holds a principal that unlocks gradually:
//! - **Decay law**: every `period` heights a fixed fraction of the remaining
//!   principal becomes withdrawable, so `remaining` decays geometrically.
//!   Inside a partial period the release is interpolated linearly. The
//!   curve stays anchored to the stream's period grid, so how often a stream
//!   is written never changes how fast it unlocks.
//! - **Funding**: eager and single funding commit pending decay first and
//!   the new principal starts decaying at the funding height; lazy funding
//!   skips the commit and the amount decays from the last accrual height.
//! - **Cancellation**: pays the unlocked balance to the recipient and refunds
//!   the locked principal to the sender.

pub mod decay;
pub mod ledger;
pub mod stream;

pub use decay::{apply_decay, base_for_funding, DecaySnapshot};
pub use ledger::{CancelReceipt, StreamParams, VestingLedger};
pub use stream::{Stream, StreamBalance, StreamStatus};
