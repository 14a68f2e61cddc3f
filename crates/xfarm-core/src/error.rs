//! Error types for the XFarm protocol.
use thiserror::Error;

use crate::types::{AccountId, Amount, Height, PoolId, StreamId, StreamKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: Amount, need: Amount },
    #[error("insufficient allowance: have {have}, need {need}")] InsufficientAllowance { have: Amount, need: Amount },
    #[error("unauthorized: {0}")] Unauthorized(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid schedule: {0}")] InvalidConfig(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VestingError {
    #[error("invalid stream parameters: {0}")] InvalidConfig(String),
    #[error("stream not found: {0}")] StreamNotFound(StreamId),
    #[error("no {kind} stream for account {account}")] NoStreamForKind { account: AccountId, kind: StreamKind },
    #[error("{kind} stream already exists for account {account}")] StreamExists { account: AccountId, kind: StreamKind },
    #[error("stream is terminated: {0}")] StreamTerminated(StreamId),
    #[error("insufficient withdrawable: have {have}, need {need}")] InsufficientWithdrawable { have: Amount, need: Amount },
    #[error("unauthorized: {0}")] Unauthorized(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error(transparent)] Asset(#[from] AssetError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")] InvalidConfig(String),
    #[error("pool not found: {0}")] PoolNotFound(PoolId),
    #[error("no position in {pool} for account {account}")] PositionNotFound { pool: PoolId, account: AccountId },
    #[error("insufficient stake: have {have}, need {need}")] InsufficientStake { have: Amount, need: Amount },
    #[error("unauthorized: {0}")] Unauthorized(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Schedule(#[from] ScheduleError),
    #[error(transparent)] Vesting(#[from] VestingError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FarmError {
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Schedule(#[from] ScheduleError),
    #[error(transparent)] Vesting(#[from] VestingError),
    #[error(transparent)] Pool(#[from] PoolError),
    #[error("height regression: current {current}, requested {requested}")] HeightRegression { current: Height, requested: Height },
    #[error("snapshot: {0}")] Snapshot(String),
}
