//! Stake ledger errors.

use gora_types::Round;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StakeError {
    #[error("insufficient balance: need {needed}, available {available}")]
    NegativeBalance { needed: u64, available: u64 },

    #[error("stake is locked until round {until}")]
    StakeLocked { until: Round },

    #[error("remaining stake {remaining} below minimum {minimum}")]
    BelowMinimumStake { remaining: u64, minimum: u64 },

    #[error("stake snapshot at {snapshot} is ahead of requested round {requested}")]
    SnapshotAhead { snapshot: Round, requested: Round },

    #[error("participation key is locked until round {until}")]
    ParticipationKeyLocked { until: Round },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("arithmetic overflow in stake computation")]
    Overflow,

    #[error("{0}")]
    Other(String),
}
