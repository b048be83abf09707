use gora_stake::StakeError;
use gora_types::AccountId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("depositor {0} already has a pending action in this aggregation round")]
    MultipleActionsPerRound(AccountId),

    #[error("insufficient pool balance: need {needed}, available {available}")]
    NegativeBalance { needed: u64, available: u64 },

    #[error("only the pool manager may do this")]
    NotManager,

    #[error("vested tokens belong to a different vesting source")]
    NotVestingSource,

    #[error("manager share {0} exceeds 10000 basis points")]
    InvalidShare(u64),

    #[error("depositor {0} not found")]
    DepositorNotFound(AccountId),

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("arithmetic overflow in pool accounting")]
    Overflow,

    #[error("stake ledger: {0}")]
    Stake(#[from] StakeError),

    #[error("{0}")]
    Other(String),
}
