use gora_consensus::ConsensusError;
use gora_delegation::DelegationError;
use gora_settlement::SettlementError;
use gora_stake::StakeError;
use gora_types::AccountId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("delegation error: {0}")]
    Delegation(#[from] DelegationError),

    #[error("stake error: {0}")]
    Stake(#[from] StakeError),

    #[error("no delegation pool at {0}")]
    PoolNotFound(AccountId),

    #[error("a delegation pool already exists at {0}")]
    PoolExists(AccountId),

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
