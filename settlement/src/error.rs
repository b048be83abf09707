use gora_stake::StakeError;
use gora_types::{AccountId, RequestId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("voter {voter} has no vote recorded for request {request_id}")]
    NotInHistory {
        voter: AccountId,
        request_id: RequestId,
    },

    #[error("completed request {0} has no winning proposal")]
    MissingWinner(RequestId),

    #[error("arithmetic overflow in settlement")]
    Overflow,

    #[error("stake ledger: {0}")]
    Stake(#[from] StakeError),

    #[error("{0}")]
    Other(String),
}
