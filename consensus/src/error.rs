use gora_sortition::SortitionError;
use gora_stake::StakeError;
use gora_types::{KeyHash, RequestId, Round, VoteHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("insufficient fee: paid {paid_algo}/{paid_gora}, minimum {min_algo}/{min_gora}")]
    InsufficientFee {
        paid_algo: u64,
        paid_gora: u64,
        min_algo: u64,
        min_gora: u64,
    },

    #[error("a live request already exists for key {0}")]
    DuplicateKey(KeyHash),

    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    #[error("caller is not the requester of {0}")]
    NotRequester(RequestId),

    #[error("request has not timed out (refundable after round {until})")]
    NotTimedOut { until: Round },

    #[error("request {0} was already refunded")]
    AlreadyRefunded(RequestId),

    #[error("request {0} already completed, cannot refund")]
    AlreadyCompleted(RequestId),

    #[error("request {0} already completed")]
    RequestAlreadyCompleted(RequestId),

    #[error("request {0} has expired")]
    RequestExpired(RequestId),

    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("ticket lease does not match request {0}")]
    InvalidLease(RequestId),

    #[error("voter already holds an overlapping ticket for this lease")]
    OverlappingLease,

    #[error("voter has no stake at round {0}")]
    ZeroStake(Round),

    #[error("participation key missing or registered less than the time lock ago")]
    ParticipationKeyNotReady,

    #[error("VRF proof rejected by {0}")]
    InvalidProof(String),

    #[error("claimed weight {claimed} does not match sortition weight {expected}")]
    WeightMismatch { claimed: u64, expected: u64 },

    #[error("voter was not selected (zero weight)")]
    NotSelected,

    #[error("proposal {0} not found")]
    ProposalNotFound(VoteHash),

    #[error("proposal {0} is still active")]
    ProposalNotArchived(VoteHash),

    #[error("proposal {vote_hash} was voted on at {vote_round}, cannot delete yet")]
    ProposalTooRecent { vote_hash: VoteHash, vote_round: Round },

    #[error("response delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("arithmetic overflow in vote tally")]
    Overflow,

    #[error("stake ledger: {0}")]
    Stake(#[from] StakeError),

    #[error("sortition: {0}")]
    Sortition(#[from] SortitionError),

    #[error("{0}")]
    Other(String),
}
