//! Request records.

use gora_types::{AccountId, AlgoAmount, GoraAmount, KeyHash, RequestId, Round, VoteHash};
use serde::{Deserialize, Serialize};

use crate::proposal::Proposal;

/// Lifecycle of a request.
///
/// `Made -> Processing -> Completed` on the happy path; any non-completed
/// request that outlives its time lock can go `RefundAvailable -> Refunded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Made,
    Processing,
    Completed,
    RefundAvailable,
    Refunded,
}

impl RequestStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Made | Self::Processing)
    }
}

/// Where the agreed value is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub app_id: u64,
    /// 4-byte method selector.
    pub method: [u8; 4],
}

/// Fee offered with a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub algo: AlgoAmount,
    pub gora: GoraAmount,
}

impl Fee {
    pub fn new(algo: u64, gora: u64) -> Self {
        Self {
            algo: AlgoAmount::new(algo),
            gora: GoraAmount::new(gora),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub key_hash: KeyHash,
    pub key: Vec<u8>,
    pub requester: AccountId,
    pub voting_contract_ref: u64,
    pub submitted_round: Round,
    pub status: RequestStatus,
    /// Network stake at submission; the quorum denominator.
    pub total_stake: u64,
    /// Set once the request no longer owns its key (completed or refunded).
    pub is_history: bool,
    /// Native-currency fee still held in escrow.
    pub algo_fee: AlgoAmount,
    /// Token fee still held in escrow.
    pub gora_fee: GoraAmount,
    pub storage_deposit: AlgoAmount,
    /// Fees already paid out to winning voters.
    pub fees_paid: Fee,
    pub total_votes: u64,
    pub total_votes_refunded: u64,
    /// Seed every voter's VRF output must be derived from.
    pub seed: [u8; 32],
    pub destination: Destination,
    /// Opaque description of the data source the nodes query.
    pub source: Vec<u8>,
    /// Every proposal created for this request.
    pub proposals: Vec<VoteHash>,
    /// Snapshot of the completing proposal.
    pub winning: Option<Proposal>,
}

impl Request {
    /// Last round a vote is accepted and first round after which a refund is.
    pub fn deadline(&self, time_lock: u64) -> Round {
        self.submitted_round.saturating_add(time_lock)
    }

    pub fn timed_out(&self, time_lock: u64, now: Round) -> bool {
        self.submitted_round.lock_expired(time_lock, now)
    }
}
