//! Proposals: one per distinct answer to a request.

use gora_types::{AccountId, RequestId, Round, VoteHash};
use serde::{Deserialize, Serialize};

/// Votes accumulated behind one answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub vote_hash: VoteHash,
    pub request_id: RequestId,
    pub requester: AccountId,
    pub value: Vec<u8>,
    pub vote_count: u64,
    pub stake_count: u64,
    /// Round of the most recent vote.
    pub vote_round: Round,
    /// Stake of the voters already paid out (settlement).
    pub rewards_paid_out: u64,
}

impl Proposal {
    pub fn new(vote_hash: VoteHash, request_id: RequestId, requester: AccountId, value: Vec<u8>, now: Round) -> Self {
        Self {
            vote_hash,
            request_id,
            requester,
            value,
            vote_count: 0,
            stake_count: 0,
            vote_round: now,
            rewards_paid_out: 0,
        }
    }
}

/// A proposal is `Active` while its request is open and `Archived` once the
/// request is settled. Only archived proposals may be deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalRecord {
    Active(Proposal),
    Archived(Proposal),
}

impl ProposalRecord {
    pub fn proposal(&self) -> &Proposal {
        match self {
            Self::Active(p) | Self::Archived(p) => p,
        }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived(_))
    }

    /// Move into the archived state. Idempotent.
    pub fn archive(self) -> Self {
        match self {
            Self::Active(p) | Self::Archived(p) => Self::Archived(p),
        }
    }
}
