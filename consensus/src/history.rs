//! Per-voter vote history used by settlement.

use std::collections::HashMap;

use gora_types::{AccountId, KeyHash, RequestId, Round, VoteHash};
use serde::{Deserialize, Serialize};

/// A voter's own contribution to the proposal it most recently voted for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterHistoryEntry {
    pub key_hash: KeyHash,
    pub request_id: RequestId,
    pub vote_hash: VoteHash,
    /// Votes this voter cast.
    pub vote_count: u64,
    /// This voter's stake at the request round.
    pub stake_count: u64,
    pub vote_round: Round,
    pub claimed: bool,
}

/// One entry per voter. A new vote replaces the previous entry, so voters
/// (or the node on their behalf) claim before voting again.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VoterHistory {
    entries: HashMap<AccountId, VoterHistoryEntry>,
}

impl VoterHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, voter: &AccountId) -> Option<&VoterHistoryEntry> {
        self.entries.get(voter)
    }

    pub fn get_mut(&mut self, voter: &AccountId) -> Option<&mut VoterHistoryEntry> {
        self.entries.get_mut(voter)
    }

    /// Store `entry`, returning the one it replaced.
    pub fn record(&mut self, voter: AccountId, entry: VoterHistoryEntry) -> Option<VoterHistoryEntry> {
        self.entries.insert(voter, entry)
    }

    /// Entries for `request_id`, as `(voter, entry)`.
    pub fn for_request<'a>(
        &'a self,
        request_id: &'a RequestId,
    ) -> impl Iterator<Item = (&'a AccountId, &'a VoterHistoryEntry)> + 'a {
        self.entries
            .iter()
            .filter(move |(_, e)| &e.request_id == request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
