//! Request registry: submission, refund, completion and expiry.
//!
//! Holds at most one live request per `key_hash`. A key is released when its
//! request completes or is refunded, after which the same requester may ask
//! again under the same key.

use std::collections::HashMap;

use gora_crypto::{key_hash, request_id, request_seed};
use gora_stake::StakeLedger;
use gora_types::{AccountId, AlgoAmount, GoraAmount, KeyHash, ProtocolParams, RequestId, Round, VoteHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConsensusError;
use crate::proposal::{Proposal, ProposalRecord};
use crate::request::{Destination, Fee, Request, RequestStatus};

/// What a successful `refund` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundOutcome {
    /// Nothing owed to voters: fees and deposit returned, record deleted.
    Closed { algo: AlgoAmount, gora: GoraAmount },
    /// Votes were cast: token fee returned, the native fee stays in escrow
    /// for the voters' refund claims.
    AwaitingVoterRefunds { gora: GoraAmount },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestRegistry {
    live: HashMap<KeyHash, RequestId>,
    requests: HashMap<RequestId, Request>,
    proposals: HashMap<VoteHash, ProposalRecord>,
    params: ProtocolParams,
    voting_contract_ref: u64,
    sequence: u64,
}

impl RequestRegistry {
    pub fn new(params: ProtocolParams) -> Self {
        Self {
            live: HashMap::new(),
            requests: HashMap::new(),
            proposals: HashMap::new(),
            params,
            voting_contract_ref: 0,
            sequence: 0,
        }
    }

    /// Voting contract new requests are routed to.
    pub fn with_voting_contract(mut self, voting_contract_ref: u64) -> Self {
        self.voting_contract_ref = voting_contract_ref;
        self
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Open a request for `key`, escrowing `fee` plus the storage deposit.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        requester: AccountId,
        key: &[u8],
        source: Vec<u8>,
        destination: Destination,
        fee: Fee,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<RequestId, ConsensusError> {
        if fee.algo.raw() < self.params.algo_request_fee || fee.gora.raw() < self.params.gora_request_fee {
            return Err(ConsensusError::InsufficientFee {
                paid_algo: fee.algo.raw(),
                paid_gora: fee.gora.raw(),
                min_algo: self.params.algo_request_fee,
                min_gora: self.params.gora_request_fee,
            });
        }

        let kh = key_hash(&requester, key);
        if self.live.contains_key(&kh) {
            return Err(ConsensusError::DuplicateKey(kh));
        }

        let total_stake = ledger.total_stake_at(now)?;
        let deposit = AlgoAmount::new(self.params.request_storage_deposit);
        let escrowed_algo = fee.algo.checked_add(deposit).ok_or(ConsensusError::Overflow)?;
        ledger.escrow(&requester, escrowed_algo, fee.gora)?;

        let id = request_id(&kh, now, self.sequence);
        self.sequence += 1;
        let request = Request {
            id,
            key_hash: kh,
            key: key.to_vec(),
            requester,
            voting_contract_ref: self.voting_contract_ref,
            submitted_round: now,
            status: RequestStatus::Made,
            total_stake,
            is_history: false,
            algo_fee: fee.algo,
            gora_fee: fee.gora,
            storage_deposit: deposit,
            fees_paid: Fee::default(),
            total_votes: 0,
            total_votes_refunded: 0,
            seed: request_seed(&id, now),
            destination,
            source,
            proposals: Vec::new(),
            winning: None,
        };
        self.live.insert(kh, id);
        self.requests.insert(id, request);

        debug!(request = %id, requester = %requester, round = %now, total_stake, "request submitted");
        Ok(id)
    }

    // ── Refund ───────────────────────────────────────────────────────────

    /// Requester-initiated refund of a request that timed out without completing.
    pub fn refund(
        &mut self,
        requester: &AccountId,
        id: &RequestId,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<RefundOutcome, ConsensusError> {
        let request = self.requests.get(id).ok_or(ConsensusError::RequestNotFound(*id))?;
        if &request.requester != requester {
            return Err(ConsensusError::NotRequester(*id));
        }
        match request.status {
            RequestStatus::Completed => return Err(ConsensusError::AlreadyCompleted(*id)),
            RequestStatus::Refunded => return Err(ConsensusError::AlreadyRefunded(*id)),
            _ => {}
        }
        if !request.timed_out(self.params.time_lock, now) {
            return Err(ConsensusError::NotTimedOut {
                until: request.deadline(self.params.time_lock),
            });
        }

        let pct = self.params.refund_request_made_percentage;
        let gora_back = GoraAmount::new(scale_percent(request.gora_fee.raw(), pct));

        if request.total_votes == 0 {
            let algo_back = AlgoAmount::new(scale_percent(request.algo_fee.raw(), pct))
                .checked_add(request.storage_deposit)
                .ok_or(ConsensusError::Overflow)?;
            ledger.release(requester, algo_back, gora_back)?;
            let key_hash = request.key_hash;
            self.live.remove(&key_hash);
            self.requests.remove(id);
            info!(request = %id, algo = %algo_back, gora = %gora_back, "request refunded and closed");
            return Ok(RefundOutcome::Closed {
                algo: algo_back,
                gora: gora_back,
            });
        }

        let key_hash = request.key_hash;
        let proposals = request.proposals.clone();
        if request.total_votes_refunded >= request.total_votes {
            // every voter already took its refund while the request sat expired
            let algo_back = request
                .algo_fee
                .checked_add(request.storage_deposit)
                .ok_or(ConsensusError::Overflow)?;
            ledger.release(requester, algo_back, gora_back)?;
            self.live.remove(&key_hash);
            self.archive(&proposals);
            self.requests.remove(id);
            info!(request = %id, algo = %algo_back, gora = %gora_back, "request refunded and closed");
            return Ok(RefundOutcome::Closed {
                algo: algo_back,
                gora: gora_back,
            });
        }

        ledger.release(requester, AlgoAmount::ZERO, gora_back)?;
        if let Some(request) = self.requests.get_mut(id) {
            request.gora_fee = GoraAmount::ZERO;
            request.status = RequestStatus::Refunded;
            request.is_history = true;
        }
        self.live.remove(&key_hash);
        self.archive(&proposals);
        info!(request = %id, gora = %gora_back, "request refunded, awaiting voter refunds");
        Ok(RefundOutcome::AwaitingVoterRefunds { gora: gora_back })
    }

    // ── Completion ───────────────────────────────────────────────────────

    /// Mark a request completed with `winning`, archive its proposals,
    /// release its key and return the storage deposit. Irreversible.
    pub fn complete(
        &mut self,
        id: &RequestId,
        winning: Proposal,
        ledger: &mut StakeLedger,
    ) -> Result<(), ConsensusError> {
        let request = self.requests.get(id).ok_or(ConsensusError::RequestNotFound(*id))?;
        if request.status == RequestStatus::Completed {
            return Err(ConsensusError::RequestAlreadyCompleted(*id));
        }
        let requester = request.requester;
        let deposit = request.storage_deposit;
        let key_hash = request.key_hash;
        ledger.release(&requester, deposit, GoraAmount::ZERO)?;

        let proposals = request.proposals.clone();
        if let Some(request) = self.requests.get_mut(id) {
            request.status = RequestStatus::Completed;
            request.is_history = true;
            request.storage_deposit = AlgoAmount::ZERO;
            request.winning = Some(winning);
        }
        self.live.remove(&key_hash);
        self.archive(&proposals);
        info!(request = %id, "request completed");
        Ok(())
    }

    fn archive(&mut self, vote_hashes: &[VoteHash]) {
        for vh in vote_hashes {
            if let Some(record) = self.proposals.remove(vh) {
                self.proposals.insert(*vh, record.archive());
            }
        }
    }

    // ── Expiry ───────────────────────────────────────────────────────────

    /// Move every open request past its time lock to `RefundAvailable`.
    pub fn expire(&mut self, now: Round) -> Vec<RequestId> {
        let time_lock = self.params.time_lock;
        let mut expired = Vec::new();
        for request in self.requests.values_mut() {
            if request.status.is_open() && request.timed_out(time_lock, now) {
                request.status = RequestStatus::RefundAvailable;
                expired.push(request.id);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), round = %now, "requests expired");
        }
        expired
    }

    // ── Proposals ────────────────────────────────────────────────────────

    pub fn get_proposal(&self, vote_hash: &VoteHash) -> Option<&ProposalRecord> {
        self.proposals.get(vote_hash)
    }

    /// Store an active proposal, linking it to its request on first insert.
    pub fn put_proposal(&mut self, proposal: Proposal) {
        let vh = proposal.vote_hash;
        let request_id = proposal.request_id;
        if self.proposals.insert(vh, ProposalRecord::Active(proposal)).is_none() {
            if let Some(request) = self.requests.get_mut(&request_id) {
                request.proposals.push(vh);
            }
        }
    }

    /// Garbage-collect an archived proposal last voted on before `now`.
    pub fn delete_archived_proposal(&mut self, vote_hash: &VoteHash, now: Round) -> Result<Proposal, ConsensusError> {
        let record = self
            .proposals
            .get(vote_hash)
            .ok_or(ConsensusError::ProposalNotFound(*vote_hash))?;
        let ProposalRecord::Archived(proposal) = record else {
            return Err(ConsensusError::ProposalNotArchived(*vote_hash));
        };
        if proposal.vote_round >= now {
            return Err(ConsensusError::ProposalTooRecent {
                vote_hash: *vote_hash,
                vote_round: proposal.vote_round,
            });
        }
        let request_id = proposal.request_id;
        let removed = match self.proposals.remove(vote_hash) {
            Some(record) => record.proposal().clone(),
            None => return Err(ConsensusError::ProposalNotFound(*vote_hash)),
        };
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.proposals.retain(|vh| vh != vote_hash);
        }
        debug!(vote_hash = %vote_hash, "archived proposal deleted");
        Ok(removed)
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn get_request_info(&self, id: &RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    pub fn get_request_mut(&mut self, id: &RequestId) -> Option<&mut Request> {
        self.requests.get_mut(id)
    }

    /// The live request for `(requester, key)`, if any.
    pub fn live_request(&self, requester: &AccountId, key: &[u8]) -> Option<&Request> {
        self.live
            .get(&key_hash(requester, key))
            .and_then(|id| self.requests.get(id))
    }

    /// Drop a settled request record. Its proposals are left for GC.
    pub fn remove_request(&mut self, id: &RequestId) -> Option<Request> {
        let request = self.requests.remove(id)?;
        if self.live.get(&request.key_hash) == Some(id) {
            self.live.remove(&request.key_hash);
        }
        Some(request)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }
}

/// `amount * pct / 100` without intermediate overflow.
pub(crate) fn scale_percent(amount: u64, pct: u64) -> u64 {
    let scaled = u128::from(amount) * u128::from(pct.min(100)) / 100;
    u64::try_from(scaled).unwrap_or(amount)
}
