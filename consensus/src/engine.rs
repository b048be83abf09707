//! Vote tally engine.
//!
//! Validates a ballot against its request, the voter's stake and VRF proof,
//! adds its weight to the proposal for the returned value, and completes the
//! request once a proposal reaches quorum.

use gora_crypto::vote_hash;
use gora_sortition::{votes_for_stake, VrfOutput, VrfVerifier};
use gora_stake::StakeLedger;
use gora_types::{AccountId, KeyHash, ProtocolParams, RequestId, Round, VoteHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConsensusError;
use crate::history::{VoterHistory, VoterHistoryEntry};
use crate::lease::{LeaseBook, Ticket};
use crate::proposal::{Proposal, ProposalRecord};
use crate::quorum;
use crate::registry::RequestRegistry;
use crate::request::{Request, RequestStatus};
use crate::sink::{Delivery, ResponseSink};

/// A voter's answer to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: AccountId,
    pub request_id: RequestId,
    pub ticket: Ticket,
    pub vrf: VrfOutput,
    /// Weight the voter claims from sortition; must match the recomputed one.
    pub weight: u64,
    pub value: Vec<u8>,
}

/// Result of an accepted vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    QuorumNotYetReached {
        vote_hash: VoteHash,
        vote_count: u64,
        threshold: u64,
    },
    Completed {
        vote_hash: VoteHash,
        vote_count: u64,
    },
}

/// Registry, lease book and voter history behind one writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteEngine {
    pub registry: RequestRegistry,
    pub leases: LeaseBook,
    pub history: VoterHistory,
}

impl VoteEngine {
    pub fn new(params: ProtocolParams) -> Self {
        Self {
            registry: RequestRegistry::new(params),
            leases: LeaseBook::new(),
            history: VoterHistory::new(),
        }
    }

    pub fn params(&self) -> &ProtocolParams {
        self.registry.params()
    }

    /// The response body a vote hash commits to: the request id followed by
    /// the returned value.
    pub fn response_body(request_id: &RequestId, value: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(32 + value.len());
        body.extend_from_slice(request_id.as_bytes());
        body.extend_from_slice(value);
        body
    }

    /// Proposal key for `value` on `request`.
    pub fn vote_hash_for(request: &Request, value: &[u8]) -> VoteHash {
        vote_hash(
            &Self::response_body(&request.id, value),
            request.destination.app_id,
            &request.destination.method,
            &request.requester,
        )
    }

    /// Quorum vote count for a request.
    pub fn threshold_for(&self, request: &Request) -> u64 {
        quorum::threshold(self.params().voting_threshold, request.total_stake)
    }

    /// Tally one vote. No state changes unless the vote is accepted.
    pub fn vote(
        &mut self,
        ballot: Ballot,
        now: Round,
        ledger: &mut StakeLedger,
        verifier: &dyn VrfVerifier,
        sink: &dyn ResponseSink,
    ) -> Result<VoteOutcome, ConsensusError> {
        let time_lock = self.params().time_lock;
        let voting_threshold = self.params().voting_threshold;
        let request = self
            .registry
            .get_request_info(&ballot.request_id)
            .ok_or(ConsensusError::RequestNotFound(ballot.request_id))?;

        Self::check_votable(request, time_lock, now)?;
        Self::check_ticket(request, &ballot.ticket, time_lock, now)?;
        if self.leases.conflicts(&ballot.voter, &ballot.ticket) {
            return Err(ConsensusError::OverlappingLease);
        }

        let stake = ledger.stake_at(&ballot.voter, request.submitted_round)?;
        if stake == 0 {
            return Err(ConsensusError::ZeroStake(request.submitted_round));
        }
        let key = match ledger.participation_key(&ballot.voter) {
            Some(pk) if pk.ready(time_lock, now) => pk.key,
            _ => return Err(ConsensusError::ParticipationKeyNotReady),
        };
        if !verifier.verify(&key, &request.seed, &ballot.vrf)? {
            return Err(ConsensusError::InvalidProof(verifier.name().to_string()));
        }
        let expected = votes_for_stake(ballot.vrf.q(), stake);
        if ballot.weight != expected {
            return Err(ConsensusError::WeightMismatch {
                claimed: ballot.weight,
                expected,
            });
        }
        if expected == 0 {
            return Err(ConsensusError::NotSelected);
        }

        let vh = Self::vote_hash_for(request, &ballot.value);
        let mut proposal = match self.registry.get_proposal(&vh) {
            Some(ProposalRecord::Active(p)) => p.clone(),
            Some(ProposalRecord::Archived(_)) => {
                return Err(ConsensusError::RequestAlreadyCompleted(request.id))
            }
            None => Proposal::new(vh, request.id, request.requester, ballot.value.clone(), now),
        };
        proposal.vote_count = proposal
            .vote_count
            .checked_add(ballot.weight)
            .ok_or(ConsensusError::Overflow)?;
        proposal.stake_count = proposal
            .stake_count
            .checked_add(stake)
            .ok_or(ConsensusError::Overflow)?;
        proposal.vote_round = now;
        let total_votes = request
            .total_votes
            .checked_add(ballot.weight)
            .ok_or(ConsensusError::Overflow)?;

        let reached = quorum::reached(proposal.vote_count, voting_threshold, request.total_stake);
        if reached {
            let delivery = Delivery {
                request_id: request.id,
                requester: request.requester,
                destination: request.destination,
                value: ballot.value.clone(),
            };
            if let Err(reason) = sink.deliver(&delivery) {
                warn!(request = %request.id, sink = sink.name(), %reason, "delivery rejected");
                return Err(ConsensusError::DeliveryFailed(reason));
            }
        }

        let threshold = self.threshold_for(request);
        let key_hash: KeyHash = request.key_hash;
        let request_id = request.id;

        // accepted from here on
        if let Some(request) = self.registry.get_request_mut(&request_id) {
            request.total_votes = total_votes;
            if request.status == RequestStatus::Made {
                request.status = RequestStatus::Processing;
            }
        }
        self.registry.put_proposal(proposal.clone());
        self.leases.record(ballot.voter, ballot.ticket);
        self.history.record(
            ballot.voter,
            VoterHistoryEntry {
                key_hash,
                request_id,
                vote_hash: vh,
                vote_count: ballot.weight,
                stake_count: stake,
                vote_round: now,
                claimed: false,
            },
        );
        debug!(
            request = %request_id,
            voter = %ballot.voter,
            weight = ballot.weight,
            vote_count = proposal.vote_count,
            threshold,
            "vote accepted"
        );

        if reached {
            let vote_count = proposal.vote_count;
            self.registry.complete(&request_id, proposal, ledger)?;
            return Ok(VoteOutcome::Completed {
                vote_hash: vh,
                vote_count,
            });
        }
        Ok(VoteOutcome::QuorumNotYetReached {
            vote_hash: vh,
            vote_count: proposal.vote_count,
            threshold,
        })
    }

    fn check_votable(request: &Request, time_lock: u64, now: Round) -> Result<(), ConsensusError> {
        match request.status {
            RequestStatus::Completed => Err(ConsensusError::RequestAlreadyCompleted(request.id)),
            RequestStatus::Refunded => Err(ConsensusError::AlreadyRefunded(request.id)),
            RequestStatus::RefundAvailable => Err(ConsensusError::RequestExpired(request.id)),
            _ if request.timed_out(time_lock, now) => Err(ConsensusError::RequestExpired(request.id)),
            _ => Ok(()),
        }
    }

    fn check_ticket(request: &Request, ticket: &Ticket, time_lock: u64, now: Round) -> Result<(), ConsensusError> {
        if ticket.first_valid <= request.submitted_round {
            return Err(ConsensusError::InvalidTicket(format!(
                "first_valid {} not after submission round {}",
                ticket.first_valid, request.submitted_round
            )));
        }
        if ticket.last_valid != request.deadline(time_lock) {
            return Err(ConsensusError::InvalidTicket(format!(
                "last_valid {} must be {}",
                ticket.last_valid,
                request.deadline(time_lock)
            )));
        }
        if now < ticket.first_valid || now > ticket.last_valid {
            return Err(ConsensusError::InvalidTicket(format!(
                "round {} outside window {}..={}",
                now, ticket.first_valid, ticket.last_valid
            )));
        }
        if &ticket.lease != request.id.as_bytes() {
            return Err(ConsensusError::InvalidLease(request.id));
        }
        Ok(())
    }

    /// Drop lease windows that have closed.
    pub fn prune_leases(&mut self, now: Round) -> usize {
        self.leases.prune(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Destination, Fee};
    use crate::sink::DiscardSink;
    use gora_sortition::{SortitionError, MIDPOINT};
    use gora_types::{AlgoAmount, GoraAmount};
    use std::sync::Mutex;

    // ── Test doubles ─────────────────────────────────────────────────────

    struct AcceptAll;

    impl VrfVerifier for AcceptAll {
        fn verify(&self, _: &[u8; 32], _: &[u8; 32], _: &VrfOutput) -> Result<bool, SortitionError> {
            Ok(true)
        }
        fn name(&self) -> &str {
            "accept-all"
        }
    }

    struct RejectAll;

    impl VrfVerifier for RejectAll {
        fn verify(&self, _: &[u8; 32], _: &[u8; 32], _: &VrfOutput) -> Result<bool, SortitionError> {
            Ok(false)
        }
        fn name(&self) -> &str {
            "reject-all"
        }
    }

    #[derive(Default)]
    struct Recorder {
        delivered: Mutex<Vec<Delivery>>,
        fail: bool,
    }

    impl ResponseSink for Recorder {
        fn deliver(&self, delivery: &Delivery) -> Result<(), String> {
            if self.fail {
                return Err("destination unreachable".into());
            }
            if let Ok(mut d) = self.delivered.lock() {
                d.push(delivery.clone());
            }
            Ok(())
        }
        fn name(&self) -> &str {
            "recorder"
        }
    }

    // ── Fixture ──────────────────────────────────────────────────────────

    fn make_account(byte: u8) -> AccountId {
        AccountId::new([byte; 32])
    }

    /// VRF output whose prefix is exactly the midpoint: weight = stake / 1000.
    fn mid_output() -> VrfOutput {
        let mut output = [0u8; 32];
        output[..8].copy_from_slice(&MIDPOINT.to_be_bytes());
        VrfOutput::new(output, Vec::new())
    }

    struct Fixture {
        engine: VoteEngine,
        ledger: StakeLedger,
        requester: AccountId,
        request: RequestId,
    }

    /// Voters 1, 2, 3 stake 100k, 50k, 50k; account 4 stakes 100k and never
    /// votes. Total 300k with threshold 50 means 150 votes complete.
    fn setup() -> Fixture {
        let params = ProtocolParams {
            voting_threshold: 50,
            algo_request_fee: 1_000,
            gora_request_fee: 1_000,
            request_storage_deposit: 100,
            ..ProtocolParams::default()
        };
        let mut ledger = StakeLedger::new(&params);
        for (byte, stake) in [(1u8, 100_000u64), (2, 50_000), (3, 50_000), (4, 100_000)] {
            let id = make_account(byte);
            ledger.deposit_tokens(&id, GoraAmount::new(stake)).unwrap();
            ledger.stake(&id, stake, Round::new(1)).unwrap();
            ledger.register_participation_key(&id, [byte; 32], Round::new(1)).unwrap();
        }
        let requester = make_account(9);
        ledger.deposit_algo(&requester, AlgoAmount::new(10_000)).unwrap();
        ledger.deposit_tokens(&requester, GoraAmount::new(10_000)).unwrap();

        let mut engine = VoteEngine::new(params);
        let request = engine
            .registry
            .submit(
                requester,
                b"btc/usd",
                b"https://prices".to_vec(),
                Destination {
                    app_id: 42,
                    method: *b"recv",
                },
                Fee::new(1_000, 1_000),
                Round::new(10),
                &mut ledger,
            )
            .unwrap();
        Fixture {
            engine,
            ledger,
            requester,
            request,
        }
    }

    fn ballot(f: &Fixture, voter: u8, weight: u64, value: &[u8]) -> Ballot {
        Ballot {
            voter: make_account(voter),
            request_id: f.request,
            ticket: Ticket {
                first_valid: Round::new(11),
                last_valid: Round::new(20),
                lease: *f.request.as_bytes(),
            },
            vrf: mid_output(),
            weight,
            value: value.to_vec(),
        }
    }

    fn cast(f: &mut Fixture, b: Ballot, now: u64, sink: &dyn ResponseSink) -> Result<VoteOutcome, ConsensusError> {
        f.engine.vote(b, Round::new(now), &mut f.ledger, &AcceptAll, sink)
    }

    // ── Quorum flow ──────────────────────────────────────────────────────

    #[test]
    fn completes_on_second_vote_and_rejects_third() {
        let mut f = setup();
        let sink = Recorder::default();
        let b1 = ballot(&f, 1, 100, b"42000");
        let first = cast(&mut f, b1, 12, &sink).unwrap();
        assert!(matches!(
            first,
            VoteOutcome::QuorumNotYetReached { vote_count: 100, threshold: 150, .. }
        ));
        assert_eq!(
            f.engine.registry.get_request_info(&f.request).unwrap().status,
            RequestStatus::Processing
        );

        let b2 = ballot(&f, 2, 50, b"42000");
        let second = cast(&mut f, b2, 13, &sink).unwrap();
        assert!(matches!(second, VoteOutcome::Completed { vote_count: 150, .. }));

        let b3 = ballot(&f, 3, 50, b"42000");
        assert!(matches!(
            cast(&mut f, b3, 14, &sink),
            Err(ConsensusError::RequestAlreadyCompleted(_))
        ));

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].value, b"42000".to_vec());
        assert_eq!(delivered[0].destination.app_id, 42);
    }

    #[test]
    fn completion_archives_all_proposals_and_frees_key() {
        let mut f = setup();
        let sink = DiscardSink;
        let b = ballot(&f, 3, 50, b"41999");
        cast(&mut f, b, 12, &sink).unwrap();
        let b = ballot(&f, 1, 100, b"42000");
        cast(&mut f, b, 12, &sink).unwrap();
        let b = ballot(&f, 2, 50, b"42000");
        cast(&mut f, b, 13, &sink).unwrap();

        let req = f.engine.registry.get_request_info(&f.request).unwrap();
        assert_eq!(req.status, RequestStatus::Completed);
        assert_eq!(req.proposals.len(), 2);
        for vh in &req.proposals {
            assert!(f.engine.registry.get_proposal(vh).unwrap().is_archived());
        }
        assert_eq!(req.winning.as_ref().unwrap().vote_count, 150);
        assert_eq!(req.total_votes, 200);
        assert!(f.engine.registry.live_request(&f.requester, b"btc/usd").is_none());
        // deposit returned on completion
        assert_eq!(f.ledger.algo_balance(&f.requester), AlgoAmount::new(9_000));
    }

    #[test]
    fn distinct_values_tally_separately() {
        let mut f = setup();
        let sink = DiscardSink;
        let b = ballot(&f, 1, 100, b"1");
        cast(&mut f, b, 12, &sink).unwrap();
        let b = ballot(&f, 2, 50, b"2");
        let out = cast(&mut f, b, 12, &sink).unwrap();
        assert!(matches!(out, VoteOutcome::QuorumNotYetReached { vote_count: 50, .. }));
    }

    #[test]
    fn failed_delivery_leaves_no_trace() {
        let mut f = setup();
        let ok = DiscardSink;
        let b = ballot(&f, 1, 100, b"42000");
        cast(&mut f, b, 12, &ok).unwrap();

        let failing = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let b = ballot(&f, 2, 50, b"42000");
        assert!(matches!(
            cast(&mut f, b.clone(), 13, &failing),
            Err(ConsensusError::DeliveryFailed(_))
        ));
        let req = f.engine.registry.get_request_info(&f.request).unwrap();
        assert_eq!(req.status, RequestStatus::Processing);
        assert_eq!(req.total_votes, 100);
        assert!(f.engine.history.get(&make_account(2)).is_none());

        // retry succeeds: the lease was not recorded
        assert!(matches!(cast(&mut f, b, 13, &ok).unwrap(), VoteOutcome::Completed { .. }));
    }

    // ── Ballot validation ────────────────────────────────────────────────

    #[test]
    fn second_vote_same_lease_overlaps() {
        let mut f = setup();
        let sink = DiscardSink;
        let b = ballot(&f, 1, 100, b"1");
        cast(&mut f, b.clone(), 12, &sink).unwrap();
        assert!(matches!(cast(&mut f, b, 13, &sink), Err(ConsensusError::OverlappingLease)));
    }

    #[test]
    fn lease_must_name_request() {
        let mut f = setup();
        let mut b = ballot(&f, 1, 100, b"1");
        b.ticket.lease = [0xaa; 32];
        assert!(matches!(
            cast(&mut f, b, 12, &DiscardSink),
            Err(ConsensusError::InvalidLease(_))
        ));
    }

    #[test]
    fn ticket_window_enforced() {
        let mut f = setup();
        let mut early = ballot(&f, 1, 100, b"1");
        early.ticket.first_valid = Round::new(10);
        assert!(matches!(
            cast(&mut f, early, 12, &DiscardSink),
            Err(ConsensusError::InvalidTicket(_))
        ));

        let mut wrong_end = ballot(&f, 1, 100, b"1");
        wrong_end.ticket.last_valid = Round::new(19);
        assert!(matches!(
            cast(&mut f, wrong_end, 12, &DiscardSink),
            Err(ConsensusError::InvalidTicket(_))
        ));

        let mut late_start = ballot(&f, 1, 100, b"1");
        late_start.ticket.first_valid = Round::new(15);
        assert!(matches!(
            cast(&mut f, late_start, 12, &DiscardSink),
            Err(ConsensusError::InvalidTicket(_))
        ));
    }

    #[test]
    fn vote_after_deadline_expired() {
        let mut f = setup();
        let b = ballot(&f, 1, 100, b"1");
        assert!(matches!(
            cast(&mut f, b, 21, &DiscardSink),
            Err(ConsensusError::RequestExpired(_))
        ));
    }

    #[test]
    fn wrong_weight_rejected() {
        let mut f = setup();
        let b = ballot(&f, 1, 101, b"1");
        assert!(matches!(
            cast(&mut f, b, 12, &DiscardSink),
            Err(ConsensusError::WeightMismatch { claimed: 101, expected: 100 })
        ));
    }

    #[test]
    fn unstaked_voter_rejected() {
        let mut f = setup();
        f.ledger
            .register_participation_key(&make_account(7), [7; 32], Round::new(1))
            .unwrap();
        let b = ballot(&f, 7, 0, b"1");
        assert!(matches!(cast(&mut f, b, 12, &DiscardSink), Err(ConsensusError::ZeroStake(_))));
    }

    #[test]
    fn fresh_participation_key_rejected() {
        let mut f = setup();
        let voter = make_account(8);
        f.ledger.deposit_tokens(&voter, GoraAmount::new(10_000)).unwrap();
        f.ledger.stake(&voter, 10_000, Round::new(1)).unwrap();
        f.ledger.register_participation_key(&voter, [8; 32], Round::new(5)).unwrap();
        let b = ballot(&f, 8, 10, b"1");
        // registered at 5, ready at 15
        assert!(matches!(
            cast(&mut f, b.clone(), 12, &DiscardSink),
            Err(ConsensusError::ParticipationKeyNotReady)
        ));
        cast(&mut f, b, 15, &DiscardSink).unwrap();
    }

    #[test]
    fn bad_proof_rejected() {
        let mut f = setup();
        let b = ballot(&f, 1, 100, b"1");
        let err = f
            .engine
            .vote(b, Round::new(12), &mut f.ledger, &RejectAll, &DiscardSink)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidProof(name) if name == "reject-all"));
    }

    #[test]
    fn refunded_request_rejects_votes() {
        let mut f = setup();
        let b = ballot(&f, 1, 100, b"1");
        cast(&mut f, b, 12, &DiscardSink).unwrap();
        let requester = f.requester;
        f.engine
            .registry
            .refund(&requester, &f.request, Round::new(21), &mut f.ledger)
            .unwrap();
        let b = ballot(&f, 2, 50, b"1");
        assert!(matches!(
            cast(&mut f, b, 20, &DiscardSink),
            Err(ConsensusError::AlreadyRefunded(_))
        ));
    }

    #[test]
    fn unknown_request_not_found() {
        let mut f = setup();
        let mut b = ballot(&f, 1, 100, b"1");
        b.request_id = RequestId::new([0xee; 32]);
        assert!(matches!(
            cast(&mut f, b, 12, &DiscardSink),
            Err(ConsensusError::RequestNotFound(_))
        ));
    }

    // ── History ──────────────────────────────────────────────────────────

    #[test]
    fn winning_contributions_sum_to_vote_count() {
        let mut f = setup();
        let sink = DiscardSink;
        let b = ballot(&f, 1, 100, b"x");
        cast(&mut f, b, 12, &sink).unwrap();
        let b = ballot(&f, 2, 50, b"x");
        cast(&mut f, b, 12, &sink).unwrap();
        let req = f.engine.registry.get_request_info(&f.request).unwrap();
        let winning = req.winning.as_ref().unwrap();
        let sum: u64 = f
            .engine
            .history
            .for_request(&f.request)
            .filter(|(_, e)| e.vote_hash == winning.vote_hash)
            .map(|(_, e)| e.vote_count)
            .sum();
        assert_eq!(sum, winning.vote_count);
        assert_eq!(winning.stake_count, 150_000);
    }

    #[test]
    fn engine_state_survives_bincode() {
        let mut f = setup();
        let b = ballot(&f, 1, 100, b"x");
        cast(&mut f, b, 12, &DiscardSink).unwrap();
        let bytes = bincode::serialize(&f.engine).unwrap();
        let back: VoteEngine = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.registry.request_count(), 1);
        assert_eq!(back.history.len(), 1);
        assert_eq!(back.leases.len(), 1);
    }
}
