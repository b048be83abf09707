//! End-to-end flows through the node: staking, request submission, VRF
//! sortition, tallying, delivery, settlement, refunds, pools and snapshots.

use std::sync::Arc;

use gora_consensus::{Ballot, ConsensusError, Destination, Fee, RefundOutcome, Ticket, VoteOutcome};
use gora_crypto::account_from_label;
use gora_delegation::{PoolBalance, PoolSettings};
use gora_node::{NodeConfig, NodeError, OracleNode};
use gora_nullables::{NullClock, NullVrf, RecordingSink};
use gora_settlement::ClaimOutcome;
use gora_sortition::{votes_for_stake, HashVrf};
use gora_types::{AccountId, AlgoAmount, GoraAmount, RequestId, Round};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const VOTER_STAKE: u64 = 10_000_000;

/// Quorum at half the stake: two of three equal voters complete a request,
/// one never does.
fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.params.voting_threshold = 50;
    config
}

fn participation_key(voter: &AccountId) -> [u8; 32] {
    let mut key = *voter.as_bytes();
    key[0] ^= 0xFF;
    key
}

fn destination() -> Destination {
    Destination {
        app_id: 77,
        method: *b"recv",
    }
}

struct Harness {
    node: OracleNode,
    sink: Arc<RecordingSink>,
    clock: NullClock,
    voters: Vec<AccountId>,
    requester: AccountId,
}

/// Three voters staked and keyed at round 1; the clock is then moved past
/// the key time lock.
async fn harness(config: NodeConfig) -> Harness {
    let sink = Arc::new(RecordingSink::new());
    let node = OracleNode::new(config, sink.clone(), Arc::new(HashVrf::new())).unwrap();
    let clock = NullClock::new(1);
    let voters: Vec<_> = ["v1", "v2", "v3"].iter().map(|l| account_from_label(l)).collect();
    for voter in &voters {
        node.deposit_tokens(voter, VOTER_STAKE).await.unwrap();
        node.stake(voter, VOTER_STAKE, clock.now()).await.unwrap();
        node.register_participation_key(voter, participation_key(voter), clock.now())
            .await
            .unwrap();
    }
    let requester = account_from_label("requester");
    node.deposit_algo(&requester, 200_000).await.unwrap();
    node.deposit_tokens(&requester, 2_000_000).await.unwrap();
    clock.advance(10);
    Harness {
        node,
        sink,
        clock,
        voters,
        requester,
    }
}

impl Harness {
    async fn submit(&self, key: &[u8]) -> RequestId {
        self.node
            .submit_request(
                &self.requester,
                key,
                b"https://prices.example/btc".to_vec(),
                destination(),
                Fee::new(10_000, 1_000_000),
                self.clock.now(),
            )
            .await
            .unwrap()
    }

    /// An honest ballot: HashVrf output for the request seed and the weight
    /// sortition gives for the voter's stake.
    async fn ballot(&self, voter: &AccountId, request_id: RequestId, value: &[u8]) -> Ballot {
        let request = self.node.get_request_info(&request_id).await.unwrap();
        let time_lock = self.node.params().await.time_lock;
        let vrf = HashVrf::new().evaluate(&participation_key(voter), &request.seed);
        let weight = votes_for_stake(vrf.q(), VOTER_STAKE);
        Ballot {
            voter: *voter,
            request_id,
            ticket: Ticket {
                first_valid: request.submitted_round.saturating_add(1),
                last_valid: request.submitted_round.saturating_add(time_lock),
                lease: *request_id.as_bytes(),
            },
            vrf,
            weight,
            value: value.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_completes_on_second_vote_and_pays_winners() {
    let h = harness(config()).await;
    let id = h.submit(b"btc-usd").await;
    h.clock.advance(1);

    let first = h.ballot(&h.voters[0], id, b"42000").await;
    let report = h.node.vote(first, h.clock.now()).await.unwrap();
    assert!(matches!(report.outcome, VoteOutcome::QuorumNotYetReached { .. }));
    assert_eq!(report.previous, None);
    assert_eq!(h.sink.count(), 0);

    let second = h.ballot(&h.voters[1], id, b"42000").await;
    let report = h.node.vote(second, h.clock.now()).await.unwrap();
    assert!(matches!(report.outcome, VoteOutcome::Completed { .. }));

    let delivered = h.sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].value, b"42000".to_vec());
    assert_eq!(delivered[0].destination, destination());

    let late = h.ballot(&h.voters[2], id, b"42000").await;
    let err = h.node.vote(late, h.clock.now()).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Consensus(ConsensusError::RequestAlreadyCompleted(_))
    ));
    assert_eq!(h.sink.count(), 1);

    let mut algo_paid = 0;
    let mut gora_paid = 0;
    for voter in &h.voters[..2] {
        match h.node.claim(voter, voter, &id, h.clock.now()).await.unwrap() {
            ClaimOutcome::Rewarded { algo, gora } => {
                assert!(algo.raw() > 0 && gora.raw() > 0);
                algo_paid += algo.raw();
                gora_paid += gora.raw();
            }
            other => panic!("expected a reward, got {other:?}"),
        }
    }
    assert!(algo_paid <= 10_000);
    assert!(gora_paid <= 1_000_000);
    // every winner paid, the record is gone
    assert!(h.node.get_request_info(&id).await.is_none());

    let again = h.node.claim(&h.voters[0], &h.voters[0], &id, h.clock.now()).await.unwrap();
    assert_eq!(again, ClaimOutcome::AlreadyClaimed);

    let m = &h.node.metrics;
    assert_eq!(m.votes_accepted.get(), 2);
    assert_eq!(m.votes_rejected.get(), 1);
    assert_eq!(m.requests_completed.get(), 1);
    assert_eq!(m.claims_paid.get(), 2);
    assert_eq!(m.live_requests.get(), 0);
}

#[tokio::test]
async fn duplicate_key_rejected_until_completion() {
    let h = harness(config()).await;
    let _id = h.submit(b"eth-usd").await;
    let err = h
        .node
        .submit_request(
            &h.requester,
            b"eth-usd",
            Vec::new(),
            destination(),
            Fee::new(10_000, 1_000_000),
            h.clock.now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Consensus(ConsensusError::DuplicateKey(_))));
    assert_eq!(h.node.metrics.requests_submitted.get(), 1);
}

#[tokio::test]
async fn fee_below_minimum_escrows_nothing() {
    let h = harness(config()).await;
    let before = h.node.get_stake(&h.requester).await;
    let err = h
        .node
        .submit_request(
            &h.requester,
            b"k",
            Vec::new(),
            destination(),
            Fee::new(100, 1_000_000),
            h.clock.now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Consensus(ConsensusError::InsufficientFee { .. })));
    assert_eq!(h.node.get_stake(&h.requester).await, before);
}

#[tokio::test]
async fn failed_delivery_leaves_request_open() {
    let h = harness(config()).await;
    let id = h.submit(b"btc-usd").await;
    h.clock.advance(1);
    let first = h.ballot(&h.voters[0], id, b"1").await;
    h.node.vote(first, h.clock.now()).await.unwrap();

    h.sink.fail_with(Some("destination offline"));
    let second = h.ballot(&h.voters[1], id, b"1").await;
    let err = h.node.vote(second, h.clock.now()).await.unwrap_err();
    assert!(matches!(err, NodeError::Consensus(ConsensusError::DeliveryFailed(_))));
    assert!(h.node.get_voter_history(&h.voters[1]).await.is_none());

    h.sink.fail_with(None);
    let retry = h.ballot(&h.voters[1], id, b"1").await;
    let report = h.node.vote(retry, h.clock.now()).await.unwrap();
    assert!(matches!(report.outcome, VoteOutcome::Completed { .. }));
    assert_eq!(h.sink.count(), 1);
}

#[tokio::test]
async fn refund_after_timeout_then_voter_refund_closes() {
    let h = harness(config()).await;
    let id = h.submit(b"btc-usd").await;
    h.clock.advance(1);
    let only = h.ballot(&h.voters[0], id, b"7").await;
    h.node.vote(only, h.clock.now()).await.unwrap();

    let err = h.node.refund_request(&h.requester, &id, h.clock.now()).await.unwrap_err();
    assert!(matches!(err, NodeError::Consensus(ConsensusError::NotTimedOut { .. })));

    h.clock.advance(10);
    let outcome = h.node.refund_request(&h.requester, &id, h.clock.now()).await.unwrap();
    assert_eq!(
        outcome,
        RefundOutcome::AwaitingVoterRefunds {
            gora: GoraAmount::new(1_000_000)
        }
    );
    let claimed = h.node.claim(&h.requester, &h.voters[0], &id, h.clock.now()).await.unwrap();
    assert_eq!(
        claimed,
        ClaimOutcome::Refunded {
            algo: AlgoAmount::new(2_000),
            closed: true
        }
    );

    let requester = h.node.get_stake(&h.requester).await;
    // 200_000 - 10_000 fee - 60_900 deposit + 8_000 remainder + 60_900 deposit
    assert_eq!(requester.algo, AlgoAmount::new(198_000));
    assert_eq!(requester.tokens, GoraAmount::new(2_000_000));
    assert_eq!(h.node.get_stake(&h.voters[0]).await.algo, AlgoAmount::new(2_000));
    assert!(h.node.get_request_info(&id).await.is_none());
}

#[tokio::test]
async fn expiry_sweep_marks_open_requests() {
    let h = harness(config()).await;
    let id = h.submit(b"btc-usd").await;
    assert!(h.node.expire_requests(h.clock.now()).await.is_empty());
    h.clock.advance(11);
    assert_eq!(h.node.expire_requests(h.clock.now()).await, vec![id]);
    assert_eq!(h.node.metrics.requests_expired.get(), 1);
}

#[tokio::test]
async fn new_vote_settles_previous_entry_first() {
    let h = harness(config()).await;
    let a = h.submit(b"a").await;
    let b = h.submit(b"b").await;
    h.clock.advance(1);

    let on_a = h.ballot(&h.voters[0], a, b"1").await;
    h.node.vote(on_a, h.clock.now()).await.unwrap();
    let on_b = h.ballot(&h.voters[0], b, b"2").await;
    let report = h.node.vote(on_b, h.clock.now()).await.unwrap();
    assert_eq!(report.previous, Some((a, ClaimOutcome::Pending)));
    assert_eq!(h.node.get_voter_history(&h.voters[0]).await.unwrap().request_id, b);
}

#[tokio::test]
async fn rejected_proof_counts_as_rejected_vote() {
    let sink = Arc::new(RecordingSink::new());
    let verifier = Arc::new(NullVrf::reject_all());
    let node = OracleNode::new(config(), sink, verifier.clone()).unwrap();
    let voter = account_from_label("v1");
    let requester = account_from_label("requester");
    node.deposit_tokens(&voter, VOTER_STAKE).await.unwrap();
    node.stake(&voter, VOTER_STAKE, Round::new(1)).await.unwrap();
    node.register_participation_key(&voter, [3; 32], Round::new(1)).await.unwrap();
    node.deposit_algo(&requester, 100_000).await.unwrap();
    node.deposit_tokens(&requester, 1_000_000).await.unwrap();
    let id = node
        .submit_request(&requester, b"k", Vec::new(), destination(), Fee::new(10_000, 1_000_000), Round::new(11))
        .await
        .unwrap();
    let request = node.get_request_info(&id).await.unwrap();
    let vrf = HashVrf::new().evaluate(&[3; 32], &request.seed);
    let ballot = Ballot {
        voter,
        request_id: id,
        ticket: Ticket {
            first_valid: Round::new(12),
            last_valid: Round::new(21),
            lease: *id.as_bytes(),
        },
        weight: votes_for_stake(vrf.q(), VOTER_STAKE),
        vrf,
        value: b"x".to_vec(),
    };
    let err = node.vote(ballot, Round::new(12)).await.unwrap_err();
    assert!(matches!(err, NodeError::Consensus(ConsensusError::InvalidProof(_))));
    assert_eq!(verifier.calls(), 1);
    assert_eq!(node.metrics.votes_rejected.get(), 1);
}

// ---------------------------------------------------------------------------
// Delegation pools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_rolls_over_and_pays_depositor() {
    let node = OracleNode::new(config(), Arc::new(RecordingSink::new()), Arc::new(HashVrf::new())).unwrap();
    let pool = account_from_label("pool");
    let manager = account_from_label("manager");
    let alice = account_from_label("alice");
    let settings = PoolSettings {
        manager,
        manager_algo_share_bp: 0,
        manager_gora_share_bp: 0,
    };
    node.create_pool(&pool, settings, Round::new(0)).await.unwrap();
    node.deposit_tokens(&alice, 1_000).await.unwrap();
    node.pool_stake(&pool, &alice, 1_000, None, Round::new(1)).await.unwrap();

    let err = node.pool_unstake(&pool, &alice, 10, Round::new(2)).await.unwrap_err();
    assert!(matches!(err, NodeError::Delegation(_)));

    assert!(node.process_aggregation(&pool, Round::new(11)).await.unwrap());
    assert_eq!(node.get_stake(&pool).await.stake, 1_000);

    node.deposit_algo(&pool, 500).await.unwrap();
    assert!(node.process_aggregation(&pool, Round::new(22)).await.unwrap());
    let paid = node.pool_user_claim(&pool, &alice, Round::new(23)).await.unwrap();
    assert_eq!(paid, PoolBalance::new(500, 0));
    assert_eq!(node.metrics.pool_rollovers.get(), 2);
    assert_eq!(node.get_depositor(&pool, &alice).await.unwrap().local_stake, 1_000);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.data_dir = dir.path().to_path_buf();

    let h = harness(config.clone()).await;
    let id = h.submit(b"btc-usd").await;
    let path = h.node.save_snapshot().await.unwrap();
    assert!(path.exists());

    let reopened = OracleNode::open(config, Arc::new(RecordingSink::new()), Arc::new(HashVrf::new())).unwrap();
    let request = reopened.get_request_info(&id).await.unwrap();
    assert_eq!(request.requester, h.requester);
    assert_eq!(reopened.get_stake(&h.voters[0]).await.stake, VOTER_STAKE);
    assert_eq!(reopened.metrics.live_requests.get(), 1);
    assert_eq!(reopened.params().await.voting_threshold, 50);
}
