//! The oracle node: every engine behind one writer.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use gora_consensus::{
    Ballot, Destination, Fee, Proposal, ProposalRecord, RefundOutcome, Request, ResponseSink, VoteOutcome,
    VoterHistoryEntry,
};
use gora_delegation::{DelegationError, DelegationPool, DepositorState, PoolBalance, PoolInfo, PoolSettings};
use gora_settlement::{claim, claimable, ClaimOutcome};
use gora_sortition::VrfVerifier;
use gora_stake::{ParticipationKey, StakeLedger};
use gora_types::{AccountId, AlgoAmount, GoraAmount, ProtocolParams, RequestId, Round, VoteHash};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::snapshot;
use crate::state::OracleState;
use crate::tracing_spans::{claim_span, pool_span, refund_span, submit_span, vote_span};

/// An accepted vote, plus what happened to the voter's previous unclaimed
/// entry, which the node settles first because the new vote replaces it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReport {
    pub outcome: VoteOutcome,
    /// `Pending` here means the earlier request was still open and that
    /// contribution was given up.
    pub previous: Option<(RequestId, ClaimOutcome)>,
}

/// An account's balances and stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeView {
    pub account: AccountId,
    pub algo: AlgoAmount,
    pub tokens: GoraAmount,
    pub stake: u64,
    pub stake_locked_until: Option<Round>,
    pub participation_key: Option<ParticipationKey>,
}

/// A running oracle node.
pub struct OracleNode {
    pub config: NodeConfig,
    state: Arc<Mutex<OracleState>>,
    sink: Arc<dyn ResponseSink>,
    verifier: Arc<dyn VrfVerifier>,
    pub metrics: Arc<NodeMetrics>,
}

impl OracleNode {
    /// A node with empty state.
    pub fn new(
        config: NodeConfig,
        sink: Arc<dyn ResponseSink>,
        verifier: Arc<dyn VrfVerifier>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let state = OracleState::new(&config.params);
        Self::from_state(config, state, sink, verifier)
    }

    /// A node resumed from the configured snapshot, or empty if there is
    /// none. A snapshot keeps the parameters it was written with.
    pub fn open(
        config: NodeConfig,
        sink: Arc<dyn ResponseSink>,
        verifier: Arc<dyn VrfVerifier>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let state = match snapshot::load(&config.snapshot_path())? {
            Some(state) => {
                if state.params() != &config.params {
                    warn!("snapshot parameters differ from configuration; keeping the snapshot's");
                }
                state
            }
            None => OracleState::new(&config.params),
        };
        Self::from_state(config, state, sink, verifier)
    }

    fn from_state(
        config: NodeConfig,
        state: OracleState,
        sink: Arc<dyn ResponseSink>,
        verifier: Arc<dyn VrfVerifier>,
    ) -> Result<Self, NodeError> {
        let metrics = Arc::new(NodeMetrics::new()?);
        refresh_gauges(&metrics, &state);
        info!(
            sink = sink.name(),
            verifier = verifier.name(),
            requests = state.engine.registry.request_count(),
            pools = state.pools.len(),
            "oracle node ready"
        );
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(state)),
            sink,
            verifier,
            metrics,
        })
    }

    pub async fn params(&self) -> ProtocolParams {
        self.state.lock().await.params().clone()
    }

    /// Write the whole state to the configured snapshot file.
    pub async fn save_snapshot(&self) -> Result<PathBuf, NodeError> {
        let path = self.config.snapshot_path();
        let state = self.state.lock().await;
        snapshot::save(&path, &state)?;
        Ok(path)
    }

    /// A copy of the current state.
    pub async fn state(&self) -> OracleState {
        self.state.lock().await.clone()
    }

    // ── Accounts ─────────────────────────────────────────────────────────

    pub async fn deposit_algo(&self, account: &AccountId, amount: u64) -> Result<AlgoAmount, NodeError> {
        let mut state = self.state.lock().await;
        Ok(state.ledger.deposit_algo(account, AlgoAmount::new(amount))?)
    }

    pub async fn withdraw_algo(&self, account: &AccountId, amount: u64) -> Result<AlgoAmount, NodeError> {
        let mut state = self.state.lock().await;
        Ok(state.ledger.withdraw_algo(account, AlgoAmount::new(amount))?)
    }

    pub async fn deposit_tokens(&self, account: &AccountId, amount: u64) -> Result<GoraAmount, NodeError> {
        let mut state = self.state.lock().await;
        Ok(state.ledger.deposit_tokens(account, GoraAmount::new(amount))?)
    }

    pub async fn withdraw_tokens(&self, account: &AccountId, amount: u64) -> Result<GoraAmount, NodeError> {
        let mut state = self.state.lock().await;
        Ok(state.ledger.withdraw_tokens(account, GoraAmount::new(amount))?)
    }

    pub async fn stake(&self, account: &AccountId, amount: u64, now: Round) -> Result<u64, NodeError> {
        self.with_ledger(|ledger| ledger.stake(account, amount, now)).await
    }

    pub async fn unstake(&self, account: &AccountId, amount: u64, now: Round) -> Result<u64, NodeError> {
        self.with_ledger(|ledger| ledger.unstake(account, amount, now)).await
    }

    pub async fn register_participation_key(
        &self,
        account: &AccountId,
        key: [u8; 32],
        now: Round,
    ) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        state.ledger.register_participation_key(account, key, now)?;
        debug!(account = %account, round = %now, "participation key registered");
        Ok(())
    }

    pub async fn get_stake(&self, account: &AccountId) -> StakeView {
        let state = self.state.lock().await;
        let ledger = &state.ledger;
        StakeView {
            account: *account,
            algo: ledger.algo_balance(account),
            tokens: ledger.token_balance(account),
            stake: ledger.stake_of(account),
            stake_locked_until: ledger.account(account).and_then(|a| a.stake_locked_until),
            participation_key: ledger.participation_key(account).copied(),
        }
    }

    /// Stake the account held as of `round`, as a vote on a request
    /// submitted then would see it.
    pub async fn stake_at(&self, account: &AccountId, round: Round) -> Result<u64, NodeError> {
        Ok(self.state.lock().await.ledger.stake_at(account, round)?)
    }

    async fn with_ledger<R>(
        &self,
        f: impl FnOnce(&mut StakeLedger) -> Result<R, gora_stake::StakeError> + Send,
    ) -> Result<R, NodeError> {
        let mut state = self.state.lock().await;
        let result = f(&mut state.ledger);
        refresh_gauges(&self.metrics, &state);
        Ok(result?)
    }

    // ── Requests ─────────────────────────────────────────────────────────

    pub async fn submit_request(
        &self,
        requester: &AccountId,
        key: &[u8],
        source: Vec<u8>,
        destination: Destination,
        fee: Fee,
        now: Round,
    ) -> Result<RequestId, NodeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let result = submit_span(requester).in_scope(|| {
            state
                .engine
                .registry
                .submit(*requester, key, source, destination, fee, now, &mut state.ledger)
        });
        let id = result?;
        self.metrics.requests_submitted.inc();
        refresh_gauges(&self.metrics, state);
        Ok(id)
    }

    /// Tally a ballot. The voter's previous unclaimed entry is settled
    /// first.
    pub async fn vote(&self, ballot: Ballot, now: Round) -> Result<VoteReport, NodeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let span = vote_span(&ballot.request_id, &ballot.voter);
        let result = span.in_scope(|| -> Result<VoteReport, NodeError> {
            let previous = match claimable(&state.engine, &ballot.voter) {
                Some(earlier) if earlier != ballot.request_id => {
                    let voter = ballot.voter;
                    let outcome = claim(&mut state.engine, &mut state.ledger, &voter, &voter, &earlier, now)?;
                    if is_payout(&outcome) {
                        self.metrics.claims_paid.inc();
                    }
                    if outcome == ClaimOutcome::Pending {
                        warn!(previous = %earlier, "voter's earlier request still open; its entry is replaced");
                    }
                    Some((earlier, outcome))
                }
                _ => None,
            };
            let outcome = state.engine.vote(
                ballot,
                now,
                &mut state.ledger,
                self.verifier.as_ref(),
                self.sink.as_ref(),
            )?;
            Ok(VoteReport { outcome, previous })
        });

        match &result {
            Ok(report) => {
                self.metrics.votes_accepted.inc();
                if matches!(report.outcome, VoteOutcome::Completed { .. }) {
                    self.metrics.requests_completed.inc();
                }
            }
            Err(e) => {
                self.metrics.votes_rejected.inc();
                debug!(error = %e, "vote rejected");
            }
        }
        refresh_gauges(&self.metrics, state);
        result
    }

    pub async fn refund_request(
        &self,
        requester: &AccountId,
        request_id: &RequestId,
        now: Round,
    ) -> Result<RefundOutcome, NodeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let outcome = refund_span(request_id)
            .in_scope(|| state.engine.registry.refund(requester, request_id, now, &mut state.ledger))?;
        self.metrics.requests_refunded.inc();
        refresh_gauges(&self.metrics, state);
        Ok(outcome)
    }

    /// Move every timed-out open request to `RefundAvailable`.
    pub async fn expire_requests(&self, now: Round) -> Vec<RequestId> {
        let mut state = self.state.lock().await;
        let expired = state.engine.registry.expire(now);
        self.metrics.requests_expired.inc_by(expired.len() as u64);
        expired
    }

    pub async fn claim(
        &self,
        caller: &AccountId,
        voter: &AccountId,
        request_id: &RequestId,
        now: Round,
    ) -> Result<ClaimOutcome, NodeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let outcome = claim_span(request_id, voter)
            .in_scope(|| claim(&mut state.engine, &mut state.ledger, caller, voter, request_id, now))?;
        if is_payout(&outcome) {
            self.metrics.claims_paid.inc();
        }
        refresh_gauges(&self.metrics, state);
        Ok(outcome)
    }

    pub async fn delete_archived_proposal(&self, vote_hash: &VoteHash, now: Round) -> Result<Proposal, NodeError> {
        let mut state = self.state.lock().await;
        Ok(state.engine.registry.delete_archived_proposal(vote_hash, now)?)
    }

    /// Forget lease windows that closed before `now`.
    pub async fn prune_leases(&self, now: Round) -> usize {
        self.state.lock().await.engine.prune_leases(now)
    }

    pub async fn get_request_info(&self, request_id: &RequestId) -> Option<Request> {
        self.state.lock().await.engine.registry.get_request_info(request_id).cloned()
    }

    pub async fn get_proposal(&self, vote_hash: &VoteHash) -> Option<ProposalRecord> {
        self.state.lock().await.engine.registry.get_proposal(vote_hash).cloned()
    }

    pub async fn get_voter_history(&self, voter: &AccountId) -> Option<VoterHistoryEntry> {
        self.state.lock().await.engine.history.get(voter).cloned()
    }

    // ── Delegation pools ─────────────────────────────────────────────────

    /// Open a pool staking through `pool_account`, rolling over every
    /// `pool_timeout` rounds.
    pub async fn create_pool(&self, pool_account: &AccountId, settings: PoolSettings, now: Round) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        if state.pools.contains_key(pool_account) {
            return Err(NodeError::PoolExists(*pool_account));
        }
        let timeout = state.params().pool_timeout;
        let pool = DelegationPool::new(*pool_account, settings, timeout, now)?;
        state.pools.insert(*pool_account, pool);
        info!(pool = %pool_account, manager = %settings.manager, timeout, "delegation pool created");
        refresh_gauges(&self.metrics, &state);
        Ok(())
    }

    pub async fn pool_stake(
        &self,
        pool: &AccountId,
        depositor: &AccountId,
        amount: u64,
        vesting_source: Option<AccountId>,
        now: Round,
    ) -> Result<(), NodeError> {
        self.with_pool(pool, "stake", |p, ledger| {
            p.stake(depositor, amount, vesting_source, now, ledger).map(|_| ())
        })
        .await
    }

    pub async fn pool_unstake(&self, pool: &AccountId, depositor: &AccountId, amount: u64, now: Round) -> Result<(), NodeError> {
        self.with_pool(pool, "unstake", |p, ledger| p.unstake(depositor, amount, now, ledger).map(|_| ()))
            .await
    }

    pub async fn pool_withdraw_non_stake(
        &self,
        pool: &AccountId,
        depositor: &AccountId,
        amount: PoolBalance,
        now: Round,
    ) -> Result<PoolBalance, NodeError> {
        self.with_pool(pool, "withdraw_non_stake", |p, ledger| {
            p.withdraw_non_stake(depositor, amount, now, ledger)
        })
        .await
    }

    pub async fn pool_user_claim(&self, pool: &AccountId, depositor: &AccountId, now: Round) -> Result<PoolBalance, NodeError> {
        self.with_pool(pool, "user_claim", |p, ledger| p.user_claim(depositor, now, ledger))
            .await
    }

    pub async fn pool_withdraw_vested(
        &self,
        pool: &AccountId,
        source: &AccountId,
        beneficiary: &AccountId,
        now: Round,
    ) -> Result<u64, NodeError> {
        self.with_pool(pool, "withdraw_vested", |p, ledger| {
            p.withdraw_vested(source, beneficiary, now, ledger)
        })
        .await
    }

    pub async fn pool_configure(&self, pool: &AccountId, caller: &AccountId, settings: PoolSettings) -> Result<(), NodeError> {
        self.with_pool(pool, "configure", |p, _| p.configure_settings(caller, settings))
            .await
    }

    pub async fn pool_register_participation_key(
        &self,
        pool: &AccountId,
        caller: &AccountId,
        key: [u8; 32],
        now: Round,
    ) -> Result<(), NodeError> {
        self.with_pool(pool, "register_participation_key", |p, ledger| {
            p.register_participation_key(caller, key, now, ledger)
        })
        .await
    }

    /// Roll `pool` over if its aggregation round has timed out.
    pub async fn process_aggregation(&self, pool: &AccountId, now: Round) -> Result<bool, NodeError> {
        self.with_pool(pool, "process_aggregation", |p, ledger| {
            p.process_aggregation(now, ledger).map(|report| report.is_some())
        })
        .await
    }

    pub async fn get_pool(&self, pool: &AccountId) -> Option<PoolInfo> {
        self.state.lock().await.pools.get(pool).map(DelegationPool::info)
    }

    pub async fn get_depositor(&self, pool: &AccountId, depositor: &AccountId) -> Option<DepositorState> {
        self.state
            .lock()
            .await
            .pools
            .get(pool)
            .and_then(|p| p.depositor(depositor).cloned())
    }

    async fn with_pool<R, F>(&self, pool: &AccountId, action: &str, f: F) -> Result<R, NodeError>
    where
        F: FnOnce(&mut DelegationPool, &mut StakeLedger) -> Result<R, DelegationError> + Send,
    {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let entry = state.pools.get_mut(pool).ok_or(NodeError::PoolNotFound(*pool))?;
        let before = entry.aggregation_round();
        let result = pool_span(pool, action).in_scope(|| f(entry, &mut state.ledger));
        let rolled = entry.aggregation_round().saturating_sub(before);
        self.metrics.pool_rollovers.inc_by(rolled);
        refresh_gauges(&self.metrics, state);
        Ok(result?)
    }
}

fn is_payout(outcome: &ClaimOutcome) -> bool {
    matches!(outcome, ClaimOutcome::Rewarded { .. } | ClaimOutcome::Refunded { .. })
}

fn refresh_gauges(metrics: &NodeMetrics, state: &OracleState) {
    metrics
        .live_requests
        .set(i64::try_from(state.engine.registry.live_count()).unwrap_or(i64::MAX));
    metrics
        .total_stake
        .set(i64::try_from(state.ledger.total_stake()).unwrap_or(i64::MAX));
    metrics
        .pools
        .set(i64::try_from(state.pools.len()).unwrap_or(i64::MAX));
}
