//! The delegation pool.
//!
//! Depositors hand tokens to the pool, which stakes them under its own
//! account. Stake changes are batched: each one is recorded as pending and
//! only reaches the ledger when the current aggregation round closes. At
//! every rollover the pool also collects the rewards its account earned,
//! takes the manager's cut, and makes the rest claimable in proportion to
//! each depositor's stake-time: a round's rewards go to the stake that was
//! active during that round, tracked through a [`RewardIndex`].

use std::collections::HashMap;

use gora_stake::StakeLedger;
use gora_types::{AccountId, AlgoAmount, GoraAmount, Round};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::depositor::{DepositorState, LocalAggregationTracker, PoolBalance, RewardIndex};
use crate::error::DelegationError;

/// Manager shares are in basis points of this.
pub const SHARE_DENOMINATOR: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub manager: AccountId,
    pub manager_algo_share_bp: u64,
    pub manager_gora_share_bp: u64,
}

impl PoolSettings {
    fn validate(&self) -> Result<(), DelegationError> {
        for bp in [self.manager_algo_share_bp, self.manager_gora_share_bp] {
            if bp > SHARE_DENOMINATOR {
                return Err(DelegationError::InvalidShare(bp));
            }
        }
        Ok(())
    }
}

/// Aggregation round counter and when the current round started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutTracker {
    pub aggregation_round: u64,
    pub algorand_start_round: Round,
    pub timeout: u64,
}

impl TimeoutTracker {
    pub fn due(&self, now: Round) -> bool {
        self.algorand_start_round.elapsed_since(now) > self.timeout
    }
}

/// Cumulative rewards made claimable by every rollover so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub executed_at: Round,
    pub rewards: PoolBalance,
}

/// What a rollover did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverReport {
    /// The round that just started.
    pub aggregation_round: u64,
    pub collected: PoolBalance,
    pub manager_cut: PoolBalance,
    pub staked: u64,
    pub unstaked: u64,
}

/// Read-only view of the pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub pool_account: AccountId,
    pub settings: PoolSettings,
    pub aggregation_round: u64,
    pub algorand_start_round: Round,
    pub global_stake: u64,
    pub global_stake_time: u128,
    pub reward_index: RewardIndex,
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
    pub custody: PoolBalance,
    pub undistributed: PoolBalance,
    pub depositors: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelegationPool {
    pool_account: AccountId,
    settings: PoolSettings,
    round: TimeoutTracker,
    most_recent: Aggregation,
    global_stake: u64,
    /// Active stake summed over every closed aggregation round.
    global_stake_time: u128,
    reward_index: RewardIndex,
    pending_deposits: u64,
    pending_withdrawals: u64,
    /// Funds held by the pool outside the ledger.
    custody: PoolBalance,
    /// Collected rewards not yet credited to a depositor.
    undistributed: PoolBalance,
    /// Rewards collected while no stake was active, carried to the next
    /// round that has some.
    unassigned: PoolBalance,
    depositors: HashMap<AccountId, DepositorState>,
}

impl DelegationPool {
    pub fn new(
        pool_account: AccountId,
        settings: PoolSettings,
        timeout: u64,
        now: Round,
    ) -> Result<Self, DelegationError> {
        settings.validate()?;
        Ok(Self {
            pool_account,
            settings,
            round: TimeoutTracker {
                aggregation_round: 1,
                algorand_start_round: now,
                timeout,
            },
            most_recent: Aggregation::default(),
            global_stake: 0,
            global_stake_time: 0,
            reward_index: RewardIndex::default(),
            pending_deposits: 0,
            pending_withdrawals: 0,
            custody: PoolBalance::ZERO,
            undistributed: PoolBalance::ZERO,
            unassigned: PoolBalance::ZERO,
            depositors: HashMap::new(),
        })
    }

    // ── Depositor actions ────────────────────────────────────────────────

    /// Deposit `amount` tokens for `depositor`. With a `vesting_source` the
    /// tokens come from that account and stay locked to it.
    pub fn stake(
        &mut self,
        depositor: &AccountId,
        amount: u64,
        vesting_source: Option<AccountId>,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<Option<RolloverReport>, DelegationError> {
        if amount == 0 {
            return Err(DelegationError::ZeroAmount);
        }
        let mut state = self.depositors.get(depositor).cloned().unwrap_or_default();
        self.assert_action_timing(depositor, &state)?;
        if let (Some(source), Some(existing)) = (vesting_source, state.vesting.source) {
            if source != existing {
                return Err(DelegationError::NotVestingSource);
            }
        }

        let share = self.update_stake_time(&mut state);
        state.non_stake.gora = state
            .non_stake
            .gora
            .checked_add(amount)
            .ok_or(DelegationError::Overflow)?;
        if let Some(source) = vesting_source {
            state.vesting.vested_amount = state
                .vesting
                .vested_amount
                .checked_add(amount)
                .ok_or(DelegationError::Overflow)?;
            state.vesting.source = Some(source);
        }
        state.tracker = self.record_action(amount, true);
        let pending = self
            .pending_deposits
            .checked_add(amount)
            .ok_or(DelegationError::Overflow)?;
        let custody_gora = self
            .custody
            .gora
            .checked_add(amount)
            .ok_or(DelegationError::Overflow)?;

        let funder = vesting_source.unwrap_or(*depositor);
        ledger.withdraw_tokens(&funder, GoraAmount::new(amount))?;

        self.commit(share);
        self.pending_deposits = pending;
        self.custody.gora = custody_gora;
        self.depositors.insert(*depositor, state);
        debug!(depositor = %depositor, amount, round = self.round.aggregation_round, "pool deposit pending");
        Ok(self.post_action_update(now, ledger))
    }

    /// Ask for `amount` of the depositor's stake back at the next rollover.
    pub fn unstake(
        &mut self,
        depositor: &AccountId,
        amount: u64,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<Option<RolloverReport>, DelegationError> {
        if amount == 0 {
            return Err(DelegationError::ZeroAmount);
        }
        let mut state = self
            .depositors
            .get(depositor)
            .cloned()
            .ok_or(DelegationError::DepositorNotFound(*depositor))?;
        self.assert_action_timing(depositor, &state)?;

        let share = self.update_stake_time(&mut state);
        if amount > state.local_stake {
            return Err(DelegationError::NegativeBalance {
                needed: amount,
                available: state.local_stake,
            });
        }
        let pending = self
            .pending_withdrawals
            .checked_add(amount)
            .ok_or(DelegationError::Overflow)?;
        state.tracker = self.record_action(amount, false);

        self.commit(share);
        self.pending_withdrawals = pending;
        self.depositors.insert(*depositor, state);
        debug!(depositor = %depositor, amount, round = self.round.aggregation_round, "pool withdrawal pending");
        Ok(self.post_action_update(now, ledger))
    }

    /// Pay out part of the depositor's non-stake balance.
    pub fn withdraw_non_stake(
        &mut self,
        depositor: &AccountId,
        amount: PoolBalance,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<PoolBalance, DelegationError> {
        let paid = self.take_non_stake(depositor, Some(amount), ledger)?;
        self.post_action_update(now, ledger);
        Ok(paid)
    }

    /// Roll the pool over if due, then pay out everything the depositor may
    /// withdraw.
    pub fn user_claim(
        &mut self,
        depositor: &AccountId,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<PoolBalance, DelegationError> {
        if !self.depositors.contains_key(depositor) {
            return Err(DelegationError::DepositorNotFound(*depositor));
        }
        self.post_action_update(now, ledger);
        self.take_non_stake(depositor, None, ledger)
    }

    /// Return the vested tokens that are no longer staked to the vesting
    /// source that deposited them.
    pub fn withdraw_vested(
        &mut self,
        source: &AccountId,
        beneficiary: &AccountId,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<u64, DelegationError> {
        let mut state = self
            .depositors
            .get(beneficiary)
            .cloned()
            .ok_or(DelegationError::DepositorNotFound(*beneficiary))?;
        if state.vesting.source != Some(*source) {
            return Err(DelegationError::NotVestingSource);
        }
        let share = self.update_stake_time(&mut state);
        let free = state
            .non_stake
            .gora
            .saturating_sub(state.tracker.unapplied_deposit(self.round.aggregation_round));
        let amount = state
            .vesting
            .vested_amount
            .saturating_sub(state.local_stake)
            .min(free);
        if amount == 0 {
            return Err(DelegationError::NegativeBalance {
                needed: state.vesting.vested_amount,
                available: 0,
            });
        }
        ledger.deposit_tokens(source, GoraAmount::new(amount))?;

        state.non_stake.gora -= amount;
        state.vesting.vested_amount -= amount;
        self.custody.gora = self.custody.gora.saturating_sub(amount);
        self.commit(share);
        self.depositors.insert(*beneficiary, state);
        info!(source = %source, beneficiary = %beneficiary, amount, "vested tokens returned");
        self.post_action_update(now, ledger);
        Ok(amount)
    }

    fn take_non_stake(
        &mut self,
        depositor: &AccountId,
        requested: Option<PoolBalance>,
        ledger: &mut StakeLedger,
    ) -> Result<PoolBalance, DelegationError> {
        let mut state = self
            .depositors
            .get(depositor)
            .cloned()
            .ok_or(DelegationError::DepositorNotFound(*depositor))?;
        let share = self.update_stake_time(&mut state);
        let available = state.withdrawable(self.round.aggregation_round);
        let amount = requested.unwrap_or(available);
        if amount.algo > available.algo {
            return Err(DelegationError::NegativeBalance {
                needed: amount.algo,
                available: available.algo,
            });
        }
        if amount.gora > available.gora {
            return Err(DelegationError::NegativeBalance {
                needed: amount.gora,
                available: available.gora,
            });
        }
        ledger.deposit_algo(depositor, AlgoAmount::new(amount.algo))?;
        ledger.deposit_tokens(depositor, GoraAmount::new(amount.gora))?;

        state.non_stake = state.non_stake.saturating_sub(amount);
        self.custody = self.custody.saturating_sub(amount);
        self.commit(share);
        self.depositors.insert(*depositor, state);
        debug!(depositor = %depositor, algo = amount.algo, gora = amount.gora, "non-stake withdrawn");
        Ok(amount)
    }

    // ── Manager ──────────────────────────────────────────────────────────

    pub fn configure_settings(&mut self, caller: &AccountId, settings: PoolSettings) -> Result<(), DelegationError> {
        if caller != &self.settings.manager {
            return Err(DelegationError::NotManager);
        }
        settings.validate()?;
        self.settings = settings;
        info!(manager = %settings.manager, algo_bp = settings.manager_algo_share_bp, gora_bp = settings.manager_gora_share_bp, "pool settings updated");
        Ok(())
    }

    /// Register the participation key the pool account votes with.
    pub fn register_participation_key(
        &self,
        caller: &AccountId,
        key: [u8; 32],
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<(), DelegationError> {
        if caller != &self.settings.manager {
            return Err(DelegationError::NotManager);
        }
        ledger.register_participation_key(&self.pool_account, key, now)?;
        Ok(())
    }

    // ── Aggregation ──────────────────────────────────────────────────────

    /// Close the current aggregation round if its timeout has passed.
    pub fn process_aggregation(
        &mut self,
        now: Round,
        ledger: &mut StakeLedger,
    ) -> Result<Option<RolloverReport>, DelegationError> {
        if !self.round.due(now) {
            return Ok(None);
        }
        self.rollover(now, ledger).map(Some)
    }

    /// Rollover attempted after every depositor action. A failure leaves the
    /// round open for the next call and does not undo the action.
    fn post_action_update(&mut self, now: Round, ledger: &mut StakeLedger) -> Option<RolloverReport> {
        if !self.round.due(now) {
            return None;
        }
        match self.rollover(now, ledger) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, round = self.round.aggregation_round, "aggregation rollover deferred");
                None
            }
        }
    }

    fn rollover(&mut self, now: Round, ledger: &mut StakeLedger) -> Result<RolloverReport, DelegationError> {
        let pool = self.pool_account;
        let closing = self.round.aggregation_round;
        let collected = PoolBalance::new(ledger.algo_balance(&pool).raw(), ledger.token_balance(&pool).raw());
        let manager_cut = PoolBalance::new(
            bp_of(collected.algo, self.settings.manager_algo_share_bp),
            bp_of(collected.gora, self.settings.manager_gora_share_bp),
        );
        let distributable = collected.saturating_sub(manager_cut);

        let staked = self.pending_deposits.saturating_sub(self.pending_withdrawals);
        let unstaked = self.pending_withdrawals.saturating_sub(self.pending_deposits);

        let custody = self
            .custody
            .checked_add(collected)
            .and_then(|c| c.checked_sub(PoolBalance::new(0, staked)))
            .and_then(|c| c.checked_add(PoolBalance::new(0, unstaked)))
            .ok_or(DelegationError::Overflow)?;
        let global_stake = self
            .global_stake
            .checked_add(staked)
            .and_then(|s| s.checked_sub(unstaked))
            .ok_or(DelegationError::Overflow)?;
        let rewards = self
            .most_recent
            .rewards
            .checked_add(distributable)
            .ok_or(DelegationError::Overflow)?;
        let mut undistributed = self
            .undistributed
            .checked_add(distributable)
            .ok_or(DelegationError::Overflow)?;

        // the stake that earned this round's rewards is the stake held before
        // the round's pending changes land
        let active = self.global_stake;
        let to_assign = self
            .unassigned
            .checked_add(distributable)
            .ok_or(DelegationError::Overflow)?;
        let (reward_index, unassigned) = if active == 0 {
            (self.reward_index, to_assign)
        } else {
            let index = self
                .reward_index
                .accrue(to_assign, active)
                .ok_or(DelegationError::Overflow)?;
            (index, PoolBalance::ZERO)
        };
        let global_stake_time = self
            .global_stake_time
            .checked_add(u128::from(active))
            .ok_or(DelegationError::Overflow)?;
        let released_gora = collected
            .gora
            .checked_add(unstaked)
            .ok_or(DelegationError::Overflow)?;
        let manager_id = self.settings.manager;
        let manager_non_stake = self
            .depositors
            .get(&manager_id)
            .map(|d| d.non_stake)
            .unwrap_or_default()
            .checked_add(manager_cut)
            .ok_or(DelegationError::Overflow)?;

        if staked > 0 {
            ledger.deposit_tokens(&pool, GoraAmount::new(staked))?;
            if let Err(e) = ledger.stake(&pool, staked, now) {
                ledger.withdraw_tokens(&pool, GoraAmount::new(staked))?;
                return Err(e.into());
            }
        } else if unstaked > 0 {
            ledger.unstake(&pool, unstaked, now)?;
        }
        ledger.withdraw_algo(&pool, AlgoAmount::new(collected.algo))?;
        ledger.withdraw_tokens(&pool, GoraAmount::new(released_gora))?;

        if !manager_cut.is_zero() {
            let manager = self.depositors.entry(manager_id).or_default();
            manager.non_stake = manager_non_stake;
        }
        // pending changes from the closing round take effect now; their
        // owners are credited at the old stake first
        for state in self.depositors.values_mut() {
            let tracker = state.tracker;
            if !tracker.has_pending() || tracker.previous_round > closing {
                continue;
            }
            let share = credit_rewards(state, &reward_index, undistributed);
            undistributed = undistributed.saturating_sub(share);
            state.tracker.pending_amount = 0;
            if tracker.is_deposit {
                state.non_stake.gora = state.non_stake.gora.saturating_sub(tracker.pending_amount);
                state.local_stake = state.local_stake.saturating_add(tracker.pending_amount);
            } else {
                state.local_stake = state.local_stake.saturating_sub(tracker.pending_amount);
                state.non_stake.gora = state.non_stake.gora.saturating_add(tracker.pending_amount);
            }
        }

        self.custody = custody;
        self.undistributed = undistributed;
        self.unassigned = unassigned;
        self.reward_index = reward_index;
        self.most_recent = Aggregation {
            executed_at: now,
            rewards,
        };
        self.global_stake = global_stake;
        self.global_stake_time = global_stake_time;
        self.round.aggregation_round += 1;
        self.round.algorand_start_round = now;
        self.pending_deposits = 0;
        self.pending_withdrawals = 0;

        info!(
            aggregation_round = self.round.aggregation_round,
            collected_algo = collected.algo,
            collected_gora = collected.gora,
            staked,
            unstaked,
            global_stake,
            "aggregation round rolled over"
        );
        Ok(RolloverReport {
            aggregation_round: self.round.aggregation_round,
            collected,
            manager_cut,
            staked,
            unstaked,
        })
    }

    // ── Stake-time accounting ────────────────────────────────────────────

    fn assert_action_timing(&self, depositor: &AccountId, state: &DepositorState) -> Result<(), DelegationError> {
        if state.tracker.has_pending() && state.tracker.previous_round == self.round.aggregation_round {
            return Err(DelegationError::MultipleActionsPerRound(*depositor));
        }
        Ok(())
    }

    fn record_action(&self, amount: u64, is_deposit: bool) -> LocalAggregationTracker {
        LocalAggregationTracker {
            previous_round: self.round.aggregation_round,
            previous_round_rewards: self.most_recent.rewards,
            pending_amount: amount,
            is_deposit,
        }
    }

    /// Credit the depositor with what its stake earned since its last
    /// update. Pending changes land at rollover, so `local_stake` is the
    /// stake that was active over the whole span.
    fn update_stake_time(&self, state: &mut DepositorState) -> PoolBalance {
        credit_rewards(state, &self.reward_index, self.undistributed)
    }

    fn commit(&mut self, share: PoolBalance) {
        self.undistributed = self.undistributed.saturating_sub(share);
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn pool_account(&self) -> &AccountId {
        &self.pool_account
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn aggregation_round(&self) -> u64 {
        self.round.aggregation_round
    }

    pub fn timeout_tracker(&self) -> &TimeoutTracker {
        &self.round
    }

    pub fn depositor(&self, id: &AccountId) -> Option<&DepositorState> {
        self.depositors.get(id)
    }

    pub fn global_stake(&self) -> u64 {
        self.global_stake
    }

    pub fn pending(&self) -> (u64, u64) {
        (self.pending_deposits, self.pending_withdrawals)
    }

    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            pool_account: self.pool_account,
            settings: self.settings,
            aggregation_round: self.round.aggregation_round,
            algorand_start_round: self.round.algorand_start_round,
            global_stake: self.global_stake,
            global_stake_time: self.global_stake_time,
            reward_index: self.reward_index,
            pending_deposits: self.pending_deposits,
            pending_withdrawals: self.pending_withdrawals,
            custody: self.custody,
            undistributed: self.undistributed,
            depositors: self.depositors.len(),
        }
    }
}

fn bp_of(amount: u64, bp: u64) -> u64 {
    let cut = u128::from(amount) * u128::from(bp.min(SHARE_DENOMINATOR)) / u128::from(SHARE_DENOMINATOR);
    u64::try_from(cut).unwrap_or(amount)
}

/// `local_stake * (index - depositor index)`, capped by what is left to
/// hand out. Moves the depositor's index forward.
fn credit_rewards(state: &mut DepositorState, index: &RewardIndex, available: PoolBalance) -> PoolBalance {
    let share = index
        .earned_since(&state.reward_index, state.local_stake)
        .min(available)
        .min(PoolBalance::new(u64::MAX - state.non_stake.algo, u64::MAX - state.non_stake.gora));
    state.non_stake = state.non_stake.checked_add(share).unwrap_or(state.non_stake);
    state.reward_index = *index;
    share
}

#[cfg(test)]
mod tests {
    use super::*;
    use gora_types::ProtocolParams;

    fn make_account(byte: u8) -> AccountId {
        AccountId::new([byte; 32])
    }

    const POOL: u8 = 0xB0;
    const MANAGER: u8 = 0xA0;

    fn setup(manager_bp: u64, timeout: u64) -> (DelegationPool, StakeLedger) {
        let settings = PoolSettings {
            manager: make_account(MANAGER),
            manager_algo_share_bp: manager_bp,
            manager_gora_share_bp: manager_bp,
        };
        let pool = DelegationPool::new(make_account(POOL), settings, timeout, Round::new(0)).unwrap();
        let ledger = StakeLedger::new(&ProtocolParams::default());
        (pool, ledger)
    }

    fn fund(ledger: &mut StakeLedger, who: &AccountId, tokens: u64) {
        ledger.deposit_tokens(who, GoraAmount::new(tokens)).unwrap();
    }

    #[test]
    fn second_action_in_same_round_rejected() {
        let (mut pool, mut ledger) = setup(0, 10);
        let alice = make_account(1);
        fund(&mut ledger, &alice, 1_000);
        pool.stake(&alice, 500, None, Round::new(1), &mut ledger).unwrap();
        let err = pool.stake(&alice, 100, None, Round::new(2), &mut ledger).unwrap_err();
        assert!(matches!(err, DelegationError::MultipleActionsPerRound(id) if id == alice));
        let err = pool.unstake(&alice, 100, Round::new(2), &mut ledger).unwrap_err();
        assert!(matches!(err, DelegationError::MultipleActionsPerRound(_)));
    }

    #[test]
    fn deposits_reach_the_ledger_at_rollover() {
        let (mut pool, mut ledger) = setup(0, 10);
        let alice = make_account(1);
        fund(&mut ledger, &alice, 3_000);
        pool.stake(&alice, 3_000, None, Round::new(1), &mut ledger).unwrap();
        assert_eq!(pool.pending(), (3_000, 0));
        assert_eq!(ledger.stake_of(pool.pool_account()), 0);
        assert_eq!(ledger.token_balance(&alice), GoraAmount::ZERO);

        assert_eq!(pool.process_aggregation(Round::new(10), &mut ledger).unwrap(), None);
        let report = pool.process_aggregation(Round::new(11), &mut ledger).unwrap().unwrap();
        assert_eq!(report.aggregation_round, 2);
        assert_eq!(report.staked, 3_000);
        assert_eq!(ledger.stake_of(pool.pool_account()), 3_000);
        assert_eq!(pool.pending(), (0, 0));
        assert_eq!(pool.global_stake(), 3_000);
        assert_eq!(pool.process_aggregation(Round::new(12), &mut ledger).unwrap(), None);
    }

    #[test]
    fn rewards_split_by_stake_time() {
        let (mut pool, mut ledger) = setup(1_000, 10);
        let alice = make_account(1);
        let bob = make_account(2);
        let pool_id = *pool.pool_account();
        fund(&mut ledger, &alice, 3_000);
        fund(&mut ledger, &bob, 1_000);
        pool.stake(&alice, 3_000, None, Round::new(1), &mut ledger).unwrap();
        pool.stake(&bob, 1_000, None, Round::new(2), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();

        // rewards earned by the pool account while voting
        ledger.deposit_algo(&pool_id, AlgoAmount::new(1_000)).unwrap();
        fund(&mut ledger, &pool_id, 2_000);
        let report = pool.process_aggregation(Round::new(22), &mut ledger).unwrap().unwrap();
        assert_eq!(report.collected, PoolBalance::new(1_000, 2_000));
        assert_eq!(report.manager_cut, PoolBalance::new(100, 200));
        assert_eq!(ledger.algo_balance(&pool_id), AlgoAmount::ZERO);

        let paid = pool.user_claim(&alice, Round::new(23), &mut ledger).unwrap();
        assert_eq!(paid, PoolBalance::new(675, 1_350));
        assert_eq!(ledger.algo_balance(&alice), AlgoAmount::new(675));
        assert_eq!(ledger.token_balance(&alice), GoraAmount::new(1_350));

        let paid = pool.user_claim(&bob, Round::new(24), &mut ledger).unwrap();
        assert_eq!(paid, PoolBalance::new(225, 450));

        let paid = pool.user_claim(&make_account(MANAGER), Round::new(25), &mut ledger).unwrap();
        assert_eq!(paid, PoolBalance::new(100, 200));
        assert_eq!(pool.info().custody, PoolBalance::ZERO);
        assert_eq!(pool.info().undistributed, PoolBalance::ZERO);
        assert_eq!(ledger.stake_of(&pool_id), 4_000);
    }

    #[test]
    fn equal_depositors_share_equally_in_any_claim_order() {
        for order in [[1u8, 2, 3], [3, 1, 2], [2, 3, 1]] {
            let (mut pool, mut ledger) = setup(0, 10);
            let pool_id = *pool.pool_account();
            for who in 1u8..=3 {
                fund(&mut ledger, &make_account(who), 1_000);
                pool.stake(&make_account(who), 1_000, None, Round::new(1), &mut ledger).unwrap();
            }
            pool.process_aggregation(Round::new(11), &mut ledger).unwrap();
            ledger.deposit_algo(&pool_id, AlgoAmount::new(900)).unwrap();
            pool.process_aggregation(Round::new(22), &mut ledger).unwrap();

            for (i, who) in order.iter().enumerate() {
                let paid = pool
                    .user_claim(&make_account(*who), Round::new(23 + i as u64), &mut ledger)
                    .unwrap();
                assert_eq!(paid, PoolBalance::new(300, 0), "depositor {who} in order {order:?}");
            }
            assert_eq!(pool.info().undistributed, PoolBalance::ZERO);
        }
    }

    #[test]
    fn rewards_follow_the_stake_active_in_each_round() {
        let (mut pool, mut ledger) = setup(0, 10);
        let pool_id = *pool.pool_account();
        let alice = make_account(1);
        let bob = make_account(2);
        fund(&mut ledger, &alice, 1_000);
        fund(&mut ledger, &bob, 500);
        pool.stake(&alice, 1_000, None, Round::new(1), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();

        // only alice is active while these are earned
        ledger.deposit_algo(&pool_id, AlgoAmount::new(600)).unwrap();
        // a withdrawal and a deposit that net out in the ledger
        pool.unstake(&alice, 500, Round::new(12), &mut ledger).unwrap();
        pool.stake(&bob, 500, None, Round::new(12), &mut ledger).unwrap();
        let report = pool.process_aggregation(Round::new(22), &mut ledger).unwrap().unwrap();
        assert_eq!((report.staked, report.unstaked), (0, 0));
        assert_eq!(pool.global_stake(), 1_000);

        ledger.deposit_algo(&pool_id, AlgoAmount::new(400)).unwrap();
        pool.process_aggregation(Round::new(33), &mut ledger).unwrap();

        let bob_paid = pool.user_claim(&bob, Round::new(34), &mut ledger).unwrap();
        assert_eq!(bob_paid, PoolBalance::new(200, 0));
        let alice_paid = pool.user_claim(&alice, Round::new(35), &mut ledger).unwrap();
        assert_eq!(alice_paid, PoolBalance::new(800, 500));
        assert_eq!(pool.info().undistributed, PoolBalance::ZERO);
        assert_eq!(pool.info().global_stake_time, 2_000);
    }

    #[test]
    fn rewards_without_active_stake_carry_over() {
        let (mut pool, mut ledger) = setup(0, 10);
        let pool_id = *pool.pool_account();
        let alice = make_account(1);
        fund(&mut ledger, &alice, 1_000);
        ledger.deposit_algo(&pool_id, AlgoAmount::new(50)).unwrap();
        pool.stake(&alice, 1_000, None, Round::new(1), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();
        assert_eq!(pool.info().undistributed, PoolBalance::new(50, 0));

        pool.process_aggregation(Round::new(22), &mut ledger).unwrap();
        let paid = pool.user_claim(&alice, Round::new(23), &mut ledger).unwrap();
        assert_eq!(paid, PoolBalance::new(50, 0));
    }

    #[test]
    fn overflowing_rollover_changes_nothing() {
        let (mut pool, mut ledger) = setup(SHARE_DENOMINATOR, 10);
        let pool_id = *pool.pool_account();
        let manager = make_account(MANAGER);
        ledger.deposit_algo(&pool_id, AlgoAmount::new(u64::MAX - 5)).unwrap();
        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();
        assert_eq!(pool.depositor(&manager).unwrap().non_stake, PoolBalance::new(u64::MAX - 5, 0));

        ledger.deposit_algo(&pool_id, AlgoAmount::new(10)).unwrap();
        let err = pool.process_aggregation(Round::new(22), &mut ledger).unwrap_err();
        assert!(matches!(err, DelegationError::Overflow));
        assert_eq!(pool.aggregation_round(), 2);
        assert_eq!(pool.depositor(&manager).unwrap().non_stake, PoolBalance::new(u64::MAX - 5, 0));
        assert_eq!(ledger.algo_balance(&pool_id), AlgoAmount::new(10));
    }

    #[test]
    fn unstake_returns_tokens_after_rollover() {
        let (mut pool, mut ledger) = setup(0, 10);
        let alice = make_account(1);
        fund(&mut ledger, &alice, 1_000);
        pool.stake(&alice, 1_000, None, Round::new(1), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();

        let err = pool.unstake(&alice, 1_001, Round::new(12), &mut ledger).unwrap_err();
        assert!(matches!(err, DelegationError::NegativeBalance { needed: 1_001, available: 1_000 }));
        pool.unstake(&alice, 400, Round::new(12), &mut ledger).unwrap();
        let report = pool.process_aggregation(Round::new(22), &mut ledger).unwrap().unwrap();
        assert_eq!(report.unstaked, 400);
        assert_eq!(ledger.stake_of(pool.pool_account()), 600);

        let paid = pool.user_claim(&alice, Round::new(23), &mut ledger).unwrap();
        assert_eq!(paid, PoolBalance::new(0, 400));
        assert_eq!(ledger.token_balance(&alice), GoraAmount::new(400));
        assert_eq!(pool.depositor(&alice).unwrap().local_stake, 600);
    }

    #[test]
    fn pending_deposit_cannot_be_withdrawn() {
        let (mut pool, mut ledger) = setup(0, 10);
        let alice = make_account(1);
        fund(&mut ledger, &alice, 500);
        pool.stake(&alice, 500, None, Round::new(1), &mut ledger).unwrap();
        let err = pool
            .withdraw_non_stake(&alice, PoolBalance::new(0, 1), Round::new(2), &mut ledger)
            .unwrap_err();
        assert!(matches!(err, DelegationError::NegativeBalance { needed: 1, available: 0 }));
    }

    #[test]
    fn vested_tokens_go_back_to_their_source() {
        let (mut pool, mut ledger) = setup(0, 10);
        let vesting = make_account(7);
        let alice = make_account(1);
        fund(&mut ledger, &vesting, 500);
        pool.stake(&alice, 500, Some(vesting), Round::new(1), &mut ledger).unwrap();
        assert_eq!(ledger.token_balance(&vesting), GoraAmount::ZERO);
        assert_eq!(pool.user_claim(&alice, Round::new(2), &mut ledger).unwrap(), PoolBalance::ZERO);

        let err = pool
            .withdraw_vested(&make_account(8), &alice, Round::new(2), &mut ledger)
            .unwrap_err();
        assert!(matches!(err, DelegationError::NotVestingSource));
        // still pending, nothing to return yet
        assert!(pool.withdraw_vested(&vesting, &alice, Round::new(2), &mut ledger).is_err());

        pool.process_aggregation(Round::new(11), &mut ledger).unwrap();
        pool.unstake(&alice, 500, Round::new(12), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(22), &mut ledger).unwrap();
        let returned = pool.withdraw_vested(&vesting, &alice, Round::new(23), &mut ledger).unwrap();
        assert_eq!(returned, 500);
        assert_eq!(ledger.token_balance(&vesting), GoraAmount::new(500));
        assert_eq!(ledger.token_balance(&alice), GoraAmount::ZERO);
        assert_eq!(pool.depositor(&alice).unwrap().vesting.vested_amount, 0);
    }

    #[test]
    fn rollover_deferred_while_pool_stake_locked() {
        let (mut pool, mut ledger) = setup(0, 5);
        let alice = make_account(1);
        let bob = make_account(2);
        fund(&mut ledger, &alice, 100);
        fund(&mut ledger, &bob, 100);
        pool.stake(&alice, 100, None, Round::new(1), &mut ledger).unwrap();
        pool.process_aggregation(Round::new(6), &mut ledger).unwrap();

        // the ledger keeps the pool's stake locked until round 16
        let report = pool.stake(&bob, 100, None, Round::new(12), &mut ledger).unwrap();
        assert_eq!(report, None);
        assert_eq!(pool.aggregation_round(), 2);
        assert_eq!(pool.pending(), (100, 0));
        assert_eq!(ledger.token_balance(pool.pool_account()), GoraAmount::ZERO);
        assert!(pool.process_aggregation(Round::new(12), &mut ledger).is_err());

        let report = pool.process_aggregation(Round::new(17), &mut ledger).unwrap().unwrap();
        assert_eq!(report.staked, 100);
        assert_eq!(ledger.stake_of(pool.pool_account()), 200);
    }

    #[test]
    fn settings_are_manager_only() {
        let (mut pool, _) = setup(0, 10);
        let manager = make_account(MANAGER);
        let mut settings = *pool.settings();
        settings.manager_gora_share_bp = 2_500;
        assert!(matches!(
            pool.configure_settings(&make_account(1), settings),
            Err(DelegationError::NotManager)
        ));
        pool.configure_settings(&manager, settings).unwrap();
        assert_eq!(pool.settings().manager_gora_share_bp, 2_500);

        settings.manager_algo_share_bp = SHARE_DENOMINATOR + 1;
        assert!(matches!(
            pool.configure_settings(&manager, settings),
            Err(DelegationError::InvalidShare(10_001))
        ));
    }

    #[test]
    fn participation_key_registered_for_pool_account() {
        let (pool, mut ledger) = setup(0, 10);
        assert!(matches!(
            pool.register_participation_key(&make_account(1), [9; 32], Round::new(1), &mut ledger),
            Err(DelegationError::NotManager)
        ));
        pool.register_participation_key(&make_account(MANAGER), [9; 32], Round::new(1), &mut ledger)
            .unwrap();
        assert_eq!(ledger.participation_key(pool.pool_account()).unwrap().key, [9; 32]);
    }

    #[test]
    fn pool_state_survives_bincode() {
        let (mut pool, mut ledger) = setup(500, 10);
        let alice = make_account(1);
        fund(&mut ledger, &alice, 100);
        pool.stake(&alice, 100, None, Round::new(1), &mut ledger).unwrap();
        let bytes = bincode::serialize(&pool).unwrap();
        let back: DelegationPool = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.info(), pool.info());
        assert_eq!(back.depositor(&alice), pool.depositor(&alice));
    }
}
