//! The stake ledger: balances, stake, fee sinks and participation keys.

use std::collections::HashMap;

use gora_types::{AccountId, AlgoAmount, GoraAmount, ProtocolParams, Round};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::{AccountState, ParticipationKey};
use crate::error::StakeError;
use crate::history::StakeHistory;

/// Balances and stake for every account, plus the network-wide stake total.
///
/// Fees escrowed by requests sit in two sinks (one per currency) until
/// settlement pays them out to voters or back to the requester.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakeLedger {
    accounts: HashMap<AccountId, AccountState>,
    total_stake: StakeHistory,
    algo_fee_sink: AlgoAmount,
    token_fee_sink: GoraAmount,
    time_lock: u64,
    minimum_stake: u64,
}

impl StakeLedger {
    pub fn new(params: &ProtocolParams) -> Self {
        Self {
            accounts: HashMap::new(),
            total_stake: StakeHistory::new(),
            algo_fee_sink: AlgoAmount::ZERO,
            token_fee_sink: GoraAmount::ZERO,
            time_lock: params.time_lock,
            minimum_stake: params.minimum_stake,
        }
    }

    pub fn time_lock(&self) -> u64 {
        self.time_lock
    }

    pub fn account(&self, id: &AccountId) -> Option<&AccountState> {
        self.accounts.get(id)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn account_mut(&mut self, id: &AccountId) -> &mut AccountState {
        self.accounts.entry(*id).or_default()
    }

    // ── Balances ─────────────────────────────────────────────────────────

    pub fn algo_balance(&self, id: &AccountId) -> AlgoAmount {
        self.accounts.get(id).map(|a| a.algo).unwrap_or_default()
    }

    pub fn token_balance(&self, id: &AccountId) -> GoraAmount {
        self.accounts.get(id).map(|a| a.tokens).unwrap_or_default()
    }

    pub fn deposit_algo(&mut self, id: &AccountId, amount: AlgoAmount) -> Result<AlgoAmount, StakeError> {
        let acct = self.account_mut(id);
        acct.algo = acct.algo.checked_add(amount).ok_or(StakeError::Overflow)?;
        Ok(acct.algo)
    }

    pub fn withdraw_algo(&mut self, id: &AccountId, amount: AlgoAmount) -> Result<AlgoAmount, StakeError> {
        let available = self.algo_balance(id);
        let remaining = available.checked_sub(amount).ok_or(StakeError::NegativeBalance {
            needed: amount.raw(),
            available: available.raw(),
        })?;
        self.account_mut(id).algo = remaining;
        Ok(remaining)
    }

    pub fn deposit_tokens(&mut self, id: &AccountId, amount: GoraAmount) -> Result<GoraAmount, StakeError> {
        let acct = self.account_mut(id);
        acct.tokens = acct.tokens.checked_add(amount).ok_or(StakeError::Overflow)?;
        Ok(acct.tokens)
    }

    pub fn withdraw_tokens(&mut self, id: &AccountId, amount: GoraAmount) -> Result<GoraAmount, StakeError> {
        let available = self.token_balance(id);
        let remaining = available.checked_sub(amount).ok_or(StakeError::NegativeBalance {
            needed: amount.raw(),
            available: available.raw(),
        })?;
        self.account_mut(id).tokens = remaining;
        Ok(remaining)
    }

    // ── Fee sinks ────────────────────────────────────────────────────────

    pub fn algo_fee_sink(&self) -> AlgoAmount {
        self.algo_fee_sink
    }

    pub fn token_fee_sink(&self) -> GoraAmount {
        self.token_fee_sink
    }

    /// Move fees from an account into the sinks. Both legs succeed or neither does.
    pub fn escrow(&mut self, from: &AccountId, algo: AlgoAmount, tokens: GoraAmount) -> Result<(), StakeError> {
        let algo_available = self.algo_balance(from);
        let tokens_available = self.token_balance(from);
        let algo_left = algo_available.checked_sub(algo).ok_or(StakeError::NegativeBalance {
            needed: algo.raw(),
            available: algo_available.raw(),
        })?;
        let tokens_left = tokens_available.checked_sub(tokens).ok_or(StakeError::NegativeBalance {
            needed: tokens.raw(),
            available: tokens_available.raw(),
        })?;
        let algo_sink = self.algo_fee_sink.checked_add(algo).ok_or(StakeError::Overflow)?;
        let token_sink = self.token_fee_sink.checked_add(tokens).ok_or(StakeError::Overflow)?;

        let acct = self.account_mut(from);
        acct.algo = algo_left;
        acct.tokens = tokens_left;
        self.algo_fee_sink = algo_sink;
        self.token_fee_sink = token_sink;
        Ok(())
    }

    /// Pay out of the sinks into an account's balances.
    pub fn release(&mut self, to: &AccountId, algo: AlgoAmount, tokens: GoraAmount) -> Result<(), StakeError> {
        let algo_sink = self.algo_fee_sink.checked_sub(algo).ok_or(StakeError::NegativeBalance {
            needed: algo.raw(),
            available: self.algo_fee_sink.raw(),
        })?;
        let token_sink = self.token_fee_sink.checked_sub(tokens).ok_or(StakeError::NegativeBalance {
            needed: tokens.raw(),
            available: self.token_fee_sink.raw(),
        })?;
        let acct_algo = self.algo_balance(to).checked_add(algo).ok_or(StakeError::Overflow)?;
        let acct_tokens = self.token_balance(to).checked_add(tokens).ok_or(StakeError::Overflow)?;

        self.algo_fee_sink = algo_sink;
        self.token_fee_sink = token_sink;
        let acct = self.account_mut(to);
        acct.algo = acct_algo;
        acct.tokens = acct_tokens;
        Ok(())
    }

    // ── Stake ────────────────────────────────────────────────────────────

    pub fn stake_of(&self, id: &AccountId) -> u64 {
        self.accounts.get(id).map(|a| a.stake.amount()).unwrap_or(0)
    }

    /// An account's stake as counted for a request submitted at `round`.
    pub fn stake_at(&self, id: &AccountId, round: Round) -> Result<u64, StakeError> {
        match self.accounts.get(id) {
            Some(acct) => acct.stake.amount_at(round),
            None => Ok(0),
        }
    }

    pub fn total_stake(&self) -> u64 {
        self.total_stake.amount()
    }

    pub fn total_stake_at(&self, round: Round) -> Result<u64, StakeError> {
        self.total_stake.amount_at(round)
    }

    /// Lock `amount` of the account's deposited tokens as stake.
    pub fn stake(&mut self, id: &AccountId, amount: u64, now: Round) -> Result<u64, StakeError> {
        if amount == 0 {
            return Err(StakeError::ZeroAmount);
        }
        let acct = self.accounts.get(id).cloned().unwrap_or_default();
        self.check_unlocked(&acct, now)?;
        let tokens_left = acct
            .tokens
            .checked_sub(GoraAmount::new(amount))
            .ok_or(StakeError::NegativeBalance {
                needed: amount,
                available: acct.tokens.raw(),
            })?;
        let mut history = acct.stake;
        let staked = history.increase(now, amount)?;
        self.check_minimum(staked)?;
        let mut total = self.total_stake;
        total.increase(now, amount)?;

        let time_lock = self.time_lock;
        let entry = self.account_mut(id);
        entry.tokens = tokens_left;
        entry.stake = history;
        entry.stake_locked_until = Some(now.saturating_add(time_lock));
        self.total_stake = total;
        debug!(account = %id, amount, staked, round = %now, "stake increased");
        Ok(staked)
    }

    /// Return `amount` of stake to the account's token balance.
    pub fn unstake(&mut self, id: &AccountId, amount: u64, now: Round) -> Result<u64, StakeError> {
        if amount == 0 {
            return Err(StakeError::ZeroAmount);
        }
        let acct = self.accounts.get(id).cloned().unwrap_or_default();
        self.check_unlocked(&acct, now)?;
        let mut history = acct.stake;
        let staked = history.decrease(now, amount)?;
        self.check_minimum(staked)?;
        let tokens = acct
            .tokens
            .checked_add(GoraAmount::new(amount))
            .ok_or(StakeError::Overflow)?;
        let mut total = self.total_stake;
        total.decrease(now, amount)?;

        let time_lock = self.time_lock;
        let entry = self.account_mut(id);
        entry.tokens = tokens;
        entry.stake = history;
        entry.stake_locked_until = Some(now.saturating_add(time_lock));
        self.total_stake = total;
        debug!(account = %id, amount, staked, round = %now, "stake decreased");
        Ok(staked)
    }

    fn check_unlocked(&self, acct: &AccountState, now: Round) -> Result<(), StakeError> {
        match acct.stake_locked_until {
            Some(until) if until >= now => Err(StakeError::StakeLocked { until }),
            _ => Ok(()),
        }
    }

    fn check_minimum(&self, remaining: u64) -> Result<(), StakeError> {
        if remaining != 0 && remaining < self.minimum_stake {
            return Err(StakeError::BelowMinimumStake {
                remaining,
                minimum: self.minimum_stake,
            });
        }
        Ok(())
    }

    // ── Participation keys ───────────────────────────────────────────────

    pub fn participation_key(&self, id: &AccountId) -> Option<&ParticipationKey> {
        self.accounts.get(id).and_then(|a| a.participation.as_ref())
    }

    /// Register or rotate the account's participation key.
    ///
    /// Rotation is refused until `time_lock` rounds after the previous
    /// registration.
    pub fn register_participation_key(&mut self, id: &AccountId, key: [u8; 32], now: Round) -> Result<(), StakeError> {
        let time_lock = self.time_lock;
        let acct = self.account_mut(id);
        if let Some(existing) = acct.participation {
            if !existing.ready(time_lock, now) {
                return Err(StakeError::ParticipationKeyLocked {
                    until: existing.registered_at.saturating_add(time_lock),
                });
            }
        }
        acct.participation = Some(ParticipationKey {
            key,
            registered_at: now,
        });
        debug!(account = %id, round = %now, "participation key registered");
        Ok(())
    }
}
