//! Per-depositor pool state.

use gora_types::AccountId;
use serde::{Deserialize, Serialize};

/// An algo/token pair held or owed by the pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalance {
    pub algo: u64,
    pub gora: u64,
}

impl PoolBalance {
    pub const ZERO: Self = Self { algo: 0, gora: 0 };

    pub fn new(algo: u64, gora: u64) -> Self {
        Self { algo, gora }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            algo: self.algo.checked_add(other.algo)?,
            gora: self.gora.checked_add(other.gora)?,
        })
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        Some(Self {
            algo: self.algo.checked_sub(other.algo)?,
            gora: self.gora.checked_sub(other.gora)?,
        })
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            algo: self.algo.saturating_sub(other.algo),
            gora: self.gora.saturating_sub(other.gora),
        }
    }

    pub fn min(self, other: Self) -> Self {
        Self {
            algo: self.algo.min(other.algo),
            gora: self.gora.min(other.gora),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.algo == 0 && self.gora == 0
    }
}

/// Fixed-point scale of [`RewardIndex`].
pub const INDEX_SCALE: u128 = 1_000_000_000_000_000_000;

/// Cumulative rewards per unit of active stake, scaled by [`INDEX_SCALE`].
///
/// Each rollover adds the round's rewards divided by the stake that was
/// active during the round, so a depositor's share over any span is its
/// stake times the index difference. Claim order does not matter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardIndex {
    pub algo: u128,
    pub gora: u128,
}

impl RewardIndex {
    /// The index after distributing `rewards` over `active_stake`. `None`
    /// on overflow or when there is no stake to distribute over.
    pub fn accrue(self, rewards: PoolBalance, active_stake: u64) -> Option<Self> {
        if active_stake == 0 {
            return None;
        }
        let stake = u128::from(active_stake);
        Some(Self {
            algo: self.algo.checked_add(u128::from(rewards.algo) * INDEX_SCALE / stake)?,
            gora: self.gora.checked_add(u128::from(rewards.gora) * INDEX_SCALE / stake)?,
        })
    }

    /// What `stake` earned between `since` and this index.
    pub fn earned_since(&self, since: &RewardIndex, stake: u64) -> PoolBalance {
        PoolBalance::new(
            scaled_share(self.algo.saturating_sub(since.algo), stake),
            scaled_share(self.gora.saturating_sub(since.gora), stake),
        )
    }
}

fn scaled_share(delta: u128, stake: u64) -> u64 {
    let stake = u128::from(stake);
    let whole = stake.saturating_mul(delta / INDEX_SCALE);
    let frac = stake * (delta % INDEX_SCALE) / INDEX_SCALE;
    u64::try_from(whole.saturating_add(frac)).unwrap_or(u64::MAX)
}

/// The depositor's one pending stake change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAggregationTracker {
    /// Aggregation round the pending change was made in (0 = never acted).
    pub previous_round: u64,
    /// Cumulative pool rewards when the pending change was made.
    pub previous_round_rewards: PoolBalance,
    pub pending_amount: u64,
    pub is_deposit: bool,
}

impl LocalAggregationTracker {
    pub fn has_pending(&self) -> bool {
        self.pending_amount > 0
    }

    /// A pending deposit whose round has not closed yet.
    pub fn unapplied_deposit(&self, current_round: u64) -> u64 {
        if self.is_deposit && self.previous_round >= current_round {
            self.pending_amount
        } else {
            0
        }
    }
}

/// Tokens staked on a depositor's behalf by a vesting source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingTracker {
    pub vested_amount: u64,
    pub source: Option<AccountId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorState {
    /// Pool reward index when the depositor's share was last credited.
    pub reward_index: RewardIndex,
    /// Stake counted in the pool's ledger stake.
    pub local_stake: u64,
    /// Rewards and uncommitted tokens held for the depositor.
    pub non_stake: PoolBalance,
    pub tracker: LocalAggregationTracker,
    pub vesting: VestingTracker,
}

impl DepositorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-stake funds the depositor may take out right now.
    ///
    /// Vested tokens count against stake first; whatever is not staked is
    /// held back here, as is a deposit whose round has not closed.
    pub fn withdrawable(&self, current_round: u64) -> PoolBalance {
        let locked = self
            .vesting
            .vested_amount
            .saturating_sub(self.local_stake)
            .saturating_add(self.tracker.unapplied_deposit(current_round));
        PoolBalance {
            algo: self.non_stake.algo,
            gora: self.non_stake.gora.saturating_sub(locked),
        }
    }
}
