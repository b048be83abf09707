//! Per-account state held by the stake ledger.

use gora_types::{AlgoAmount, GoraAmount, Round};
use serde::{Deserialize, Serialize};

use crate::history::StakeHistory;

/// A participation key and the round it was registered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationKey {
    /// Public key the account's VRF outputs are checked against.
    pub key: [u8; 32],
    pub registered_at: Round,
}

impl ParticipationKey {
    /// A key may vote once `time_lock` rounds have passed since registration.
    pub fn ready(&self, time_lock: u64, now: Round) -> bool {
        self.registered_at.saturating_add(time_lock) <= now
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Deposited native currency available for fees.
    pub algo: AlgoAmount,
    /// Deposited tokens not currently staked.
    pub tokens: GoraAmount,
    pub stake: StakeHistory,
    /// Stake changes are refused until a round strictly after this one.
    pub stake_locked_until: Option<Round>,
    pub participation: Option<ParticipationKey>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake_unlocked(&self, now: Round) -> bool {
        self.stake_locked_until.map_or(true, |until| until < now)
    }
}
