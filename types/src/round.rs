//! Round numbers of the underlying ledger.
//!
//! The engine never reads wall time. Every timeout, lock and validity window is
//! a round count supplied by the caller's clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger round.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Round(u64);

impl Round {
    pub const ZERO: Self = Self(0);

    pub fn new(round: u64) -> Self {
        Self(round)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, rounds: u64) -> Self {
        Self(self.0.saturating_add(rounds))
    }

    /// Rounds elapsed since `self`, as seen from `now`.
    pub fn elapsed_since(&self, now: Round) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether a lock of `rounds` starting at `self` is strictly behind `now`.
    pub fn lock_expired(&self, rounds: u64, now: Round) -> bool {
        now.0 > self.0.saturating_add(rounds)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<u64> for Round {
    fn from(round: u64) -> Self {
        Self(round)
    }
}
