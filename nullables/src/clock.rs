//! Nullable clock: deterministic rounds for testing.

use gora_types::Round;
use std::cell::Cell;

/// A round counter that only moves when told to.
pub struct NullClock {
    current: Cell<u64>,
}

impl NullClock {
    pub fn new(initial_round: u64) -> Self {
        Self {
            current: Cell::new(initial_round),
        }
    }

    pub fn now(&self) -> Round {
        Round::new(self.current.get())
    }

    /// Advance by `rounds` and return the new round.
    pub fn advance(&self, rounds: u64) -> Round {
        self.current.set(self.current.get().saturating_add(rounds));
        self.now()
    }

    pub fn set(&self, round: u64) {
        self.current.set(round);
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new(0)
    }
}
