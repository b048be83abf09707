//! Two-slot stake history.
//!
//! Only two snapshots are kept: the value as of the last change (`current`)
//! and the value it replaced (`historical`). That is enough to answer "what
//! was the stake at round r" for any r at or after the last change, which is
//! all the vote engine ever asks.

use gora_types::Round;
use serde::{Deserialize, Serialize};

use crate::error::StakeError;

/// Stake amount as of a round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSnapshot {
    pub round: Round,
    pub amount: u64,
}

/// Invariant: `current.round >= historical.round`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeHistory {
    pub historical: StakeSnapshot,
    pub current: StakeSnapshot,
}

impl StakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest stake amount.
    pub fn amount(&self) -> u64 {
        self.current.amount
    }

    /// Stake that counts for a request submitted at `round`.
    ///
    /// A change made in the same round as the request does not count; the
    /// value it replaced does.
    pub fn amount_at(&self, round: Round) -> Result<u64, StakeError> {
        if self.current.round < round {
            Ok(self.current.amount)
        } else if self.current.round == round {
            Ok(self.historical.amount)
        } else {
            Err(StakeError::SnapshotAhead {
                snapshot: self.current.round,
                requested: round,
            })
        }
    }

    pub fn increase(&mut self, now: Round, amount: u64) -> Result<u64, StakeError> {
        let updated = self
            .current
            .amount
            .checked_add(amount)
            .ok_or(StakeError::Overflow)?;
        self.record(now, updated)?;
        Ok(updated)
    }

    pub fn decrease(&mut self, now: Round, amount: u64) -> Result<u64, StakeError> {
        let updated =
            self.current
                .amount
                .checked_sub(amount)
                .ok_or(StakeError::NegativeBalance {
                    needed: amount,
                    available: self.current.amount,
                })?;
        self.record(now, updated)?;
        Ok(updated)
    }

    fn record(&mut self, now: Round, amount: u64) -> Result<(), StakeError> {
        if self.current.round > now {
            return Err(StakeError::SnapshotAhead {
                snapshot: self.current.round,
                requested: now,
            });
        }
        if self.current.round < now {
            self.historical = self.current;
        }
        self.current = StakeSnapshot { round: now, amount };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u64) -> Round {
        Round::new(n)
    }

    #[test]
    fn fresh_history_is_zero() {
        let h = StakeHistory::new();
        assert_eq!(h.amount(), 0);
        assert_eq!(h.amount_at(r(5)).unwrap(), 0);
    }

    #[test]
    fn lookup_after_change_sees_current() {
        let mut h = StakeHistory::new();
        h.increase(r(10), 500).unwrap();
        assert_eq!(h.amount_at(r(11)).unwrap(), 500);
    }

    #[test]
    fn lookup_in_change_round_sees_previous() {
        let mut h = StakeHistory::new();
        h.increase(r(10), 500).unwrap();
        h.increase(r(20), 300).unwrap();
        assert_eq!(h.amount_at(r(20)).unwrap(), 500);
        assert_eq!(h.amount_at(r(21)).unwrap(), 800);
    }

    #[test]
    fn lookup_before_change_is_ahead() {
        let mut h = StakeHistory::new();
        h.increase(r(10), 500).unwrap();
        assert_eq!(
            h.amount_at(r(9)),
            Err(StakeError::SnapshotAhead {
                snapshot: r(10),
                requested: r(9)
            })
        );
    }

    #[test]
    fn second_change_in_same_round_keeps_historical() {
        let mut h = StakeHistory::new();
        h.increase(r(10), 500).unwrap();
        h.increase(r(20), 100).unwrap();
        h.decrease(r(20), 50).unwrap();
        assert_eq!(h.historical, StakeSnapshot { round: r(10), amount: 500 });
        assert_eq!(h.current, StakeSnapshot { round: r(20), amount: 550 });
    }

    #[test]
    fn decrease_below_zero_rejected() {
        let mut h = StakeHistory::new();
        h.increase(r(1), 5).unwrap();
        assert!(matches!(
            h.decrease(r(2), 6),
            Err(StakeError::NegativeBalance { needed: 6, available: 5 })
        ));
        assert_eq!(h.amount(), 5);
    }

    #[test]
    fn change_in_the_past_rejected() {
        let mut h = StakeHistory::new();
        h.increase(r(10), 5).unwrap();
        assert!(h.increase(r(9), 1).is_err());
    }
}
