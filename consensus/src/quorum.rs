//! Quorum arithmetic.
//!
//! `voting_threshold` is in units of 0.1%: a request completes when
//! `vote_count * 100 >= voting_threshold * total_stake / 1000`. The expected
//! committee size is one vote per 1000 stake, so the factor of 100 turns the
//! vote count back into the stake scale. Computed in `u128` so neither side
//! overflows.

/// Whether `vote_count` meets the threshold for a request snapshot of
/// `total_stake`.
pub fn reached(vote_count: u64, voting_threshold: u64, total_stake: u64) -> bool {
    let lhs = u128::from(vote_count) * 100;
    let rhs = u128::from(voting_threshold) * u128::from(total_stake) / 1000;
    lhs >= rhs
}

/// Smallest vote count that reaches quorum.
pub fn threshold(voting_threshold: u64, total_stake: u64) -> u64 {
    let rhs = u128::from(voting_threshold) * u128::from(total_stake) / 1000;
    let votes = (rhs + 99) / 100;
    u64::try_from(votes).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_smallest_reaching_count() {
        assert_eq!(threshold(50, 300_000), 150);
        assert!(reached(150, 50, 300_000));
        assert!(!reached(149, 50, 300_000));
    }

    #[test]
    fn rounds_up() {
        // 66 * 10_001 / 1000 = 660 -> 6.6 votes -> 7
        assert_eq!(threshold(66, 10_001), 7);
        assert!(reached(7, 66, 10_001));
        assert!(!reached(6, 66, 10_001));
    }

    #[test]
    fn zero_stake_always_reached() {
        assert_eq!(threshold(66, 0), 0);
        assert!(reached(0, 66, 0));
    }

    #[test]
    fn no_overflow_at_extremes() {
        assert!(reached(u64::MAX, 1000, u64::MAX));
        assert_eq!(threshold(1000, u64::MAX), 184_467_440_737_095_517);
    }
}
