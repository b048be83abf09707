//! Reward arithmetic.
//!
//! A winning voter's share is a whole percentage of the winning vote count,
//! and each fee is paid as `share * fee / 100`. Rounding dust stays in the
//! fee sinks.

/// Whole-percent share of `voter_votes` in `winning_votes`.
pub fn voter_share(voter_votes: u64, winning_votes: u64) -> u64 {
    if winning_votes == 0 {
        return 0;
    }
    let share = u128::from(voter_votes) * 100 / u128::from(winning_votes);
    u64::try_from(share.min(100)).unwrap_or(100)
}

/// `share` percent of `fee`.
pub fn share_of(share: u64, fee: u64) -> u64 {
    let paid = u128::from(share.min(100)) * u128::from(fee) / 100;
    u64::try_from(paid).unwrap_or(fee)
}
