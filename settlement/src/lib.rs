//! Reward settlement.
//!
//! Once a request completes, each voter that backed the winning answer
//! claims a share of the escrowed fees proportional to its votes. Voters on
//! requests that never completed claim a fixed refund out of the native fee
//! instead, and the requester gets whatever is left once they are all paid.

pub mod claim;
pub mod error;
pub mod rewards;

pub use claim::{claim, claimable, ClaimOutcome};
pub use error::SettlementError;
pub use rewards::{share_of, voter_share};
