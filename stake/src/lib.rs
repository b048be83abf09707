//! Stake ledger for the oracle network.
//!
//! Tracks each account's deposited balances, its stake with a two-slot
//! round history, the network-wide stake total, the fee escrow sinks, and
//! registered participation keys. Every engine operation that moves value
//! takes the ledger by mutable reference; nothing here is global.

pub mod account;
pub mod error;
pub mod history;
pub mod ledger;

pub use account::{AccountState, ParticipationKey};
pub use error::StakeError;
pub use history::{StakeHistory, StakeSnapshot};
pub use ledger::StakeLedger;
