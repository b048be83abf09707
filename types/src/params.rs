//! Protocol parameters shared by the registry, the vote engine, settlement and pools.
//!
//! Every field has a serde default so a partial `[params]` table in the node
//! configuration only overrides what it names.

use serde::{Deserialize, Serialize};

/// All tunable protocol parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    // ── Fees ─────────────────────────────────────────────────────────────
    /// Minimum native-currency fee per request (microalgos).
    #[serde(default = "default_algo_request_fee")]
    pub algo_request_fee: u64,

    /// Minimum token fee per request.
    #[serde(default = "default_gora_request_fee")]
    pub gora_request_fee: u64,

    /// Deposit held for the lifetime of a request record, returned on cleanup.
    #[serde(default = "default_request_storage_deposit")]
    pub request_storage_deposit: u64,

    /// Percentage of the escrowed fee returned by `refund` (0..=100).
    #[serde(default = "default_refund_percentage")]
    pub refund_request_made_percentage: u64,

    /// Native-currency compensation paid per voter on a refunded request.
    #[serde(default = "default_vote_refund_amount")]
    pub vote_refund_amount: u64,

    // ── Voting ───────────────────────────────────────────────────────────
    /// Quorum: `vote_count * 100 >= voting_threshold * total_stake / 1000`.
    #[serde(default = "default_voting_threshold")]
    pub voting_threshold: u64,

    /// Rounds a request stays open, and the lock applied to stake changes
    /// and participation key rotation.
    #[serde(default = "default_time_lock")]
    pub time_lock: u64,

    // ── Staking ──────────────────────────────────────────────────────────
    /// Smallest non-zero stake an account may hold.
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: u64,

    /// Rounds between delegation pool aggregations.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout: u64,
}

fn default_algo_request_fee() -> u64 {
    10_000
}

fn default_gora_request_fee() -> u64 {
    1_000_000
}

// 2500 + 400 * (32-byte key + 114-byte record)
fn default_request_storage_deposit() -> u64 {
    60_900
}

fn default_refund_percentage() -> u64 {
    100
}

fn default_vote_refund_amount() -> u64 {
    2_000
}

fn default_voting_threshold() -> u64 {
    66
}

fn default_time_lock() -> u64 {
    10
}

fn default_minimum_stake() -> u64 {
    0
}

fn default_pool_timeout() -> u64 {
    10
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            algo_request_fee: default_algo_request_fee(),
            gora_request_fee: default_gora_request_fee(),
            request_storage_deposit: default_request_storage_deposit(),
            refund_request_made_percentage: default_refund_percentage(),
            vote_refund_amount: default_vote_refund_amount(),
            voting_threshold: default_voting_threshold(),
            time_lock: default_time_lock(),
            minimum_stake: default_minimum_stake(),
            pool_timeout: default_pool_timeout(),
        }
    }
}
