//! Stake delegation for the oracle network.
//!
//! A [`DelegationPool`] stakes its depositors' tokens under one account,
//! batches stake changes into aggregation rounds, and splits whatever the
//! pool account earns by stake-time after the manager's cut. Tokens can
//! also be staked on a depositor's behalf by a vesting source, which alone
//! may take them back.

pub mod depositor;
pub mod error;
pub mod pool;

pub use depositor::{
    DepositorState, LocalAggregationTracker, PoolBalance, RewardIndex, VestingTracker, INDEX_SCALE,
};
pub use error::DelegationError;
pub use pool::{
    Aggregation, DelegationPool, PoolInfo, PoolSettings, RolloverReport, TimeoutTracker, SHARE_DENOMINATOR,
};
