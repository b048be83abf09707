//! Oracle node: orchestrates every protocol engine.
//!
//! The node owns the stake ledger, the vote engine and the delegation pools
//! behind a single async mutex, so every operation sees a total order. It:
//! - Accepts deposits, stake changes and participation keys
//! - Opens, tallies, completes and refunds requests
//! - Settles voter rewards and refunds, auto-claiming before a new vote
//! - Runs delegation pools and their aggregation rollovers
//! - Counts everything in Prometheus metrics and snapshots state to disk

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod snapshot;
pub mod state;
pub mod tracing_spans;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{OracleNode, StakeView, VoteReport};
pub use state::OracleState;
