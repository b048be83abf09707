//! Request registry and vote tally engine.
//!
//! Requesters open requests with a fee; staked nodes answer them with
//! ballots whose weight comes from VRF sortition. Ballots carrying the same
//! answer accumulate on one proposal, and the first proposal to reach quorum
//! completes the request and is delivered to its destination.
//!
//! ## Module overview
//!
//! - [`registry`]: submission, refund, completion and expiry of requests.
//! - [`engine`]: ballot validation and tallying.
//! - [`proposal`]: per-answer vote accumulators, active or archived.
//! - [`lease`]: ticket windows and the overlapping-lease guard.
//! - [`history`]: each voter's latest contribution, read by settlement.
//! - [`quorum`]: threshold arithmetic.
//! - [`sink`]: outbound delivery seam.

pub mod engine;
pub mod error;
pub mod history;
pub mod lease;
pub mod proposal;
pub mod quorum;
pub mod registry;
pub mod request;
pub mod sink;

pub use engine::{Ballot, VoteEngine, VoteOutcome};
pub use error::ConsensusError;
pub use history::{VoterHistory, VoterHistoryEntry};
pub use lease::{LeaseBook, Ticket};
pub use proposal::{Proposal, ProposalRecord};
pub use registry::{RefundOutcome, RequestRegistry};
pub use request::{Destination, Fee, Request, RequestStatus};
pub use sink::{Delivery, DiscardSink, ResponseSink};
