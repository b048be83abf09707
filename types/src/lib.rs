//! Fundamental types for the Gora oracle engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! account identifiers, 32-byte hashes, fee amounts, round numbers and the
//! protocol parameter set.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod params;
pub mod round;

pub use address::AccountId;
pub use amount::{AlgoAmount, GoraAmount};
pub use error::TypesError;
pub use hash::{KeyHash, RequestId, VoteHash};
pub use params::ProtocolParams;
pub use round::Round;
