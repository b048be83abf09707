//! Hashing primitives for the Gora oracle engine.
//!
//! - **SHA-512/256** for the content-addressed record keys (`key_hash`, `vote_hash`),
//!   so keys line up with the ones the on-chain contracts derive.
//! - **Blake2b** for engine-local identifiers (request ids, per-request seeds)
//!   and for deriving deterministic account ids from labels.

pub mod hash;

pub use hash::{
    account_from_label, blake2b_256, blake2b_256_multi, key_hash, request_id, request_seed,
    sha512_256_multi, vote_hash,
};
