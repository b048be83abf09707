//! Stake-weighted sortition for oracle committees.
//!
//! A node turns its VRF output for a request seed and its stake into a number
//! of votes. The expected committee size is one vote per 1000 stake; the VRF
//! output picks a z-score from a static quantile table and the weight is the
//! mean shifted by that many standard deviations.
//!
//! Everything here is integer-only so every node computes the same weight
//! for the same inputs.

pub mod error;
pub mod hash_vrf;
pub mod weight;
pub mod z_table;

pub use error::SortitionError;
pub use hash_vrf::HashVrf;
pub use weight::{
    isqrt, q_from_output, votes_for_hex_output, votes_for_stake, votes_for_vrf_output,
    weights_batch, STAKE_PER_VOTE,
};
pub use z_table::{z_index, MAX_Z, MIDPOINT, TABLE_SIZE, Z_TABLE};

use serde::{Deserialize, Serialize};

/// A VRF evaluation: the pseudo-random output and the proof binding it to a
/// public key and seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfOutput {
    pub output: [u8; 32],
    pub proof: Vec<u8>,
}

impl VrfOutput {
    pub fn new(output: [u8; 32], proof: Vec<u8>) -> Self {
        Self { output, proof }
    }

    /// The 64-bit sortition input carried by this output.
    pub fn q(&self) -> u64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.output[..8]);
        u64::from_be_bytes(prefix)
    }
}

/// Checks that a VRF output was honestly derived from a key and seed.
///
/// The engine never evaluates VRFs itself; the host supplies a verifier for
/// whatever VRF construction the network uses.
pub trait VrfVerifier: Send + Sync {
    /// Whether `output` is the VRF of `seed` under `public_key`.
    fn verify(
        &self,
        public_key: &[u8; 32],
        seed: &[u8; 32],
        output: &VrfOutput,
    ) -> Result<bool, SortitionError>;

    /// Human-readable name of this verifier.
    fn name(&self) -> &str;
}
