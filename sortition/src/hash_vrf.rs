//! Hash-based stand-in VRF for local networks and replays.
//!
//! `output = blake2b(public_key ‖ seed)` with an empty proof. Anyone who knows
//! the public key can predict the output, so this is only for development
//! setups where unpredictability does not matter.

use gora_crypto::blake2b_256_multi;

use crate::{SortitionError, VrfOutput, VrfVerifier};

/// Deterministic hash "VRF".
#[derive(Clone, Copy, Debug, Default)]
pub struct HashVrf;

impl HashVrf {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate for a participation key and seed.
    pub fn evaluate(&self, public_key: &[u8; 32], seed: &[u8; 32]) -> VrfOutput {
        VrfOutput::new(blake2b_256_multi(&[public_key, seed]), Vec::new())
    }
}

impl VrfVerifier for HashVrf {
    fn verify(
        &self,
        public_key: &[u8; 32],
        seed: &[u8; 32],
        output: &VrfOutput,
    ) -> Result<bool, SortitionError> {
        Ok(self.evaluate(public_key, seed).output == output.output)
    }

    fn name(&self) -> &str {
        "hash-vrf"
    }
}
