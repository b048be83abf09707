//! Nullable VRF verifier.

use gora_sortition::{SortitionError, VrfOutput, VrfVerifier};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A verifier whose verdict is set by the test. Counts how often it was
/// consulted.
pub struct NullVrf {
    accept: AtomicBool,
    calls: AtomicUsize,
}

impl NullVrf {
    pub fn accept_all() -> Self {
        Self {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reject_all() -> Self {
        Self {
            accept: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for NullVrf {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl VrfVerifier for NullVrf {
    fn verify(&self, _public_key: &[u8; 32], _seed: &[u8; 32], _output: &VrfOutput) -> Result<bool, SortitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "null-vrf"
    }
}
