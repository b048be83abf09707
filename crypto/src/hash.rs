//! Hash functions and the record-key derivations built on them.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use gora_types::{AccountId, KeyHash, RequestId, Round, VoteHash};
use sha2::Sha512_256;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-512/256 over the concatenation of `parts`.
pub fn sha512_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// `H(requester ‖ key)`: registry key of a requester's live request.
pub fn key_hash(requester: &AccountId, key: &[u8]) -> KeyHash {
    KeyHash::new(sha512_256_multi(&[requester.as_bytes(), key]))
}

/// `H(response_body ‖ itob(destination_app) ‖ method_selector ‖ requester)`.
///
/// Two voters that return the same body for the same destination land on
/// the same proposal.
pub fn vote_hash(
    response_body: &[u8],
    destination_app: u64,
    method_selector: &[u8; 4],
    requester: &AccountId,
) -> VoteHash {
    VoteHash::new(sha512_256_multi(&[
        response_body,
        &destination_app.to_be_bytes(),
        method_selector,
        requester.as_bytes(),
    ]))
}

/// Request identifier: unique per submission even when a key is reused.
pub fn request_id(key_hash: &KeyHash, submitted: Round, sequence: u64) -> RequestId {
    RequestId::new(blake2b_256_multi(&[
        key_hash.as_bytes(),
        &submitted.as_u64().to_be_bytes(),
        &sequence.to_be_bytes(),
    ]))
}

/// Per-request seed every voter's VRF output must be derived from.
pub fn request_seed(request_id: &RequestId, submitted: Round) -> [u8; 32] {
    blake2b_256_multi(&[
        b"gora-seed",
        request_id.as_bytes(),
        &submitted.as_u64().to_be_bytes(),
    ])
}

/// Deterministic account id for a human-readable label (scripts, tests).
pub fn account_from_label(label: &str) -> AccountId {
    AccountId::new(blake2b_256_multi(&[b"gora-account", label.as_bytes()]))
}
