//! Vote weight from a VRF prefix and a stake.

use rayon::prelude::*;

use crate::z_table::{z100, z_index};
use crate::SortitionError;

/// Stake per expected vote.
pub const STAKE_PER_VOTE: u64 = 1_000;

/// Integer square root (floor) by Newton iteration.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Read the sortition input from raw VRF output bytes (first 8, big-endian).
pub fn q_from_output(output: &[u8]) -> Result<u64, SortitionError> {
    let prefix: [u8; 8] = output
        .get(..8)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(SortitionError::OutputTooShort(output.len()))?;
    Ok(u64::from_be_bytes(prefix))
}

/// Number of votes a node with `stake` receives for VRF prefix `q`.
///
/// Mean `stake / 1000`, variance `mean * 999 / 1000`. Prefixes below the
/// midpoint subtract the deviation, the rest add it.
pub fn votes_for_stake(q: u64, stake: u64) -> u64 {
    if stake == 0 {
        return 0;
    }
    let (index, lower) = z_index(q);
    let mean = stake / STAKE_PER_VOTE;
    let variance = u128::from(mean) * 999 / 1000;
    let std = isqrt(variance);
    let deviation = u128::from(z100(index)) * std / 100;
    // deviation <= 7 * sqrt(mean) fits comfortably in u64
    let deviation = u64::try_from(deviation).unwrap_or(u64::MAX);
    if lower {
        mean.saturating_sub(deviation)
    } else {
        mean.saturating_add(deviation)
    }
}

/// Weight for a raw VRF output (hex-decoded bytes, at least 8 long).
pub fn votes_for_vrf_output(output: &[u8], stake: u64) -> Result<u64, SortitionError> {
    Ok(votes_for_stake(q_from_output(output)?, stake))
}

/// Evaluate many `(q, stake)` pairs in parallel. Output order matches input.
pub fn weights_batch(inputs: &[(u64, u64)]) -> Vec<u64> {
    inputs
        .par_iter()
        .map(|&(q, stake)| votes_for_stake(q, stake))
        .collect()
}

/// Parse a hex VRF output and return its weight.
pub fn votes_for_hex_output(output_hex: &str, stake: u64) -> Result<u64, SortitionError> {
    let bytes =
        hex::decode(output_hex).map_err(|e| SortitionError::InvalidEncoding(e.to_string()))?;
    votes_for_vrf_output(&bytes, stake)
}
