//! Whole-state snapshots.
//!
//! The snapshot is the bincode encoding of [`OracleState`] behind a format
//! version. Writes go to a sibling temp file that is renamed over the target,
//! so a crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::OracleState;
use crate::NodeError;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    state: OracleState,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    state: &'a OracleState,
}

pub fn encode(state: &OracleState) -> Result<Vec<u8>, NodeError> {
    bincode::serialize(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        state,
    })
    .map_err(|e| NodeError::Snapshot(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<OracleState, NodeError> {
    let file: SnapshotFile = bincode::deserialize(bytes).map_err(|e| NodeError::Snapshot(e.to_string()))?;
    if file.version != SNAPSHOT_VERSION {
        return Err(NodeError::Snapshot(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            file.version
        )));
    }
    Ok(file.state)
}

/// Write `state` to `path` atomically.
pub fn save(path: &Path, state: &OracleState) -> Result<(), NodeError> {
    let bytes = encode(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
    Ok(())
}

/// Read the snapshot at `path`, or `None` when there is none yet.
pub fn load(path: &Path) -> Result<Option<OracleState>, NodeError> {
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot");
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let state = decode(&bytes)?;
    info!(path = %path.display(), requests = state.engine.registry.request_count(), "snapshot loaded");
    Ok(Some(state))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gora_types::{AccountId, GoraAmount, ProtocolParams, Round};

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.bin");
        let mut state = OracleState::new(&ProtocolParams::default());
        let alice = AccountId::new([1; 32]);
        state.ledger.deposit_tokens(&alice, GoraAmount::new(500)).unwrap();
        state.ledger.stake(&alice, 200, Round::new(3)).unwrap();

        save(&path, &state).unwrap();
        assert!(!temp_path(&path).exists());
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.ledger.stake_of(&alice), 200);
        assert_eq!(loaded.ledger.token_balance(&alice), GoraAmount::new(300));
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.bin")).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_snapshot_error() {
        assert!(matches!(decode(&[0xFF; 7]), Err(NodeError::Snapshot(_))));
    }

    #[test]
    fn other_versions_rejected() {
        let state = OracleState::new(&ProtocolParams::default());
        let bytes = bincode::serialize(&SnapshotRef { version: 99, state: &state }).unwrap();
        let err = decode(&bytes).err().unwrap();
        assert!(err.to_string().contains("version 99"));
    }
}
