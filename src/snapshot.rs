//! Point-in-time dump of the file table, used to shortcut startup
//! recovery (`SPEC_FULL.md` §4.3). Snapshots never include the node
//! table — liveness re-converges from fresh heartbeats after restart.
//!
//! A snapshot also records the WAL byte offset it covers
//! (`wal_offset`), so recovery can replay only the entries appended
//! after the snapshot was taken instead of the entire WAL — the
//! "capacity optimization" §4.3 asks for.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::{FileChunks, State};
use crate::wal::Wal;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub files: std::collections::HashMap<String, FileChunks>,
    /// WAL byte offset as of when `files` was captured. Entries before
    /// this offset are already folded into `files`; replay should start
    /// here. Defaults to `0` so snapshots written before this field
    /// existed are still read as "replay the whole WAL", which is
    /// correct, just not maximally cheap.
    #[serde(default)]
    pub wal_offset: u64,
}

/// Loads the snapshot at `path`, or `None` if it does not exist yet.
pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Option<Snapshot>> {
    let path = path.as_ref();
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let snapshot = serde_json::from_slice(&bytes).map_err(|err| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed snapshot at {}: {}", path.display(), err),
                )
            })?;
            Ok(Some(snapshot))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Writes `snapshot` to `path` atomically: serialize to a sibling
/// `.tmp` file, flush, then rename over the destination.
pub async fn save(path: impl AsRef<Path>, snapshot: &Snapshot) -> std::io::Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("tmp");

    let data = serde_json::to_vec(snapshot)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    tokio::fs::write(&tmp_path, &data).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Periodically writes a snapshot of the current file table. No schedule
/// is mandated by the spec beyond "a capacity optimization"; an
/// interval-driven writer is used here, disabled entirely when
/// `interval_seconds` is zero.
pub async fn run(
    state: Arc<State>,
    wal: Arc<Wal>,
    path: PathBuf,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    if interval_seconds == 0 {
        log::info!("snapshot writer disabled (snapshot.interval_seconds = 0)");
        return;
    }

    let mut ticker = interval(Duration::from_secs(interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Captured under the read lock, which excludes concurrent
                // appends, so `wal_offset` lines up exactly with `files`.
                let (files, wal_offset) = {
                    let guard = state.read().await;
                    (guard.files.clone(), wal.current_offset())
                };
                if let Err(err) = save(&path, &Snapshot { files, wal_offset }).await {
                    log::warn!("failed to write snapshot to '{}': {}", path.display(), err);
                } else {
                    log::debug!("wrote snapshot to '{}' (wal_offset={})", path.display(), wal_offset);
                }
            }
            _ = shutdown.changed() => {
                log::info!("snapshot writer shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChunkRecord;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.snapshot");

        let mut files = std::collections::HashMap::new();
        let mut chunks = FileChunks::new();
        chunks.insert(
            0,
            ChunkRecord {
                chunk_id: "c0".to_string(),
                nodes: vec!["127.0.0.1:6001".to_string()],
            },
        );
        files.insert("a.txt".to_string(), chunks);

        save(&path, &Snapshot { files, wal_offset: 42 }).await.unwrap();

        let loaded = load(&path).await.unwrap().expect("snapshot present");
        assert_eq!(loaded.files["a.txt"][&0].chunk_id, "c0");
        assert_eq!(loaded.wal_offset, 42);
    }

    #[tokio::test]
    async fn missing_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.snapshot");
        assert!(load(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_without_wal_offset_field_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.snapshot");

        // A snapshot written before `wal_offset` existed: the field is
        // simply absent from the JSON object.
        tokio::fs::write(&path, br#"{"files":{}}"#).await.unwrap();

        let loaded = load(&path).await.unwrap().expect("snapshot present");
        assert_eq!(loaded.wal_offset, 0);
    }
}
