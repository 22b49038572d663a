//! Startup recovery: load the snapshot (if any), then replay the WAL on
//! top of it using the same semantics as the live handlers, but without
//! re-appending to the WAL (`SPEC_FULL.md` §4.3).

use std::path::Path;
use std::time::SystemTime;

use crate::config::{SnapshotConfig, WalConfig};
use crate::snapshot::{self, Snapshot};
use crate::state::{ChunkRecord, FileChunks, Inner, NodeRecord};
use crate::wal::{Wal, WalEntry};

/// Applies a single WAL entry to in-memory state using live-handler
/// semantics, but never touches `replicating` (a pure replay concern)
/// and never fails: unknown/malformed entries are filtered out earlier
/// by [`Wal::read_entries`], and `ADD_REPLICA` for a chunk that does not
/// exist is simply a no-op (it cannot happen in a well-formed log, but
/// replay stays permissive rather than panicking on a corrupt one).
pub fn apply_entry(inner: &mut Inner, entry: WalEntry) {
    match entry {
        WalEntry::RegisterNode { node_id, address } => {
            // Recovered last_seen is zero; liveness re-converges once the
            // node resumes sending heartbeats.
            inner.nodes.insert(
                node_id,
                NodeRecord {
                    address,
                    last_seen: SystemTime::UNIX_EPOCH,
                },
            );
        }
        WalEntry::CreateFile(filename) => {
            inner.files.entry(filename).or_insert_with(FileChunks::new);
        }
        WalEntry::AllocateChunk {
            filename,
            chunk_index,
            chunk_id,
            nodes,
        } => {
            let file = inner.files.entry(filename).or_insert_with(FileChunks::new);
            file.insert(chunk_index, ChunkRecord { chunk_id, nodes });
        }
        WalEntry::AddReplica {
            filename,
            chunk_index,
            node,
        } => {
            if let Some(file) = inner.files.get_mut(&filename) {
                if let Some(chunk) = file.get_mut(&chunk_index) {
                    chunk.add_replica(&node);
                }
            }
        }
    }
}

/// Full startup recovery: load the snapshot, then replay only the WAL
/// entries appended after the snapshot's recorded `wal_offset` (replay
/// is idempotent regardless, but skipping the already-covered prefix is
/// the point of carrying a snapshot at all — see `SPEC_FULL.md` §4.3).
/// With no snapshot present, replay starts at offset zero, i.e. the
/// whole WAL. Returns the recovered state plus the now-open WAL.
pub async fn recover(wal: &WalConfig, snapshot: &SnapshotConfig) -> std::io::Result<(Inner, Wal)> {
    let mut inner = Inner::default();
    let mut start_offset = 0;

    if let Some(Snapshot { files, wal_offset }) = snapshot::load(&snapshot.path).await? {
        inner.files = files;
        start_offset = wal_offset;
    }

    for entry in Wal::read_entries_from(&wal.path, start_offset).await? {
        apply_entry(&mut inner, entry);
    }

    let wal = Wal::open(&wal.path).await?;

    Ok((inner, wal))
}

/// Replays the WAL at `path` into an empty [`Inner`], ignoring any
/// snapshot. Used directly by tests that want to exercise replay without
/// a full [`recover`] call.
pub async fn replay_wal_only(path: impl AsRef<Path>) -> std::io::Result<Inner> {
    let mut inner = Inner::default();
    for entry in Wal::read_entries(path).await? {
        apply_entry(&mut inner, entry);
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Wal;

    #[tokio::test]
    async fn replay_reproduces_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("wal.log");

        {
            let wal = Wal::open(&wal_path).await.unwrap();
            wal.append(&WalEntry::CreateFile("x.txt".to_string()))
                .await
                .unwrap();
        }

        let inner = replay_wal_only(&wal_path).await.unwrap();
        assert!(inner.files.contains_key("x.txt"));
        assert!(inner.files["x.txt"].is_empty());
    }

    #[tokio::test]
    async fn replay_add_replica_is_deduplicating() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("wal.log");

        {
            let wal = Wal::open(&wal_path).await.unwrap();
            wal.append(&WalEntry::CreateFile("a.txt".to_string()))
                .await
                .unwrap();
            wal.append(&WalEntry::AllocateChunk {
                filename: "a.txt".to_string(),
                chunk_index: 0,
                chunk_id: "c0".to_string(),
                nodes: vec!["dn1".to_string()],
            })
            .await
            .unwrap();
            wal.append(&WalEntry::AddReplica {
                filename: "a.txt".to_string(),
                chunk_index: 0,
                node: "dn1".to_string(),
            })
            .await
            .unwrap();
            wal.append(&WalEntry::AddReplica {
                filename: "a.txt".to_string(),
                chunk_index: 0,
                node: "dn2".to_string(),
            })
            .await
            .unwrap();
        }

        let inner = replay_wal_only(&wal_path).await.unwrap();
        assert_eq!(inner.files["a.txt"][&0].nodes, vec!["dn1", "dn2"]);
    }

    /// Proves `recover` actually honors the snapshot's `wal_offset`
    /// rather than silently replaying the whole WAL regardless: a WAL
    /// entry before the recorded offset is given a chunk id the
    /// snapshot does not have, so if that entry were (wrongly) replayed
    /// it would overwrite the snapshot's value.
    #[tokio::test]
    async fn recover_skips_wal_entries_covered_by_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("wal.log");
        let snapshot_path = dir.path().join("metadata.snapshot");

        let offset_after_snapshot_point = {
            let wal = Wal::open(&wal_path).await.unwrap();
            wal.append(&WalEntry::CreateFile("a.txt".to_string()))
                .await
                .unwrap();
            wal.append(&WalEntry::AllocateChunk {
                filename: "a.txt".to_string(),
                chunk_index: 0,
                chunk_id: "pre-snapshot".to_string(),
                nodes: vec!["dn1".to_string()],
            })
            .await
            .unwrap();
            wal.current_offset()
        };

        let mut files = FileChunks::new();
        files.insert(
            0,
            ChunkRecord {
                chunk_id: "from-snapshot".to_string(),
                nodes: vec!["dn1".to_string()],
            },
        );
        let mut file_table = std::collections::HashMap::new();
        file_table.insert("a.txt".to_string(), files);
        snapshot::save(
            &snapshot_path,
            &Snapshot {
                files: file_table,
                wal_offset: offset_after_snapshot_point,
            },
        )
        .await
        .unwrap();

        let (inner, _wal) = recover(
            &WalConfig {
                path: wal_path.to_string_lossy().into_owned(),
            },
            &SnapshotConfig {
                path: snapshot_path.to_string_lossy().into_owned(),
                interval_seconds: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(inner.files["a.txt"][&0].chunk_id, "from-snapshot");
    }

    /// With no snapshot present, recovery falls back to replaying the
    /// entire WAL from offset zero.
    #[tokio::test]
    async fn recover_with_no_snapshot_replays_whole_wal() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("wal.log");
        let snapshot_path = dir.path().join("metadata.snapshot");

        {
            let wal = Wal::open(&wal_path).await.unwrap();
            wal.append(&WalEntry::CreateFile("a.txt".to_string()))
                .await
                .unwrap();
            wal.append(&WalEntry::AllocateChunk {
                filename: "a.txt".to_string(),
                chunk_index: 0,
                chunk_id: "c0".to_string(),
                nodes: vec!["dn1".to_string()],
            })
            .await
            .unwrap();
        }

        let (inner, _wal) = recover(
            &WalConfig {
                path: wal_path.to_string_lossy().into_owned(),
            },
            &SnapshotConfig {
                path: snapshot_path.to_string_lossy().into_owned(),
                interval_seconds: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(inner.files["a.txt"][&0].chunk_id, "c0");
    }
}
