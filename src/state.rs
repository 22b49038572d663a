//! The metadata service's single in-memory authoritative structure: the
//! node table, the file table, and the replication-in-progress set, all
//! behind one reader/writer lock (see `SPEC_FULL.md` §4.1).
//!
//! Handlers acquire [`State::write`] for mutations and hold the guard
//! across the WAL append that must precede the in-memory change, so WAL
//! order is exactly commit order. Pure reads (`GetFile`) use
//! [`State::read`].

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub address: String,
    pub last_seen: SystemTime,
}

/// A single chunk's placement. `nodes` is conceptually a set (no
/// duplicates, order irrelevant) but kept as a `Vec` since replica sets
/// are small and insertion order is a harmless, stable iteration order.
/// `Serialize`/`Deserialize` are needed because [`FileChunks`] is the
/// payload of a snapshot (see `crate::snapshot::Snapshot`); `NodeRecord`
/// has no such requirement since snapshots never include the node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub nodes: Vec<String>,
}

impl ChunkRecord {
    pub fn is_healthy(&self, replication_factor: u32) -> bool {
        self.nodes.len() >= replication_factor as usize
    }

    /// Adds `node` to the replica set unless it is already present.
    /// Returns whether the set actually changed.
    pub fn add_replica(&mut self, node: &str) -> bool {
        if self.nodes.iter().any(|n| n == node) {
            return false;
        }
        self.nodes.push(node.to_string());
        true
    }
}

pub type FileChunks = HashMap<u32, ChunkRecord>;

#[derive(Default)]
pub struct Inner {
    pub nodes: HashMap<String, NodeRecord>,
    pub files: HashMap<String, FileChunks>,
    /// Keys of the form `"<filename>:<index>"`; a key present here means
    /// a repair task for that chunk is currently in flight.
    pub replicating: HashSet<String>,
}

pub struct State(RwLock<Inner>);

impl State {
    pub fn new() -> Self {
        State(RwLock::new(Inner::default()))
    }

    /// Wraps an already-recovered [`Inner`] (see `crate::recovery::recover`).
    pub fn from_inner(inner: Inner) -> Self {
        State(RwLock::new(inner))
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.0.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.0.write().await
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

pub fn replication_key(filename: &str, chunk_index: u32) -> String {
    format!("{}:{}", filename, chunk_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replica_is_deduplicating() {
        let mut chunk = ChunkRecord {
            chunk_id: "c0".to_string(),
            nodes: vec!["dn1".to_string()],
        };
        assert!(!chunk.add_replica("dn1"));
        assert!(chunk.add_replica("dn2"));
        assert_eq!(chunk.nodes, vec!["dn1".to_string(), "dn2".to_string()]);
    }

    #[test]
    fn is_healthy_respects_replication_factor() {
        let chunk = ChunkRecord {
            chunk_id: "c0".to_string(),
            nodes: vec!["dn1".to_string()],
        };
        assert!(chunk.is_healthy(1));
        assert!(!chunk.is_healthy(2));
    }
}
