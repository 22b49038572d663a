//! Re-replication loop: finds under-replicated chunks and repairs them
//! in the background (`SPEC_FULL.md` §4.7). Repair RPCs never run while
//! the state lock is held; the write lock is re-acquired only to
//! re-validate and commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::placement::pick_replica_nodes;
use crate::replica_io;
use crate::state::{replication_key, ChunkRecord, Inner, NodeRecord, State};
use crate::wal::{Wal, WalEntry};

/// Chunks whose replica-set size is below `replication_factor`, snapshot
/// from a single read-lock acquisition.
fn find_under_replicated(
    inner: &Inner,
    replication_factor: u32,
) -> Vec<(String, u32, ChunkRecord)> {
    let mut found = Vec::new();
    for (filename, chunks) in &inner.files {
        for (&index, record) in chunks {
            if !record.is_healthy(replication_factor) {
                found.push((filename.clone(), index, record.clone()));
            }
        }
    }
    found
}

fn is_address_live(nodes: &HashMap<String, NodeRecord>, address: &str) -> bool {
    nodes.values().any(|record| record.address == address)
}

/// Repairs one under-replicated chunk: fetch from a current replica,
/// store on a fresh node, then re-validate and commit under the write
/// lock. Exits silently (logging at `warn`) on any failure — the next
/// scan retries.
async fn repair_chunk(
    state: Arc<State>,
    wal: Arc<Wal>,
    filename: String,
    chunk_index: u32,
    record: ChunkRecord,
    replication_factor: u32,
) {
    let source = match record.nodes.first() {
        Some(source) => source.clone(),
        None => {
            log::warn!(
                "cannot repair {}:{} - no source replica available",
                filename,
                chunk_index
            );
            return;
        }
    };

    let target = {
        let guard = state.read().await;
        pick_replica_nodes(&guard.nodes, 1, &record.nodes)
            .into_iter()
            .next()
    };
    let target = match target {
        Some(target) => target,
        None => {
            log::warn!(
                "cannot repair {}:{} - no target node available",
                filename,
                chunk_index
            );
            return;
        }
    };

    let data = match replica_io::fetch_chunk(&source, &record.chunk_id).await {
        Ok(data) => data,
        Err(err) => {
            log::warn!("repair {}:{} - fetch from '{}' failed: {}", filename, chunk_index, source, err);
            return;
        }
    };

    if let Err(err) = replica_io::store_chunk(&target, &record.chunk_id, data).await {
        log::warn!("repair {}:{} - store on '{}' failed: {}", filename, chunk_index, target, err);
        return;
    }

    let mut guard = state.write().await;

    if !is_address_live(&guard.nodes, &source) || !is_address_live(&guard.nodes, &target) {
        log::warn!(
            "repair {}:{} - source or target no longer live, aborting",
            filename,
            chunk_index
        );
        return;
    }

    let still_under_replicated = guard
        .files
        .get(&filename)
        .and_then(|chunks| chunks.get(&chunk_index))
        .map(|chunk| !chunk.is_healthy(replication_factor))
        .unwrap_or(false);

    if !still_under_replicated {
        return;
    }

    if let Err(err) = wal
        .append(&WalEntry::AddReplica {
            filename: filename.clone(),
            chunk_index,
            node: target.clone(),
        })
        .await
    {
        log::warn!(
            "repair {}:{} - failed to append ADD_REPLICA: {}",
            filename,
            chunk_index,
            err
        );
        return;
    }

    if let Some(chunk) = guard
        .files
        .get_mut(&filename)
        .and_then(|chunks| chunks.get_mut(&chunk_index))
    {
        chunk.add_replica(&target);
        log::info!(
            "repaired chunk {}:{} - added replica '{}'",
            filename,
            chunk_index,
            target
        );
    }
}

/// Runs one scan: finds under-replicated chunks and dispatches one
/// repair task per chunk, gated by the replication-in-progress set so a
/// chunk already being repaired is skipped.
pub async fn scan_once(state: Arc<State>, wal: Arc<Wal>, replication_factor: u32) {
    let candidates = {
        let guard = state.read().await;
        find_under_replicated(&guard, replication_factor)
    };

    for (filename, chunk_index, record) in candidates {
        let key = replication_key(&filename, chunk_index);

        {
            let mut guard = state.write().await;
            if guard.replicating.contains(&key) {
                continue;
            }
            guard.replicating.insert(key.clone());
        }

        let state = state.clone();
        let wal = wal.clone();
        tokio::spawn(async move {
            repair_chunk(
                state.clone(),
                wal,
                filename,
                chunk_index,
                record,
                replication_factor,
            )
            .await;

            let mut guard = state.write().await;
            guard.replicating.remove(&key);
        });
    }
}

/// Runs [`scan_once`] on `scan_interval_seconds` forever until `shutdown`
/// fires.
pub async fn run(
    state: Arc<State>,
    wal: Arc<Wal>,
    replication_factor: u32,
    scan_interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(scan_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scan_once(state.clone(), wal.clone(), replication_factor).await;
            }
            _ = shutdown.changed() => {
                log::info!("re-replication loop shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_chunks_below_replication_factor() {
        let mut inner = Inner::default();
        let mut chunks = crate::state::FileChunks::new();
        chunks.insert(
            0,
            ChunkRecord {
                chunk_id: "c0".to_string(),
                nodes: vec!["dn1".to_string()],
            },
        );
        chunks.insert(
            1,
            ChunkRecord {
                chunk_id: "c1".to_string(),
                nodes: vec!["dn1".to_string(), "dn2".to_string()],
            },
        );
        inner.files.insert("a.txt".to_string(), chunks);

        let found = find_under_replicated(&inner, 2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 0);
    }
}
