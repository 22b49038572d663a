//! The metadata service's RPC surface (`SPEC_FULL.md` §4.4): owns the
//! namespace, assigns placements, and durably logs every mutation before
//! applying it in memory.

use std::sync::Arc;
use std::time::SystemTime;

use tonic::{Request, Response, Status};

use crate::error::MetadataError;
use crate::placement::pick_replica_nodes;
use crate::proto::metadata_service_server::MetadataService;
use crate::proto::{
    Ack, AllocateChunkRequest, ChunkMetadata, CreateFileRequest, FileMetadata,
    GetFileRequest, HeartbeatRequest, HeartbeatResponse, RegisterNodeRequest,
};
use crate::state::{ChunkRecord, FileChunks, NodeRecord, State};
use crate::wal::{Wal, WalEntry};

pub struct MetadataServer {
    pub state: Arc<State>,
    pub wal: Arc<Wal>,
    pub replication_factor: u32,
}

impl MetadataServer {
    pub fn new(state: Arc<State>, wal: Arc<Wal>, replication_factor: u32) -> Self {
        Self {
            state,
            wal,
            replication_factor,
        }
    }

    async fn create_file_inner(&self, filename: String) -> Result<FileMetadata, MetadataError> {
        let mut guard = self.state.write().await;

        if guard.files.contains_key(&filename) {
            return Err(MetadataError::AlreadyExists(filename));
        }

        self.wal
            .append(&WalEntry::CreateFile(filename.clone()))
            .await?;

        guard.files.insert(filename.clone(), FileChunks::new());

        Ok(FileMetadata {
            filename,
            chunks: Vec::new(),
        })
    }

    async fn allocate_chunk_inner(
        &self,
        filename: String,
        chunk_index: u32,
        chunk_id: String,
    ) -> Result<ChunkMetadata, MetadataError> {
        let mut guard = self.state.write().await;

        // Ensure the file entry exists; no WAL record here, the
        // subsequent ALLOCATE_CHUNK implies it on replay.
        if !guard.files.contains_key(&filename) {
            guard.files.insert(filename.clone(), FileChunks::new());
        }

        if let Some(existing) = guard.files[&filename].get(&chunk_index) {
            return Ok(to_proto_chunk(existing));
        }

        let nodes = pick_replica_nodes(&guard.nodes, self.replication_factor, &[]);

        self.wal
            .append(&WalEntry::AllocateChunk {
                filename: filename.clone(),
                chunk_index,
                chunk_id: chunk_id.clone(),
                nodes: nodes.clone(),
            })
            .await?;

        let record = ChunkRecord {
            chunk_id,
            nodes,
        };

        let proto_chunk = to_proto_chunk(&record);
        guard
            .files
            .get_mut(&filename)
            .expect("file entry inserted above")
            .insert(chunk_index, record);

        Ok(proto_chunk)
    }

    async fn get_file_inner(&self, filename: &str) -> Result<FileMetadata, MetadataError> {
        let guard = self.state.read().await;

        let chunks = guard
            .files
            .get(filename)
            .ok_or_else(|| MetadataError::NotFound(filename.to_string()))?;

        let k = chunks.len() as u32;
        let mut ordered = Vec::with_capacity(k as usize);
        for index in 0..k {
            let record = chunks.get(&index).ok_or_else(|| {
                MetadataError::Internal(format!(
                    "chunk indices for '{}' are not dense in [0, {})",
                    filename, k
                ))
            })?;
            ordered.push(to_proto_chunk(record));
        }

        Ok(FileMetadata {
            filename: filename.to_string(),
            chunks: ordered,
        })
    }
}

fn to_proto_chunk(record: &ChunkRecord) -> ChunkMetadata {
    ChunkMetadata {
        chunk_id: record.chunk_id.clone(),
        nodes: record.nodes.clone(),
    }
}

#[tonic::async_trait]
impl MetadataService for MetadataServer {
    async fn register_node(
        &self,
        request: Request<RegisterNodeRequest>,
    ) -> Result<Response<Ack>, Status> {
        let RegisterNodeRequest { node_id, address } = request.into_inner();
        log::info!("registering node '{}' at '{}'", node_id, address);

        let mut guard = self.state.write().await;

        self.wal
            .append(&WalEntry::RegisterNode {
                node_id: node_id.clone(),
                address: address.clone(),
            })
            .await
            .map_err(MetadataError::from)?;

        guard.nodes.insert(
            node_id,
            NodeRecord {
                address,
                last_seen: SystemTime::now(),
            },
        );

        Ok(Response::new(Ack { ok: true }))
    }

    async fn heartbeat(
        &self,
        request: Request<HeartbeatRequest>,
    ) -> Result<Response<HeartbeatResponse>, Status> {
        let HeartbeatRequest { node_id } = request.into_inner();

        let mut guard = self.state.write().await;
        let ok = match guard.nodes.get_mut(&node_id) {
            Some(record) => {
                record.last_seen = SystemTime::now();
                true
            }
            None => false,
        };
        log::debug!("heartbeat from '{}': ok={}", node_id, ok);

        Ok(Response::new(HeartbeatResponse { ok }))
    }

    async fn create_file(
        &self,
        request: Request<CreateFileRequest>,
    ) -> Result<Response<FileMetadata>, Status> {
        let CreateFileRequest { filename } = request.into_inner();
        log::info!("creating file '{}'", filename);

        let meta = self.create_file_inner(filename).await?;
        Ok(Response::new(meta))
    }

    async fn allocate_chunk(
        &self,
        request: Request<AllocateChunkRequest>,
    ) -> Result<Response<ChunkMetadata>, Status> {
        let AllocateChunkRequest {
            filename,
            chunk_index,
            chunk_id,
        } = request.into_inner();
        log::info!("allocating chunk {} of '{}'", chunk_index, filename);

        let meta = self
            .allocate_chunk_inner(filename, chunk_index, chunk_id)
            .await?;
        Ok(Response::new(meta))
    }

    async fn get_file(
        &self,
        request: Request<GetFileRequest>,
    ) -> Result<Response<FileMetadata>, Status> {
        let GetFileRequest { filename } = request.into_inner();
        log::debug!("reading file '{}'", filename);

        let meta = self.get_file_inner(&filename).await?;
        Ok(Response::new(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn server() -> MetadataServer {
        let dir = tempfile::tempdir().unwrap();
        let wal = Wal::open(dir.path().join("wal.log")).await.unwrap();
        // Leak the tempdir for the lifetime of the test so the WAL path
        // stays valid; fine for short-lived unit tests.
        std::mem::forget(dir);
        MetadataServer::new(Arc::new(State::new()), Arc::new(wal), 2)
    }

    #[tokio::test]
    async fn create_file_then_get_file_returns_empty_chunks() {
        let server = server().await;
        server
            .create_file_inner("a.txt".to_string())
            .await
            .unwrap();

        let meta = server.get_file_inner("a.txt").await.unwrap();
        assert_eq!(meta.filename, "a.txt");
        assert!(meta.chunks.is_empty());
    }

    #[tokio::test]
    async fn create_file_twice_is_already_exists() {
        let server = server().await;
        server
            .create_file_inner("a.txt".to_string())
            .await
            .unwrap();

        let err = server
            .create_file_inner("a.txt".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_file_missing_is_not_found() {
        let server = server().await;
        let err = server.get_file_inner("missing.txt").await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[tokio::test]
    async fn allocate_chunk_is_idempotent() {
        let server = server().await;
        {
            let mut guard = server.state.write().await;
            guard.nodes.insert(
                "dn1".to_string(),
                NodeRecord {
                    address: "127.0.0.1:6001".to_string(),
                    last_seen: SystemTime::now(),
                },
            );
        }
        server
            .create_file_inner("t.txt".to_string())
            .await
            .unwrap();

        let first = server
            .allocate_chunk_inner("t.txt".to_string(), 0, "chunk123".to_string())
            .await
            .unwrap();
        let second = server
            .allocate_chunk_inner("t.txt".to_string(), 0, "chunk123".to_string())
            .await
            .unwrap();

        assert_eq!(first.chunk_id, second.chunk_id);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.nodes, vec!["127.0.0.1:6001".to_string()]);
    }

    #[tokio::test]
    async fn get_file_orders_chunks_by_index() {
        let server = server().await;
        server
            .create_file_inner("a.txt".to_string())
            .await
            .unwrap();

        for (index, chunk_id) in [(2u32, "c2"), (0, "c0"), (1, "c1")] {
            server
                .allocate_chunk_inner("a.txt".to_string(), index, chunk_id.to_string())
                .await
                .unwrap();
        }

        let meta = server.get_file_inner("a.txt").await.unwrap();
        let ids: Vec<_> = meta.chunks.iter().map(|c| c.chunk_id.clone()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2"]);
    }
}
