//! `DataNodeService` implementation: the RPC surface a data node exposes
//! to clients and to the metadata service's repair path.

use std::path::PathBuf;

use tonic::{Request, Response, Status};

use crate::proto::data_node_service_server::DataNodeService;
use crate::proto::{Ack, Chunk, ChunkRequest};

use super::storage;

pub struct DataNodeServer {
    pub data_dir: PathBuf,
}

impl DataNodeServer {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[tonic::async_trait]
impl DataNodeService for DataNodeServer {
    async fn store_chunk(&self, request: Request<Chunk>) -> Result<Response<Ack>, Status> {
        let Chunk { chunk_id, data } = request.into_inner();
        log::info!("storing chunk '{}' ({} bytes)", chunk_id, data.len());

        match storage::write_chunk(&self.data_dir, &chunk_id, &data).await {
            Ok(()) => Ok(Response::new(Ack { ok: true })),
            Err(err) => {
                log::error!("failed to store chunk '{}': {}", chunk_id, err);
                Err(Status::internal(format!("failed to store chunk: {}", err)))
            }
        }
    }

    async fn get_chunk(&self, request: Request<ChunkRequest>) -> Result<Response<Chunk>, Status> {
        let ChunkRequest { chunk_id } = request.into_inner();
        log::debug!("reading chunk '{}'", chunk_id);

        match storage::read_chunk(&self.data_dir, &chunk_id).await {
            Ok(data) => Ok(Response::new(Chunk { chunk_id, data })),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Status::not_found(format!("chunk not found: {}", chunk_id)))
            }
            Err(err) => {
                log::error!("failed to read chunk '{}': {}", chunk_id, err);
                Err(Status::internal(format!("failed to read chunk: {}", err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let server = DataNodeServer::new(dir.path().to_path_buf());

        let ack = server
            .store_chunk(Request::new(Chunk {
                chunk_id: "c0".to_string(),
                data: b"payload".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(ack.ok);

        let chunk = server
            .get_chunk(Request::new(ChunkRequest {
                chunk_id: "c0".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(chunk.data, b"payload");
    }

    #[tokio::test]
    async fn get_missing_chunk_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let server = DataNodeServer::new(dir.path().to_path_buf());

        let status = server
            .get_chunk(Request::new(ChunkRequest {
                chunk_id: "missing".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
