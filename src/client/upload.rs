//! `upload <filename>`: splits a file into fixed-size chunks, registers
//! it with the metadata service, then pushes each chunk to its replica
//! set (`SPEC_FULL.md` §4.9).

use std::path::Path;

use anyhow::{bail, Context, Error};
use futures::stream::{self, StreamExt};
use tonic::Request;

use crate::proto::{AllocateChunkRequest, Chunk, CreateFileRequest};

use super::{chunking, connect_data_node, hashing, Client};

impl Client {
    pub async fn upload(&self, path: &Path, filename: &str) -> Result<(), Error> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;

        let mut metadata = self.metadata_client().await?;

        match metadata
            .create_file(Request::new(CreateFileRequest {
                filename: filename.to_string(),
            }))
            .await
        {
            Ok(_) => {}
            Err(status) if status.code() == tonic::Code::AlreadyExists => {
                log::warn!("file '{}' already exists, continuing upload", filename);
            }
            Err(status) => return Err(status.into()),
        }

        let chunks = chunking::split(&data, self.chunk_size_bytes);
        log::info!("uploading '{}' as {} chunk(s)", filename, chunks.len());

        let results: Vec<Result<(), Error>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| {
                let filename = filename.to_string();
                let chunk = chunk.to_vec();
                async move { self.upload_chunk(&filename, index as u32, chunk).await }
            })
            .buffer_unordered(self.upload_workers.max(1))
            .collect()
            .await;

        for result in results {
            result?;
        }

        log::info!("upload of '{}' complete", filename);
        Ok(())
    }

    async fn upload_chunk(&self, filename: &str, index: u32, data: Vec<u8>) -> Result<(), Error> {
        let chunk_id = hashing::chunk_id(filename, index);

        let mut metadata = self.metadata_client().await?;
        let allocation = metadata
            .allocate_chunk(Request::new(AllocateChunkRequest {
                filename: filename.to_string(),
                chunk_index: index,
                chunk_id: chunk_id.clone(),
            }))
            .await
            .with_context(|| format!("AllocateChunk({}, {}) failed", filename, index))?
            .into_inner();

        if allocation.nodes.is_empty() {
            bail!(
                "chunk {} of '{}' was allocated with no replica nodes",
                index,
                filename
            );
        }

        let stores = stream::iter(allocation.nodes.into_iter())
            .map(|address| {
                let chunk_id = chunk_id.clone();
                let data = data.clone();
                let timeout = self.rpc_timeout;
                let max_msg_bytes = self.max_msg_bytes;
                async move { store_on(&address, &chunk_id, data, timeout, max_msg_bytes).await }
            })
            .buffer_unordered(4)
            .collect::<Vec<_>>()
            .await;

        let successes = stores.iter().filter(|r| r.is_ok()).count();
        if successes == 0 {
            for err in stores.into_iter().filter_map(Result::err) {
                log::warn!("store of chunk {} of '{}' failed: {}", index, filename, err);
            }
            bail!(
                "failed to store chunk {} of '{}' on any replica",
                index,
                filename
            );
        }

        Ok(())
    }
}

async fn store_on(
    address: &str,
    chunk_id: &str,
    data: Vec<u8>,
    timeout: std::time::Duration,
    max_msg_bytes: usize,
) -> Result<(), Error> {
    let mut client = connect_data_node(address, timeout, max_msg_bytes).await?;
    let ack = client
        .store_chunk(Request::new(Chunk {
            chunk_id: chunk_id.to_string(),
            data,
        }))
        .await
        .with_context(|| format!("StoreChunk({}) failed on '{}'", chunk_id, address))?
        .into_inner();

    if !ack.ok {
        bail!("StoreChunk({}) on '{}' reported failure", chunk_id, address);
    }
    Ok(())
}
