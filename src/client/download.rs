//! `download <filename> [output_path]`: fetches file metadata, pulls
//! each chunk from the first reachable replica, and assembles the
//! result in index order (`SPEC_FULL.md` §4.9).

use std::path::Path;

use anyhow::{bail, Context, Error};
use futures::stream::{self, StreamExt};
use tonic::Request;

use crate::proto::{ChunkRequest, GetFileRequest};

use super::{connect_data_node, Client};

impl Client {
    pub async fn download(&self, filename: &str, output_path: &Path) -> Result<(), Error> {
        let mut metadata = self.metadata_client().await?;
        let file = metadata
            .get_file(Request::new(GetFileRequest {
                filename: filename.to_string(),
            }))
            .await
            .with_context(|| format!("GetFile('{}') failed", filename))?
            .into_inner();

        log::info!(
            "downloading '{}' ({} chunk(s))",
            filename,
            file.chunks.len()
        );

        let results: Vec<Result<(usize, Vec<u8>), Error>> = stream::iter(file.chunks.into_iter().enumerate())
            .map(|(index, chunk)| {
                let timeout = self.rpc_timeout;
                let max_msg_bytes = self.max_msg_bytes;
                async move {
                    let data =
                        fetch_from_any(&chunk.nodes, &chunk.chunk_id, timeout, max_msg_bytes)
                            .await?;
                    Ok::<_, Error>((index, data))
                }
            })
            .buffer_unordered(self.upload_workers.max(1))
            .collect()
            .await;

        let mut ordered: Vec<Option<Vec<u8>>> = vec![None; results.len()];
        for result in results {
            let (index, data) = result?;
            ordered[index] = Some(data);
        }

        let mut assembled = Vec::new();
        for (index, chunk) in ordered.into_iter().enumerate() {
            assembled.extend(chunk.with_context(|| format!("missing chunk {} after fetch", index))?);
        }

        tokio::fs::write(output_path, assembled)
            .await
            .with_context(|| format!("failed to write '{}'", output_path.display()))?;

        log::info!(
            "download of '{}' complete, wrote '{}'",
            filename,
            output_path.display()
        );
        Ok(())
    }
}

async fn fetch_from_any(
    nodes: &[String],
    chunk_id: &str,
    timeout: std::time::Duration,
    max_msg_bytes: usize,
) -> Result<Vec<u8>, Error> {
    for address in nodes {
        match fetch_one(address, chunk_id, timeout, max_msg_bytes).await {
            Ok(data) => return Ok(data),
            Err(err) => log::warn!(
                "fetch of chunk '{}' from '{}' failed: {}",
                chunk_id,
                address,
                err
            ),
        }
    }
    bail!("chunk '{}' unreachable on all {} replica(s)", chunk_id, nodes.len());
}

async fn fetch_one(
    address: &str,
    chunk_id: &str,
    timeout: std::time::Duration,
    max_msg_bytes: usize,
) -> Result<Vec<u8>, Error> {
    let mut client = connect_data_node(address, timeout, max_msg_bytes).await?;
    let chunk = client
        .get_chunk(Request::new(ChunkRequest {
            chunk_id: chunk_id.to_string(),
        }))
        .await
        .with_context(|| format!("GetChunk({}) failed on '{}'", chunk_id, address))?
        .into_inner();
    Ok(chunk.data)
}
