//! Outbound calls from the metadata service to data nodes, used only by
//! the re-replication repair path (`SPEC_FULL.md` §4.7). Every call gets
//! a short deadline since an unreachable node must never stall a scan.

use std::time::Duration;

use anyhow::{Context, Error};
use tonic::transport::Channel;

use crate::proto::data_node_service_client::DataNodeServiceClient;
use crate::proto::{Chunk, ChunkRequest};

const REPLICA_RPC_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(address: &str) -> Result<DataNodeServiceClient<Channel>, Error> {
    let endpoint = format!("http://{}", address);
    let channel = Channel::from_shared(endpoint)
        .with_context(|| format!("invalid data node address '{}'", address))?
        .connect_timeout(REPLICA_RPC_TIMEOUT)
        .timeout(REPLICA_RPC_TIMEOUT)
        .connect()
        .await
        .with_context(|| format!("failed to connect to data node '{}'", address))?;
    Ok(DataNodeServiceClient::new(channel))
}

/// Fetches chunk bytes from `address` via `GetChunk`.
pub async fn fetch_chunk(address: &str, chunk_id: &str) -> Result<Vec<u8>, Error> {
    let mut client = connect(address).await?;
    let response = client
        .get_chunk(ChunkRequest {
            chunk_id: chunk_id.to_string(),
        })
        .await
        .with_context(|| format!("GetChunk({}) failed on '{}'", chunk_id, address))?;
    Ok(response.into_inner().data)
}

/// Stores chunk bytes on `address` via `StoreChunk`.
pub async fn store_chunk(address: &str, chunk_id: &str, data: Vec<u8>) -> Result<(), Error> {
    let mut client = connect(address).await?;
    let ack = client
        .store_chunk(Chunk {
            chunk_id: chunk_id.to_string(),
            data,
        })
        .await
        .with_context(|| format!("StoreChunk({}) failed on '{}'", chunk_id, address))?;

    if !ack.into_inner().ok {
        anyhow::bail!("StoreChunk({}) on '{}' reported failure", chunk_id, address);
    }
    Ok(())
}
