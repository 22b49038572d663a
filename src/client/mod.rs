//! The client role: a `upload`/`download` binary speaking both RPC
//! surfaces directly (`SPEC_FULL.md` §4.9).

pub mod chunking;
pub mod download;
pub mod hashing;
pub mod upload;

use std::time::Duration;

use anyhow::{Context, Error};
use tonic::transport::Channel;

use crate::proto::data_node_service_client::DataNodeServiceClient;
use crate::proto::metadata_service_client::MetadataServiceClient;

/// Shared client state: one metadata connection plus the knobs that
/// shape how upload/download fan out across data nodes.
pub struct Client {
    pub metadata_address: String,
    pub rpc_timeout: Duration,
    pub upload_workers: usize,
    pub chunk_size_bytes: usize,
    pub max_msg_bytes: usize,
}

impl Client {
    pub fn new(
        metadata_address: String,
        rpc_timeout: Duration,
        upload_workers: usize,
        chunk_size_bytes: usize,
        max_msg_bytes: usize,
    ) -> Self {
        Self {
            metadata_address,
            rpc_timeout,
            upload_workers,
            chunk_size_bytes,
            max_msg_bytes,
        }
    }

    async fn metadata_client(&self) -> Result<MetadataServiceClient<Channel>, Error> {
        connect_metadata(&self.metadata_address, self.rpc_timeout, self.max_msg_bytes).await
    }
}

pub(crate) async fn connect_metadata(
    address: &str,
    timeout: Duration,
    max_msg_bytes: usize,
) -> Result<MetadataServiceClient<Channel>, Error> {
    let endpoint = format!("http://{}", address);
    let channel = Channel::from_shared(endpoint)
        .with_context(|| format!("invalid metadata address '{}'", address))?
        .connect_timeout(timeout)
        .timeout(timeout)
        .connect()
        .await
        .with_context(|| format!("failed to connect to metadata service '{}'", address))?;
    Ok(MetadataServiceClient::new(channel)
        .max_decoding_message_size(max_msg_bytes)
        .max_encoding_message_size(max_msg_bytes))
}

pub(crate) async fn connect_data_node(
    address: &str,
    timeout: Duration,
    max_msg_bytes: usize,
) -> Result<DataNodeServiceClient<Channel>, Error> {
    let endpoint = format!("http://{}", address);
    let channel = Channel::from_shared(endpoint)
        .with_context(|| format!("invalid data node address '{}'", address))?
        .connect_timeout(timeout)
        .timeout(timeout)
        .connect()
        .await
        .with_context(|| format!("failed to connect to data node '{}'", address))?;
    Ok(DataNodeServiceClient::new(channel)
        .max_decoding_message_size(max_msg_bytes)
        .max_encoding_message_size(max_msg_bytes))
}
