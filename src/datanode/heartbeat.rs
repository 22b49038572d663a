//! Client-side heartbeat loop: a data node periodically tells the
//! metadata service it is still alive (`SPEC_FULL.md` §4.8). A failure
//! here is always transient from the data node's point of view — it
//! logs and retries on the next tick, never exits the process.

use std::time::Duration;

use tonic::transport::Channel;
use tonic::Request;

use crate::proto::metadata_service_client::MetadataServiceClient;
use crate::proto::HeartbeatRequest;

async fn send_heartbeat(metadata_address: &str, node_id: &str) -> Result<bool, anyhow::Error> {
    let endpoint = format!("http://{}", metadata_address);
    let mut client = MetadataServiceClient::connect(endpoint).await?;
    let response = client
        .heartbeat(Request::new(HeartbeatRequest {
            node_id: node_id.to_string(),
        }))
        .await?;
    Ok(response.into_inner().ok)
}

/// Registers `node_id` with the metadata service once at startup.
pub async fn register(
    metadata_address: &str,
    node_id: &str,
    address: &str,
) -> Result<(), anyhow::Error> {
    let endpoint = format!("http://{}", metadata_address);
    let mut client = MetadataServiceClient::<Channel>::connect(endpoint).await?;
    client
        .register_node(Request::new(crate::proto::RegisterNodeRequest {
            node_id: node_id.to_string(),
            address: address.to_string(),
        }))
        .await?;
    Ok(())
}

/// Runs the heartbeat loop forever, every `interval_seconds`.
pub async fn run(metadata_address: String, node_id: String, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match send_heartbeat(&metadata_address, &node_id).await {
            Ok(true) => log::debug!("heartbeat to '{}' acknowledged", metadata_address),
            Ok(false) => log::warn!(
                "heartbeat to '{}' rejected - node '{}' unknown to metadata service",
                metadata_address,
                node_id
            ),
            Err(err) => log::warn!("heartbeat to '{}' failed: {}", metadata_address, err),
        }
    }
}
