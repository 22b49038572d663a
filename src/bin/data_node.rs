//! The data node binary: serves `DataNodeService` over gRPC, registers
//! with the metadata service at startup, then heartbeats periodically
//! (`SPEC_FULL.md` §4.8).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tonic::transport::Server;

use chunkstore::config;
use chunkstore::datanode::{heartbeat, DataNodeServer};
use chunkstore::proto::data_node_service_server::DataNodeServiceServer;

#[derive(Parser)]
#[command(name = "chunkstore-node")]
struct Opt {
    /// Path to the data node's YAML config file.
    #[arg(long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let cfg = config::load_data_node_config(&opt.config)
        .with_context(|| format!("failed to load config '{}'", opt.config.display()))?;

    tokio::fs::create_dir_all(&cfg.data_dir)
        .await
        .with_context(|| format!("failed to create data directory '{}'", cfg.data_dir))?;

    match heartbeat::register(&cfg.metadata_address, &cfg.node_id, &cfg.address).await {
        Ok(()) => log::info!(
            "registered node '{}' ({}) with metadata service at '{}'",
            cfg.node_id,
            cfg.address,
            cfg.metadata_address
        ),
        Err(err) => log::warn!(
            "initial registration with metadata service '{}' failed: {} (heartbeat loop will keep retrying)",
            cfg.metadata_address,
            err
        ),
    }

    tokio::spawn(heartbeat::run(
        cfg.metadata_address.clone(),
        cfg.node_id.clone(),
        cfg.heartbeat.interval_seconds,
    ));

    let max_msg_bytes = (cfg.grpc.max_msg_mb * 1024 * 1024) as usize;
    let service = DataNodeServer::new(PathBuf::from(cfg.data_dir.clone()));
    let server = DataNodeServiceServer::new(service)
        .max_decoding_message_size(max_msg_bytes)
        .max_encoding_message_size(max_msg_bytes);

    let address = cfg
        .address
        .parse()
        .with_context(|| format!("invalid listen address '{}'", cfg.address))?;

    log::info!(
        "data node '{}' listening on {}, storing chunks under '{}'",
        cfg.node_id,
        address,
        cfg.data_dir
    );

    Server::builder()
        .add_service(server)
        .serve_with_shutdown(address, async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutdown signal received");
        })
        .await
        .context("data node terminated with an error")?;

    Ok(())
}
