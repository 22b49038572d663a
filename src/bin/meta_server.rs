//! The metadata service binary: recovers state from snapshot+WAL, then
//! serves `MetadataService` over gRPC while running the cleanup and
//! re-replication background loops (`SPEC_FULL.md` §4).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tonic::transport::Server;

use chunkstore::config;
use chunkstore::metadata_service::MetadataServer;
use chunkstore::proto::metadata_service_server::MetadataServiceServer;
use chunkstore::state::State;
use chunkstore::{cleanup, recovery, replication, snapshot};

#[derive(Parser)]
#[command(name = "chunkstore-meta")]
struct Opt {
    /// Path to the metadata service's YAML config file.
    #[arg(long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let cfg = config::load_metadata_config(&opt.config)
        .with_context(|| format!("failed to load config '{}'", opt.config.display()))?;

    let (inner, wal) = recovery::recover(&cfg.wal, &cfg.snapshot)
        .await
        .context("startup recovery failed")?;
    log::info!(
        "recovered {} file(s), {} node(s) from snapshot+WAL",
        inner.files.len(),
        inner.nodes.len()
    );

    let state = Arc::new(State::from_inner(inner));
    let wal = Arc::new(wal);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(cleanup::run(
        state.clone(),
        Duration::from_secs(cfg.heartbeat.ttl_seconds),
        cfg.heartbeat.cleanup_interval_seconds,
        shutdown_rx.clone(),
    ));

    tokio::spawn(replication::run(
        state.clone(),
        wal.clone(),
        cfg.replication_factor,
        cfg.scan_interval_seconds,
        shutdown_rx.clone(),
    ));

    tokio::spawn(snapshot::run(
        state.clone(),
        wal.clone(),
        PathBuf::from(cfg.snapshot.path.clone()),
        cfg.snapshot.interval_seconds,
        shutdown_rx.clone(),
    ));

    let max_msg_bytes = (cfg.grpc.max_msg_mb * 1024 * 1024) as usize;
    let service = MetadataServer::new(state, wal, cfg.replication_factor);
    let server = MetadataServiceServer::new(service)
        .max_decoding_message_size(max_msg_bytes)
        .max_encoding_message_size(max_msg_bytes);

    let address = cfg
        .address
        .parse()
        .with_context(|| format!("invalid listen address '{}'", cfg.address))?;

    log::info!("metadata service listening on {}", address);

    Server::builder()
        .add_service(server)
        .serve_with_shutdown(address, async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("metadata service terminated with an error")?;

    Ok(())
}
