//! YAML configuration for the three roles (metadata service, data node,
//! client). Each role reads its own document shape via `--config <path>`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Error};
use serde::Deserialize;

fn default_replication_factor() -> u32 {
    2
}

fn default_ttl_seconds() -> u64 {
    10
}

fn default_cleanup_interval_seconds() -> u64 {
    5
}

fn default_scan_interval_seconds() -> u64 {
    10
}

fn default_snapshot_interval_seconds() -> u64 {
    0
}

fn default_heartbeat_interval_seconds() -> u64 {
    3
}

fn default_max_msg_mb() -> u64 {
    16
}

fn default_rpc_timeout_seconds() -> u64 {
    5
}

fn default_upload_workers() -> usize {
    4
}

fn default_chunk_size_bytes() -> u64 {
    4 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    pub path: String,
    #[serde(default = "default_snapshot_interval_seconds")]
    pub interval_seconds: u64,
}

/// Configuration for the metadata service binary.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub address: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    pub wal: WalConfig,
    pub snapshot: SnapshotConfig,
    #[serde(default = "default_scan_interval_seconds")]
    pub scan_interval_seconds: u64,
    #[serde(default)]
    pub grpc: GrpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataNodeHeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for DataNodeHeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_heartbeat_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrpcConfig {
    #[serde(default = "default_max_msg_mb")]
    pub max_msg_mb: u64,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            max_msg_mb: default_max_msg_mb(),
        }
    }
}

/// Configuration for the data node binary.
#[derive(Debug, Clone, Deserialize)]
pub struct DataNodeConfig {
    pub node_id: String,
    pub address: String,
    pub data_dir: String,
    pub metadata_address: String,
    #[serde(default)]
    pub heartbeat: DataNodeHeartbeatConfig,
    #[serde(default)]
    pub grpc: GrpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            rpc_seconds: default_rpc_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_upload_workers")]
    pub upload_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            upload_workers: default_upload_workers(),
        }
    }
}

/// Configuration for the client binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub metadata_address: String,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: u64,
    #[serde(default)]
    pub grpc: GrpcConfig,
}

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, Error> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file '{}'", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("unable to parse config file '{}'", path.display()))
}

pub fn load_metadata_config(path: &Path) -> Result<MetadataConfig, Error> {
    load(path)
}

pub fn load_data_node_config(path: &Path) -> Result<DataNodeConfig, Error> {
    load(path)
}

pub fn load_client_config(path: &Path) -> Result<ClientConfig, Error> {
    load(path)
}
