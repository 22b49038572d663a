//! A distributed chunked file store: a metadata service that owns the
//! namespace and replica placement, data nodes that persist chunk
//! bytes, and a client that fans writes and reads out across both.

pub mod cleanup;
pub mod client;
pub mod config;
pub mod datanode;
pub mod error;
pub mod metadata_service;
pub mod placement;
pub mod proto;
pub mod recovery;
pub mod replica_io;
pub mod replication;
pub mod snapshot;
pub mod state;
pub mod wal;
