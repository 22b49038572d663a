//! The data node role: a standalone binary that stores chunk bytes on
//! local disk, serves them back over gRPC, and keeps the metadata
//! service informed of its liveness (`SPEC_FULL.md` §4.8).

pub mod heartbeat;
pub mod server;
pub mod storage;

pub use server::DataNodeServer;
