//! Typed errors surfaced by the metadata service.
//!
//! Handlers return [`MetadataError`] internally; the RPC layer converts it
//! to a [`tonic::Status`] at the service boundary (see the `From` impl
//! below). Background tasks never propagate this type — they log and move
//! on (see `cleanup` and `replication`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("durability error: failed to append WAL entry")]
    Durability(#[from] std::io::Error),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<MetadataError> for tonic::Status {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(msg) => tonic::Status::not_found(msg),
            MetadataError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            MetadataError::Durability(err) => {
                log::error!("WAL append failed: {}", err);
                tonic::Status::internal(format!("durability error: {}", err))
            }
            MetadataError::Internal(msg) => {
                log::error!("internal invariant violation: {}", msg);
                tonic::Status::internal(msg)
            }
        }
    }
}
