//! Chunk id derivation (`SPEC_FULL.md` §6): `sha256(filename + "-" +
//! index)`, hex-encoded. The metadata service treats the result as
//! opaque; this makes `AllocateChunk` retries trivially idempotent.

use sha2::{Digest, Sha256};

pub fn chunk_id(filename: &str, index: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(b"-");
    hasher.update(index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
