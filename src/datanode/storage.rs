//! On-disk chunk storage: one file per chunk, named exactly `chunk_id`,
//! under a configured data directory (`SPEC_FULL.md` §4.8, §6).

use std::path::Path;

/// Writes `data` to `data_dir/chunk_id`. A single `tokio::fs::write` is
/// sufficient — a short or missing file simply fails the next `GetChunk`
/// and gets healed by re-replication, so no rename-into-place dance is
/// needed here.
pub async fn write_chunk(data_dir: &Path, chunk_id: &str, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(data_dir.join(chunk_id), data).await
}

/// Reads the bytes stored for `chunk_id`, or `Err` with
/// `ErrorKind::NotFound` if no such chunk is stored here.
pub async fn read_chunk(data_dir: &Path, chunk_id: &str) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(data_dir.join(chunk_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write_chunk(dir.path(), "chunk-a", b"hello").await.unwrap();
        let data = read_chunk(dir.path(), "chunk-a").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn read_missing_chunk_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_chunk(dir.path(), "missing").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
