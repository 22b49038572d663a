//! Fixed-size chunk splitting (`SPEC_FULL.md` §4.9). Unlike the
//! teacher's content-defined chunker, this spec calls for plain
//! fixed-size boundaries: simpler, and sufficient since chunk ids are
//! derived from filename and index rather than content.

/// Splits `data` into chunks of at most `chunk_size` bytes. An empty
/// input yields zero chunks; the final chunk may be shorter than
/// `chunk_size`.
pub fn split(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    data.chunks(chunk_size.max(1)).collect()
}
