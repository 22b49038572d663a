//! Write-ahead log: an append-only file of newline-delimited JSON
//! records. See `SPEC_FULL.md` §4.2 for the on-disk contract.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, SeekFrom};
use tokio::sync::Mutex;

/// One WAL record. The `tag`/`content` representation serializes each
/// variant as `{"type": "...", "data": ...}`, matching the wire format
/// exactly (including `CreateFile`, whose `data` is a bare JSON string
/// rather than an object).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WalEntry {
    #[serde(rename = "REGISTER_NODE")]
    RegisterNode { node_id: String, address: String },

    #[serde(rename = "CREATE_FILE")]
    CreateFile(String),

    #[serde(rename = "ALLOCATE_CHUNK")]
    AllocateChunk {
        filename: String,
        chunk_index: u32,
        chunk_id: String,
        nodes: Vec<String>,
    },

    #[serde(rename = "ADD_REPLICA")]
    AddReplica {
        filename: String,
        chunk_index: u32,
        node: String,
    },
}

pub struct Wal {
    path: PathBuf,
    file: Mutex<File>,
    /// Current length of the WAL file in bytes, tracked so snapshots can
    /// record the position they cover without re-`stat`-ing the file
    /// under the append lock (see [`Wal::current_offset`]).
    offset: AtomicU64,
}

impl Wal {
    /// Opens the WAL for appending, creating it if it does not exist yet.
    /// Does not read any existing contents — callers should call
    /// [`Wal::read_entries`] for replay before constructing this, or
    /// against the same path independently, since recovery happens
    /// before the service starts serving.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let offset = file.metadata().await?.len();
        Ok(Self {
            path,
            file: Mutex::new(file),
            offset: AtomicU64::new(offset),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The WAL's current length in bytes. A snapshot taken while holding
    /// the state lock can record this value as the point it covers, so
    /// recovery can later skip already-snapshotted entries on replay
    /// (see `SPEC_FULL.md` §4.3 and [`Wal::read_entries_from`]).
    pub fn current_offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Serializes `entry`, appends `bytes + '\n'` and flushes. Callers
    /// must hold the state write lock across this call so WAL order is
    /// exactly commit order (see `SPEC_FULL.md` §4.2).
    pub async fn append(&self, entry: &WalEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        self.offset.fetch_add(line.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    /// Reads every entry in file order, skipping lines that fail to
    /// parse (unknown record types or malformed JSON) instead of
    /// failing the whole replay. Best-effort-forward by design, to
    /// tolerate a partial trailing write left by a crash.
    pub async fn read_entries(path: impl AsRef<Path>) -> std::io::Result<Vec<WalEntry>> {
        Self::read_entries_from(path, 0).await
    }

    /// Like [`Wal::read_entries`], but starts reading at `start_offset`
    /// bytes into the file instead of from the beginning — used to skip
    /// the prefix already folded into a loaded snapshot. `start_offset`
    /// is expected to land exactly on a line boundary, which holds as
    /// long as it was produced by [`Wal::current_offset`] at a moment no
    /// append was in flight (snapshots are taken under the state read
    /// lock, which excludes concurrent appends). An offset past the end
    /// of the file simply yields no entries.
    pub async fn read_entries_from(
        path: impl AsRef<Path>,
        start_offset: u64,
    ) -> std::io::Result<Vec<WalEntry>> {
        let path = path.as_ref();
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        if start_offset > 0 {
            file.seek(SeekFrom::Start(start_offset)).await?;
        }

        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    log::warn!("skipping unparseable WAL record: {}", err);
                }
            }
        }

        Ok(entries)
    }
}
