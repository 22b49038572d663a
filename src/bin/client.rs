//! The client binary: `upload <filename>` and `download <filename>
//! [output_path]`, speaking both RPC surfaces directly
//! (`SPEC_FULL.md` §4.9).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chunkstore::client::Client;
use chunkstore::config;

#[derive(Parser)]
#[command(name = "chunkstore-client")]
struct Opt {
    /// Path to the client's YAML config file.
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a local file into chunks and write it into the store.
    Upload {
        /// Path to the local file to upload; also used as the store filename.
        path: PathBuf,
    },
    /// Fetch a file from the store and write it to a local path.
    Download {
        /// Filename to fetch from the store.
        filename: String,
        /// Where to write the downloaded bytes; defaults to `filename`.
        output_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let cfg = config::load_client_config(&opt.config)
        .with_context(|| format!("failed to load config '{}'", opt.config.display()))?;

    let max_msg_bytes = (cfg.grpc.max_msg_mb * 1024 * 1024) as usize;
    let client = Client::new(
        cfg.metadata_address,
        Duration::from_secs(cfg.timeouts.rpc_seconds),
        cfg.concurrency.upload_workers,
        cfg.chunk_size_bytes as usize,
        max_msg_bytes,
    );

    match opt.command {
        Command::Upload { path } => {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("'{}' has no usable file name", path.display()))?
                .to_string();
            client.upload(&path, &filename).await?;
        }
        Command::Download {
            filename,
            output_path,
        } => {
            let output_path = output_path.unwrap_or_else(|| PathBuf::from(&filename));
            client.download(&filename, &output_path).await?;
        }
    }

    Ok(())
}
