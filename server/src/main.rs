use clap::Parser;
use log::info;
use server::network::Server;
use server::storage::{BlobStore, FileBlobStore, MemoryBlobStore};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Directory holding the persisted leaderboard
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Keep the leaderboard in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "10")]
    client_timeout_secs: u64,
}

async fn serve<B: BlobStore + 'static>(
    args: &Args,
    storage: B,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        args.max_clients,
        Duration::from_secs(args.client_timeout_secs),
        storage,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    if args.ephemeral {
        info!("Running with an in-memory leaderboard");
        serve(&args, MemoryBlobStore::new()).await
    } else {
        info!("Persisting leaderboard to {}", args.data_dir.display());
        serve(&args, FileBlobStore::new(&args.data_dir)).await
    }
}
