use clap::Parser;
use client::board::{format_board, format_header};
use client::network::Client;
use client::round::RoundResult;
use log::info;
use shared::Position;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player address; a random guest address is used if omitted
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// Name shown on the leaderboard
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Score to submit directly
    #[arg(long, conflicts_with = "distance")]
    score: Option<f64>,

    /// Distance from home the penguin stopped at, in meters
    #[arg(short = 'd', long)]
    distance: Option<f32>,

    /// Treat the round as lost (penguin never reached the target area)
    #[arg(long, requires = "distance")]
    lost: bool,

    /// How long to wait for the server, in milliseconds
    #[arg(short = 'w', long, default_value = "2000")]
    wait_ms: u64,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn guest_address() -> String {
    let bytes: [u8; 20] = rand::random();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = args.address.clone().unwrap_or_else(guest_address);

    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = Client::new(&args.server, &address, args.name.clone(), args.fake_ping).await?;

    let mut expected_updates = 1;
    if let Some(score) = args.score {
        client.submit_score(score).await?;
        if client.leaderboard().pending_score().is_some() {
            expected_updates += 1;
        }
    } else if let Some(distance) = args.distance {
        let home = Position::new(0.0, 0.0, 0.0);
        let result = RoundResult::finish(&Position::new(0.0, 0.0, distance), &home, args.lost);
        println!("{} ({} points)", result.summary(), result.score());

        client.submit_round(&result).await?;
        if result.should_submit() {
            expected_updates += 1;
        }
    }

    client.connect().await?;
    let finished = client
        .run_until(Duration::from_millis(args.wait_ms), |c| {
            c.disconnect_reason().is_some() || c.updates_received() >= expected_updates
        })
        .await?;

    if let Some(reason) = client.disconnect_reason() {
        eprintln!("Server refused the connection: {}", reason);
    } else if !finished {
        eprintln!("Timed out waiting for the server");
    } else if client.ping_ms() > 0 {
        info!("Round trip: {}ms", client.ping_ms());
    }

    println!("{}", format_header());
    println!("{}", format_board(client.leaderboard().entries()));

    client.disconnect().await?;
    Ok(())
}
