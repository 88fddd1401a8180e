//! # Leaderboard Client Library
//!
//! Client-side half of the sliding-penguin race leaderboard. A game client
//! turns the penguin's final position into a score, sends it to the
//! server and keeps the latest leaderboard the server broadcasts.
//!
//! ## Architecture Overview
//!
//! ### Queued Submissions
//! A round can finish before the server has accepted the connection. The
//! score is then held in a single pending slot (the newest score wins) and
//! sent right after the board is requested, as soon as the server replies
//! `Connected`.
//!
//! ### Server-Pushed Snapshots
//! The client never computes rankings on its own. Every accepted
//! submission from any player makes the server broadcast a fresh snapshot,
//! which replaces the cached one wholesale.
//!
//! ## Module Organization
//!
//! ### Leaderboard Module (`leaderboard`)
//! The session state: snapshot cache, pending score and the ready latch.
//! Its operations return packets instead of sending them.
//!
//! ### Round Module (`round`)
//! Score, distance and lost flag of a finished round, and whether it
//! should be submitted.
//!
//! ### Board Module (`board`)
//! Text layout of the top-10 board.
//!
//! ### Network Module (`network`)
//! UDP socket, connect handshake, heartbeats and packet handling.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use client::round::RoundResult;
//! use shared::Position;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "0xabc", Some("Pingu".into()), 0).await?;
//!
//!     let home = Position::new(0.0, 0.0, 0.0);
//!     let result = RoundResult::finish(&Position::new(3.0, 0.0, 4.0), &home, false);
//!
//!     // Queued until the server accepts the connection
//!     client.submit_round(&result).await?;
//!     client.connect().await?;
//!     client.run_for(Duration::from_secs(1)).await?;
//!
//!     println!("{}", client::board::format_board(client.leaderboard().entries()));
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod leaderboard;
pub mod network;
pub mod round;
