//! # Leaderboard Server Library
//!
//! This library provides the authoritative server for the sliding-penguin
//! race leaderboard. Game clients report the score of each finished round,
//! the server merges it into a best-score table, persists the table and
//! broadcasts the updated top of the board to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Scores
//! Only the server decides what a player's best score is. Each player has a
//! single entry keyed by their lowercase address. A submission raises the
//! best score only when it is strictly higher, and every accepted
//! submission counts as one play.
//!
//! ### Durable State
//! The full table is written to a blob store after every accepted
//! submission and read back once when the server starts. A failed write
//! is logged and the in-memory table keeps serving clients.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connect handshake with protocol version and player address checks
//! - Mapping sockets to player identities
//! - Disconnection handling and timeout cleanup
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One loop owns the leaderboard session and processes every packet to
//! completion, including the storage write. Load, merge and save therefore
//! never interleave inside one server.
//!
//! ### UDP-Based Communication
//! Clients and server exchange bincode-encoded `shared::Packet` datagrams.
//! There are no acknowledgements or retries.
//!
//! ## Module Organization
//!
//! - `client_manager`: connected clients, identity and timeouts
//! - `network`: UDP tasks and packet routing
//! - `service`: the leaderboard dispatch table
//! - `storage`: durable blob backends
//! - `store`: the best-score table, merge rules and JSON snapshot
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::storage::FileBlobStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = FileBlobStore::new("data");
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         32,
//!         Duration::from_secs(10),
//!         storage,
//!     ).await?;
//!
//!     // Loads the stored leaderboard, then serves clients until shutdown
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server runs internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes outgoing packet queue and broadcasts
//! - **Timeout Checker**: Monitors client health and removes inactive connections
//! - **Main Loop**: Runs each packet through the leaderboard service

pub mod client_manager;
pub mod network;
pub mod service;
pub mod storage;
pub mod store;
