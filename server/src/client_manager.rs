//! Connected-player roster for the leaderboard server
//!
//! This module handles the server-side management of connected clients, including:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Mapping socket addresses to the player address announced on connect
//! - Resolving live display names for leaderboard entries
//! - Client capacity management
//!
//! The roster is the server's only source of sender identity: a packet from
//! a socket that never completed the handshake has no player address.

use crate::service::SenderContext;
use crate::store::IdentityResolver;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Normalized player address used as the leaderboard key
    pub address: String,
    /// Name the player announced, if any
    pub display_name: Option<String>,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    /// Creates a new client and marks it as recently active.
    pub fn new(id: u32, addr: SocketAddr, address: String, display_name: Option<String>) -> Self {
        Self {
            id,
            addr,
            address,
            display_name,
            last_seen: Instant::now(),
        }
    }

    /// Records activity from this client.
    pub fn refresh_last_seen(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have been received within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the capacity limit, hands out client ids and drops clients that
/// go quiet for longer than the configured timeout.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is considered gone
    timeout: Duration,
}

impl ClientManager {
    /// Creates an empty roster. Client IDs start from 1.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to register a new client connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    /// `address` must already be normalized.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        address: String,
        display_name: Option<String>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, address, addr);
        let client = Client::new(client_id, addr, address, display_name);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client, returning false if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by its network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the client at `addr` as active. Returns its ID if registered.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .values_mut()
            .find(|client| client.addr == addr)
            .map(|client| {
                client.refresh_last_seen();
                client.id
            })
    }

    /// Identity of the client at `addr`, used to authorize leaderboard packets.
    pub fn sender_context(&self, addr: SocketAddr) -> Option<SenderContext> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| SenderContext {
                client_id: client.id,
                address: client.address.clone(),
            })
    }

    /// Checks for and removes timed-out clients, returning their IDs.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses for broadcasting.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl IdentityResolver for ClientManager {
    fn display_name(&self, address: &str) -> Option<String> {
        self.clients
            .values()
            .filter(|client| client.address == address)
            .find_map(|client| {
                client
                    .display_name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
            })
    }
}
