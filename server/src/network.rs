//! Server network layer handling UDP communications and leaderboard routing

use crate::client_manager::ClientManager;
use crate::service::{Dispatch, LeaderboardService};
use crate::storage::BlobStore;
use crate::store::IdentityResolver;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    normalize_address, Packet, MAX_ADDRESS_LEN, MAX_DATAGRAM_SIZE, MAX_DISPLAY_NAME_LEN,
    PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

/// Why a `Connect` was refused
fn connect_rejection(client_version: u32, address: &str) -> Option<&'static str> {
    if client_version != PROTOCOL_VERSION {
        Some("Protocol version mismatch")
    } else if address.is_empty() {
        Some("Missing player address")
    } else if address.len() > MAX_ADDRESS_LEN {
        Some("Player address too long")
    } else {
        None
    }
}

/// Trims a requested display name and cuts it to `MAX_DISPLAY_NAME_LEN` characters.
fn clean_display_name(display_name: Option<String>) -> Option<String> {
    display_name
        .map(|name| name.trim().chars().take(MAX_DISPLAY_NAME_LEN).collect::<String>())
        .filter(|name| !name.is_empty())
}

/// Main server coordinating networking and the leaderboard session
pub struct Server<B: BlobStore + 'static> {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    service: LeaderboardService<B>,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl<B: BlobStore + 'static> Server<B> {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
        storage: B,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            service: LeaderboardService::new(storage),
            tasks: Vec::new(),
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Address the socket is actually bound to (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender that stops `run` when given `ServerMessage::Shutdown`.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut outbound_rx = std::mem::replace(&mut self.outbound_rx, mpsc::unbounded_channel().1);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        }));
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.outbound_tx.send(OutboundMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Queues the service's dispatches. `origin` is the socket that triggered them.
    fn route(&self, dispatches: Vec<Dispatch>, origin: Option<SocketAddr>) {
        for dispatch in dispatches {
            match dispatch {
                Dispatch::ToSender(packet) => match origin {
                    Some(addr) => self.send_packet(packet, addr),
                    None => debug!("Dropping {} reply without a sender", packet.kind()),
                },
                Dispatch::ToAll(packet) => self.broadcast_packet(packet),
            }
        }
    }

    async fn handle_connect(
        &mut self,
        addr: SocketAddr,
        client_version: u32,
        address: String,
        display_name: Option<String>,
    ) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        let address = normalize_address(&address);
        if let Some(reason) = connect_rejection(client_version, &address) {
            debug!("Rejecting connect from {}: {}", addr, reason);
            self.send_packet(
                Packet::Disconnected {
                    reason: reason.to_string(),
                },
                addr,
            );
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;

            // Replace an existing registration from the same socket
            if let Some(existing_id) = clients.find_client_by_addr(addr) {
                info!("Removing existing client {} from {}", existing_id, addr);
                clients.remove_client(&existing_id);
            }

            clients.add_client(addr, address, clean_display_name(display_name))
        };

        let response = match client_id {
            Some(client_id) => Packet::Connected { client_id },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        {
            let mut clients = self.clients.write().await;
            clients.touch(addr);
        }

        match packet {
            Packet::Connect {
                client_version,
                address,
                display_name,
            } => {
                self.handle_connect(addr, client_version, address, display_name)
                    .await;
            }

            Packet::Disconnect => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.remove_client(&client_id);
                }
            }

            packet @ (Packet::Ping { .. } | Packet::SubmitScore { .. } | Packet::GetLeaderboard) => {
                debug!("Received {} from {}", packet.kind(), addr);
                let (sender, names) = {
                    let clients = self.clients.read().await;
                    let sender = clients.sender_context(addr);
                    let names: HashMap<String, String> = sender
                        .as_ref()
                        .and_then(|s| Some((s.address.clone(), clients.display_name(&s.address)?)))
                        .into_iter()
                        .collect();
                    (sender, names)
                };

                // Roster lock is released before the service may hit storage
                let dispatches = self.service.handle(packet, sender.as_ref(), &names).await;
                self.route(dispatches, Some(addr));
            }

            other => {
                warn!("Unexpected {} packet from {}", other.kind(), addr);
            }
        }
    }

    /// Main server loop. Returns after `ServerMessage::Shutdown`.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let dispatches = self.service.on_ready().await;
        self.route(dispatches, None);

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id }) => {
                    info!("Client {} timed out", client_id);
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
