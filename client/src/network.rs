use crate::leaderboard::LeaderboardClient;
use crate::round::RoundResult;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{timestamp_ms, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, sleep_until};

/// How often a connected client pings the server to stay registered.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    address: String,
    display_name: Option<String>,
    client_id: Option<u32>,
    connected: bool,
    disconnect_reason: Option<String>,

    leaderboard: LeaderboardClient,
    updates_received: u64,

    ping_ms: u64,
    fake_ping_ms: u64,
    last_ping_time: Instant,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        address: &str,
        display_name: Option<String>,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            address: address.to_string(),
            display_name,
            client_id: None,
            connected: false,
            disconnect_reason: None,
            leaderboard: LeaderboardClient::new(),
            updates_received: 0,
            ping_ms: 0,
            fake_ping_ms,
            last_ping_time: Instant::now(),
        })
    }

    pub async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server {} as {}...", self.server_addr, self.address);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            address: self.address.clone(),
            display_name: self.display_name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_all(&self, packets: Vec<Packet>) -> Result<(), Box<dyn std::error::Error>> {
        for packet in packets {
            debug!("Sending {}", packet.kind());
            self.send_packet(&packet).await?;
        }
        Ok(())
    }

    /// Submits a score now, or queues it until the server accepts the connection.
    pub async fn submit_score(&mut self, score: f64) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(packet) = self.leaderboard.submit_score(score) {
            self.send_packet(&packet).await?;
        }
        Ok(())
    }

    /// Submits the score of a finished round if it counts.
    pub async fn submit_round(
        &mut self,
        result: &RoundResult,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !result.should_submit() {
            debug!("Round not submitted: {}", result.summary());
            return Ok(());
        }
        self.submit_score(f64::from(result.score())).await
    }

    pub async fn request_leaderboard(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.connected {
            self.send_packet(&Packet::GetLeaderboard).await?;
        }
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.disconnect_reason = None;

                let packets = self.leaderboard.on_ready(true);
                self.send_all(packets).await?;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.disconnect_reason = Some(reason);
                self.leaderboard.reset();
            }

            Packet::LeaderboardUpdate { entries } => {
                debug!("Leaderboard update with {} entries", entries.len());
                self.leaderboard.on_leaderboard_update(entries);
                self.updates_received += 1;
            }

            Packet::Pong { .. } => {
                self.ping_ms = self.last_ping_time.elapsed().as_millis() as u64;
            }

            Packet::Ping { ts } => {
                debug!("Server ready (ts = {})", ts);
            }

            other => {
                warn!("Unexpected {} packet", other.kind());
            }
        }

        Ok(())
    }

    async fn send_heartbeat(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }
        self.last_ping_time = Instant::now();
        self.send_packet(&Packet::Ping { ts: timestamp_ms() }).await
    }

    /// Processes server traffic until `done` holds or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub async fn run_until<F>(
        &mut self,
        timeout: Duration,
        mut done: F,
    ) -> Result<bool, Box<dyn std::error::Error>>
    where
        F: FnMut(&Client) -> bool,
    {
        if done(&*self) {
            return Ok(true);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => {
                            if addr != self.server_addr {
                                debug!("Ignoring datagram from {}", addr);
                                continue;
                            }

                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await?,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }

                            if done(&*self) {
                                return Ok(true);
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat.tick() => {
                    self.send_heartbeat().await?;
                },

                _ = sleep_until(deadline) => {
                    return Ok(false);
                },
            }
        }
    }

    /// Processes server traffic for a fixed duration.
    pub async fn run_for(&mut self, duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(duration, |_| false).await?;
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
        }
        self.connected = false;
        self.client_id = None;
        self.leaderboard.reset();
        Ok(())
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    pub fn leaderboard(&self) -> &LeaderboardClient {
        &self.leaderboard
    }

    /// Number of `LeaderboardUpdate` broadcasts received so far.
    pub fn updates_received(&self) -> u64 {
        self.updates_received
    }

    /// Round trip of the last heartbeat, in milliseconds.
    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }
}
