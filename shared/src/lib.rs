use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod scoring;

pub use scoring::{calculate_score, distance_2d, Position, DEFAULT_MAX_DISTANCE, MAX_SCORE};

pub const PROTOCOL_VERSION: u32 = 1;

/// Durable key holding the JSON array of all-time entries.
pub const LEADERBOARD_ALL_TIME_KEY: &str = "leaderboard:allTime";

/// Entries carried by a `LeaderboardUpdate` broadcast.
pub const BROADCAST_LIMIT: usize = 50;

/// Entries shown on the in-game board.
pub const DISPLAY_LIMIT: usize = 10;

/// Characters of an address used when no display name is known.
pub const FALLBACK_NAME_LEN: usize = 8;

pub const MAX_ADDRESS_LEN: usize = 64;
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        address: String,
        display_name: Option<String>,
    },
    Disconnect,
    Ping {
        ts: i64,
    },
    SubmitScore {
        score: i64,
    },
    GetLeaderboard,

    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    Pong {
        ts: i64,
    },
    LeaderboardUpdate {
        entries: Vec<LeaderboardEntry>,
    },
}

impl Packet {
    /// Short name of the packet type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Connect { .. } => "connect",
            Packet::Disconnect => "disconnect",
            Packet::Ping { .. } => "ping",
            Packet::SubmitScore { .. } => "submitScore",
            Packet::GetLeaderboard => "getLeaderboard",
            Packet::Connected { .. } => "connected",
            Packet::Disconnected { .. } => "disconnected",
            Packet::Pong { .. } => "pong",
            Packet::LeaderboardUpdate { .. } => "leaderboardUpdate",
        }
    }
}

/// Best-score record for one player.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub address: String,
    pub display_name: String,
    pub best_score: u64,
    pub play_count: u64,
}

impl LeaderboardEntry {
    pub fn new(address: &str, display_name: &str, best_score: u64) -> Self {
        Self {
            address: normalize_address(address),
            display_name: display_name.to_string(),
            best_score,
            play_count: 1,
        }
    }
}

/// Lowercases a player address so it can be used as a merge key.
pub fn normalize_address(address: &str) -> String {
    address.to_lowercase()
}

/// Name shown for players whose display name can't be resolved.
pub fn fallback_display_name(address: &str) -> String {
    address.chars().take(FALLBACK_NAME_LEN).collect()
}

/// Milliseconds since the unix epoch.
pub fn timestamp_ms() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(i64::MAX as u128) as i64
}
