//! Authoritative best-score store and its durable snapshot
//!
//! The store keeps one `LeaderboardEntry` per lowercase player address.
//! Submissions merge by taking the maximum score and counting every accepted
//! play. The whole store is mirrored to a single blob under
//! `LEADERBOARD_ALL_TIME_KEY` as a JSON array.
//!
//! Storage failures never escape this module: they are logged and the
//! in-memory state keeps serving whatever it already had.

use crate::storage::{BlobStore, StorageError};
use log::{debug, error, info};
use serde_json::Value;
use shared::{fallback_display_name, normalize_address, LeaderboardEntry, LEADERBOARD_ALL_TIME_KEY};
use std::collections::{BTreeMap, HashMap};

/// Looks up the live display name of a connected player
pub trait IdentityResolver {
    /// Returns the name of a connected player with this (normalized) address.
    fn display_name(&self, address: &str) -> Option<String>;
}

impl IdentityResolver for HashMap<String, String> {
    fn display_name(&self, address: &str) -> Option<String> {
        self.get(address).cloned()
    }
}

/// In-memory leaderboard keyed by normalized address
///
/// Entries are kept in a `BTreeMap`, so snapshots that tie on score come out
/// in ascending address order.
#[derive(Debug, Default, Clone)]
pub struct LeaderboardStore {
    entries: BTreeMap<String, LeaderboardEntry>,
}

impl LeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds entries accepted elsewhere into this store.
    ///
    /// Best scores take the maximum, play counts add up and the incoming
    /// display name wins.
    pub fn absorb(&mut self, other: LeaderboardStore) {
        for (address, incoming) in other.entries {
            self.entries
                .entry(address)
                .and_modify(|entry| {
                    entry.best_score = entry.best_score.max(incoming.best_score);
                    entry.play_count = entry.play_count.saturating_add(incoming.play_count);
                    entry.display_name = incoming.display_name.clone();
                })
                .or_insert(incoming);
        }
    }

    /// Replaces the store with the persisted snapshot.
    ///
    /// A missing key counts as an empty leaderboard. Any other failure,
    /// including a blob that doesn't parse, is logged and leaves the store
    /// untouched. Returns true when the store now reflects durable state.
    pub async fn load<B: BlobStore>(&mut self, storage: &B) -> bool {
        match storage.get(LEADERBOARD_ALL_TIME_KEY).await {
            Ok(raw) => match parse_entries(&raw) {
                Ok(entries) => {
                    self.replace_all(entries);
                    info!("Loaded {} leaderboard entries", self.entries.len());
                    true
                }
                Err(e) => {
                    error!("Failed to parse stored leaderboard: {}", e);
                    false
                }
            },
            Err(StorageError::NotFound(_)) => {
                info!("No stored leaderboard yet, starting empty");
                self.entries.clear();
                true
            }
            Err(e) => {
                error!("Failed to load leaderboard: {}", e);
                false
            }
        }
    }

    /// Writes the full store to durable storage. Failures are logged, not returned.
    pub async fn save<B: BlobStore>(&self, storage: &B) -> bool {
        let json = match self.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize leaderboard: {}", e);
                return false;
            }
        };

        match storage.set(LEADERBOARD_ALL_TIME_KEY, json).await {
            Ok(()) => {
                debug!("Persisted {} leaderboard entries", self.entries.len());
                true
            }
            Err(e) => {
                error!("Failed to save leaderboard: {}", e);
                false
            }
        }
    }

    /// Serializes every entry, best score first.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(&self.snapshot(usize::MAX))?)
    }

    /// Merges a submitted score for `address`.
    ///
    /// Scores that are not finite or not positive, and empty addresses, are
    /// dropped without touching the store. Otherwise the best score becomes
    /// the maximum of old and new, the play count goes up by one and the
    /// display name is refreshed from `resolver`. Returns the merged entry.
    pub fn submit<R: IdentityResolver + ?Sized>(
        &mut self,
        address: &str,
        raw_score: f64,
        resolver: &R,
    ) -> Option<LeaderboardEntry> {
        if !raw_score.is_finite() || raw_score <= 0.0 {
            debug!("Ignoring invalid score {} from {}", raw_score, address);
            return None;
        }

        let address = normalize_address(address);
        if address.is_empty() {
            debug!("Ignoring score {} without a player address", raw_score);
            return None;
        }

        let score = raw_score.round() as u64;
        let display_name = resolver
            .display_name(&address)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| fallback_display_name(&address));

        let entry = self
            .entries
            .entry(address.clone())
            .and_modify(|entry| {
                entry.best_score = entry.best_score.max(score);
                entry.play_count = entry.play_count.saturating_add(1);
                entry.display_name = display_name.clone();
            })
            .or_insert_with(|| LeaderboardEntry {
                address,
                display_name,
                best_score: score,
                play_count: 1,
            });

        Some(entry.clone())
    }

    /// Entries sorted by best score, highest first, truncated to `limit`.
    pub fn snapshot(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self.entries.values().cloned().collect();
        // Stable sort keeps ties in map order
        entries.sort_by(|a, b| b.best_score.cmp(&a.best_score));
        entries.truncate(limit);
        entries
    }

    pub fn get(&self, address: &str) -> Option<&LeaderboardEntry> {
        self.entries.get(&normalize_address(address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn replace_all(&mut self, entries: Vec<LeaderboardEntry>) {
        self.entries.clear();
        for entry in entries {
            let address = normalize_address(&entry.address);
            if address.is_empty() {
                continue;
            }
            let display_name = if entry.display_name.is_empty() {
                fallback_display_name(&address)
            } else {
                entry.display_name
            };
            self.entries.insert(
                address.clone(),
                LeaderboardEntry {
                    address,
                    display_name,
                    best_score: entry.best_score,
                    play_count: entry.play_count,
                },
            );
        }
    }
}

/// Parses a stored blob leniently: bad elements are skipped, bad numbers read as zero.
fn parse_entries(raw: &str) -> Result<Vec<LeaderboardEntry>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = serde_json::from_str(raw)?;
    Ok(values.iter().filter_map(entry_from_value).collect())
}

fn entry_from_value(value: &Value) -> Option<LeaderboardEntry> {
    let address = value.get("address")?.as_str()?;

    Some(LeaderboardEntry {
        address: address.to_string(),
        display_name: value
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        best_score: count_or_zero(value.get("bestScore")),
        play_count: count_or_zero(value.get("playCount")),
    })
}

fn count_or_zero(value: Option<&Value>) -> u64 {
    if let Some(n) = value.and_then(Value::as_u64) {
        return n;
    }

    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.round() as u64,
        _ => 0,
    }
}
