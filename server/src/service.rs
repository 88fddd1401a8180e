//! Leaderboard protocol handling
//!
//! `LeaderboardService` is the server-side session for the leaderboard. It
//! owns the store and its durable backend, and turns each inbound packet
//! into a list of outbound `Dispatch`es. The network layer decides which
//! sockets those reach.
//!
//! | Inbound          | Needs sender | Outbound                          |
//! |------------------|--------------|-----------------------------------|
//! | `Ping`           | yes          | `Pong` to the sender              |
//! | `SubmitScore`    | yes          | `LeaderboardUpdate` to everyone   |
//! | `GetLeaderboard` | no           | `LeaderboardUpdate` to everyone   |

use crate::storage::BlobStore;
use crate::store::{IdentityResolver, LeaderboardStore};
use log::{debug, info, warn};
use shared::{timestamp_ms, Packet, BROADCAST_LIMIT};

/// Identity of the client that sent a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderContext {
    pub client_id: u32,
    /// Normalized player address announced on connect
    pub address: String,
}

/// Where an outbound packet should go
#[derive(Debug, Clone)]
pub enum Dispatch {
    ToSender(Packet),
    ToAll(Packet),
}

pub struct LeaderboardService<B: BlobStore> {
    store: LeaderboardStore,
    storage: B,
    loaded: bool,
}

impl<B: BlobStore> LeaderboardService<B> {
    pub fn new(storage: B) -> Self {
        Self {
            store: LeaderboardStore::new(),
            storage,
            loaded: false,
        }
    }

    pub fn store(&self) -> &LeaderboardStore {
        &self.store
    }

    /// True once the store has been populated from durable storage.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Channel-ready event: announces the server and loads the store once.
    pub async fn on_ready(&mut self) -> Vec<Dispatch> {
        let mut dispatches = vec![Dispatch::ToAll(Packet::Ping { ts: timestamp_ms() })];

        if !self.loaded && self.ensure_loaded().await {
            dispatches.push(self.leaderboard_update());
        }

        dispatches
    }

    /// Loads durable state if that hasn't succeeded yet.
    ///
    /// Scores accepted while the load kept failing are merged on top of the
    /// durable entries. Returns whether the store reflects durable state.
    async fn ensure_loaded(&mut self) -> bool {
        if self.loaded {
            return true;
        }

        let mut durable = LeaderboardStore::new();
        if !durable.load(&self.storage).await {
            return false;
        }

        durable.absorb(std::mem::take(&mut self.store));
        self.store = durable;
        self.loaded = true;
        true
    }

    /// Runs one inbound packet through the dispatch table.
    ///
    /// `sender` is `None` when the packet came from a socket that never
    /// completed the connect handshake. Packets whose preconditions fail are
    /// dropped and produce no dispatches.
    pub async fn handle<R: IdentityResolver + ?Sized>(
        &mut self,
        packet: Packet,
        sender: Option<&SenderContext>,
        directory: &R,
    ) -> Vec<Dispatch> {
        match packet {
            Packet::Ping { ts } => {
                let Some(sender) = sender else {
                    return Vec::new();
                };
                debug!("Ping from client {} (ts = {})", sender.client_id, ts);
                vec![Dispatch::ToSender(Packet::Pong { ts: timestamp_ms() })]
            }

            Packet::SubmitScore { score } => {
                let Some(sender) = sender else {
                    debug!("Dropping score {} from unidentified sender", score);
                    return Vec::new();
                };

                let loaded = self.ensure_loaded().await;
                let Some(entry) = self.store.submit(&sender.address, score as f64, directory) else {
                    return Vec::new();
                };

                info!(
                    "Score {} from {} ({}): best {}, plays {}",
                    score, entry.display_name, entry.address, entry.best_score, entry.play_count
                );

                // A store that never loaded would overwrite the durable board
                if loaded {
                    self.store.save(&self.storage).await;
                } else {
                    warn!("Leaderboard not loaded, keeping score for {} in memory", entry.address);
                }
                vec![self.leaderboard_update()]
            }

            Packet::GetLeaderboard => {
                self.ensure_loaded().await;
                if let Some(sender) = sender {
                    debug!("Leaderboard requested by client {}", sender.client_id);
                }
                vec![self.leaderboard_update()]
            }

            other => {
                warn!("Leaderboard service ignoring {} packet", other.kind());
                Vec::new()
            }
        }
    }

    fn leaderboard_update(&self) -> Dispatch {
        Dispatch::ToAll(Packet::LeaderboardUpdate {
            entries: self.store.snapshot(BROADCAST_LIMIT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBlobStore, StorageError};
    use shared::{LeaderboardEntry, LEADERBOARD_ALL_TIME_KEY};
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ReadOnlyStorage(MemoryBlobStore);

    impl BlobStore for ReadOnlyStorage {
        async fn get(&self, key: &str) -> Result<String, StorageError> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    /// Storage whose first read fails, then behaves like memory storage
    #[derive(Clone)]
    struct FlakyStorage {
        inner: MemoryBlobStore,
        failures_left: Arc<AtomicUsize>,
    }

    impl FlakyStorage {
        fn new(inner: MemoryBlobStore, failures: usize) -> Self {
            Self {
                inner,
                failures_left: Arc::new(AtomicUsize::new(failures)),
            }
        }
    }

    impl BlobStore for FlakyStorage {
        async fn get(&self, key: &str) -> Result<String, StorageError> {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "storage unavailable").into());
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }
    }

    fn sender(address: &str) -> SenderContext {
        SenderContext {
            client_id: 1,
            address: address.to_string(),
        }
    }

    fn no_players() -> HashMap<String, String> {
        HashMap::new()
    }

    fn broadcast_entries(dispatches: &[Dispatch]) -> Vec<LeaderboardEntry> {
        match dispatches {
            [Dispatch::ToAll(Packet::LeaderboardUpdate { entries })] => entries.clone(),
            other => panic!("Expected a single leaderboard broadcast, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ready_without_stored_data() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let dispatches = service.on_ready().await;

        assert!(service.is_loaded());
        assert_eq!(dispatches.len(), 2);
        assert!(matches!(dispatches[0], Dispatch::ToAll(Packet::Ping { .. })));
        match &dispatches[1] {
            Dispatch::ToAll(Packet::LeaderboardUpdate { entries }) => assert!(entries.is_empty()),
            other => panic!("Unexpected dispatch {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ready_loads_only_once() {
        let storage = MemoryBlobStore::with_value(
            LEADERBOARD_ALL_TIME_KEY,
            r#"[{"address":"0xabc","displayName":"Pingu","bestScore":600,"playCount":2}]"#,
        );
        let mut service = LeaderboardService::new(storage.clone());
        service.on_ready().await;
        assert_eq!(service.store().get("0xabc").unwrap().best_score, 600);

        // Durable data changing underneath must not be reloaded
        storage.insert(LEADERBOARD_ALL_TIME_KEY, "[]");
        let dispatches = service.on_ready().await;

        assert_eq!(dispatches.len(), 1);
        assert!(matches!(dispatches[0], Dispatch::ToAll(Packet::Ping { .. })));
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn test_get_leaderboard_on_fresh_server_is_empty() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        service.on_ready().await;

        let dispatches = service
            .handle(Packet::GetLeaderboard, None, &no_players())
            .await;
        assert!(broadcast_entries(&dispatches).is_empty());
    }

    #[tokio::test]
    async fn test_ping_replies_to_sender_only() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let before = timestamp_ms();

        let dispatches = service
            .handle(Packet::Ping { ts: 1 }, Some(&sender("0xabc")), &no_players())
            .await;

        match dispatches.as_slice() {
            [Dispatch::ToSender(Packet::Pong { ts })] => assert!(*ts >= before),
            other => panic!("Unexpected dispatches {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_without_sender_is_dropped() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let dispatches = service
            .handle(Packet::Ping { ts: 1 }, None, &no_players())
            .await;
        assert!(dispatches.is_empty());
    }

    #[tokio::test]
    async fn test_submit_score_persists_and_broadcasts() {
        let storage = MemoryBlobStore::new();
        let mut service = LeaderboardService::new(storage.clone());
        let mut players = HashMap::new();
        players.insert("0xabc".to_string(), "Pingu".to_string());

        let dispatches = service
            .handle(Packet::SubmitScore { score: 750 }, Some(&sender("0xabc")), &players)
            .await;

        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].address, "0xabc");
        assert_eq!(entries[0].display_name, "Pingu");
        assert_eq!(entries[0].best_score, 750);
        assert_eq!(entries[0].play_count, 1);

        let stored = storage.value(LEADERBOARD_ALL_TIME_KEY).unwrap();
        let stored: Vec<LeaderboardEntry> = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored, entries);
    }

    #[tokio::test]
    async fn test_submit_invalid_score_is_silent() {
        let storage = MemoryBlobStore::new();
        let mut service = LeaderboardService::new(storage.clone());

        for score in [0, -1, i64::MIN] {
            let dispatches = service
                .handle(Packet::SubmitScore { score }, Some(&sender("0xabc")), &no_players())
                .await;
            assert!(dispatches.is_empty());
        }

        assert!(service.store().is_empty());
        assert!(storage.value(LEADERBOARD_ALL_TIME_KEY).is_none());
    }

    #[tokio::test]
    async fn test_submit_without_sender_is_dropped() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let dispatches = service
            .handle(Packet::SubmitScore { score: 500 }, None, &no_players())
            .await;

        assert!(dispatches.is_empty());
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_still_broadcasts() {
        let mut service = LeaderboardService::new(ReadOnlyStorage(MemoryBlobStore::new()));

        let dispatches = service
            .handle(Packet::SubmitScore { score: 420 }, Some(&sender("0xabc")), &no_players())
            .await;

        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries[0].best_score, 420);
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn test_two_players_broadcast_in_score_order() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        service
            .handle(Packet::SubmitScore { score: 500 }, Some(&sender("0xaaa")), &no_players())
            .await;
        let dispatches = service
            .handle(Packet::SubmitScore { score: 900 }, Some(&sender("0xbbb")), &no_players())
            .await;

        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].best_score, 900);
        assert_eq!(entries[0].address, "0xbbb");
        assert_eq!(entries[1].best_score, 500);
    }

    #[tokio::test]
    async fn test_lower_score_counts_as_play() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        service
            .handle(Packet::SubmitScore { score: 300 }, Some(&sender("0xabc")), &no_players())
            .await;
        let dispatches = service
            .handle(Packet::SubmitScore { score: 200 }, Some(&sender("0xabc")), &no_players())
            .await;

        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].best_score, 300);
        assert_eq!(entries[0].play_count, 2);
    }

    #[tokio::test]
    async fn test_broadcast_is_capped() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let mut last = Vec::new();
        for i in 0..(BROADCAST_LIMIT + 5) {
            last = service
                .handle(
                    Packet::SubmitScore { score: (i + 1) as i64 },
                    Some(&sender(&format!("0x{:03}", i))),
                    &no_players(),
                )
                .await;
        }

        let entries = broadcast_entries(&last);
        assert_eq!(entries.len(), BROADCAST_LIMIT);
        assert_eq!(entries[0].best_score, (BROADCAST_LIMIT + 5) as u64);
        assert_eq!(service.store().len(), BROADCAST_LIMIT + 5);
    }

    #[tokio::test]
    async fn test_server_bound_only_packets_are_ignored() {
        let mut service = LeaderboardService::new(MemoryBlobStore::new());
        let dispatches = service
            .handle(
                Packet::LeaderboardUpdate { entries: vec![] },
                Some(&sender("0xabc")),
                &no_players(),
            )
            .await;
        assert!(dispatches.is_empty());
    }

    fn stored_entries(storage: &MemoryBlobStore) -> Vec<LeaderboardEntry> {
        let raw = storage.value(LEADERBOARD_ALL_TIME_KEY).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_failed_ready_load_is_retried_on_submit() {
        let memory = MemoryBlobStore::with_value(
            LEADERBOARD_ALL_TIME_KEY,
            r#"[{"address":"0xold","displayName":"Old","bestScore":990,"playCount":7}]"#,
        );
        let mut service = LeaderboardService::new(FlakyStorage::new(memory.clone(), 1));

        let dispatches = service.on_ready().await;
        assert!(!service.is_loaded());
        assert_eq!(dispatches.len(), 1);

        let dispatches = service
            .handle(Packet::SubmitScore { score: 10 }, Some(&sender("0xnew")), &no_players())
            .await;

        assert!(service.is_loaded());
        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, "0xold");
        assert_eq!(entries[0].play_count, 7);

        let stored = stored_entries(&memory);
        assert_eq!(stored, entries);
    }

    #[tokio::test]
    async fn test_unloaded_store_is_never_saved() {
        let memory = MemoryBlobStore::with_value(
            LEADERBOARD_ALL_TIME_KEY,
            r#"[{"address":"0xold","displayName":"Old","bestScore":990,"playCount":7}]"#,
        );
        let mut service = LeaderboardService::new(FlakyStorage::new(memory.clone(), 2));
        service.on_ready().await;

        let dispatches = service
            .handle(Packet::SubmitScore { score: 10 }, Some(&sender("0xnew")), &no_players())
            .await;

        // Still broadcast from memory, durable board untouched
        assert!(!service.is_loaded());
        assert_eq!(broadcast_entries(&dispatches).len(), 1);
        assert_eq!(stored_entries(&memory).len(), 1);
        assert_eq!(stored_entries(&memory)[0].address, "0xold");

        // Storage recovers: the unsaved play is folded into the durable board
        let dispatches = service
            .handle(Packet::SubmitScore { score: 5 }, Some(&sender("0xnew")), &no_players())
            .await;

        assert!(service.is_loaded());
        let entries = broadcast_entries(&dispatches);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].address, "0xnew");
        assert_eq!(entries[1].best_score, 10);
        assert_eq!(entries[1].play_count, 2);
        assert_eq!(stored_entries(&memory), entries);
    }
}
