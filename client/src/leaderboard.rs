//! Client-side leaderboard session
//!
//! Holds the latest snapshot pushed by the server and a single pending score
//! for rounds that finish before the connection is ready. Operations return
//! the packets to send so the network layer decides when they go out.

use log::debug;
use shared::{LeaderboardEntry, Packet};

#[derive(Debug, Default, Clone)]
pub struct LeaderboardClient {
    entries: Vec<LeaderboardEntry>,
    ready: bool,
    pending: Option<f64>,
}

impl LeaderboardClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles a channel readiness change.
    ///
    /// The first transition to ready requests the board and flushes the
    /// pending score, in that order. Every later call returns nothing.
    pub fn on_ready(&mut self, is_ready: bool) -> Vec<Packet> {
        if !is_ready || self.ready {
            return Vec::new();
        }
        self.ready = true;

        let mut packets = vec![Packet::GetLeaderboard];
        if let Some(score) = self.pending.take() {
            debug!("Submitting pending score {}", score);
            packets.push(submit_packet(score));
        }
        packets
    }

    /// Submits a finished round's score, or queues it until the channel is ready.
    ///
    /// Only the most recent queued score survives.
    pub fn submit_score(&mut self, score: f64) -> Option<Packet> {
        if !score.is_finite() || score <= 0.0 {
            debug!("Not submitting invalid score {}", score);
            return None;
        }

        if !self.ready {
            debug!("Channel not ready, queueing score {}", score);
            self.pending = Some(score);
            return None;
        }

        Some(submit_packet(score))
    }

    /// Replaces the cached snapshot with the one the server broadcast.
    pub fn on_leaderboard_update(&mut self, entries: Vec<LeaderboardEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn pending_score(&self) -> Option<f64> {
        self.pending
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Forgets the ready latch after the connection is lost. The cache and
    /// any pending score are kept for the next session.
    pub fn reset(&mut self) {
        self.ready = false;
    }
}

fn submit_packet(score: f64) -> Packet {
    Packet::SubmitScore {
        score: score.round() as i64,
    }
}
