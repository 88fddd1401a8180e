//! End-of-round result
//!
//! A round ends either with the penguin at rest (scored by its distance to
//! home) or lost, in which case it scores nothing and is never submitted.

use shared::{calculate_score, distance_2d, Position, DEFAULT_MAX_DISTANCE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundResult {
    score: u32,
    distance: f32,
    has_lost: bool,
}

impl RoundResult {
    pub fn finish(final_position: &Position, home: &Position, has_lost: bool) -> Self {
        let distance = distance_2d(final_position, home);
        let score = if has_lost {
            0
        } else {
            calculate_score(final_position, home, DEFAULT_MAX_DISTANCE)
        };

        Self {
            score,
            distance,
            has_lost,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Horizontal distance between the penguin and home, in meters.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn has_lost(&self) -> bool {
        self.has_lost
    }

    pub fn should_submit(&self) -> bool {
        !self.has_lost && self.score > 0
    }

    /// One-line result shown on the end screen, e.g. "12,5 m from home".
    pub fn summary(&self) -> String {
        if self.has_lost {
            "You didn't reach home".to_string()
        } else {
            format!("{:.1} m from home", self.distance).replace('.', ",")
        }
    }
}
