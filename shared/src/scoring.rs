//! Distance-based scoring for a finished slide.
//!
//! The penguin scores more the closer it stops to the home target. Only the
//! ground plane counts: the vertical axis is ignored.

use serde::{Deserialize, Serialize};

pub const MAX_SCORE: u32 = 1000;

/// Distance at which the score reaches zero (start line to home).
pub const DEFAULT_MAX_DISTANCE: f32 = 60.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Distance on the x/z plane.
pub fn distance_2d(a: &Position, b: &Position) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Maps the final resting position to a score in `0..=MAX_SCORE`.
///
/// The score falls linearly from `MAX_SCORE` on the target to 0 at
/// `max_distance` and stays at 0 beyond it.
pub fn calculate_score(final_position: &Position, target: &Position, max_distance: f32) -> u32 {
    let distance = distance_2d(final_position, target);

    if !(max_distance > 0.0 && max_distance.is_finite()) {
        return if distance == 0.0 { MAX_SCORE } else { 0 };
    }

    let normalized = (distance / max_distance).min(1.0);
    let score = MAX_SCORE as f32 * (1.0 - normalized);

    score.round().max(0.0) as u32
}
