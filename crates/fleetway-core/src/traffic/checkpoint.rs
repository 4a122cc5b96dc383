//! Path and reservation data model.
//!
//! A reservation is an ordered sequence of [`Checkpoint`]s plus a footprint
//! radius. Checkpoints are the unit of negotiation with the arbitration
//! authority: they bound the combinatorics it must reason about, and the
//! radius converts a path into a swept volume so overlap tests reduce to
//! geometric containment.

use serde::{Deserialize, Serialize};

/// Index of a checkpoint within a reservation path.
pub type CheckpointId = usize;

/// Handle for one registered traffic participant.
pub type ParticipantId = u64;

/// Identifier of one submitted reservation.
///
/// Monotonically increasing per participant; every wholesale path
/// replacement is submitted under a fresh id so that stale arbitration
/// decisions are identifiable and void.
pub type ReservationId = u64;

/// A 2D position on a named map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate in meters.
    pub x: f64,
    /// Y coordinate in meters.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One named waypoint on a reservation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position of this checkpoint.
    pub position: Point,

    /// Name of the map this checkpoint belongs to.
    pub map_name: String,

    /// Whether a robot may legally stop and hold at this checkpoint.
    ///
    /// Neither the arbitration authority nor the robot driver may be
    /// instructed to wait at a checkpoint where this is false.
    pub can_hold: bool,
}

impl Checkpoint {
    /// Creates a new checkpoint.
    #[must_use]
    pub fn new(position: Point, map_name: impl Into<String>, can_hold: bool) -> Self {
        Self {
            position,
            map_name: map_name.into(),
            can_hold,
        }
    }
}

/// A participant's claimed path plus safety radius.
///
/// Immutable once submitted: a reservation is replaced wholesale, never
/// patched in place. Submitting a new path invalidates all progress
/// recorded against the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Ordered sequence of checkpoints to traverse.
    pub path: Vec<Checkpoint>,

    /// Footprint buffer in meters used by the arbitration authority to
    /// compute spatial overlap with other participants' reservations.
    pub radius: f64,
}
