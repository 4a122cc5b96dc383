//! Error types for the traffic protocol.

use thiserror::Error;

use super::checkpoint::CheckpointId;

/// Errors from reservation and motion-gate operations.
///
/// The violation variants are alarm conditions, not recoverable failures:
/// they mean a robot disobeyed an issued instruction and the safety
/// protocol itself may be compromised. Supervisory layers receiving one
/// may need to halt the offending robot and its neighbors to prevent a
/// collision or deadlock. The remaining variants are synchronous caller
/// misuse and leave state unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrafficError {
    /// A reservation path must contain at least one checkpoint.
    #[error("reservation path is empty")]
    EmptyPath,

    /// A progress report referenced a checkpoint outside the active path.
    #[error("checkpoint {checkpoint} is out of range for a path of {len} checkpoints")]
    CheckpointOutOfRange {
        /// The index that was reported.
        checkpoint: CheckpointId,
        /// Length of the active path.
        len: usize,
    },

    /// A progress report arrived while no reservation is active.
    #[error("no active reservation")]
    NoActiveReservation,

    /// The footprint radius must be strictly positive.
    #[error("footprint radius must be positive, got {radius}")]
    InvalidRadius {
        /// The rejected radius.
        radius: f64,
    },

    /// The robot reported movement despite an instruction to stop.
    ///
    /// Also returned for every report while the gate remains faulted.
    /// This can surface during the window between a stop instruction being
    /// issued and the robot's confirmation of having stopped.
    #[error(
        "robot moved while instructed to stop at checkpoint {expected_stop} \
         (reported from checkpoint {reported})"
    )]
    MovingViolation {
        /// The checkpoint the robot was instructed to stop at.
        expected_stop: CheckpointId,
        /// The checkpoint the robot reported progress from.
        reported: CheckpointId,
    },

    /// The robot came to rest somewhere it was not permitted to be.
    ///
    /// Also returned for every report while the gate remains faulted.
    #[error(
        "robot stopped beyond its instructed hold point {expected_stop} \
         (reported from checkpoint {reported})"
    )]
    WaitingViolation {
        /// The checkpoint the robot was instructed to hold at.
        expected_stop: CheckpointId,
        /// The checkpoint the robot reported progress from.
        reported: CheckpointId,
    },
}

impl TrafficError {
    /// Returns `true` if this error is a protocol violation rather than
    /// caller misuse.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(
            self,
            Self::MovingViolation { .. } | Self::WaitingViolation { .. }
        )
    }
}
