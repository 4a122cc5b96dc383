//! # fleetway-core
//!
//! Traffic-coordination core for fleets of independently-moving robots
//! sharing a discretized map of checkpoints. Two tightly coupled
//! subsystems live here:
//!
//! - **Checkpoint reservation & motion protocol** ([`traffic`]): the
//!   client-side state machine a robot's agent uses to report progress
//!   along a reserved path and receive move/wait instructions, while an
//!   external arbitration authority resolves spatial conflicts between
//!   robots.
//! - **Durable participant registry** ([`registry`]): a crash-safe,
//!   append-only journal of participant registrations, reconstructed by
//!   deterministic replay on restart.
//!
//! The arbitration algorithm itself, message transport, and motion
//! control are external collaborators reached only through the narrow
//! [`ReservationWriter`] and [`ClearanceSource`] boundaries.
//!
//! ## Example
//!
//! ```rust
//! # fn main() -> Result<(), fleetway_core::TrafficError> {
//! use std::sync::Arc;
//!
//! use fleetway_core::{
//!     Checkpoint, Grant, MotionGate, MovingInstruction, Point, Reservation,
//!     ReservationWriter, SharedClearance,
//! };
//!
//! // The transport to the arbitration authority; a no-op stand-in here.
//! struct NullWriter;
//!
//! impl ReservationWriter for NullWriter {
//!     fn set(&self, _participant: u64, _reservation: u64, _details: &Reservation) {}
//!     fn ready(&self, _participant: u64, _reservation: u64, _checkpoint: usize) {}
//!     fn reached(&self, _participant: u64, _reservation: u64, _checkpoint: usize) {}
//!     fn cancel(&self, _participant: u64, _reservation: u64) {}
//! }
//!
//! let clearance = SharedClearance::new();
//! let mut gate = MotionGate::new(
//!     1,
//!     0.5,
//!     Arc::new(NullWriter),
//!     Arc::new(clearance.clone()),
//! )?;
//!
//! gate.follow_new_path(vec![
//!     Checkpoint::new(Point::new(0.0, 0.0), "warehouse", true),
//!     Checkpoint::new(Point::new(5.0, 0.0), "warehouse", false),
//!     Checkpoint::new(Point::new(10.0, 0.0), "warehouse", true),
//! ])?;
//!
//! // Arbitration grants the whole path; the robot may keep moving.
//! clearance.publish(Grant {
//!     reservation: gate.participant().reservation_id(),
//!     until: 2,
//! });
//! let instruction = gate.moving_from(0, Point::new(0.2, 0.0))?;
//! assert_eq!(instruction, MovingInstruction::ContinueAtNextCheckpoint);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod registry;
pub mod traffic;

// Re-export main types at crate root for convenience
pub use registry::{
    AtomicOperation, ConvexShape, FileJournal, JournalError, OpKind, ParticipantDescription,
    ParticipantLogger, ParticipantRegistry, Profile, RegistryError, Responsiveness, ShapeContext,
    ShapeKind,
};
pub use traffic::{
    Checkpoint, CheckpointId, ClearanceSource, GateState, Grant, MotionGate, MovingInstruction,
    Participant, ParticipantId, Point, Reservation, ReservationId, ReservationWriter,
    SharedClearance, TrafficError, WaitingInstruction,
};
