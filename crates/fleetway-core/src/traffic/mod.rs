//! Checkpoint reservation and motion protocol.
//!
//! This module is the client side of the fleet's traffic-coordination
//! protocol. A robot's agent:
//!
//! 1. submits a path of [`Checkpoint`]s as a [`Reservation`] through the
//!    [`ReservationWriter`] boundary,
//! 2. reports progress through a [`MotionGate`], and
//! 3. obeys the move/wait instruction the gate derives from the
//!    arbitration authority's latest decision (polled via
//!    [`ClearanceSource`]).
//!
//! The conflict-resolution algorithm itself lives behind those two
//! boundaries; this module only enforces the contract the client must
//! honor: monotonic progress, instruction re-derivation on every report,
//! and fault latching when a robot disobeys.

mod checkpoint;
mod error;
mod gate;
mod participant;
mod writer;

#[cfg(test)]
mod tests;

pub use checkpoint::{Checkpoint, CheckpointId, ParticipantId, Point, Reservation, ReservationId};
pub use error::TrafficError;
pub use gate::{GateState, MotionGate, MovingInstruction, WaitingInstruction};
pub use participant::Participant;
pub use writer::{ClearanceSource, Grant, ReservationWriter, SharedClearance};
