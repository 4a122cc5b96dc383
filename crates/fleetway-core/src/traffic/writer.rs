//! Boundary contracts with the external arbitration authority.
//!
//! Two narrow interfaces connect a participant to arbitration:
//!
//! - [`ReservationWriter`] carries outbound reports (reservation submission
//!   and checkpoint progress). Calls are fire-and-forget: the transport
//!   either delivers them or raises its own fault signal, which this core
//!   does not interpret.
//! - [`ClearanceSource`] is the inbound half. The arbitration authority's
//!   latest decision is published here out-of-band, and the motion gate
//!   polls it on every progress report. Instructions are re-derived from
//!   the current value on each call; nothing may be cached across reports,
//!   because the decision can change between calls (for example after a
//!   conflict with another robot is resolved).

use std::sync::{Arc, Mutex};

use super::checkpoint::{CheckpointId, ParticipantId, Reservation, ReservationId};

/// Outbound interface for submitting reservations and reporting progress
/// to the arbitration authority.
///
/// Implemented by the transport layer, not by this crate.
pub trait ReservationWriter: Send + Sync {
    /// Submits a new reservation, or updates the one already held under
    /// `reservation`.
    fn set(
        &self,
        participant: ParticipantId,
        reservation: ReservationId,
        details: &Reservation,
    );

    /// Reports that the participant is ready to enter `checkpoint`.
    fn ready(
        &self,
        participant: ParticipantId,
        reservation: ReservationId,
        checkpoint: CheckpointId,
    );

    /// Reports that the participant has physically reached `checkpoint`.
    fn reached(
        &self,
        participant: ParticipantId,
        reservation: ReservationId,
        checkpoint: CheckpointId,
    );

    /// Withdraws the reservation.
    fn cancel(&self, participant: ParticipantId, reservation: ReservationId);
}

/// The arbitration authority's current decision for one participant.
///
/// A grant permits the robot to advance into checkpoints up to and
/// including `until` of the named reservation. A grant naming any other
/// reservation id is void: replacing a path invalidates every in-flight
/// instruction issued against the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// The reservation this decision applies to.
    pub reservation: ReservationId,

    /// Highest checkpoint the robot is permitted to enter.
    pub until: CheckpointId,
}

/// Read side of the arbitration decision channel.
///
/// The returned value is the latest decision at the moment of the call.
/// Callers must poll on every state report and never hold on to a
/// previously returned grant.
pub trait ClearanceSource: Send + Sync {
    /// Returns the latest grant, or `None` if nothing is currently granted.
    fn granted(&self) -> Option<Grant>;
}

/// Shared single-slot clearance cell.
///
/// The primary [`ClearanceSource`] implementation: transport glue publishes
/// each new arbitration decision with [`SharedClearance::publish`], and the
/// motion gate observes whatever is current when it polls. Cloning shares
/// the underlying slot.
#[derive(Debug, Clone, Default)]
pub struct SharedClearance {
    slot: Arc<Mutex<Option<Grant>>>,
}

impl SharedClearance {
    /// Creates an empty clearance cell with nothing granted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current decision.
    pub fn publish(&self, grant: Grant) {
        *self.slot.lock().expect("clearance lock poisoned") = Some(grant);
    }

    /// Clears the current decision, revoking any standing grant.
    pub fn revoke(&self) {
        *self.slot.lock().expect("clearance lock poisoned") = None;
    }
}

impl ClearanceSource for SharedClearance {
    fn granted(&self) -> Option<Grant> {
        *self.slot.lock().expect("clearance lock poisoned")
    }
}
