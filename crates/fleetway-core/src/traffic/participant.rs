//! Client-side reservation ownership and progress tracking.

use std::sync::Arc;

use super::checkpoint::{Checkpoint, CheckpointId, ParticipantId, Reservation, ReservationId};
use super::error::TrafficError;
use super::writer::ReservationWriter;

/// One robot's handle on its active reservation.
///
/// A participant owns at most one reservation at a time and tracks the
/// highest checkpoint the robot has declared ready to enter and the highest
/// it has physically reached. Both indices are monotonically non-decreasing
/// within the lifetime of a single reservation, reset when a new path is
/// submitted, and satisfy `last_reached <= last_ready` after every
/// operation. Every state change is forwarded to the [`ReservationWriter`].
///
/// A participant is owned by exactly one robot-side agent; reports arrive
/// serially from that robot's own driver loop.
pub struct Participant {
    id: ParticipantId,
    reservation_id: ReservationId,
    radius: f64,
    reservation: Option<Reservation>,
    last_ready: Option<CheckpointId>,
    last_reached: Option<CheckpointId>,
    writer: Arc<dyn ReservationWriter>,
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("reservation_id", &self.reservation_id)
            .field("radius", &self.radius)
            .field("path_len", &self.path().len())
            .field("last_ready", &self.last_ready)
            .field("last_reached", &self.last_reached)
            .finish_non_exhaustive()
    }
}

impl Participant {
    /// Creates a participant with the given footprint radius and an
    /// injected writer.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::InvalidRadius`] if `radius` is not strictly
    /// positive.
    pub fn new(
        id: ParticipantId,
        radius: f64,
        writer: Arc<dyn ReservationWriter>,
    ) -> Result<Self, TrafficError> {
        if radius.is_nan() || radius <= 0.0 {
            return Err(TrafficError::InvalidRadius { radius });
        }
        Ok(Self {
            id,
            reservation_id: 0,
            radius,
            reservation: None,
            last_ready: None,
            last_reached: None,
            writer,
        })
    }

    /// Replaces the active reservation wholesale.
    ///
    /// Progress indices reset; the new path is submitted under a fresh
    /// reservation id, which voids every in-flight instruction issued
    /// against the old one.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::EmptyPath`] if `path` is empty. No state
    /// changes on error.
    pub fn set_path(&mut self, path: Vec<Checkpoint>) -> Result<(), TrafficError> {
        if path.is_empty() {
            return Err(TrafficError::EmptyPath);
        }

        self.reservation_id += 1;
        self.last_ready = None;
        self.last_reached = None;

        let reservation = Reservation {
            path,
            radius: self.radius,
        };
        self.writer
            .set(self.id, self.reservation_id, &reservation);
        tracing::debug!(
            participant = self.id,
            reservation = self.reservation_id,
            path_len = reservation.path.len(),
            "submitted new reservation"
        );
        self.reservation = Some(reservation);
        Ok(())
    }

    /// Declares the robot ready to enter `checkpoint`.
    ///
    /// The index only moves forward; a report at or below the current
    /// value is an idempotent re-report and is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::NoActiveReservation`] without a reservation,
    /// or [`TrafficError::CheckpointOutOfRange`] for an index outside the
    /// path.
    pub fn ready(&mut self, checkpoint: CheckpointId) -> Result<(), TrafficError> {
        let len = self.active_len()?;
        if checkpoint >= len {
            return Err(TrafficError::CheckpointOutOfRange { checkpoint, len });
        }

        if self.last_ready.is_none_or(|r| checkpoint > r) {
            self.last_ready = Some(checkpoint);
            self.writer.ready(self.id, self.reservation_id, checkpoint);
            tracing::trace!(
                participant = self.id,
                reservation = self.reservation_id,
                checkpoint,
                "ready"
            );
        }
        Ok(())
    }

    /// Records that the robot has physically reached `checkpoint`.
    ///
    /// Raises the ready index as well if the robot reached a checkpoint it
    /// had not yet declared readiness for, keeping
    /// `last_reached <= last_ready`. Regressions are ignored.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Participant::ready`].
    pub fn reached(&mut self, checkpoint: CheckpointId) -> Result<(), TrafficError> {
        let len = self.active_len()?;
        if checkpoint >= len {
            return Err(TrafficError::CheckpointOutOfRange { checkpoint, len });
        }

        if self.last_ready.is_none_or(|r| checkpoint > r) {
            self.last_ready = Some(checkpoint);
            self.writer.ready(self.id, self.reservation_id, checkpoint);
        }
        if self.last_reached.is_none_or(|r| checkpoint > r) {
            self.last_reached = Some(checkpoint);
            self.writer
                .reached(self.id, self.reservation_id, checkpoint);
            tracing::trace!(
                participant = self.id,
                reservation = self.reservation_id,
                checkpoint,
                "reached"
            );
        }
        Ok(())
    }

    /// Updates the footprint radius.
    ///
    /// If a reservation is active it is resubmitted with the new radius
    /// under the same reservation id (an update, not a replacement), so
    /// progress indices are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::InvalidRadius`] if `radius` is not strictly
    /// positive.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), TrafficError> {
        if radius.is_nan() || radius <= 0.0 {
            return Err(TrafficError::InvalidRadius { radius });
        }
        self.radius = radius;
        if let Some(reservation) = &mut self.reservation {
            reservation.radius = radius;
            self.writer.set(self.id, self.reservation_id, reservation);
            tracing::debug!(
                participant = self.id,
                reservation = self.reservation_id,
                radius,
                "updated reservation radius"
            );
        }
        Ok(())
    }

    /// Withdraws the active reservation, if any.
    pub fn cancel(&mut self) {
        if self.reservation.take().is_some() {
            self.writer.cancel(self.id, self.reservation_id);
            self.last_ready = None;
            self.last_reached = None;
            tracing::debug!(
                participant = self.id,
                reservation = self.reservation_id,
                "cancelled reservation"
            );
        }
    }

    /// This participant's id.
    #[must_use]
    pub const fn id(&self) -> ParticipantId {
        self.id
    }

    /// Id of the current reservation.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        self.reservation_id
    }

    /// The current footprint radius.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// The active path, empty if no reservation is held.
    #[must_use]
    pub fn path(&self) -> &[Checkpoint] {
        self.reservation
            .as_ref()
            .map_or(&[], |reservation| reservation.path.as_slice())
    }

    /// Whether a reservation is currently held.
    #[must_use]
    pub const fn has_reservation(&self) -> bool {
        self.reservation.is_some()
    }

    /// Highest checkpoint declared ready to enter, if any.
    #[must_use]
    pub const fn last_ready(&self) -> Option<CheckpointId> {
        self.last_ready
    }

    /// Highest checkpoint physically reached, if any.
    #[must_use]
    pub const fn last_reached(&self) -> Option<CheckpointId> {
        self.last_reached
    }

    fn active_len(&self) -> Result<usize, TrafficError> {
        match &self.reservation {
            Some(reservation) => Ok(reservation.path.len()),
            None => Err(TrafficError::NoActiveReservation),
        }
    }
}
