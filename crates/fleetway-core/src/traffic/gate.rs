//! Traffic-light façade over a [`Participant`].
//!
//! The [`MotionGate`] converts raw robot progress reports into move/wait
//! instructions for the driving robot. Every report polls the
//! [`ClearanceSource`] and derives the instruction from the arbitration
//! authority's *current* decision: the authority can change its mind
//! between calls (for example after resolving a conflict with another
//! robot), so the robot-facing contract is "poll on every state report,
//! never cache across reports".
//!
//! # State machine
//!
//! ```text
//!                 follow_new_path
//!   (any state) ------------------> Moving   (Idle for a trivial path)
//!
//!   Moving --moving_from--> Moving
//!   Moving --waiting_at---> WaitingAtCheckpoint | Moving (on Resume)
//!   Moving --waiting_after-> WaitingBetween     | Moving (on Resume)
//!   (any report contradicting the standing instruction) --> Faulted
//! ```
//!
//! `Faulted` latches: every further report returns the violation error
//! until a fresh `follow_new_path` restarts the protocol under a new
//! reservation.

use std::sync::Arc;

use super::checkpoint::{Checkpoint, CheckpointId, ParticipantId, Point};
use super::error::TrafficError;
use super::participant::Participant;
use super::writer::{ClearanceSource, ReservationWriter};

/// Instruction for a robot that is currently moving.
///
/// The value must not be cached by the caller across calls: each report
/// re-derives the instruction from the latest arbitration decision, and
/// the result may flip from continue to wait (or back) with no new report
/// in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingInstruction {
    /// When the robot reaches its next checkpoint, it should continue.
    ContinueAtNextCheckpoint,

    /// When the robot reaches its next checkpoint, it must stop and wait.
    WaitAtNextCheckpoint,
}

/// Instruction for a robot that is stationary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitingInstruction {
    /// The robot may continue along its path.
    Resume,

    /// The robot must keep waiting where it is.
    Wait,
}

/// Observable state of the gate's protocol machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No traversal in progress.
    Idle,
    /// The robot is (or should be) in motion.
    Moving,
    /// The robot is holding at a checkpoint under a wait instruction.
    WaitingAtCheckpoint,
    /// The robot is holding between checkpoints under a wait instruction.
    WaitingBetween,
    /// A protocol violation was detected; only a new path clears this.
    Faulted,
}

/// The last instruction issued to the robot, kept to detect disobedience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    /// Free to proceed; no stop is pending.
    Clear,
    /// Instructed to stop upon arriving at this checkpoint.
    StopAt(CheckpointId),
    /// Instructed to keep holding at this checkpoint.
    HoldAt(CheckpointId),
    /// Instructed to keep holding in the gap after this checkpoint.
    HoldAfter(CheckpointId),
}

/// A latched protocol violation.
#[derive(Debug, Clone, Copy)]
struct Fault {
    expected_stop: CheckpointId,
    reported: CheckpointId,
}

#[derive(Debug, Clone, Copy)]
enum ViolationKind {
    Moving,
    Waiting,
}

/// Per-robot traffic light.
///
/// Wraps a [`Participant`] and a [`ClearanceSource`]; owned by one robot's
/// driver loop and not shared across threads. Many gates for different
/// robots operate independently and concurrently with no shared mutable
/// state between them other than the external arbitration authority.
pub struct MotionGate {
    participant: Participant,
    clearance: Arc<dyn ClearanceSource>,
    state: GateState,
    standing: Standing,
    fault: Option<Fault>,
}

impl std::fmt::Debug for MotionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionGate")
            .field("participant", &self.participant)
            .field("state", &self.state)
            .field("standing", &self.standing)
            .finish_non_exhaustive()
    }
}

impl MotionGate {
    /// Creates a gate for one robot.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::InvalidRadius`] if `radius` is not strictly
    /// positive.
    pub fn new(
        id: ParticipantId,
        radius: f64,
        writer: Arc<dyn ReservationWriter>,
        clearance: Arc<dyn ClearanceSource>,
    ) -> Result<Self, TrafficError> {
        Ok(Self {
            participant: Participant::new(id, radius, writer)?,
            clearance,
            state: GateState::Idle,
            standing: Standing::Clear,
            fault: None,
        })
    }

    /// Replaces the robot's path.
    ///
    /// Transitions any state, including `Faulted`, to `Moving`, or to
    /// `Idle` for a single-checkpoint path, which needs no negotiation.
    /// Progress
    /// indices reset and every in-flight instruction issued against the
    /// old path becomes void.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::EmptyPath`] for an empty path; state is
    /// unchanged on error.
    pub fn follow_new_path(&mut self, path: Vec<Checkpoint>) -> Result<(), TrafficError> {
        self.participant.set_path(path)?;
        self.fault = None;
        self.standing = Standing::Clear;
        self.state = if self.participant.path().len() > 1 {
            GateState::Moving
        } else {
            GateState::Idle
        };
        Ok(())
    }

    /// Report that the robot is moving, having just passed `checkpoint`.
    ///
    /// `location` is the robot's current position; it is recorded for the
    /// arbitration authority's benefit but does not influence the
    /// instruction.
    ///
    /// Returns what the robot should do when it reaches its next
    /// checkpoint. The result may change between calls to this function;
    /// always obey the latest value.
    ///
    /// # Errors
    ///
    /// [`TrafficError::MovingViolation`] if the robot moved despite an
    /// instruction to stop (the gate latches `Faulted`); misuse errors for
    /// out-of-range indices or a missing reservation.
    pub fn moving_from(
        &mut self,
        checkpoint: CheckpointId,
        location: Point,
    ) -> Result<MovingInstruction, TrafficError> {
        let len = self.active_len(checkpoint)?;

        if let Some(fault) = self.fault {
            return Err(TrafficError::MovingViolation {
                expected_stop: fault.expected_stop,
                reported: fault.reported,
            });
        }

        // A moving report under any standing stop or hold is disobedience.
        // StopAt only faults once the robot is at or past its stop point;
        // a hold means the robot must not be moving at all.
        let violated = match self.standing {
            Standing::StopAt(stop) => (checkpoint >= stop).then_some(stop),
            Standing::HoldAt(hold) | Standing::HoldAfter(hold) => Some(hold),
            Standing::Clear => None,
        };
        if let Some(expected_stop) = violated {
            return Err(self.latch_fault(expected_stop, checkpoint, ViolationKind::Moving));
        }

        self.participant.reached(checkpoint)?;
        tracing::trace!(
            participant = self.participant.id(),
            checkpoint,
            x = location.x,
            y = location.y,
            "moving"
        );

        // Passing the final checkpoint completes the traversal.
        if checkpoint + 1 >= len {
            self.standing = Standing::Clear;
            self.state = GateState::Idle;
            return Ok(MovingInstruction::ContinueAtNextCheckpoint);
        }

        // The robot is physically committed to entering the next
        // checkpoint; declare readiness for it.
        let next = checkpoint + 1;
        self.participant.ready(next)?;

        self.state = GateState::Moving;
        if next + 1 >= len || self.grant_covers(next + 1) {
            self.standing = Standing::Clear;
            Ok(MovingInstruction::ContinueAtNextCheckpoint)
        } else {
            self.standing = Standing::StopAt(next);
            self.warn_if_unholdable(next);
            Ok(MovingInstruction::WaitAtNextCheckpoint)
        }
    }

    /// Report that the robot is waiting exactly at `checkpoint`.
    ///
    /// # Errors
    ///
    /// [`TrafficError::WaitingViolation`] if the robot came to rest beyond
    /// its instructed stop point (the gate latches `Faulted`); misuse
    /// errors for out-of-range indices or a missing reservation.
    pub fn waiting_at(&mut self, checkpoint: CheckpointId) -> Result<WaitingInstruction, TrafficError> {
        let len = self.active_len(checkpoint)?;

        if let Some(fault) = self.fault {
            return Err(TrafficError::WaitingViolation {
                expected_stop: fault.expected_stop,
                reported: fault.reported,
            });
        }

        let violated = match self.standing {
            // Stopping at or short of the instructed checkpoint is
            // compliance; resting beyond it means the stop was ignored.
            Standing::StopAt(stop) => (checkpoint > stop).then_some(stop),
            // A holding robot that turns up at a different checkpoint
            // moved without a resume.
            Standing::HoldAt(hold) => (checkpoint != hold).then_some(hold),
            // It was holding between checkpoints and is now at one.
            Standing::HoldAfter(hold) => Some(hold),
            Standing::Clear => None,
        };
        if let Some(expected_stop) = violated {
            return Err(self.latch_fault(expected_stop, checkpoint, ViolationKind::Waiting));
        }

        self.participant.reached(checkpoint)?;

        // Arriving at the final checkpoint completes the traversal.
        if checkpoint + 1 >= len {
            self.standing = Standing::Clear;
            self.state = GateState::Idle;
            return Ok(WaitingInstruction::Resume);
        }

        // Standing readiness request: the robot wants to enter the next
        // checkpoint, and arbitration answers through the clearance cell.
        self.participant.ready(checkpoint + 1)?;

        if self.grant_covers(checkpoint + 1) {
            self.standing = Standing::Clear;
            self.state = GateState::Moving;
            Ok(WaitingInstruction::Resume)
        } else {
            self.standing = Standing::HoldAt(checkpoint);
            self.state = GateState::WaitingAtCheckpoint;
            self.warn_if_unholdable(checkpoint);
            Ok(WaitingInstruction::Wait)
        }
    }

    /// Report that the robot is waiting in the gap after `checkpoint`,
    /// stopped off-checkpoint (for example because of an obstacle).
    ///
    /// Distinguished from [`MotionGate::waiting_at`] because the
    /// arbitration authority must account for a robot occupying space that
    /// is not a designated hold point.
    ///
    /// # Errors
    ///
    /// Same conditions as [`MotionGate::waiting_at`].
    pub fn waiting_after(
        &mut self,
        checkpoint: CheckpointId,
        location: Point,
    ) -> Result<WaitingInstruction, TrafficError> {
        let len = self.active_len(checkpoint)?;

        if let Some(fault) = self.fault {
            return Err(TrafficError::WaitingViolation {
                expected_stop: fault.expected_stop,
                reported: fault.reported,
            });
        }

        let violated = match self.standing {
            // Resting anywhere past the instructed checkpoint means the
            // robot departed a stop point.
            Standing::StopAt(stop) => (checkpoint >= stop).then_some(stop),
            // A robot holding at a checkpoint crept off it.
            Standing::HoldAt(hold) => Some(hold),
            // Re-reporting the same gap is compliance.
            Standing::HoldAfter(hold) => (checkpoint != hold).then_some(hold),
            Standing::Clear => None,
        };
        if let Some(expected_stop) = violated {
            return Err(self.latch_fault(expected_stop, checkpoint, ViolationKind::Waiting));
        }

        self.participant.reached(checkpoint)?;
        tracing::trace!(
            participant = self.participant.id(),
            checkpoint,
            x = location.x,
            y = location.y,
            "waiting between checkpoints"
        );

        if checkpoint + 1 >= len {
            self.standing = Standing::Clear;
            self.state = GateState::Idle;
            return Ok(WaitingInstruction::Resume);
        }

        self.participant.ready(checkpoint + 1)?;

        if self.grant_covers(checkpoint + 1) {
            self.standing = Standing::Clear;
            self.state = GateState::Moving;
            Ok(WaitingInstruction::Resume)
        } else {
            self.standing = Standing::HoldAfter(checkpoint);
            self.state = GateState::WaitingBetween;
            Ok(WaitingInstruction::Wait)
        }
    }

    /// Current state of the protocol machine.
    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// Read access to the wrapped participant.
    #[must_use]
    pub const fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Withdraws the active reservation and returns the gate to `Idle`.
    pub fn cancel(&mut self) {
        self.participant.cancel();
        self.standing = Standing::Clear;
        self.fault = None;
        self.state = GateState::Idle;
    }

    /// Whether the current grant permits entering `checkpoint`.
    ///
    /// Grants naming a reservation other than the current one are void.
    fn grant_covers(&self, checkpoint: CheckpointId) -> bool {
        self.clearance.granted().is_some_and(|grant| {
            grant.reservation == self.participant.reservation_id() && grant.until >= checkpoint
        })
    }

    fn active_len(&self, checkpoint: CheckpointId) -> Result<usize, TrafficError> {
        if !self.participant.has_reservation() {
            return Err(TrafficError::NoActiveReservation);
        }
        let len = self.participant.path().len();
        if checkpoint >= len {
            return Err(TrafficError::CheckpointOutOfRange { checkpoint, len });
        }
        Ok(len)
    }

    fn latch_fault(
        &mut self,
        expected_stop: CheckpointId,
        reported: CheckpointId,
        kind: ViolationKind,
    ) -> TrafficError {
        self.fault = Some(Fault {
            expected_stop,
            reported,
        });
        self.state = GateState::Faulted;
        tracing::warn!(
            participant = self.participant.id(),
            expected_stop,
            reported,
            kind = ?kind,
            "protocol violation: robot disobeyed its instruction"
        );
        match kind {
            ViolationKind::Moving => TrafficError::MovingViolation {
                expected_stop,
                reported,
            },
            ViolationKind::Waiting => TrafficError::WaitingViolation {
                expected_stop,
                reported,
            },
        }
    }

    /// A wait pinned to a checkpoint that cannot legally hold a robot is a
    /// contract breach by the arbitration layer. Surface it rather than
    /// mask the instruction.
    fn warn_if_unholdable(&self, checkpoint: CheckpointId) {
        if !self.participant.path()[checkpoint].can_hold {
            tracing::warn!(
                participant = self.participant.id(),
                checkpoint,
                "arbitration left the robot waiting at a checkpoint that cannot hold"
            );
        }
    }
}
