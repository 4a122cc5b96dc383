//! Unit and property tests for the traffic protocol.
//!
//! The property tests drive the gate with arbitrary report sequences and
//! check the progress invariants that must hold after every operation:
//!
//! - `last_reached <= last_ready`
//! - both indices are monotonically non-decreasing within one reservation
//!
//! The unit tests pin the instruction semantics against a stubbed
//! arbitration decision, including the no-caching contract: consecutive
//! calls must track an intervening decision change exactly.

// Checkpoint indices double as test coordinates; the cast is exact for
// the tiny values involved.
#![allow(clippy::cast_precision_loss)]

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::{
    Checkpoint, CheckpointId, GateState, Grant, MotionGate, MovingInstruction, Participant, Point,
    Reservation, ReservationId, ReservationWriter, SharedClearance, TrafficError,
    WaitingInstruction,
};

// ============================================================================
// Stubs
// ============================================================================

/// Everything a participant forwarded through the writer boundary.
#[derive(Debug, Clone, PartialEq)]
enum WriterEvent {
    Set {
        reservation: ReservationId,
        path_len: usize,
        radius: f64,
    },
    Ready {
        reservation: ReservationId,
        checkpoint: CheckpointId,
    },
    Reached {
        reservation: ReservationId,
        checkpoint: CheckpointId,
    },
    Cancel {
        reservation: ReservationId,
    },
}

#[derive(Debug, Default)]
struct RecordingWriter {
    events: Mutex<Vec<WriterEvent>>,
}

impl RecordingWriter {
    fn events(&self) -> Vec<WriterEvent> {
        self.events.lock().unwrap().clone()
    }

    fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl ReservationWriter for RecordingWriter {
    fn set(&self, _participant: u64, reservation: ReservationId, details: &Reservation) {
        self.events.lock().unwrap().push(WriterEvent::Set {
            reservation,
            path_len: details.path.len(),
            radius: details.radius,
        });
    }

    fn ready(&self, _participant: u64, reservation: ReservationId, checkpoint: CheckpointId) {
        self.events.lock().unwrap().push(WriterEvent::Ready {
            reservation,
            checkpoint,
        });
    }

    fn reached(&self, _participant: u64, reservation: ReservationId, checkpoint: CheckpointId) {
        self.events.lock().unwrap().push(WriterEvent::Reached {
            reservation,
            checkpoint,
        });
    }

    fn cancel(&self, _participant: u64, reservation: ReservationId) {
        self.events
            .lock()
            .unwrap()
            .push(WriterEvent::Cancel { reservation });
    }
}

fn checkpoint(x: f64, can_hold: bool) -> Checkpoint {
    Checkpoint::new(Point::new(x, 0.0), "test_map", can_hold)
}

/// The three-checkpoint path from the traversal examples:
/// hold, no-hold, hold.
fn short_path() -> Vec<Checkpoint> {
    vec![
        checkpoint(0.0, true),
        checkpoint(1.0, false),
        checkpoint(2.0, true),
    ]
}

fn test_gate() -> (MotionGate, Arc<RecordingWriter>, SharedClearance) {
    let writer = Arc::new(RecordingWriter::default());
    let clearance = SharedClearance::new();
    let gate = MotionGate::new(
        7,
        0.5,
        Arc::clone(&writer) as Arc<dyn ReservationWriter>,
        Arc::new(clearance.clone()),
    )
    .unwrap();
    (gate, writer, clearance)
}

fn origin() -> Point {
    Point::new(0.0, 0.0)
}

// ============================================================================
// Path submission
// ============================================================================

#[test]
fn new_path_resets_progress_and_enters_moving() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });
    gate.moving_from(0, origin()).unwrap();
    assert_eq!(gate.participant().last_reached(), Some(0));

    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(gate.state(), GateState::Moving);
    assert_eq!(gate.participant().last_ready(), None);
    assert_eq!(gate.participant().last_reached(), None);
}

#[test]
fn empty_path_is_rejected_without_state_change() {
    let (mut gate, writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    let events_before = writer.event_count();
    let reservation_before = gate.participant().reservation_id();

    assert_eq!(gate.follow_new_path(vec![]), Err(TrafficError::EmptyPath));
    assert_eq!(writer.event_count(), events_before);
    assert_eq!(gate.participant().reservation_id(), reservation_before);
}

#[test]
fn single_checkpoint_path_is_trivial() {
    let (mut gate, _writer, _clearance) = test_gate();
    gate.follow_new_path(vec![checkpoint(0.0, true)]).unwrap();
    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Resume));
}

#[test]
fn new_path_bumps_reservation_id() {
    let (mut gate, _writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    let first = gate.participant().reservation_id();
    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(gate.participant().reservation_id(), first + 1);
}

// ============================================================================
// Instruction derivation
// ============================================================================

#[test]
fn moving_instruction_tracks_the_latest_decision() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    let reservation = gate.participant().reservation_id();

    // Granted through the whole path: continue.
    clearance.publish(Grant {
        reservation,
        until: 2,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::ContinueAtNextCheckpoint)
    );

    // The decision changed between calls with no new report; the very next
    // call must reflect it. Nothing may be cached.
    clearance.publish(Grant {
        reservation,
        until: 1,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );

    clearance.publish(Grant {
        reservation,
        until: 2,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::ContinueAtNextCheckpoint)
    );
}

#[test]
fn waiting_robot_resumes_only_when_granted() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();

    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Wait));
    assert_eq!(gate.state(), GateState::WaitingAtCheckpoint);

    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 1,
    });
    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Resume));
    assert_eq!(gate.state(), GateState::Moving);
}

#[test]
fn stale_grant_for_a_replaced_path_is_void() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });

    // Replacing the path invalidates the standing grant.
    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Wait));
}

#[test]
fn revoked_grant_means_wait() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::ContinueAtNextCheckpoint)
    );

    clearance.revoke();
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );
}

#[test]
fn passing_the_final_checkpoint_completes_the_traversal() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });
    gate.moving_from(0, origin()).unwrap();
    gate.moving_from(1, origin()).unwrap();
    assert_eq!(
        gate.moving_from(2, Point::new(2.0, 0.0)),
        Ok(MovingInstruction::ContinueAtNextCheckpoint)
    );
    assert_eq!(gate.state(), GateState::Idle);
}

#[test]
fn conforming_arbitration_never_holds_at_a_no_hold_checkpoint() {
    // hold, no-hold, hold, hold: a conforming authority stops the robot at
    // checkpoint 2, never at 1.
    let path = vec![
        checkpoint(0.0, true),
        checkpoint(1.0, false),
        checkpoint(2.0, true),
        checkpoint(3.0, true),
    ];
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(path.clone()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });

    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::ContinueAtNextCheckpoint)
    );
    // Next stop target is checkpoint 2, which can hold.
    assert_eq!(
        gate.moving_from(1, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );
    assert!(path[2].can_hold);

    assert_eq!(gate.waiting_at(2), Ok(WaitingInstruction::Wait));
    assert!(path[2].can_hold);
}

// ============================================================================
// Protocol violations
// ============================================================================

#[test]
fn moving_past_an_instructed_stop_latches_a_fault() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 1,
    });

    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );

    // The robot sails past checkpoint 1 anyway.
    assert_eq!(
        gate.moving_from(1, origin()),
        Err(TrafficError::MovingViolation {
            expected_stop: 1,
            reported: 1,
        })
    );
    assert_eq!(gate.state(), GateState::Faulted);

    // Every further report keeps returning the violation.
    assert_eq!(
        gate.waiting_at(1),
        Err(TrafficError::WaitingViolation {
            expected_stop: 1,
            reported: 1,
        })
    );

    // A fresh path restarts the protocol.
    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(gate.state(), GateState::Moving);
    assert!(gate.waiting_at(0).is_ok());
}

#[test]
fn moving_while_holding_latches_a_fault() {
    let (mut gate, _writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();

    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Wait));
    let err = gate.moving_from(0, origin()).unwrap_err();
    assert!(err.is_violation());
    assert_eq!(gate.state(), GateState::Faulted);
}

#[test]
fn stopping_beyond_an_instructed_stop_latches_a_fault() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 1,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );

    // Coming to rest in the gap past checkpoint 1 means the stop at 1 was
    // ignored.
    assert_eq!(
        gate.waiting_after(1, Point::new(1.5, 0.0)),
        Err(TrafficError::WaitingViolation {
            expected_stop: 1,
            reported: 1,
        })
    );
}

#[test]
fn stopping_short_of_an_instructed_stop_is_compliance() {
    let (mut gate, _writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 1,
    });
    assert_eq!(
        gate.moving_from(0, origin()),
        Ok(MovingInstruction::WaitAtNextCheckpoint)
    );

    // An obstacle stopped the robot before its instructed hold point. The
    // grant still covers checkpoint 1, so it may creep forward to it.
    assert_eq!(
        gate.waiting_after(0, Point::new(0.4, 0.0)),
        Ok(WaitingInstruction::Resume)
    );
    assert_eq!(gate.state(), GateState::Moving);

    // Once the grant is revoked, the same report holds the robot in place.
    clearance.revoke();
    assert_eq!(
        gate.waiting_after(0, Point::new(0.4, 0.0)),
        Ok(WaitingInstruction::Wait)
    );
    assert_eq!(gate.state(), GateState::WaitingBetween);
}

#[test]
fn creeping_off_a_hold_point_latches_a_fault() {
    let (mut gate, _writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(gate.waiting_at(0), Ok(WaitingInstruction::Wait));

    let err = gate.waiting_after(0, Point::new(0.3, 0.0)).unwrap_err();
    assert!(err.is_violation());
}

// ============================================================================
// Caller misuse
// ============================================================================

#[test]
fn reports_without_a_reservation_are_rejected() {
    let (mut gate, _writer, _clearance) = test_gate();
    assert_eq!(
        gate.moving_from(0, origin()),
        Err(TrafficError::NoActiveReservation)
    );
    assert_eq!(gate.waiting_at(0), Err(TrafficError::NoActiveReservation));
}

#[test]
fn out_of_range_checkpoint_is_rejected_without_state_change() {
    let (mut gate, _writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    assert_eq!(
        gate.moving_from(5, origin()),
        Err(TrafficError::CheckpointOutOfRange {
            checkpoint: 5,
            len: 3,
        })
    );
    assert_eq!(gate.state(), GateState::Moving);
    assert_eq!(gate.participant().last_reached(), None);
}

#[test]
fn non_positive_radius_is_rejected() {
    let writer: Arc<dyn ReservationWriter> = Arc::new(RecordingWriter::default());
    assert_eq!(
        Participant::new(1, 0.0, Arc::clone(&writer)).err(),
        Some(TrafficError::InvalidRadius { radius: 0.0 })
    );
    assert_eq!(
        Participant::new(1, -0.5, writer).err(),
        Some(TrafficError::InvalidRadius { radius: -0.5 })
    );
}

// ============================================================================
// Participant bookkeeping
// ============================================================================

#[test]
fn progress_is_monotonic_and_forwarded_once() {
    let (mut gate, writer, clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    clearance.publish(Grant {
        reservation: gate.participant().reservation_id(),
        until: 2,
    });

    gate.moving_from(1, origin()).unwrap();
    assert_eq!(gate.participant().last_reached(), Some(1));
    assert_eq!(gate.participant().last_ready(), Some(2));
    let events_after_first = writer.event_count();

    // A regressed report is an idempotent re-report: indices hold and
    // nothing new crosses the writer boundary.
    gate.moving_from(0, origin()).unwrap();
    assert_eq!(gate.participant().last_reached(), Some(1));
    assert_eq!(writer.event_count(), events_after_first);
}

#[test]
fn radius_update_resubmits_the_same_reservation() {
    let writer = Arc::new(RecordingWriter::default());
    let mut participant =
        Participant::new(9, 0.5, Arc::clone(&writer) as Arc<dyn ReservationWriter>).unwrap();
    participant.set_path(short_path()).unwrap();
    let reservation = participant.reservation_id();

    participant.set_radius(0.75).unwrap();

    // An update, not a replacement: same reservation id, progress kept.
    assert_eq!(participant.reservation_id(), reservation);
    assert_eq!(
        writer.events().last(),
        Some(&WriterEvent::Set {
            reservation,
            path_len: 3,
            radius: 0.75,
        })
    );
    assert_eq!(
        participant.set_radius(-1.0),
        Err(TrafficError::InvalidRadius { radius: -1.0 })
    );
}

#[test]
fn cancel_withdraws_the_reservation() {
    let (mut gate, writer, _clearance) = test_gate();
    gate.follow_new_path(short_path()).unwrap();
    let reservation = gate.participant().reservation_id();

    gate.cancel();
    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(
        writer.events().last(),
        Some(&WriterEvent::Cancel { reservation })
    );
    assert_eq!(
        gate.moving_from(0, origin()),
        Err(TrafficError::NoActiveReservation)
    );
}

// ============================================================================
// Property tests
// ============================================================================

/// One step of an arbitrary driver/arbitration interleaving.
#[derive(Debug, Clone)]
enum Step {
    Move(CheckpointId),
    WaitAt(CheckpointId),
    WaitAfter(CheckpointId),
    Publish(CheckpointId),
    Revoke,
    NewPath(usize),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..6).prop_map(Step::Move),
        (0usize..6).prop_map(Step::WaitAt),
        (0usize..6).prop_map(Step::WaitAfter),
        (0usize..6).prop_map(Step::Publish),
        Just(Step::Revoke),
        (1usize..5).prop_map(Step::NewPath),
    ]
}

fn arb_path(len: usize) -> Vec<Checkpoint> {
    (0..len)
        .map(|i| checkpoint(i as f64, i % 2 == 0))
        .collect()
}

proptest! {
    /// `last_reached <= last_ready`, and both indices only ever move
    /// forward within one reservation, no matter how the driver and the
    /// arbitration authority interleave.
    #[test]
    fn progress_invariants_hold_for_all_interleavings(
        steps in prop::collection::vec(arb_step(), 1..50),
    ) {
        let (mut gate, _writer, clearance) = test_gate();
        gate.follow_new_path(arb_path(4)).unwrap();

        let mut floor: Option<CheckpointId> = None;

        for step in steps {
            match step {
                Step::Move(c) => {
                    let _ = gate.moving_from(c, origin());
                }
                Step::WaitAt(c) => {
                    let _ = gate.waiting_at(c);
                }
                Step::WaitAfter(c) => {
                    let _ = gate.waiting_after(c, origin());
                }
                Step::Publish(until) => {
                    clearance.publish(Grant {
                        reservation: gate.participant().reservation_id(),
                        until,
                    });
                }
                Step::Revoke => clearance.revoke(),
                Step::NewPath(len) => {
                    gate.follow_new_path(arb_path(len)).unwrap();
                    floor = None;
                }
            }

            let participant = gate.participant();
            let (reached, ready) = (participant.last_reached(), participant.last_ready());
            if let (Some(reached), Some(ready)) = (reached, ready) {
                prop_assert!(reached <= ready);
            }
            if reached.is_some() {
                prop_assert!(ready.is_some());
            }
            // Monotonic within a reservation.
            if let (Some(floor), Some(reached)) = (floor, reached) {
                prop_assert!(reached >= floor);
            }
            floor = reached;
        }
    }

    /// A fresh path always clears a fault and resets progress.
    #[test]
    fn new_path_always_restarts_the_protocol(
        steps in prop::collection::vec(arb_step(), 1..30),
    ) {
        let (mut gate, _writer, _clearance) = test_gate();
        gate.follow_new_path(arb_path(4)).unwrap();

        for step in steps {
            match step {
                Step::Move(c) => {
                    let _ = gate.moving_from(c, origin());
                }
                Step::WaitAt(c) => {
                    let _ = gate.waiting_at(c);
                }
                Step::WaitAfter(c) => {
                    let _ = gate.waiting_after(c, origin());
                }
                _ => {}
            }
        }

        gate.follow_new_path(arb_path(3)).unwrap();
        prop_assert_eq!(gate.state(), GateState::Moving);
        prop_assert_eq!(gate.participant().last_ready(), None);
        prop_assert_eq!(gate.participant().last_reached(), None);
        prop_assert!(gate.waiting_at(0).is_ok());
    }
}
