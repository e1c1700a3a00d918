//! The update half of the protocol: bind arbitration, update batching,
//! serial acknowledgement, and session teardown.

use test_harness::assertions::{assert_no_update, assert_single_update, find_update};
use test_harness::fixtures::{bound_wm, settled_windows};
use test_harness::TestWm;
use wm::protocol::{Event, ProtocolError, Request};
use wm::wm::{BindResult, WmState};

#[test]
fn bind_triggers_initial_update() {
    let mut harness = bound_wm();
    let events = harness.pump();

    let (serial, render_list) = find_update(&events).expect("initial update");
    assert_eq!(serial, 1);
    assert!(render_list.is_empty());
    assert_eq!(harness.wm.state, WmState::UpdateSent { serial: 1 });
}

#[test]
fn second_bind_refused() {
    let mut harness = bound_wm();

    assert_eq!(harness.wm.bind(), BindResult::Unavailable);
    assert_eq!(
        harness.wm.request(Request::Bind),
        Err(ProtocolError::AlreadyBound)
    );
    // The first client's session is untouched
    assert!(harness.wm.is_bound());
}

#[test]
fn one_update_per_dirty_batch() {
    let mut harness = TestWm::bound();
    let (_, node_a) = harness.add_mapped_window(640, 480);
    let (_, node_b) = harness.add_mapped_window(800, 600);

    let events = harness.pump();
    let serial = assert_single_update(&events);
    assert_eq!(serial, 1);

    let (_, render_list) = find_update(&events).unwrap();
    // Both windows batched into the one update, newest at the bottom
    assert_eq!(render_list, vec![node_b, node_a]);
}

#[test]
fn no_second_update_while_cycle_outstanding() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);

    let events = harness.pump();
    let serial = assert_single_update(&events);

    // New dirtiness mid-cycle must not produce a second update
    harness.wm.dirty_pending();
    assert_no_update(&harness.pump());

    harness.wm.ack_update(serial);
    assert_no_update(&harness.pump());

    let configures = harness.commit();
    harness.ack_all(&configures);

    // The transaction committed; the deferred update goes out at once
    let events = harness.wm.take_events();
    assert_eq!(assert_single_update(&events), serial + 1);
}

#[test]
fn stale_ack_is_ignored() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);

    let events = harness.pump();
    let serial = assert_single_update(&events);

    harness.wm.ack_update(serial + 5);
    assert_eq!(harness.wm.state, WmState::UpdateSent { serial });
    assert_eq!(
        harness.wm.request(Request::Commit),
        Err(ProtocolError::UnexpectedCommit)
    );

    harness.wm.ack_update(serial);
    assert_eq!(harness.wm.state, WmState::UpdateAcked);
}

#[test]
fn duplicate_ack_is_ignored() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);
    let serial = harness.sync();

    // Second ack of the same serial changes nothing
    harness.wm.ack_update(serial);
    assert_eq!(harness.wm.state, WmState::UpdateAcked);

    let configures = harness.commit();
    harness.ack_all(&configures);
    assert_eq!(harness.wm.state, WmState::Idle);
}

#[test]
fn commit_without_ack_rejected() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);

    // Idle: no update outstanding at all
    assert_eq!(harness.wm.commit(), Err(ProtocolError::UnexpectedCommit));

    harness.pump();
    // Update sent but not acked
    assert_eq!(harness.wm.commit(), Err(ProtocolError::UnexpectedCommit));
}

#[test]
fn updates_suspended_until_bound() {
    let mut harness = TestWm::new();
    harness.add_mapped_window(640, 480);

    // No client: the dirtiness is retained, nothing is emitted
    assert!(harness.pump().is_empty());
    assert!(harness.wm.pending_dirty);

    assert_eq!(harness.wm.bind(), BindResult::Bound);
    assert_single_update(&harness.pump());
}

#[test]
fn stop_finishes_and_unbinds() {
    let (mut harness, _) = settled_windows(1);

    assert_eq!(harness.wm.request(Request::Destroy), Err(ProtocolError::DestroyWhileBound));

    harness.wm.request(Request::Stop).unwrap();
    let events = harness.wm.take_events();
    assert!(events.contains(&Event::Finished));
    assert!(!harness.wm.is_bound());

    // Once stopped, destroying the manager object is allowed
    harness.wm.request(Request::Destroy).unwrap();
}

#[test]
fn stop_mid_cycle_resets_for_the_next_session() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);
    harness.pump();
    assert!(matches!(harness.wm.state, WmState::UpdateSent { .. }));

    harness.wm.request(Request::Stop).unwrap();
    // The abandoned cycle must not wedge the machine; its state stays
    // pending for the next session
    assert_eq!(harness.wm.state, WmState::Idle);
    assert!(harness.wm.pending_dirty);

    assert_eq!(harness.wm.bind(), BindResult::Bound);
    let events = harness.pump();
    assert_eq!(assert_single_update(&events), 2);
}

#[test]
fn stop_after_ack_discards_the_acked_update() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);
    harness.sync();

    harness.wm.request(Request::Stop).unwrap();
    // No later connection may commit on the dead session's ack
    assert_eq!(harness.wm.commit(), Err(ProtocolError::UnexpectedCommit));
}

#[test]
fn serials_increase_across_cycles() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);
    harness.settle();

    harness.wm.dirty_pending();
    let events = harness.pump();
    assert_eq!(assert_single_update(&events), 2);
}
