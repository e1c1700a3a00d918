//! The commit half of the protocol: configure dispatch, atomic application,
//! the ack timeout, and destruction racing an inflight transaction.

use test_harness::assertions::{assert_lists_converged, assert_single_update};
use test_harness::fixtures::{settled_windows, TEST_HEIGHT, TEST_WIDTH};
use test_harness::harness::TEST_TIMEOUT;
use test_harness::TestWm;
use wm::wm::{TimerRequest, WmState};

#[test]
fn zero_configure_commit_is_immediate() {
    let mut harness = TestWm::bound();
    harness.sync();

    let configures = harness.commit();
    assert!(configures.is_empty());
    assert_eq!(harness.wm.state, WmState::Idle);
    // The timer was never armed
    assert_eq!(harness.wm.timer_request, None);
}

#[test]
fn configure_carries_committed_state() {
    let mut harness = TestWm::bound();
    let (id, _) = harness.add_mapped_window(800, 600);
    harness.sync();

    let configures = harness.commit();
    assert_eq!(configures.len(), 1);
    assert_eq!(configures[0].window, id);
    assert_eq!(configures[0].state.width, 800);
    assert_eq!(configures[0].state.height, 600);

    assert_eq!(harness.wm.state, WmState::ConfiguresInflight { remaining: 1 });
    assert_eq!(harness.wm.timer_request, Some(TimerRequest::Arm(TEST_TIMEOUT)));

    // The old buffer is held until the transaction commits
    let window = &harness.wm.windows[&id];
    assert!(window.saved_buffer);
    assert!(window.frame_done_pending);

    harness.ack_all(&configures);
    let window = &harness.wm.windows[&id];
    assert!(!window.saved_buffer);
    assert_eq!(window.inflight.width, 800);
}

#[test]
fn nothing_applies_before_the_last_ack() {
    let mut harness = TestWm::bound();
    let (id_a, _) = harness.add_mapped_window(640, 480);
    let (id_b, _) = harness.add_mapped_window(800, 600);
    let tree_a = harness.wm.windows[&id_a].tree;
    let tree_b = harness.wm.windows[&id_b].tree;
    harness.sync();

    let configures = harness.commit();
    assert_eq!(configures.len(), 2);

    // First ack alone must not make anything visible
    harness.wm.ack_configure(configures[0].window, configures[0].serial);
    assert_eq!(harness.wm.state, WmState::ConfiguresInflight { remaining: 1 });
    assert!(!harness.wm.scene.node(tree_a).unwrap().enabled);
    assert!(!harness.wm.scene.node(tree_b).unwrap().enabled);
    assert!(harness.wm.inflight.is_empty());

    harness.wm.ack_configure(configures[1].window, configures[1].serial);
    assert_eq!(harness.wm.state, WmState::Idle);
    assert!(harness.wm.scene.node(tree_a).unwrap().enabled);
    assert!(harness.wm.scene.node(tree_b).unwrap().enabled);
    assert_lists_converged(&harness.wm);
}

#[test]
fn timeout_commits_with_missing_acks() {
    let mut harness = TestWm::bound();
    let (id_a, _) = harness.add_mapped_window(640, 480);
    let (id_b, _) = harness.add_mapped_window(800, 600);
    harness.sync();

    let configures = harness.commit();
    harness.wm.ack_configure(configures[0].window, configures[0].serial);

    harness.wm.handle_configure_timeout();
    assert_eq!(harness.wm.state, WmState::Idle);
    assert_lists_converged(&harness.wm);
    assert_eq!(harness.wm.windows[&id_a].inflight.width, 640);
    assert_eq!(harness.wm.windows[&id_b].inflight.width, 800);

    // The straggler's ack arrives after the forced commit and is ignored
    let late = configures[1];
    harness.wm.ack_configure(late.window, late.serial);
    assert_eq!(harness.wm.state, WmState::Idle);
}

#[test]
fn timer_firing_after_commit_is_harmless() {
    let (mut harness, _) = settled_windows(1);

    // The loop's timer callback raced a transaction that already finished
    harness.wm.handle_configure_timeout();
    assert_eq!(harness.wm.state, WmState::Idle);
}

#[test]
fn timer_disarmed_after_final_ack() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(640, 480);
    harness.sync();

    let configures = harness.commit();
    assert_eq!(harness.wm.timer_request.take(), Some(TimerRequest::Arm(TEST_TIMEOUT)));

    harness.ack_all(&configures);
    assert_eq!(harness.wm.timer_request, Some(TimerRequest::Disarm));
}

#[test]
fn unmapped_window_not_counted() {
    let mut harness = TestWm::bound();
    let (mapped, _) = harness.add_mapped_window(640, 480);
    let unmapped = harness.wm.create_window();
    harness.wm.windows.get_mut(&unmapped).unwrap().uncommitted.width = 300;
    let tree = harness.wm.windows[&unmapped].tree;
    harness.sync();

    // Only the mapped window is owed a configure; the other is skipped
    // without inflating the expected-ack total.
    let configures = harness.commit();
    assert_eq!(configures.len(), 1);
    assert_eq!(configures[0].window, mapped);

    harness.ack_all(&configures);
    assert_eq!(harness.wm.state, WmState::Idle);
    assert!(!harness.wm.scene.node(tree).unwrap().enabled);
}

#[test]
fn unchanged_state_needs_no_configure() {
    let (mut harness, windows) = settled_windows(1);
    let (id, node) = windows[0];

    // Position-only changes apply server-side
    harness.wm.dirty_pending();
    harness.sync();
    harness.wm.set_uncommitted_position(node, 50, 60);
    let configures = harness.commit();
    assert!(configures.is_empty());
    assert_eq!(harness.wm.state, WmState::Idle);
    let tree = harness.wm.windows[&id].tree;
    assert_eq!(harness.wm.scene.node(tree).unwrap().position, (50, 60));

    // A size change brings the handshake back
    harness.wm.dirty_pending();
    harness.sync();
    harness.wm.windows.get_mut(&id).unwrap().uncommitted.width = 1024;
    let configures = harness.commit();
    assert_eq!(configures.len(), 1);
    assert_eq!(configures[0].state.width, 1024);
    assert_eq!(configures[0].state.x, 50);
    harness.ack_all(&configures);
    assert_eq!(harness.wm.windows[&id].inflight.width, 1024);
}

#[test]
fn destroy_mid_transaction_is_deferred() {
    let mut harness = TestWm::bound();
    let (id_a, node_a) = harness.add_mapped_window(640, 480);
    let (id_b, node_b) = harness.add_mapped_window(800, 600);
    let tree_b = harness.wm.windows[&id_b].tree;
    harness.sync();

    let configures = harness.commit();
    assert_eq!(configures.len(), 2);

    // The dying window's own configure can never be acked; destroying it
    // settles that slot so the transaction is not held hostage.
    harness.wm.destroy_window(id_b).unwrap();
    assert_eq!(harness.wm.state, WmState::ConfiguresInflight { remaining: 1 });
    assert!(harness.wm.windows.contains_key(&id_b));
    assert!(harness.wm.nodes[&node_b].destroying);

    let ack = configures.iter().find(|c| c.window == id_a).unwrap();
    harness.wm.ack_configure(ack.window, ack.serial);

    // Transaction committed; the deferred destruction finalized with it
    assert_eq!(harness.wm.state, WmState::Idle);
    assert!(!harness.wm.windows.contains_key(&id_b));
    assert!(!harness.wm.nodes.contains_key(&node_b));
    assert!(!harness.wm.scene.contains(tree_b));
    assert_eq!(harness.wm.inflight, vec![node_a]);
    assert_eq!(harness.wm.uncommitted, vec![node_a]);
}

#[test]
fn destroy_while_idle_is_immediate() {
    let (mut harness, windows) = settled_windows(2);
    let (id_a, node_a) = windows[0];
    let (_, node_b) = windows[1];

    harness.wm.destroy_window(id_a).unwrap();
    assert!(!harness.wm.windows.contains_key(&id_a));
    assert!(!harness.wm.nodes.contains_key(&node_a));
    assert_eq!(harness.wm.uncommitted, vec![node_b]);
    assert_eq!(harness.wm.committed, vec![node_b]);
    assert_eq!(harness.wm.inflight, vec![node_b]);
}

#[test]
fn disconnect_mid_transaction_runs_to_completion() {
    let mut harness = TestWm::bound();
    let (id, _) = harness.add_mapped_window(640, 480);
    harness.sync();
    let configures = harness.commit();

    harness.wm.client_disconnected();
    assert!(!harness.wm.is_bound());
    assert_eq!(harness.wm.state, WmState::ConfiguresInflight { remaining: 1 });

    // The application side still answers; the transaction lands normally
    harness.ack_all(&configures);
    assert_eq!(harness.wm.state, WmState::Idle);
    assert_eq!(harness.wm.windows[&id].inflight.width, 640);
    // But nothing was emitted to the dead client
    assert!(harness.wm.take_events().is_empty());

    // A fresh session starts from a full-state update
    assert_eq!(harness.wm.bind(), wm::wm::BindResult::Bound);
    assert_single_update(&harness.pump());
}

#[test]
fn disconnect_with_update_outstanding_resets_cycle() {
    let mut harness = TestWm::bound();
    harness.add_mapped_window(TEST_WIDTH, TEST_HEIGHT);
    harness.pump();
    assert!(matches!(harness.wm.state, WmState::UpdateSent { .. }));

    harness.wm.client_disconnected();
    assert_eq!(harness.wm.state, WmState::Idle);
    assert!(harness.wm.pending_dirty);

    assert_eq!(harness.wm.bind(), wm::wm::BindResult::Bound);
    let events = harness.pump();
    assert_eq!(assert_single_update(&events), 2);
}
