//! Render-list reordering and the commit gate between a client's requested
//! order and what the scene actually paints.

use test_harness::assertions::applied_order;
use test_harness::fixtures::{mixed_stack, settled_windows};
use wm::protocol::Request;

#[test]
fn placement_applies_only_at_commit() {
    let (mut harness, windows) = settled_windows(2);
    let (id_a, node_a) = windows[0];
    let (id_b, node_b) = windows[1];
    let tree_a = harness.wm.windows[&id_a].tree;
    let tree_b = harness.wm.windows[&id_b].tree;

    // Bottom first: b was created last, so it sits below a
    assert_eq!(harness.wm.uncommitted, vec![node_b, node_a]);
    assert_eq!(applied_order(&harness.wm, tree_a), vec![tree_b, tree_a]);

    harness.wm.dirty_pending();
    harness.sync();
    harness.wm.request(Request::PlaceTop { node: node_b }).unwrap();

    // Requested but not committed: the scene still paints the old order
    assert_eq!(harness.wm.uncommitted, vec![node_a, node_b]);
    assert_eq!(applied_order(&harness.wm, tree_a), vec![tree_b, tree_a]);

    let configures = harness.commit();
    assert!(configures.is_empty());
    assert_eq!(applied_order(&harness.wm, tree_a), vec![tree_a, tree_b]);
    assert_eq!(harness.wm.inflight, vec![node_a, node_b]);
}

#[test]
fn place_above_and_below_anchor_correctly() {
    let (mut harness, windows) = settled_windows(3);
    let (_, node_a) = windows[0];
    let (_, node_b) = windows[1];
    let (_, node_c) = windows[2];
    assert_eq!(harness.wm.uncommitted, vec![node_c, node_b, node_a]);

    harness.wm.dirty_pending();
    harness.sync();

    harness
        .wm
        .request(Request::PlaceAbove { node: node_c, other: node_b })
        .unwrap();
    assert_eq!(harness.wm.uncommitted, vec![node_b, node_c, node_a]);

    harness
        .wm
        .request(Request::PlaceBelow { node: node_a, other: node_b })
        .unwrap();
    assert_eq!(harness.wm.uncommitted, vec![node_a, node_b, node_c]);

    harness
        .wm
        .request(Request::PlaceBottom { node: node_c })
        .unwrap();
    assert_eq!(harness.wm.uncommitted, vec![node_c, node_a, node_b]);
}

#[test]
fn self_and_missing_anchors_are_noops() {
    let (mut harness, windows) = settled_windows(2);
    let (id_a, node_a) = windows[0];
    let (_, node_b) = windows[1];

    harness.wm.place_above(node_b, node_b);
    assert_eq!(harness.wm.uncommitted, vec![node_b, node_a]);

    harness.wm.destroy_window(id_a).unwrap();
    harness.wm.place_above(node_b, node_a);
    assert_eq!(harness.wm.uncommitted, vec![node_b]);
}

#[test]
fn shell_surface_handle_created_on_request() {
    let (mut harness, [_, (_, node_b)], surface_node) = mixed_stack();
    let surface = match harness.wm.scene.data_from_node(
        harness
            .wm
            .shell_surfaces
            .values()
            .next()
            .expect("fixture created one surface")
            .tree,
    ) {
        Some(wm::scene::NodeData::ShellSurface(id)) => id,
        other => panic!("surface tree misattributed: {other:?}"),
    };

    // No handle yet: placement requests on the surface node are an error
    assert!(harness
        .wm
        .request(Request::PlaceTop { node: surface_node })
        .is_err());

    harness.wm.request(Request::GetShellSurface { surface }).unwrap();
    harness.wm.request(Request::PlaceTop { node: surface_node }).unwrap();
    assert_eq!(*harness.wm.uncommitted.last().unwrap(), surface_node);

    // node_b untouched below it
    assert!(harness.wm.uncommitted.contains(&node_b));
}

#[test]
fn requests_on_inert_handles_are_discarded() {
    let (mut harness, windows) = settled_windows(2);
    let (_, node_a) = windows[0];
    let (_, node_b) = windows[1];

    harness.wm.request(Request::Stop).unwrap();

    // The dead session's handles discard silently rather than erroring
    harness.wm.request(Request::PlaceTop { node: node_b }).unwrap();
    assert_eq!(harness.wm.uncommitted, vec![node_b, node_a]);
}

#[test]
fn rebound_session_gets_fresh_handles() {
    let (mut harness, windows) = settled_windows(2);
    let (_, node_a) = windows[0];
    let (_, node_b) = windows[1];

    harness.wm.client_disconnected();
    harness.wm.bind();
    harness.sync();

    // The new session's handles are live again
    harness.wm.request(Request::PlaceTop { node: node_b }).unwrap();
    assert_eq!(harness.wm.uncommitted, vec![node_a, node_b]);
}
