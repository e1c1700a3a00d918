//! Common assertions over engine state and event streams

use wm::node::NodeId;
use wm::protocol::Event;
use wm::scene::SceneNodeId;
use wm::wm::{WindowManager, WmState};

/// Find the update event in a batch, returning its serial and render list
pub fn find_update(events: &[Event]) -> Option<(u32, Vec<NodeId>)> {
    events.iter().find_map(|event| match event {
        Event::Update {
            serial, render_list, ..
        } => Some((*serial, render_list.clone())),
        _ => None,
    })
}

/// Assert the batch carries exactly one update event and return its serial
pub fn assert_single_update(events: &[Event]) -> u32 {
    let updates: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, Event::Update { .. }))
        .collect();
    assert_eq!(updates.len(), 1, "expected exactly one update, got {updates:?}");
    find_update(events).unwrap().0
}

/// Assert no update event is present in the batch
pub fn assert_no_update(events: &[Event]) {
    assert!(
        !events.iter().any(|event| matches!(event, Event::Update { .. })),
        "unexpected update in {events:?}"
    );
}

pub fn assert_idle(wm: &WindowManager) {
    assert_eq!(wm.state, WmState::Idle, "engine not idle");
}

/// Assert all three render lists agree, as they must between transactions
pub fn assert_lists_converged(wm: &WindowManager) {
    assert_eq!(wm.committed, wm.uncommitted, "committed diverges from uncommitted");
    assert_eq!(wm.inflight, wm.committed, "inflight diverges from committed");
}

/// The applied paint order: scene children of the render layer, bottom first
pub fn applied_order(wm: &WindowManager, any_tree: SceneNodeId) -> Vec<SceneNodeId> {
    let layer = wm
        .scene
        .node(any_tree)
        .expect("tree node exists")
        .parent
        .expect("window trees hang off the render layer");
    wm.scene.node(layer).expect("layer exists").children.clone()
}
