//! Per-toplevel window state
//!
//! A `Window` keeps four snapshots of its geometry and activation state, one
//! per protocol phase:
//!
//! - `pending`: mutated by server-side collaborators (input, app commits);
//!   serialized into the next update event sent to the window-manager client
//! - `uncommitted`: the client's proposed state, mutated only by client
//!   requests
//! - `committed`: latched from `uncommitted` when the client commits
//! - `inflight`: the state most recently applied to the scene graph
//!
//! A configure is owed to the window's own application whenever `committed`
//! differs from `inflight` in a way the application must react to (size,
//! activation, fullscreen). Position is applied server-side and never needs a
//! configure.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::scene::SceneNodeId;

/// Unique identifier for a managed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u32);

/// One phase's snapshot of a window's target state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub activated: bool,
    pub fullscreen: bool,
}

/// A toplevel window participating in the transaction protocol
#[derive(Debug)]
pub struct Window {
    pub id: WindowId,

    /// The render-list node anchoring this window's z-order
    pub node: NodeId,

    /// Root scene node of this window's surface tree
    pub tree: SceneNodeId,

    /// Whether the window currently has a mapped surface.
    /// Unmapped windows are skipped by configure dispatch without being
    /// counted against the expected-ack total.
    pub mapped: bool,

    pub pending: WindowState,
    pub uncommitted: WindowState,
    pub committed: WindowState,
    pub inflight: WindowState,

    /// Serial of the configure this window has not yet acked, if any.
    /// Doubles as the "part of the inflight transaction" marker.
    pub configure_serial: Option<u32>,

    /// The previous surface tree is held while a configure is outstanding so
    /// the transition lands tear-free once the whole transaction commits.
    pub saved_buffer: bool,

    /// A frame-done notification is owed to the application, set alongside
    /// each configure and consumed by the render collaborator.
    pub frame_done_pending: bool,
}

impl Window {
    pub fn new(id: WindowId, node: NodeId, tree: SceneNodeId) -> Self {
        Self {
            id,
            node,
            tree,
            mapped: false,
            pending: WindowState::default(),
            uncommitted: WindowState::default(),
            committed: WindowState::default(),
            inflight: WindowState::default(),
            configure_serial: None,
            saved_buffer: false,
            frame_done_pending: false,
        }
    }

    /// Whether the committed state requires the application to reconfigure.
    ///
    /// Position changes are applied server-side and excluded here.
    pub fn needs_configure(&self) -> bool {
        self.committed.width != self.inflight.width
            || self.committed.height != self.inflight.height
            || self.committed.activated != self.inflight.activated
            || self.committed.fullscreen != self.inflight.fullscreen
    }
}

/// Wire-visible snapshot of a window's pending state, carried in updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window: WindowId,
    pub node: NodeId,
    pub state: WindowState,
    pub mapped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(WindowId(0), NodeId(0), SceneNodeId(1))
    }

    #[test]
    fn fresh_window_needs_no_configure() {
        assert!(!window().needs_configure());
    }

    #[test]
    fn size_change_needs_configure() {
        let mut w = window();
        w.committed.width = 640;
        w.committed.height = 480;
        assert!(w.needs_configure());
    }

    #[test]
    fn position_change_alone_needs_no_configure() {
        let mut w = window();
        w.committed.x = 100;
        w.committed.y = 200;
        assert!(!w.needs_configure());
    }

    #[test]
    fn activation_change_needs_configure() {
        let mut w = window();
        w.committed.activated = true;
        assert!(w.needs_configure());
    }
}
