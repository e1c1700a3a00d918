//! Window-manager-visible shell surfaces
//!
//! A shell surface (layer-shell panel, lock surface, and the like) occupies a
//! slot in the render list exactly like a window, but has no tiling
//! semantics: the window-manager client may position and stack it, and there
//! is no size negotiation, so it never participates in the configure
//! handshake. Its position still moves through the same four phases so the
//! whole scene updates atomically.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::scene::SceneNodeId;

/// Unique identifier for a shell surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShellSurfaceId(pub u32);

/// One phase's snapshot of a shell surface's position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSurfaceState {
    pub x: i32,
    pub y: i32,
}

/// A non-tiled surface participating in the render list
#[derive(Debug)]
pub struct ShellSurface {
    pub id: ShellSurfaceId,

    /// The render-list node anchoring this surface's z-order
    pub node: NodeId,

    /// Root scene node of this surface's tree
    pub tree: SceneNodeId,

    pub mapped: bool,

    pub pending: ShellSurfaceState,
    pub uncommitted: ShellSurfaceState,
    pub committed: ShellSurfaceState,
    pub inflight: ShellSurfaceState,
}

impl ShellSurface {
    pub fn new(id: ShellSurfaceId, node: NodeId, tree: SceneNodeId) -> Self {
        Self {
            id,
            node,
            tree,
            mapped: false,
            pending: ShellSurfaceState::default(),
            uncommitted: ShellSurfaceState::default(),
            committed: ShellSurfaceState::default(),
            inflight: ShellSurfaceState::default(),
        }
    }
}

/// Wire-visible snapshot of a shell surface's pending state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSurfaceSnapshot {
    pub surface: ShellSurfaceId,
    pub node: NodeId,
    pub state: ShellSurfaceState,
    pub mapped: bool,
}
