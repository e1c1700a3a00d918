//! Idle-inhibitor tracking
//!
//! Applications register inhibitors against their surface's scene node; the
//! session is considered idle-inhibited while at least one inhibitor's node
//! is actually rendered. Because visibility only changes when a transaction
//! commits, the effective flag is re-evaluated at that point rather than on
//! every surface event.

use std::collections::HashMap;

use crate::scene::{SceneNodeId, SceneTree};

/// Unique identifier for a registered inhibitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InhibitorId(pub u32);

/// Registry of idle inhibitors keyed by the scene node they watch
#[derive(Debug, Default)]
pub struct IdleInhibitors {
    inhibitors: HashMap<InhibitorId, SceneNodeId>,
    next_id: u32,
}

impl IdleInhibitors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNodeId) -> InhibitorId {
        let id = InhibitorId(self.next_id);
        self.next_id += 1;
        self.inhibitors.insert(id, node);
        tracing::debug!(inhibitor = id.0, node = node.0, "idle inhibitor registered");
        id
    }

    pub fn remove(&mut self, id: InhibitorId) {
        if self.inhibitors.remove(&id).is_some() {
            tracing::debug!(inhibitor = id.0, "idle inhibitor removed");
        }
    }

    /// Whether any inhibitor's node is currently rendered.
    ///
    /// Inhibitors whose node has been destroyed count as inactive; they are
    /// cleaned up lazily here rather than via destroy hooks.
    pub fn any_active(&mut self, scene: &SceneTree) -> bool {
        self.inhibitors.retain(|_, node| scene.contains(*node));
        self.inhibitors
            .values()
            .any(|node| scene.effective_enabled(*node))
    }
}
