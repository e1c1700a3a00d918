//! Render-list nodes
//!
//! A `WmNode` is the identity and z-order anchor for one renderable entity.
//! Exactly one concrete owner exists per node, expressed as a sum type rather
//! than a downcast. The node itself carries no ordering state: its position
//! in each of the three phase lists is held by the `WindowManager`, so a
//! node's place can differ across phases until they converge.
//!
//! The optional client handle goes through three states: no object yet, a
//! live object the window-manager client can issue placement requests on, and
//! inert (the live handle was withdrawn, requests are discarded). An inert
//! node remains visually present until its owner destroys it, and a node
//! destroyed while part of an inflight transaction is only finalized once
//! that transaction completes.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;
use crate::shell_surface::ShellSurfaceId;
use crate::window::WindowId;

/// Unique identifier for a render-list node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// The domain object a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOwner {
    Window(WindowId),
    ShellSurface(ShellSurfaceId),
}

/// Lifecycle of the client-facing handle for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// No client object has been created for this node
    None,
    /// A live object; placement requests are honored
    Bound,
    /// The handle was withdrawn; placement requests are silently discarded
    Inert,
}

/// Identity and client-handle state for one render-list entry
#[derive(Debug)]
pub struct WmNode {
    pub id: NodeId,
    pub owner: NodeOwner,
    pub object: ObjectState,

    /// Set when the owner is destroyed while the node is inflight; the node
    /// is finalized when the current transaction commits.
    pub destroying: bool,
}

impl WmNode {
    pub fn new(id: NodeId, owner: NodeOwner) -> Self {
        Self {
            id,
            owner,
            object: ObjectState::None,
            destroying: false,
        }
    }

    /// Create the client-facing object for this node.
    ///
    /// Errors if an object already exists; a node gets at most one live
    /// handle over its lifetime.
    pub fn create_object(&mut self) -> Result<(), ProtocolError> {
        match self.object {
            ObjectState::None => {
                self.object = ObjectState::Bound;
                Ok(())
            }
            ObjectState::Bound | ObjectState::Inert => Err(ProtocolError::ObjectExists(self.id)),
        }
    }

    /// Withdraw the client handle without touching list membership or owner
    /// state. Subsequent placement requests on this node are no-ops.
    pub fn make_inert(&mut self) {
        if self.object == ObjectState::Bound {
            self.object = ObjectState::Inert;
        }
    }

    /// A new window-manager session starts with a fresh handle slot; handles
    /// left inert by a previous session may be recreated.
    pub fn reset_session(&mut self) {
        if self.object == ObjectState::Inert {
            self.object = ObjectState::None;
        }
    }
}
