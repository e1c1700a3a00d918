//! Arena scene graph with node attribution
//!
//! A minimal scene tree: nodes with a parent, ordered children (paint order,
//! first child paints bottom-most), a position, and an enabled flag. Any node
//! may carry attribution data naming the domain object that owns it; lookup
//! walks the ancestor chain so surfaces can attribute a whole subtree by
//! tagging its root.
//!
//! Nodes are addressed by stable ids into an arena rather than by pointers,
//! so destroying a subtree atomically clears every attribution record in it
//! and no dangling attribution is observable afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::shell_surface::ShellSurfaceId;
use crate::window::WindowId;

/// Unique identifier for a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneNodeId(pub u32);

/// Domain object owning a scene node (or subtree)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeData {
    Window(WindowId),
    ShellSurface(ShellSurfaceId),
}

/// A single node in the scene tree
#[derive(Debug)]
pub struct SceneNode {
    /// Parent node; `None` only for the root
    pub parent: Option<SceneNodeId>,

    /// Children in paint order (first = bottom-most)
    pub children: Vec<SceneNodeId>,

    /// Position relative to the parent
    pub position: (i32, i32),

    /// Whether this node (and transitively its subtree) is rendered
    pub enabled: bool,

    /// Attribution back to the owning domain object, if any
    pub data: Option<NodeData>,
}

/// Arena-backed scene tree
pub struct SceneTree {
    nodes: HashMap<SceneNodeId, SceneNode>,
    next_id: u32,
    root: SceneNodeId,
}

impl SceneTree {
    pub fn new() -> Self {
        let root = SceneNodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            SceneNode {
                parent: None,
                children: Vec::new(),
                position: (0, 0),
                enabled: true,
                data: None,
            },
        );
        Self { nodes, next_id: 1, root }
    }

    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    /// Create a new node as the top-most child of `parent`.
    ///
    /// New nodes start disabled: they become visible only when their owner's
    /// state is applied by a committed transaction.
    pub fn create_node(&mut self, parent: SceneNodeId) -> SceneNodeId {
        assert!(self.nodes.contains_key(&parent), "parent node does not exist");
        let id = SceneNodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                parent: Some(parent),
                children: Vec::new(),
                position: (0, 0),
                enabled: false,
                data: None,
            },
        );
        self.nodes.get_mut(&parent).unwrap().children.push(id);
        id
    }

    pub fn node(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: SceneNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Attach attribution data to a node
    pub fn attach_data(&mut self, id: SceneNodeId, data: NodeData) {
        let node = self.nodes.get_mut(&id).expect("attach_data on missing node");
        node.data = Some(data);
    }

    /// Resolve a node to its owning domain object by walking ancestors.
    ///
    /// Returns the nearest attributed node at or above `id`, or `None` if the
    /// walk reaches the root without finding attribution.
    pub fn data_from_node(&self, id: SceneNodeId) -> Option<NodeData> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(&node_id)?;
            if let Some(data) = node.data {
                return Some(data);
            }
            current = node.parent;
        }
        None
    }

    pub fn set_position(&mut self, id: SceneNodeId, x: i32, y: i32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = (x, y);
        }
    }

    pub fn set_enabled(&mut self, id: SceneNodeId, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.enabled = enabled;
        }
    }

    /// Whether a node is rendered: it and every ancestor must be enabled
    pub fn effective_enabled(&self, id: SceneNodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(&node_id) {
                Some(node) if node.enabled => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Reorder the children of `parent` to match `order`.
    ///
    /// Ids in `order` must all be children of `parent`; children not named
    /// keep their relative order below the reordered ones.
    pub fn restack_children(&mut self, parent: SceneNodeId, order: &[SceneNodeId]) {
        let Some(node) = self.nodes.get_mut(&parent) else {
            return;
        };
        debug_assert!(
            order.iter().all(|id| node.children.contains(id)),
            "restack order names a non-child node"
        );
        node.children.retain(|id| !order.contains(id));
        node.children.extend_from_slice(order);
    }

    /// Destroy a node and its entire subtree.
    ///
    /// Attribution records die with their nodes, so no lookup can return a
    /// destroyed owner afterwards. The root cannot be destroyed.
    pub fn destroy_node(&mut self, id: SceneNodeId) {
        assert_ne!(id, self.root, "cannot destroy the scene root");
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }

        let mut stack = vec![id];
        let mut destroyed = 0usize;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
                destroyed += 1;
            }
        }
        tracing::trace!(node = id.0, destroyed, "scene subtree destroyed");
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}
