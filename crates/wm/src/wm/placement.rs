//! Uncommitted render-list reordering
//!
//! Placement requests from the window-manager client mutate only the
//! uncommitted phase; they become visible when a later commit latches the
//! list and the resulting transaction is applied. The list is ordered
//! bottom-first: index 0 paints lowest.
//!
//! Requests naming nodes that no longer exist in the list are tolerated as
//! no-ops; the client may legitimately race a destruction it has not yet
//! observed.

use crate::node::{NodeId, NodeOwner};

use super::WindowManager;

impl WindowManager {
    fn uncommitted_index(&self, node: NodeId) -> Option<usize> {
        self.uncommitted.iter().position(|n| *n == node)
    }

    /// Move a node to the top of the uncommitted render list
    pub fn place_top(&mut self, node: NodeId) {
        if let Some(index) = self.uncommitted_index(node) {
            let entry = self.uncommitted.remove(index);
            self.uncommitted.push(entry);
        }
    }

    /// Move a node to the bottom of the uncommitted render list
    pub fn place_bottom(&mut self, node: NodeId) {
        if let Some(index) = self.uncommitted_index(node) {
            let entry = self.uncommitted.remove(index);
            self.uncommitted.insert(0, entry);
        }
    }

    /// Place `node` directly above `other`; self-referential requests are
    /// no-ops and the order is left unchanged.
    pub fn place_above(&mut self, node: NodeId, other: NodeId) {
        if node == other {
            return;
        }
        if self.uncommitted_index(node).is_none() || self.uncommitted_index(other).is_none() {
            return;
        }
        let index = self.uncommitted_index(node).unwrap();
        let entry = self.uncommitted.remove(index);
        let anchor = self.uncommitted_index(other).unwrap();
        self.uncommitted.insert(anchor + 1, entry);
    }

    /// Place `node` directly below `other`; self-referential requests are
    /// no-ops and the order is left unchanged.
    pub fn place_below(&mut self, node: NodeId, other: NodeId) {
        if node == other {
            return;
        }
        if self.uncommitted_index(node).is_none() || self.uncommitted_index(other).is_none() {
            return;
        }
        let index = self.uncommitted_index(node).unwrap();
        let entry = self.uncommitted.remove(index);
        let anchor = self.uncommitted_index(other).unwrap();
        self.uncommitted.insert(anchor, entry);
    }

    /// Set a node's uncommitted position via its owner
    pub fn set_uncommitted_position(&mut self, node: NodeId, x: i32, y: i32) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        match entry.owner {
            NodeOwner::Window(id) => {
                if let Some(window) = self.windows.get_mut(&id) {
                    window.uncommitted.x = x;
                    window.uncommitted.y = y;
                }
            }
            NodeOwner::ShellSurface(id) => {
                if let Some(surface) = self.shell_surfaces.get_mut(&id) {
                    surface.uncommitted.x = x;
                    surface.uncommitted.y = y;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::WindowManager;
    use crate::node::NodeId;

    /// Three windows; returns their node ids in creation order.
    /// Creation order means the newest sits at the bottom: [c, b, a].
    fn wm_with_three_nodes() -> (WindowManager, NodeId, NodeId, NodeId) {
        let mut wm = WindowManager::new(Duration::from_millis(100));
        let a = window_node(&mut wm);
        let b = window_node(&mut wm);
        let c = window_node(&mut wm);
        (wm, a, b, c)
    }

    fn window_node(wm: &mut WindowManager) -> NodeId {
        let id = wm.create_window();
        wm.windows[&id].node
    }

    #[test]
    fn new_nodes_join_the_bottom() {
        let (wm, a, b, c) = wm_with_three_nodes();
        assert_eq!(wm.uncommitted, vec![c, b, a]);
    }

    #[test]
    fn place_top_moves_to_end() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        wm.place_top(c);
        assert_eq!(wm.uncommitted, vec![b, a, c]);
    }

    #[test]
    fn place_bottom_moves_to_front() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        wm.place_bottom(a);
        assert_eq!(wm.uncommitted, vec![a, c, b]);
    }

    #[test]
    fn place_above_lands_directly_above_anchor() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        // [c, b, a] -> move c above a
        wm.place_above(c, a);
        assert_eq!(wm.uncommitted, vec![b, a, c]);
    }

    #[test]
    fn place_below_lands_directly_below_anchor() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        // [c, b, a] -> move a below c
        wm.place_below(a, c);
        assert_eq!(wm.uncommitted, vec![a, c, b]);
    }

    #[test]
    fn self_referential_placement_is_noop() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        wm.place_above(b, b);
        wm.place_below(b, b);
        assert_eq!(wm.uncommitted, vec![c, b, a]);
    }

    #[test]
    fn placement_against_missing_anchor_is_noop() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        wm.place_above(a, NodeId(999));
        assert_eq!(wm.uncommitted, vec![c, b, a]);
    }

    #[test]
    fn placement_does_not_touch_other_phases() {
        let (mut wm, a, b, c) = wm_with_three_nodes();
        wm.place_top(c);
        assert!(wm.committed.is_empty());
        assert!(wm.inflight.is_empty());
        let _ = (a, b);
    }
}
