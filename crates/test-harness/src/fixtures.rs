//! Canned engine setups for common test scenarios

use wm::node::NodeId;
use wm::window::WindowId;

use crate::TestWm;

/// Standard window size used by fixtures
pub const TEST_WIDTH: u32 = 640;
pub const TEST_HEIGHT: u32 = 480;

/// A bound engine with no windows, initial update still queued
pub fn bound_wm() -> TestWm {
    TestWm::bound()
}

/// A bound engine with `count` mapped windows, fully settled.
///
/// Returns the windows in creation order; note the render lists hold them in
/// reverse, since each new node joins the bottom of the stack.
pub fn settled_windows(count: usize) -> (TestWm, Vec<(WindowId, NodeId)>) {
    let mut harness = TestWm::bound();
    let windows: Vec<_> = (0..count)
        .map(|_| harness.add_mapped_window(TEST_WIDTH, TEST_HEIGHT))
        .collect();
    harness.settle();
    (harness, windows)
}

/// A settled engine with two windows and one shell surface.
///
/// Creation order window a, window b, shell surface; render lists bottom
/// first hold them as [surface, b, a].
pub fn mixed_stack() -> (TestWm, [(WindowId, NodeId); 2], NodeId) {
    let mut harness = TestWm::bound();
    let a = harness.add_mapped_window(TEST_WIDTH, TEST_HEIGHT);
    let b = harness.add_mapped_window(TEST_WIDTH, TEST_HEIGHT);
    let (_, surface_node) = harness.add_mapped_shell_surface(10, 20);
    harness.settle();
    (harness, [a, b], surface_node)
}
