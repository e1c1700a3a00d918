//! Engine wrapper that plays both protocol roles
//!
//! `TestWm` owns a `WindowManager` and drives it the way the event loop and
//! the wire layer would: `pump` is the idle-loop tick, `sync` acks the
//! resulting update, `commit` latches and collects the configures owed to
//! applications, `ack_all` answers them. Shortcuts panic when the engine is
//! not in the phase they expect, so a test failure points at the step that
//! went wrong rather than at a later assertion.

use std::time::Duration;

use wm::node::NodeId;
use wm::protocol::{Configure, Event, Request};
use wm::shell_surface::ShellSurfaceId;
use wm::window::WindowId;
use wm::wm::{BindResult, WindowManager};

/// Default transaction timeout used by every harness engine
pub const TEST_TIMEOUT: Duration = Duration::from_millis(100);

pub struct TestWm {
    pub wm: WindowManager,
}

impl TestWm {
    /// An engine with no client bound
    pub fn new() -> Self {
        Self {
            wm: WindowManager::new(TEST_TIMEOUT),
        }
    }

    /// An engine with the window-manager client already bound.
    ///
    /// The initial-state update the bind triggers is left queued; the first
    /// `pump` or `sync` delivers it.
    pub fn bound() -> Self {
        let mut harness = Self::new();
        assert_eq!(harness.wm.bind(), BindResult::Bound);
        harness
    }

    /// Create a mapped window with the given pending and uncommitted size.
    ///
    /// Goes through the engine API the way the surface layer would; the
    /// window stays invisible until a transaction applies it.
    pub fn add_mapped_window(&mut self, width: u32, height: u32) -> (WindowId, NodeId) {
        let id = self.wm.create_window();
        let window = self.wm.windows.get_mut(&id).expect("window just created");
        window.pending.width = width;
        window.pending.height = height;
        window.uncommitted = window.pending;
        let node = window.node;
        self.wm.set_window_mapped(id, true).expect("window exists");
        (id, node)
    }

    /// Create a mapped shell surface at the given position
    pub fn add_mapped_shell_surface(&mut self, x: i32, y: i32) -> (ShellSurfaceId, NodeId) {
        let id = self.wm.create_shell_surface();
        let surface = self
            .wm
            .shell_surfaces
            .get_mut(&id)
            .expect("shell surface just created");
        surface.pending.x = x;
        surface.pending.y = y;
        surface.uncommitted = surface.pending;
        let node = surface.node;
        self.wm
            .set_shell_surface_mapped(id, true)
            .expect("shell surface exists");
        (id, node)
    }

    /// One idle-loop tick: flush a pending update and drain queued events
    pub fn pump(&mut self) -> Vec<Event> {
        self.wm.flush_updates();
        self.wm.take_events()
    }

    /// Pump and ack the update this produces. Panics if no update went out.
    pub fn sync(&mut self) -> u32 {
        let events = self.pump();
        let serial = crate::assertions::find_update(&events)
            .expect("sync expected an update event")
            .0;
        self.wm.ack_update(serial);
        serial
    }

    /// Commit the acked update and collect the configures owed to
    /// applications. Panics on a protocol error, so tests probing
    /// `UnexpectedCommit` call `wm.commit()` themselves.
    pub fn commit(&mut self) -> Vec<Configure> {
        self.wm.request(Request::Commit).expect("commit accepted");
        self.wm.pending_configures.drain(..).collect()
    }

    /// Answer every configure the way a well-behaved application would
    pub fn ack_all(&mut self, configures: &[Configure]) {
        for configure in configures {
            self.wm.ack_configure(configure.window, configure.serial);
        }
    }

    /// Run one full cycle to completion: sync, commit, ack every configure.
    /// Returns the events the cycle's update batch carried.
    pub fn settle(&mut self) -> Vec<Event> {
        let events = self.pump();
        let serial = crate::assertions::find_update(&events)
            .expect("settle expected an update event")
            .0;
        self.wm.ack_update(serial);
        let configures = self.commit();
        self.ack_all(&configures);
        events
    }
}

impl Default for TestWm {
    fn default() -> Self {
        Self::new()
    }
}
