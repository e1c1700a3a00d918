//! The update/commit/configure transaction cycle
//!
//! One full cycle:
//!
//! 1. `flush_updates` (idle-loop tick): pending dirtiness becomes a single
//!    update event with a fresh serial; seat cells notify here.
//! 2. `ack_update`: the client acknowledges the current serial; stale
//!    serials are dropped silently.
//! 3. `commit`: uncommitted render-list order and per-object state latch
//!    into the committed phase, then configures go out.
//! 4. `ack_configure` / `handle_configure_timeout`: the outstanding-configure
//!    count reaches zero by acks or is forced there after the timeout.
//! 5. `commit_transaction`: committed state becomes inflight and is applied
//!    to the scene graph atomically; deferred destruction finalizes; the
//!    cycle restarts immediately if pending state dirtied meanwhile.
//!
//! No step blocks: progress suspends by returning to the event loop and
//! resumes on the next request, ack, or timer fire.

use crate::node::NodeOwner;
use crate::protocol::{Configure, Event, ProtocolError};
use crate::scene::SceneNodeId;
use crate::shell_surface::ShellSurfaceSnapshot;
use crate::window::WindowSnapshot;

use super::{TimerRequest, WindowManager, WmState};

impl WindowManager {
    /// Idle-loop tick: send one update if pending state is dirty, the client
    /// is bound, and no cycle is already outstanding.
    pub fn flush_updates(&mut self) {
        if !self.pending_dirty || !self.client_bound || self.state != WmState::Idle {
            return;
        }

        self.manage_start();
        self.bind_window_objects();

        self.update_serial = self.update_serial.wrapping_add(1);
        let serial = self.update_serial;

        let mut windows: Vec<WindowSnapshot> = self
            .windows
            .values()
            .map(|w| WindowSnapshot {
                window: w.id,
                node: w.node,
                state: w.pending,
                mapped: w.mapped,
            })
            .collect();
        windows.sort_by_key(|snapshot| snapshot.window.0);

        let mut shell_surfaces: Vec<ShellSurfaceSnapshot> = self
            .shell_surfaces
            .values()
            .map(|s| ShellSurfaceSnapshot {
                surface: s.id,
                node: s.node,
                state: s.pending,
                mapped: s.mapped,
            })
            .collect();
        shell_surfaces.sort_by_key(|snapshot| snapshot.surface.0);

        let render_list = self.uncommitted.clone();

        self.state = WmState::UpdateSent { serial };
        self.pending_dirty = false;
        self.send_event(Event::Update {
            serial,
            windows,
            shell_surfaces,
            render_list,
        });
        tracing::debug!(serial, "update sent");
    }

    /// Start of the manage cycle: every seat cell reports its diffs
    fn manage_start(&mut self) {
        let mut events = Vec::new();
        for seat in &mut self.seats {
            if let Some(focus) = seat.layer_shell.manage_start() {
                events.push(Event::LayerShellFocus { seat: seat.id, focus });
            }
            if let Some(ate) = seat.xkb_bindings.manage_start() {
                events.push(Event::UnboundKey { seat: seat.id, ate });
            }
            for binding in &mut seat.pointer_bindings {
                if let Some(change) = binding.manage_start() {
                    events.push(Event::PointerBindingState {
                        binding: binding.id,
                        change,
                    });
                }
            }
        }
        for event in events {
            self.send_event(event);
        }
    }

    /// Give every window node a live client handle before it first appears
    /// in an update. Shell surface handles are only created on request.
    fn bind_window_objects(&mut self) {
        let nodes: Vec<_> = self.windows.values().map(|w| w.node).collect();
        for node_id in nodes {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.object == crate::node::ObjectState::None && !node.destroying {
                    node.create_object().expect("object state checked");
                }
            }
        }
    }

    /// Client acknowledgement of an update. Only the serial of the current
    /// outstanding update has any effect; old serials are not tracked and
    /// anything else is dropped.
    pub fn ack_update(&mut self, serial: u32) {
        match self.state {
            WmState::UpdateSent { serial: sent } if serial == sent => {
                self.state = WmState::UpdateAcked;
                tracing::debug!(serial, "update acked");
            }
            _ => {
                tracing::debug!(serial, state = ?self.state, "stale update ack ignored");
            }
        }
    }

    /// Commit request: latch uncommitted state into the committed phase and
    /// dispatch configures. Only valid once the current update is acked.
    pub fn commit(&mut self) -> Result<(), ProtocolError> {
        if self.state != WmState::UpdateAcked {
            return Err(ProtocolError::UnexpectedCommit);
        }

        self.committed = self.uncommitted.clone();
        for window in self.windows.values_mut() {
            window.committed = window.uncommitted;
        }
        for surface in self.shell_surfaces.values_mut() {
            surface.committed = surface.uncommitted;
        }
        tracing::debug!(nodes = self.committed.len(), "commit latched");

        self.send_configures();
        Ok(())
    }

    /// Walk the committed render list and send a configure to every mapped
    /// window whose committed state its application has not yet seen.
    ///
    /// Unmapped windows are skipped without being counted, so the expected
    /// ack total matches the configures actually sent. If nothing needs a
    /// configure the transaction commits immediately; otherwise the timeout
    /// timer is armed.
    fn send_configures(&mut self) {
        let mut remaining = 0u32;
        for node_id in self.committed.clone() {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            let NodeOwner::Window(window_id) = node.owner else {
                continue;
            };
            let window = self
                .windows
                .get_mut(&window_id)
                .expect("committed list references a live window");
            assert!(
                window.configure_serial.is_none(),
                "window already part of an inflight transaction"
            );
            if !window.mapped {
                tracing::trace!(window = window_id.0, "unmapped window skipped");
                continue;
            }
            if !window.needs_configure() {
                continue;
            }

            self.configure_serial = self.configure_serial.wrapping_add(1);
            window.configure_serial = Some(self.configure_serial);
            window.saved_buffer = true;
            window.frame_done_pending = true;
            self.pending_configures.push(Configure {
                window: window_id,
                serial: self.configure_serial,
                state: window.committed,
            });
            remaining += 1;
        }

        if remaining == 0 {
            tracing::debug!("no configures required, committing immediately");
            self.commit_transaction();
        } else {
            self.state = WmState::ConfiguresInflight { remaining };
            self.timer_request = Some(TimerRequest::Arm(self.transaction_timeout));
            tracing::debug!(remaining, "configures dispatched");
        }
    }

    /// Surface-side acknowledgement of a configure.
    ///
    /// Matched against the window's outstanding configure serial: an ack for
    /// a window with nothing outstanding, or with a different serial, is
    /// ignored, so duplicate or stray acks can never drive the inflight
    /// count below zero.
    pub fn ack_configure(&mut self, window: crate::window::WindowId, serial: u32) {
        let Some(entry) = self.windows.get_mut(&window) else {
            tracing::debug!(window = window.0, serial, "configure ack for unknown window ignored");
            return;
        };
        if entry.configure_serial != Some(serial) {
            tracing::debug!(
                window = window.0,
                serial,
                outstanding = ?entry.configure_serial,
                "stale configure ack ignored"
            );
            return;
        }
        entry.configure_serial = None;
        self.configure_settled();
    }

    /// One outstanding configure has been resolved (acked, or its window
    /// destroyed). Commits the transaction when the count reaches zero.
    pub(crate) fn configure_settled(&mut self) {
        let WmState::ConfiguresInflight { remaining } = &mut self.state else {
            panic!("configure settled outside a transaction");
        };
        assert!(*remaining > 0, "inflight configure count underflow");
        *remaining -= 1;
        if *remaining == 0 {
            self.timer_request = Some(TimerRequest::Disarm);
            self.commit_transaction();
        }
    }

    /// The configure timeout fired: force the count to zero and commit with
    /// whatever acks arrived. A possibly imperfect frame is accepted in
    /// exchange for bounded waiting.
    pub fn handle_configure_timeout(&mut self) {
        let WmState::ConfiguresInflight { remaining } = self.state else {
            // The timer raced a transaction that already committed
            return;
        };
        tracing::info!(missing_acks = remaining, "configure timeout, committing anyway");
        for window in self.windows.values_mut() {
            window.configure_serial = None;
        }
        self.state = WmState::ConfiguresInflight { remaining: 0 };
        self.commit_transaction();
    }

    /// Atomically apply the committed phase to the scene graph.
    ///
    /// Precondition: no configures outstanding. This is the only place the
    /// inflight render list is mutated and the only place scene state
    /// changes, so nothing between configure dispatch and this point is
    /// observable on screen.
    fn commit_transaction(&mut self) {
        if let WmState::ConfiguresInflight { remaining } = self.state {
            assert_eq!(remaining, 0, "transaction committed with configures outstanding");
        }

        self.inflight = self.committed.clone();

        for node_id in self.inflight.clone() {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            match node.owner {
                NodeOwner::Window(id) => {
                    let window = self
                        .windows
                        .get_mut(&id)
                        .expect("inflight list references a live window");
                    window.inflight = window.committed;
                    window.saved_buffer = false;
                    // Stale after a timeout-forced commit; the late ack, if
                    // it ever arrives, must not count toward a future cycle.
                    window.configure_serial = None;
                    let (tree, mapped) = (window.tree, window.mapped);
                    let (x, y) = (window.inflight.x, window.inflight.y);
                    self.scene.set_position(tree, x, y);
                    self.scene.set_enabled(tree, mapped);
                }
                NodeOwner::ShellSurface(id) => {
                    let surface = self
                        .shell_surfaces
                        .get_mut(&id)
                        .expect("inflight list references a live shell surface");
                    surface.inflight = surface.committed;
                    let (tree, mapped) = (surface.tree, surface.mapped);
                    let (x, y) = (surface.inflight.x, surface.inflight.y);
                    self.scene.set_position(tree, x, y);
                    self.scene.set_enabled(tree, mapped);
                }
            }
        }

        // Paint order follows the inflight list (first entry bottom-most)
        let order: Vec<SceneNodeId> = self
            .inflight
            .iter()
            .filter_map(|node_id| self.nodes.get(node_id))
            .map(|node| match node.owner {
                NodeOwner::Window(id) => self.windows[&id].tree,
                NodeOwner::ShellSurface(id) => self.shell_surfaces[&id].tree,
            })
            .collect();
        self.scene.restack_children(self.layer, &order);

        // Finalize nodes whose owner died mid-transaction
        let doomed: Vec<_> = self
            .nodes
            .values()
            .filter(|node| node.destroying)
            .map(|node| node.id)
            .collect();
        for node_id in doomed {
            tracing::debug!(node = node_id.0, "finalizing deferred destruction");
            self.finalize_node(node_id);
        }

        // The scene changed under the cursor; input must re-evaluate hover
        for seat in &mut self.seats {
            seat.cursor_dirty = true;
        }

        self.idle_inhibited = self.idle_inhibitors.any_active(&self.scene);

        // End of the manage cycle: latch per-seat requested flags
        for seat in &mut self.seats {
            seat.xkb_bindings.manage_finish();
        }

        self.state = WmState::Idle;
        tracing::debug!(nodes = self.inflight.len(), "transaction committed");

        // Closed loop: if collaborators dirtied pending state during the
        // cycle, the next update goes out right away.
        if self.pending_dirty {
            self.flush_updates();
        }
    }
}
