//! Window-manager orchestrator
//!
//! `WindowManager` owns the scene tree, every window/shell-surface/node
//! arena, the three phase-ordered render lists, and the single bound
//! window-manager client. This module holds the struct, bind arbitration,
//! object lifecycle, and request dispatch.
//!
//! # Responsibilities
//!
//! - Window and shell-surface lifecycle (create/destroy, deferred while
//!   inflight)
//! - Bind arbitration: exactly one window-manager client at a time
//! - Request dispatch and client-handle gating (live / inert / absent)
//!
//! # NOT Responsible For
//!
//! - The transaction state machine itself (see `transaction.rs`)
//! - Render-list reordering (see `placement.rs`)

mod placement;
mod transaction;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::idle::IdleInhibitors;
use crate::node::{NodeId, NodeOwner, ObjectState, WmNode};
use crate::protocol::{Configure, Event, ProtocolError, Request, StateDump};
use crate::scene::{NodeData, SceneNodeId, SceneTree};
use crate::seat::{Seat, SeatId};
use crate::shell_surface::{ShellSurface, ShellSurfaceId};
use crate::window::{Window, WindowId};

/// Global protocol state: only one update/commit cycle may be outstanding
/// for the single bound client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    /// No cycle outstanding; pending dirtiness starts a new one
    Idle,
    /// An update event was sent and not yet acked
    UpdateSent { serial: u32 },
    /// The client acked; a commit request may now latch state
    UpdateAcked,
    /// Configures dispatched; `remaining` acks gate the transaction commit
    ConfiguresInflight { remaining: u32 },
}

/// Timer operation for the event loop to apply; the engine never touches
/// the loop directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Arm(Duration),
    Disarm,
}

/// Outcome of a bind attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindResult {
    Bound,
    /// Another client is bound; this one gets `Event::Unavailable` and may
    /// only destroy its object
    Unavailable,
}

/// The window-manager transaction engine
pub struct WindowManager {
    pub scene: SceneTree,

    /// Scene node under which every render-list entry's tree lives; its
    /// child order is the applied paint order.
    layer: SceneNodeId,

    pub windows: HashMap<WindowId, Window>,
    pub shell_surfaces: HashMap<ShellSurfaceId, ShellSurface>,
    pub nodes: HashMap<NodeId, WmNode>,
    pub seats: Vec<Seat>,

    pub idle_inhibitors: IdleInhibitors,
    pub idle_inhibited: bool,

    pub state: WmState,

    /// Set by collaborators whenever pending state changes; consumed by
    /// `flush_updates` on the next idle-loop tick.
    pub pending_dirty: bool,

    /// Render lists, one per phase. Promotion order is strictly
    /// uncommitted -> committed -> inflight.
    pub uncommitted: Vec<NodeId>,
    pub committed: Vec<NodeId>,
    pub inflight: Vec<NodeId>,

    /// Configures owed to applications; drained by the surface layer
    pub pending_configures: Vec<Configure>,

    /// Timer operation for the event loop to apply
    pub timer_request: Option<TimerRequest>,

    client_bound: bool,
    outbox: VecDeque<Event>,

    update_serial: u32,
    configure_serial: u32,
    transaction_timeout: Duration,

    next_window_id: u32,
    next_shell_surface_id: u32,
    next_node_id: u32,
}

impl WindowManager {
    pub fn new(transaction_timeout: Duration) -> Self {
        let mut scene = SceneTree::new();
        let layer = scene.create_node(scene.root());
        scene.set_enabled(layer, true);
        Self {
            scene,
            layer,
            windows: HashMap::new(),
            shell_surfaces: HashMap::new(),
            nodes: HashMap::new(),
            seats: vec![Seat::new(SeatId(0))],
            idle_inhibitors: IdleInhibitors::new(),
            idle_inhibited: false,
            state: WmState::Idle,
            pending_dirty: false,
            uncommitted: Vec::new(),
            committed: Vec::new(),
            inflight: Vec::new(),
            pending_configures: Vec::new(),
            timer_request: None,
            client_bound: false,
            outbox: VecDeque::new(),
            update_serial: 0,
            configure_serial: 0,
            transaction_timeout,
            next_window_id: 0,
            next_shell_surface_id: 0,
            next_node_id: 0,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.client_bound
    }

    pub fn last_update_serial(&self) -> u32 {
        self.update_serial
    }

    /// Queue an event for the bound client
    pub(crate) fn send_event(&mut self, event: Event) {
        if self.client_bound {
            self.outbox.push_back(event);
        } else {
            tracing::trace!(?event, "event dropped, no window manager bound");
        }
    }

    /// Drain queued client events (delivered by the wire layer)
    pub fn take_events(&mut self) -> Vec<Event> {
        self.outbox.drain(..).collect()
    }

    /// Attempt to bind as the window manager
    pub fn bind(&mut self) -> BindResult {
        if self.client_bound {
            tracing::info!("second window manager bind refused");
            return BindResult::Unavailable;
        }
        self.client_bound = true;
        // Handles left inert by a previous session may be recreated
        for node in self.nodes.values_mut() {
            node.reset_session();
        }
        // The new client needs a full picture of current state
        self.pending_dirty = true;
        tracing::info!("window manager bound");
        BindResult::Bound
    }

    /// Clean teardown requested by the client: acknowledge with `Finished`,
    /// make every node handle inert, and unbind.
    pub fn stop(&mut self) -> Result<(), ProtocolError> {
        if !self.client_bound {
            return Err(ProtocolError::NotBound);
        }
        self.send_event(Event::Finished);
        self.end_session();
        tracing::info!("window manager stopped");
        Ok(())
    }

    /// Destroy of the manager object; only valid when not bound (stopped or
    /// unavailable slots).
    pub fn destroy(&mut self) -> Result<(), ProtocolError> {
        if self.client_bound {
            return Err(ProtocolError::DestroyWhileBound);
        }
        Ok(())
    }

    /// The bound client's connection died. Node handles go inert and any
    /// inflight transaction runs to completion through the normal ack or
    /// timeout path; updates stay suspended until a client rebinds.
    pub fn client_disconnected(&mut self) {
        if !self.client_bound {
            return;
        }
        tracing::info!(state = ?self.state, "window manager disconnected");
        self.end_session();
    }

    /// Shared teardown for stop and disconnect: unbind, and abandon a cycle
    /// that had no transaction running yet. Its state stays pending so the
    /// next session's first update carries it; a running transaction is left
    /// to finish through the normal ack or timeout path.
    fn end_session(&mut self) {
        self.unbind();
        match self.state {
            WmState::UpdateSent { .. } | WmState::UpdateAcked => {
                self.state = WmState::Idle;
                self.pending_dirty = true;
            }
            WmState::Idle | WmState::ConfiguresInflight { .. } => {}
        }
    }

    fn unbind(&mut self) {
        self.client_bound = false;
        for node in self.nodes.values_mut() {
            node.make_inert();
        }
    }

    /// Mark pending state dirty; an update goes out on the next idle tick
    pub fn dirty_pending(&mut self) {
        self.pending_dirty = true;
    }

    /// Create a window and its render-list node.
    ///
    /// The node joins the bottom of the uncommitted render list so a fresh
    /// window cannot occlude anything before the client places it.
    pub fn create_window(&mut self) -> WindowId {
        let id = WindowId(self.next_window_id);
        self.next_window_id += 1;
        let node = self.alloc_node(NodeOwner::Window(id));
        let tree = self.scene.create_node(self.layer);
        self.scene.attach_data(tree, NodeData::Window(id));
        self.windows.insert(id, Window::new(id, node, tree));
        self.dirty_pending();
        tracing::info!(window = id.0, node = node.0, "window created");
        id
    }

    /// Create a shell surface and its render-list node
    pub fn create_shell_surface(&mut self) -> ShellSurfaceId {
        let id = ShellSurfaceId(self.next_shell_surface_id);
        self.next_shell_surface_id += 1;
        let node = self.alloc_node(NodeOwner::ShellSurface(id));
        let tree = self.scene.create_node(self.layer);
        self.scene.attach_data(tree, NodeData::ShellSurface(id));
        self.shell_surfaces
            .insert(id, ShellSurface::new(id, node, tree));
        self.dirty_pending();
        tracing::info!(shell_surface = id.0, node = node.0, "shell surface created");
        id
    }

    fn alloc_node(&mut self, owner: NodeOwner) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(id, WmNode::new(id, owner));
        self.uncommitted.insert(0, id);
        id
    }

    pub fn set_window_mapped(&mut self, id: WindowId, mapped: bool) -> Result<(), ProtocolError> {
        let window = self
            .windows
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownWindow(id))?;
        if window.mapped != mapped {
            window.mapped = mapped;
            self.dirty_pending();
        }
        Ok(())
    }

    pub fn set_shell_surface_mapped(
        &mut self,
        id: ShellSurfaceId,
        mapped: bool,
    ) -> Result<(), ProtocolError> {
        let surface = self
            .shell_surfaces
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownShellSurface(id))?;
        if surface.mapped != mapped {
            surface.mapped = mapped;
            self.dirty_pending();
        }
        Ok(())
    }

    /// Destroy a window.
    ///
    /// If the window's node is part of a transaction that is still waiting
    /// on configures, destruction is deferred until that transaction
    /// commits; its own outstanding configure (which can no longer be acked)
    /// is settled immediately so the transaction is not held hostage.
    pub fn destroy_window(&mut self, id: WindowId) -> Result<(), ProtocolError> {
        let node_id = self
            .windows
            .get(&id)
            .ok_or(ProtocolError::UnknownWindow(id))?
            .node;
        let busy = matches!(self.state, WmState::ConfiguresInflight { .. })
            && self.inflight_will_include(node_id);
        if busy {
            let settled = self
                .windows
                .get_mut(&id)
                .expect("window checked above")
                .configure_serial
                .take()
                .is_some();
            self.nodes
                .get_mut(&node_id)
                .expect("window node missing")
                .destroying = true;
            tracing::info!(window = id.0, "window destruction deferred until transaction commits");
            self.dirty_pending();
            if settled {
                self.configure_settled();
            }
        } else {
            self.finalize_node(node_id);
            self.dirty_pending();
            tracing::info!(window = id.0, "window destroyed");
        }
        Ok(())
    }

    pub fn destroy_shell_surface(&mut self, id: ShellSurfaceId) -> Result<(), ProtocolError> {
        let surface = self
            .shell_surfaces
            .get(&id)
            .ok_or(ProtocolError::UnknownShellSurface(id))?;
        let node_id = surface.node;
        let busy = matches!(self.state, WmState::ConfiguresInflight { .. })
            && self.inflight_will_include(node_id);
        if busy {
            self.nodes
                .get_mut(&node_id)
                .expect("shell surface node missing")
                .destroying = true;
            tracing::info!(
                shell_surface = id.0,
                "shell surface destruction deferred until transaction commits"
            );
        } else {
            self.finalize_node(node_id);
            tracing::info!(shell_surface = id.0, "shell surface destroyed");
        }
        self.dirty_pending();
        Ok(())
    }

    /// Whether the running transaction covers this node. The inflight list
    /// is only rewritten inside the transaction commit, so mid-transaction
    /// the committed list is the authoritative membership.
    fn inflight_will_include(&self, node: NodeId) -> bool {
        self.committed.contains(&node)
    }

    /// Remove a node from every phase list and drop it with its owner
    pub(crate) fn finalize_node(&mut self, node_id: NodeId) {
        self.uncommitted.retain(|n| *n != node_id);
        self.committed.retain(|n| *n != node_id);
        self.inflight.retain(|n| *n != node_id);
        let Some(node) = self.nodes.remove(&node_id) else {
            return;
        };
        match node.owner {
            NodeOwner::Window(id) => {
                if let Some(window) = self.windows.remove(&id) {
                    self.scene.destroy_node(window.tree);
                }
            }
            NodeOwner::ShellSurface(id) => {
                if let Some(surface) = self.shell_surfaces.remove(&id) {
                    self.scene.destroy_node(surface.tree);
                }
            }
        }
    }

    pub fn default_seat(&self) -> SeatId {
        self.seats[0].id
    }

    pub fn seat_mut(&mut self, id: SeatId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|seat| seat.id == id)
    }

    /// Dispatch one client request.
    ///
    /// Errors are client protocol violations: the wire layer reports them to
    /// the offending connection and closes it; the engine state stays valid.
    pub fn request(&mut self, request: Request) -> Result<(), ProtocolError> {
        match request {
            Request::Bind => match self.bind() {
                BindResult::Bound => Ok(()),
                BindResult::Unavailable => Err(ProtocolError::AlreadyBound),
            },
            Request::AckUpdate { serial } => {
                self.ack_update(serial);
                Ok(())
            }
            Request::Commit => self.commit(),

            Request::SetPosition { node, x, y } => {
                if self.node_request_live(node)? {
                    self.set_uncommitted_position(node, x, y);
                }
                Ok(())
            }
            Request::SetSize { window, width, height } => {
                self.window_request(window, |w| {
                    w.uncommitted.width = width;
                    w.uncommitted.height = height;
                })
            }
            Request::SetActivated { window, activated } => {
                self.window_request(window, |w| w.uncommitted.activated = activated)
            }
            Request::SetFullscreen { window, fullscreen } => {
                self.window_request(window, |w| w.uncommitted.fullscreen = fullscreen)
            }

            Request::PlaceTop { node } => {
                if self.node_request_live(node)? {
                    self.place_top(node);
                }
                Ok(())
            }
            Request::PlaceBottom { node } => {
                if self.node_request_live(node)? {
                    self.place_bottom(node);
                }
                Ok(())
            }
            Request::PlaceAbove { node, other } => {
                if self.node_request_live(node)? {
                    self.place_above(node, other);
                }
                Ok(())
            }
            Request::PlaceBelow { node, other } => {
                if self.node_request_live(node)? {
                    self.place_below(node, other);
                }
                Ok(())
            }

            Request::GetSeat => {
                let seat = self.default_seat();
                self.send_event(Event::Seat { seat });
                Ok(())
            }
            Request::GetShellSurface { surface } => {
                let node_id = self
                    .shell_surfaces
                    .get(&surface)
                    .ok_or(ProtocolError::UnknownShellSurface(surface))?
                    .node;
                self.nodes
                    .get_mut(&node_id)
                    .ok_or(ProtocolError::UnknownNode(node_id))?
                    .create_object()?;
                self.send_event(Event::ShellSurface { surface, node: node_id });
                Ok(())
            }
            Request::EnsureKeyEaten { seat, eaten } => {
                self.seat_mut(seat)
                    .ok_or(ProtocolError::UnknownSeat(seat))?
                    .xkb_bindings
                    .request_ensure_next_key_eaten(eaten);
                Ok(())
            }

            Request::AckConfigure { window, serial } => {
                self.ack_configure(window, serial);
                Ok(())
            }

            Request::Stop => self.stop(),
            Request::Destroy => self.destroy(),

            Request::QueryState => {
                let dump = self.state_dump();
                self.send_event(Event::State(dump));
                Ok(())
            }

            Request::CreateWindow { width, height } => {
                let window = self.create_window();
                let entry = self.windows.get_mut(&window).unwrap();
                entry.pending.width = width;
                entry.pending.height = height;
                entry.uncommitted = entry.pending;
                let node = entry.node;
                self.send_event(Event::WindowCreated { window, node });
                Ok(())
            }
            Request::MapWindow { window } => self.set_window_mapped(window, true),
            Request::UnmapWindow { window } => self.set_window_mapped(window, false),
            Request::CloseWindow { window } => self.destroy_window(window),
            Request::CreateShellSurface { x, y } => {
                let surface = self.create_shell_surface();
                let entry = self.shell_surfaces.get_mut(&surface).unwrap();
                entry.pending.x = x;
                entry.pending.y = y;
                entry.uncommitted = entry.pending;
                let node = entry.node;
                self.send_event(Event::ShellSurfaceCreated { surface, node });
                Ok(())
            }
        }
    }

    /// Gate a node-targeted request on its client handle: live handles are
    /// honored, inert handles silently discard, a missing handle is a
    /// protocol error.
    fn node_request_live(&self, node: NodeId) -> Result<bool, ProtocolError> {
        let entry = self.nodes.get(&node).ok_or(ProtocolError::UnknownNode(node))?;
        match entry.object {
            ObjectState::Bound => Ok(true),
            ObjectState::Inert => Ok(false),
            ObjectState::None => Err(ProtocolError::NoObject(node)),
        }
    }

    fn window_request(
        &mut self,
        window: WindowId,
        apply: impl FnOnce(&mut Window),
    ) -> Result<(), ProtocolError> {
        let node = self
            .windows
            .get(&window)
            .ok_or(ProtocolError::UnknownWindow(window))?
            .node;
        if self.node_request_live(node)? {
            apply(self.windows.get_mut(&window).unwrap());
        }
        Ok(())
    }

    pub fn state_dump(&self) -> StateDump {
        let (state, inflight_configures) = match self.state {
            WmState::Idle => ("idle".to_string(), 0),
            WmState::UpdateSent { serial } => (format!("update_sent({serial})"), 0),
            WmState::UpdateAcked => ("update_acked".to_string(), 0),
            WmState::ConfiguresInflight { remaining } => {
                ("configures_inflight".to_string(), remaining)
            }
        };
        StateDump {
            state,
            inflight_configures,
            uncommitted: self.uncommitted.clone(),
            committed: self.committed.clone(),
            inflight: self.inflight.clone(),
            idle_inhibited: self.idle_inhibited,
        }
    }
}
