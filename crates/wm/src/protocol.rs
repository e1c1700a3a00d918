//! Window-management protocol surface
//!
//! Requests and events are serde-tagged enums so they can be carried as JSON
//! lines by `wire.rs` and constructed directly by the test harness. The
//! surface splits into three groups:
//!
//! - the window-manager session: `bind`, `ack_update`, `commit`, placement
//!   and state requests, `stop`, `destroy`
//! - the surface side of the configure handshake: `ack_configure`
//! - a headless driver surface (`create_window`, `map_window`, ...) standing
//!   in for the compositor's Wayland frontend during development and testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::NodeId;
use crate::seat::{BindingId, LayerShellFocus, SeatId, StateChange};
use crate::shell_surface::{ShellSurfaceId, ShellSurfaceSnapshot};
use crate::window::{WindowId, WindowSnapshot, WindowState};

/// Client-to-server requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Bind as the window manager; at most one client may be bound
    Bind,
    /// Acknowledge the most recent update event
    AckUpdate { serial: u32 },
    /// Latch all uncommitted state and start a transaction
    Commit,

    /// Reposition a node (takes effect at the next commit)
    SetPosition { node: NodeId, x: i32, y: i32 },
    /// Propose a window size
    SetSize { window: WindowId, width: u32, height: u32 },
    /// Propose window activation
    SetActivated { window: WindowId, activated: bool },
    /// Propose fullscreen state
    SetFullscreen { window: WindowId, fullscreen: bool },

    /// Move a node to the top of the uncommitted render list
    PlaceTop { node: NodeId },
    /// Move a node to the bottom of the uncommitted render list
    PlaceBottom { node: NodeId },
    /// Place a node directly above another
    PlaceAbove { node: NodeId, other: NodeId },
    /// Place a node directly below another
    PlaceBelow { node: NodeId, other: NodeId },

    /// Request the default seat's id
    GetSeat,
    /// Create the client handle for a shell surface's node
    GetShellSurface { surface: ShellSurfaceId },
    /// Control whether the next unbound key is swallowed
    EnsureKeyEaten { seat: SeatId, eaten: bool },

    /// Surface-side acknowledgement of a configure
    AckConfigure { window: WindowId, serial: u32 },

    /// Tear down the window-manager binding cleanly
    Stop,
    /// Destroy the manager object (only valid once stopped or unavailable)
    Destroy,

    /// Introspection for testing and debugging
    QueryState,

    // Headless driver surface: stands in for the Wayland frontend
    /// Create a window with the given initial pending size
    CreateWindow { width: u32, height: u32 },
    /// Mark a window's surface as mapped
    MapWindow { window: WindowId },
    /// Mark a window's surface as unmapped
    UnmapWindow { window: WindowId },
    /// Destroy a window
    CloseWindow { window: WindowId },
    /// Create a shell surface with the given initial pending position
    CreateShellSurface { x: i32, y: i32 },
}

/// Server-to-client events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Pending state changed; re-synchronize and ack with this serial
    Update {
        serial: u32,
        windows: Vec<WindowSnapshot>,
        shell_surfaces: Vec<ShellSurfaceSnapshot>,
        render_list: Vec<NodeId>,
    },
    /// A window manager is already bound; this slot only accepts destroy
    Unavailable,
    /// Clean teardown acknowledgement for a stop request
    Finished,

    /// Layer-shell focus changed for a seat
    LayerShellFocus { seat: SeatId, focus: LayerShellFocus },
    /// A key matching no binding was processed
    UnboundKey { seat: SeatId, ate: bool },
    /// A pointer binding changed state
    PointerBindingState { binding: BindingId, change: StateChange },

    /// Response to get_seat
    Seat { seat: SeatId },
    /// Response to get_shell_surface: the node handle is now live
    ShellSurface { surface: ShellSurfaceId, node: NodeId },
    /// Response to create_window on the headless driver surface
    WindowCreated { window: WindowId, node: NodeId },
    /// Response to create_shell_surface on the headless driver surface
    ShellSurfaceCreated { surface: ShellSurfaceId, node: NodeId },

    /// Introspection snapshot
    State(StateDump),

    /// A request violated the protocol; the connection closes after this
    Error { message: String },

    /// Surface side of the configure handshake. In-process collaborators
    /// drain `pending_configures` directly; when running headless the server
    /// forwards them on the event stream instead, and the driving client
    /// answers with `ack_configure`.
    Configure(Configure),
}

/// A configure owed to a window's own application.
///
/// These do not travel to the window-manager client; the surface layer (or
/// the test harness) delivers them and routes the ack back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configure {
    pub window: WindowId,
    pub serial: u32,
    pub state: WindowState,
}

/// Introspection snapshot of the manager's protocol state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDump {
    /// Current state machine phase, by name
    pub state: String,
    /// Configures sent but not yet acked
    pub inflight_configures: u32,
    pub uncommitted: Vec<NodeId>,
    pub committed: Vec<NodeId>,
    pub inflight: Vec<NodeId>,
    pub idle_inhibited: bool,
}

/// Client-caused protocol violations.
///
/// These are fatal to the offending client's connection, never to the
/// compositor. Contract violations inside the engine itself are `assert!`s,
/// not variants here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("a window manager is already bound")]
    AlreadyBound,

    #[error("no window manager is bound")]
    NotBound,

    #[error("node {0:?} already has a client object")]
    ObjectExists(NodeId),

    #[error("node {0:?} has no client object")]
    NoObject(NodeId),

    #[error("commit without an acknowledged update")]
    UnexpectedCommit,

    #[error("destroy on a bound manager object; stop it first")]
    DestroyWhileBound,

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown window {0:?}")]
    UnknownWindow(WindowId),

    #[error("unknown shell surface {0:?}")]
    UnknownShellSurface(ShellSurfaceId),

    #[error("unknown seat {0:?}")]
    UnknownSeat(SeatId),
}
