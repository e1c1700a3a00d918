//! tidewm window-manager engine
//!
//! This library implements the transactional core of a tiling compositor:
//! tracking every renderable node, mediating geometry, focus, and visibility
//! through a three-phase commit protocol, and exposing that state to a single
//! external window-management client over an async update/commit cycle.
//!
//! # Responsibilities
//!
//! - The update -> ack -> commit -> configure -> commit-transaction state
//!   machine (see `wm/`)
//! - Render-list ordering across the uncommitted/committed/inflight phases
//! - Scene-graph node attribution (node -> owning window or shell surface)
//! - Per-seat scheduled/sent notification cells (see `seat.rs`)
//! - The client-facing protocol surface and its JSON-lines transport
//!
//! # NOT Responsible For
//!
//! - Pixel compositing or GPU buffer management
//! - Input-device drivers and keymap parsing
//! - Output/monitor configuration

pub mod config;
pub mod idle;
pub mod node;
pub mod protocol;
pub mod scene;
pub mod seat;
pub mod shell_surface;
pub mod window;
pub mod wire;
pub mod wm;
