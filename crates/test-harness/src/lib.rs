//! Test harness for tidewm
//!
//! Drives the transaction engine directly, standing in for both sides of the
//! protocol: the window-manager client (bind, ack updates, commit) and the
//! application side of the configure handshake (ack configures).
//!
//! # Modules
//!
//! - `harness`: `TestWm`, the engine wrapper with cycle-driving helpers
//! - `fixtures`: canned engine setups
//! - `assertions`: common assertions over events and render lists

pub mod assertions;
pub mod fixtures;
pub mod harness;

pub use harness::TestWm;
