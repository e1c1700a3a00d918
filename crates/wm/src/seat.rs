//! Per-seat scheduled/sent notification cells
//!
//! Each cell is a single slot: input-processing collaborators write a
//! `scheduled` value, and once per manage cycle the cell compares it against
//! the last `sent` value, emitting a notification only on inequality. The
//! window-manager client therefore sees each state change exactly once, at a
//! cycle boundary, never mid-processing.

use serde::{Deserialize, Serialize};

use crate::scene::SceneNodeId;

/// Unique identifier for a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatId(pub u32);

/// Unique identifier for a pointer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub u32);

/// Layer-shell focus target for a seat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerShellFocus {
    #[default]
    None,
    /// An exclusive-keyboard layer surface holds focus until released
    Exclusive(SceneNodeId),
    /// A one-shot focus grant; reported once, then the cell resets
    NonExclusive(SceneNodeId),
}

/// Layer-shell focus cell for one seat
#[derive(Debug)]
pub struct LayerShellSeat {
    pub seat: SeatId,
    scheduled: LayerShellFocus,
    sent: LayerShellFocus,
}

impl LayerShellSeat {
    pub fn new(seat: SeatId) -> Self {
        Self {
            seat,
            scheduled: LayerShellFocus::None,
            sent: LayerShellFocus::None,
        }
    }

    /// Called by layer-shell handling when the focus target changes
    pub fn schedule_focus(&mut self, focus: LayerShellFocus) {
        self.scheduled = focus;
    }

    /// Start of the manage cycle: returns the focus value to notify, if the
    /// scheduled value diverged from what was last sent.
    ///
    /// `NonExclusive` is a one-shot: after being reported it resets to
    /// `None` without generating a second notification.
    pub fn manage_start(&mut self) -> Option<LayerShellFocus> {
        if self.scheduled == self.sent {
            return None;
        }
        let notify = self.scheduled;
        self.sent = self.scheduled;
        if matches!(notify, LayerShellFocus::NonExclusive(_)) {
            self.scheduled = LayerShellFocus::None;
            self.sent = LayerShellFocus::None;
        }
        Some(notify)
    }
}

/// Keyboard-binding cell for one seat
#[derive(Debug)]
pub struct XkbBindingsSeat {
    pub seat: SeatId,

    /// Whether keys that match no binding are swallowed rather than passed
    /// through to the focused client. Stable for the whole input cycle; only
    /// updated at the cycle boundary by `manage_finish`.
    pub ensure_next_key_eaten: bool,

    scheduled_ate_unbound_key: Option<bool>,
    sent_ate_unbound_key: Option<bool>,
    requested_ensure_next_key_eaten: Option<bool>,
}

impl XkbBindingsSeat {
    pub fn new(seat: SeatId) -> Self {
        Self {
            seat,
            ensure_next_key_eaten: false,
            scheduled_ate_unbound_key: None,
            sent_ate_unbound_key: None,
            requested_ensure_next_key_eaten: None,
        }
    }

    /// Called by input processing after handling a key that matched no
    /// binding, recording whether it was swallowed.
    pub fn schedule_ate_unbound_key(&mut self, ate: bool) {
        self.scheduled_ate_unbound_key = Some(ate);
    }

    /// Called by the client's request handler; takes effect at cycle end
    pub fn request_ensure_next_key_eaten(&mut self, eaten: bool) {
        self.requested_ensure_next_key_eaten = Some(eaten);
    }

    /// Start of the manage cycle: report a changed unbound-key outcome
    pub fn manage_start(&mut self) -> Option<bool> {
        if self.scheduled_ate_unbound_key == self.sent_ate_unbound_key {
            return None;
        }
        self.sent_ate_unbound_key = self.scheduled_ate_unbound_key;
        self.scheduled_ate_unbound_key
    }

    /// End of the manage cycle: latch the client's requested eat flag so it
    /// only changes at a well-defined boundary.
    pub fn manage_finish(&mut self) {
        if let Some(eaten) = self.requested_ensure_next_key_eaten.take() {
            self.ensure_next_key_eaten = eaten;
        }
    }
}

/// An unconsumed press/release transition on a pointer binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    #[default]
    None,
    Pressed,
    Released,
}

/// A pointer binding with strict press/release alternation.
///
/// The input layer must not feed a new transition until the previous one has
/// been delivered to the window-manager client by a manage cycle; violating
/// that is a programming error and panics.
#[derive(Debug)]
pub struct PointerBinding {
    pub id: BindingId,
    is_pressed: bool,
    state_change: StateChange,
}

impl PointerBinding {
    pub fn new(id: BindingId) -> Self {
        Self {
            id,
            is_pressed: false,
            state_change: StateChange::None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.is_pressed
    }

    /// Record a press. Panics if the binding is already pressed or a prior
    /// transition has not yet been consumed by a manage cycle.
    pub fn pressed(&mut self) {
        assert_eq!(
            self.state_change,
            StateChange::None,
            "pointer binding has an unconsumed state change"
        );
        assert!(!self.is_pressed, "pointer binding pressed twice");
        self.is_pressed = true;
        self.state_change = StateChange::Pressed;
    }

    /// Record a release. Panics without a matching unreleased press or while
    /// a prior transition is unconsumed.
    pub fn released(&mut self) {
        assert_eq!(
            self.state_change,
            StateChange::None,
            "pointer binding has an unconsumed state change"
        );
        assert!(self.is_pressed, "pointer binding released without press");
        self.is_pressed = false;
        self.state_change = StateChange::Released;
    }

    /// Start of the manage cycle: consume and return the queued transition
    pub fn manage_start(&mut self) -> Option<StateChange> {
        match std::mem::take(&mut self.state_change) {
            StateChange::None => None,
            change => Some(change),
        }
    }
}

/// All per-seat cells, advanced together by the manage cycle
#[derive(Debug)]
pub struct Seat {
    pub id: SeatId,
    pub layer_shell: LayerShellSeat,
    pub xkb_bindings: XkbBindingsSeat,
    pub pointer_bindings: Vec<PointerBinding>,

    /// Set when a committed transaction may have moved the surface under the
    /// cursor; consumed by the input collaborator.
    pub cursor_dirty: bool,
}

impl Seat {
    pub fn new(id: SeatId) -> Self {
        Self {
            id,
            layer_shell: LayerShellSeat::new(id),
            xkb_bindings: XkbBindingsSeat::new(id),
            pointer_bindings: Vec::new(),
            cursor_dirty: false,
        }
    }

    pub fn add_pointer_binding(&mut self, id: BindingId) -> &mut PointerBinding {
        self.pointer_bindings.push(PointerBinding::new(id));
        self.pointer_bindings.last_mut().unwrap()
    }
}
