//! Typed property engine: per-window get/set/watch with encode/decode
//! rules fixed per semantic type, backed by an explicit variant enum
//! instead of a dynamic descriptor table.
use std::cell::RefCell;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sizehints::SizeHints;
use crate::xid::Xid;

/// ICCCM `WM_STATE` values. Not renumbered from the wire encoding (0/1/3) so
/// encode/decode for this one variant is a plain cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

impl WmState {
    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(WmState::Withdrawn),
            1 => Some(WmState::Normal),
            3 => Some(WmState::Iconic),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// `_NET_WM_STATE` flags this core understands.
    #[derive(Default, Serialize, Deserialize)]
    pub struct NetWmState: u32 {
        const FULLSCREEN      = 0b00001;
        const MAXIMIZED_HORZ  = 0b00010;
        const MAXIMIZED_VERT  = 0b00100;
        const ABOVE           = 0b01000;
        const DEMANDS_ATTENTION = 0b10000;
    }
}

bitflags::bitflags! {
    /// `WM_HINTS` flags (ICCCM §4.1.2.3), as far as `InputHint` matters to
    /// focus policy.
    #[derive(Default, Serialize, Deserialize)]
    pub struct WmHintsFlags: u32 {
        const INPUT_HINT   = 0b0001;
        const STATE_HINT   = 0b0010;
        const URGENCY_HINT = 0b0100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmHints {
    pub flags: WmHintsFlags,
    /// `true` unless the client explicitly asked not to take keyboard focus.
    pub accepts_input: bool,
    pub urgent: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        WmHints {
            flags: WmHintsFlags::empty(),
            accepts_input: true,
            urgent: false,
        }
    }
}

/// A decoded property value. One variant per semantic type the core cares
/// about; new properties extend this enum rather than going through a
/// generic untyped byte buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Utf8String(String),
    AtomList(Vec<Xid>),
    CardinalList(Vec<u32>),
    SizeHints(SizeHints),
    State(WmState),
    Hints(WmHints),
    WmCommand(Vec<String>),
}

impl Property {
    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Property::Utf8String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_atom_list(&self) -> Option<&[Xid]> {
        match self {
            Property::AtomList(v) => Some(v),
            _ => None,
        }
    }

    /// `WM_COMMAND` decodes as [`Property::WmCommand`] when it holds more
    /// than one NUL-separated string and as a plain [`Property::Utf8String`]
    /// when it holds exactly one; this accessor normalizes both to a `Vec<String>` so
    /// callers don't have to match on which variant a single-element argv
    /// happened to decode as.
    pub fn as_argv(&self) -> Option<Vec<String>> {
        match self {
            Property::WmCommand(argv) => Some(argv.clone()),
            Property::Utf8String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }
}

/// Guards against sending a second `GetProperty` for `(window, atom)` while
/// one is already outstanding.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    outstanding: RefCell<HashSet<(Xid, Xid)>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this is the first caller to request `(window,
    /// atom)`; callers that get `false` should await the first caller's
    /// result instead of issuing their own request.
    pub fn begin(&self, window: Xid, atom: Xid) -> bool {
        self.outstanding.borrow_mut().insert((window, atom))
    }

    pub fn complete(&self, window: Xid, atom: Xid) {
        self.outstanding.borrow_mut().remove(&(window, atom));
    }
}

/// A callback fired on `PropertyNotify` for a watched `(window, atom)` pair.
pub type Watcher = Box<dyn FnMut(Xid, &Property) -> Result<()>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_coalesces_duplicate_requests() {
        let guard = InFlightGuard::new();
        let win = Xid(1);
        let atom = Xid(2);

        assert!(guard.begin(win, atom));
        assert!(!guard.begin(win, atom), "second concurrent get should not re-issue a request");
        guard.complete(win, atom);
        assert!(guard.begin(win, atom), "completed request can be re-issued");
    }

    #[test]
    fn wm_state_decodes_exact_iccccm_values() {
        assert_eq!(WmState::from_wire(0), Some(WmState::Withdrawn));
        assert_eq!(WmState::from_wire(1), Some(WmState::Normal));
        assert_eq!(WmState::from_wire(3), Some(WmState::Iconic));
        assert_eq!(WmState::from_wire(2), None);
    }
}
