//! Wire event types the demultiplexer dispatches on.
use crate::bindings::{ButtonState, KeyCode};
use crate::geometry::Point;
use crate::xid::Xid;

/// Which edge of a window generated an `Enter`/`Leave` — relevant to
/// `SloppyFocus`'s `mode=Normal, detail != Inferior` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Normal,
    Grab,
    Ungrab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDetail {
    Ancestor,
    Virtual,
    Inferior,
    Nonlinear,
    NonlinearVirtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub window: Xid,
    pub root_pos: Point,
    pub mode: NotifyMode,
    pub detail: NotifyDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequestEvent {
    pub window: Xid,
    pub parent: Option<Xid>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub border_width: Option<u32>,
    pub stack_sibling: Option<Xid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureNotifyEvent {
    pub window: Xid,
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessageEvent {
    pub window: Xid,
    pub message_type: Xid,
    pub data: [u32; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyNotifyEvent {
    pub window: Xid,
    pub atom: Xid,
    pub is_root: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub event_window: Xid,
    pub child: Option<Xid>,
    pub root_pos: Point,
    pub event_pos: Point,
    pub state: ButtonState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionNotifyEvent {
    pub root_pos: Point,
    pub event_pos: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub window: Xid,
    pub code: KeyCode,
}

/// A server-reported protocol error, tagged with the sequence number of the
/// request that caused it so it can be correlated back to a recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolError {
    pub sequence: u16,
    pub error_code: u8,
    pub resource: Option<Xid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XEvent {
    MapRequest(Xid),
    ConfigureRequest(ConfigureRequestEvent),
    CirculateRequest(Xid),
    ConfigureNotify(ConfigureNotifyEvent),
    UnmapNotify(Xid),
    DestroyNotify(Xid),
    ReparentNotify(Xid),
    Enter(CrossingEvent),
    Leave(CrossingEvent),
    FocusIn(Xid),
    FocusOut(Xid),
    ButtonPress(ButtonPressEvent),
    ButtonRelease(ButtonPressEvent),
    MotionNotify(MotionNotifyEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    PropertyNotify(PropertyNotifyEvent),
    ClientMessage(ClientMessageEvent),
    MappingNotify,
    RandrNotify,
    Expose(Xid),
    Error(ProtocolError),
}

impl std::fmt::Display for XEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            XEvent::MapRequest(_) => "MapRequest",
            XEvent::ConfigureRequest(_) => "ConfigureRequest",
            XEvent::CirculateRequest(_) => "CirculateRequest",
            XEvent::ConfigureNotify(_) => "ConfigureNotify",
            XEvent::UnmapNotify(_) => "UnmapNotify",
            XEvent::DestroyNotify(_) => "DestroyNotify",
            XEvent::ReparentNotify(_) => "ReparentNotify",
            XEvent::Enter(_) => "Enter",
            XEvent::Leave(_) => "Leave",
            XEvent::FocusIn(_) => "FocusIn",
            XEvent::FocusOut(_) => "FocusOut",
            XEvent::ButtonPress(_) => "ButtonPress",
            XEvent::ButtonRelease(_) => "ButtonRelease",
            XEvent::MotionNotify(_) => "MotionNotify",
            XEvent::KeyPress(_) => "KeyPress",
            XEvent::KeyRelease(_) => "KeyRelease",
            XEvent::PropertyNotify(_) => "PropertyNotify",
            XEvent::ClientMessage(_) => "ClientMessage",
            XEvent::MappingNotify => "MappingNotify",
            XEvent::RandrNotify => "RandrNotify",
            XEvent::Expose(_) => "Expose",
            XEvent::Error(_) => "Error",
        };
        write!(f, "{name}")
    }
}
