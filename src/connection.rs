//! The `Connection` trait: the seam between the core and the X11 wire
//! protocol transport.
//!
//! The core never talks to a socket directly. Every request it needs is a
//! method here, reshaped around reparenting, grabs, save-set, and RandR
//! CRTCs. A production binary wires up [`crate::backend::x11rb`]; tests
//! use [`mock::MockConnection`].
use crate::error::Result;
use crate::event::XEvent;
use crate::geometry::{Point, Rect};
use crate::property::Property;
use crate::sizehints::SizeHints;
use crate::xid::Xid;

/// A RandR CRTC's bounds, used as a snap target and as the fullscreen/maximize
/// bounds for whichever monitor a client currently sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crtc {
    pub id: Xid,
    pub region: Rect,
}

/// Attributes of a window as reported by the server, consulted when deciding
/// whether to adopt an already-mapped child of root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub mapped: bool,
}

/// A cursor shape to set for the duration of a grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Normal,
    Move,
    ResizeHandle(crate::geometry::Edge, crate::geometry::Edge),
}

/// Which keyboard grab mode to request: `Sync` lets the core inspect the
/// event before deciding whether to replay it to the client, `Async` passes
/// it straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    Sync,
    Async,
}

/// The single abstraction over the X11 wire protocol the core depends on.
///
/// Every method that can legitimately race with a vanishing client returns a
/// `Result`; the core's recovery for most of those is "drop the client, no
/// user-visible effect".
pub trait Connection {
    fn root(&self) -> Xid;

    // -- atoms ---------------------------------------------------------
    fn intern_atom(&self, name: &str) -> Result<Xid>;
    fn get_atom_name(&self, atom: Xid) -> Result<String>;

    // -- event loop ------------------------------------------------------
    fn flush(&self) -> Result<()>;
    /// Block until the next event. The sole suspension point of the manager
    /// loop.
    fn wait_for_event(&self) -> Result<XEvent>;
    /// Synchronously drain and inspect errors generated by requests issued
    /// so far, without blocking for a new event.
    fn check(&self) -> Result<()>;

    // -- window lifecycle ------------------------------------------------
    fn create_frame(&self, r: Rect, border: u32) -> Result<Xid>;
    fn destroy_window(&self, id: Xid) -> Result<()>;
    fn reparent(&self, child: Xid, parent: Xid, x: i32, y: i32) -> Result<()>;
    fn map_window(&self, id: Xid) -> Result<()>;
    fn unmap_window(&self, id: Xid) -> Result<()>;
    fn add_to_save_set(&self, id: Xid) -> Result<()>;
    fn remove_from_save_set(&self, id: Xid) -> Result<()>;
    fn window_attributes(&self, id: Xid) -> Result<WindowAttributes>;
    fn query_tree(&self, id: Xid) -> Result<Vec<Xid>>;
    fn window_geometry(&self, id: Xid) -> Result<Rect>;
    fn translate_to_root(&self, id: Xid) -> Result<Point>;

    // -- configuration -----------------------------------------------------
    fn configure(&self, id: Xid, r: Rect, border: u32) -> Result<()>;
    fn raise(&self, id: Xid) -> Result<()>;
    fn lower(&self, id: Xid) -> Result<()>;
    /// ICCCM §4.1.5: tell the client its geometry changed even when the
    /// server wouldn't otherwise (position-only moves, border-only changes).
    fn send_synthetic_configure_notify(&self, id: Xid, r: Rect, border: u32) -> Result<()>;

    // -- properties --------------------------------------------------------
    fn get_property(&self, id: Xid, atom: Xid) -> Result<Option<Property>>;
    fn set_property(&self, id: Xid, atom: Xid, value: &Property) -> Result<()>;
    fn delete_property(&self, id: Xid, atom: Xid) -> Result<()>;
    fn get_size_hints(&self, id: Xid) -> Result<SizeHints>;

    // -- input -------------------------------------------------------------
    fn select_root_events(&self) -> Result<()>;
    /// Select only `PropertyChange` on root, without requesting
    /// `SubstructureRedirect`. Used by the control-message CLI,
    /// which must observe `WM_COMMAND`'s timestamp without competing with a
    /// running manager for ownership of the root window.
    fn select_root_property_events(&self) -> Result<()>;
    fn select_frame_events(&self, frame: Xid) -> Result<()>;
    /// Select `PropertyChange` on a just-adopted client window so title
    /// (`WM_NAME`/`_NET_WM_NAME`) and hint changes surface as `PropertyNotify`.
    fn select_property_events(&self, id: Xid) -> Result<()>;
    fn grab_key(&self, window: Xid, code: crate::bindings::KeyCode) -> Result<()>;
    fn ungrab_key(&self, window: Xid, code: crate::bindings::KeyCode) -> Result<()>;
    fn grab_button(&self, window: Xid, state: crate::bindings::ButtonState, mode: GrabMode) -> Result<()>;
    fn ungrab_button(&self, window: Xid, state: crate::bindings::ButtonState) -> Result<()>;
    fn grab_keyboard(&self) -> Result<()>;
    fn ungrab_keyboard(&self) -> Result<()>;
    fn grab_pointer(&self, cursor: Cursor) -> Result<()>;
    fn ungrab_pointer(&self) -> Result<()>;
    fn allow_replay_pointer(&self) -> Result<()>;
    fn warp_pointer(&self, p: Point) -> Result<()>;
    fn query_pointer(&self) -> Result<Point>;

    // -- focus ---------------------------------------------------------
    /// `None` time means "use the last server timestamp seen"; the core
    /// never passes `CurrentTime` except to force a revert.
    fn set_input_focus(&self, id: Xid, time: u32) -> Result<()>;
    fn send_client_message(&self, id: Xid, message_type: Xid, data: [u32; 5]) -> Result<()>;
    fn last_timestamp(&self) -> u32;

    // -- output/RandR ----------------------------------------------------
    fn crtcs(&self) -> Result<Vec<Crtc>>;

    // -- XOR guideline rendering -----------------------------
    fn draw_guideline(&self, vertical: bool, coord: i32) -> Result<()>;
    fn clear_guidelines(&self) -> Result<()>;

    // -- process management -------------------------------------------------
    /// Double-fork and exec `argv`, detached from the manager.
    fn spawn(&self, argv: &[String]) -> Result<()>;
}

pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// A stub [`Connection`] for unit tests: every method has an inert
    /// default, and callers record what they need (atom interning call
    /// counts, configured geometries, sent client messages) to assert
    /// against.
    #[derive(Default)]
    pub struct MockConnection {
        next_atom: Cell<u32>,
        by_name: RefCell<HashMap<String, Xid>>,
        by_id: RefCell<HashMap<Xid, String>>,
        intern_calls: Cell<u32>,
        pub configured: RefCell<Vec<(Xid, Rect, u32)>>,
        pub sent_messages: RefCell<Vec<(Xid, Xid, [u32; 5])>>,
        pub focus_calls: RefCell<Vec<(Xid, u32)>>,
        pub crtcs: RefCell<Vec<Crtc>>,
        pub pointer: Cell<Point>,
        pub timestamp: Cell<u32>,
        /// Children `query_tree(root)` reports, for exercising startup's
        /// adoption of already-mapped windows.
        pub root_children: RefCell<Vec<Xid>>,
        pub override_redirect: RefCell<std::collections::HashSet<Xid>>,
        pub properties: RefCell<HashMap<(Xid, Xid), Property>>,
    }

    impl MockConnection {
        pub fn new() -> Self {
            let s = Self::default();
            s.next_atom.set(1);
            s
        }

        pub fn intern_atom_calls(&self) -> u32 {
            self.intern_calls.get()
        }
    }

    impl Connection for MockConnection {
        fn root(&self) -> Xid {
            Xid(1)
        }

        fn intern_atom(&self, name: &str) -> Result<Xid> {
            self.intern_calls.set(self.intern_calls.get() + 1);
            if let Some(&id) = self.by_name.borrow().get(name) {
                return Ok(id);
            }
            let id = Xid(self.next_atom.get());
            self.next_atom.set(id.0 + 1);
            self.by_name.borrow_mut().insert(name.to_string(), id);
            self.by_id.borrow_mut().insert(id, name.to_string());
            Ok(id)
        }

        fn get_atom_name(&self, atom: Xid) -> Result<String> {
            self.by_id
                .borrow()
                .get(&atom)
                .cloned()
                .ok_or_else(|| crate::error::Error::Protocol(format!("unknown atom {atom}")))
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
        fn wait_for_event(&self) -> Result<XEvent> {
            Err(crate::error::Error::Protocol("no events queued".into()))
        }
        fn check(&self) -> Result<()> {
            Ok(())
        }

        fn create_frame(&self, _r: Rect, _border: u32) -> Result<Xid> {
            let id = Xid(self.next_atom.get());
            self.next_atom.set(id.0 + 1);
            Ok(id)
        }
        fn destroy_window(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn reparent(&self, _child: Xid, _parent: Xid, _x: i32, _y: i32) -> Result<()> {
            Ok(())
        }
        fn map_window(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn unmap_window(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn add_to_save_set(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn remove_from_save_set(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn window_attributes(&self, id: Xid) -> Result<WindowAttributes> {
            Ok(WindowAttributes {
                override_redirect: self.override_redirect.borrow().contains(&id),
                mapped: true,
            })
        }
        fn query_tree(&self, _id: Xid) -> Result<Vec<Xid>> {
            Ok(self.root_children.borrow().clone())
        }
        fn window_geometry(&self, _id: Xid) -> Result<Rect> {
            Ok(Rect::new(0, 0, 1, 1))
        }
        fn translate_to_root(&self, _id: Xid) -> Result<Point> {
            Ok(Point::default())
        }

        fn configure(&self, id: Xid, r: Rect, border: u32) -> Result<()> {
            self.configured.borrow_mut().push((id, r, border));
            Ok(())
        }
        fn raise(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn lower(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn send_synthetic_configure_notify(&self, _id: Xid, _r: Rect, _border: u32) -> Result<()> {
            Ok(())
        }

        fn get_property(&self, id: Xid, atom: Xid) -> Result<Option<Property>> {
            Ok(self.properties.borrow().get(&(id, atom)).cloned())
        }
        fn set_property(&self, id: Xid, atom: Xid, value: &Property) -> Result<()> {
            self.properties.borrow_mut().insert((id, atom), value.clone());
            Ok(())
        }
        fn delete_property(&self, _id: Xid, _atom: Xid) -> Result<()> {
            Ok(())
        }
        fn get_size_hints(&self, _id: Xid) -> Result<SizeHints> {
            Ok(SizeHints::default())
        }

        fn select_root_events(&self) -> Result<()> {
            Ok(())
        }
        fn select_root_property_events(&self) -> Result<()> {
            Ok(())
        }
        fn select_frame_events(&self, _frame: Xid) -> Result<()> {
            Ok(())
        }
        fn select_property_events(&self, _id: Xid) -> Result<()> {
            Ok(())
        }
        fn grab_key(&self, _window: Xid, _code: crate::bindings::KeyCode) -> Result<()> {
            Ok(())
        }
        fn ungrab_key(&self, _window: Xid, _code: crate::bindings::KeyCode) -> Result<()> {
            Ok(())
        }
        fn grab_button(
            &self,
            _window: Xid,
            _state: crate::bindings::ButtonState,
            _mode: GrabMode,
        ) -> Result<()> {
            Ok(())
        }
        fn ungrab_button(&self, _window: Xid, _state: crate::bindings::ButtonState) -> Result<()> {
            Ok(())
        }
        fn grab_keyboard(&self) -> Result<()> {
            Ok(())
        }
        fn ungrab_keyboard(&self) -> Result<()> {
            Ok(())
        }
        fn grab_pointer(&self, _cursor: Cursor) -> Result<()> {
            Ok(())
        }
        fn ungrab_pointer(&self) -> Result<()> {
            Ok(())
        }
        fn allow_replay_pointer(&self) -> Result<()> {
            Ok(())
        }
        fn warp_pointer(&self, p: Point) -> Result<()> {
            self.pointer.set(p);
            Ok(())
        }
        fn query_pointer(&self) -> Result<Point> {
            Ok(self.pointer.get())
        }

        fn set_input_focus(&self, id: Xid, time: u32) -> Result<()> {
            self.focus_calls.borrow_mut().push((id, time));
            Ok(())
        }
        fn send_client_message(&self, id: Xid, message_type: Xid, data: [u32; 5]) -> Result<()> {
            self.sent_messages.borrow_mut().push((id, message_type, data));
            Ok(())
        }
        fn last_timestamp(&self) -> u32 {
            self.timestamp.get()
        }

        fn crtcs(&self) -> Result<Vec<Crtc>> {
            Ok(self.crtcs.borrow().clone())
        }

        fn draw_guideline(&self, _vertical: bool, _coord: i32) -> Result<()> {
            Ok(())
        }
        fn clear_guidelines(&self) -> Result<()> {
            Ok(())
        }

        fn spawn(&self, _argv: &[String]) -> Result<()> {
            Ok(())
        }
    }
}
