//! The production [`Connection`] implementor, wrapping an `x11rb` XCB
//! connection.
//!
//! Generic over `x11rb::connection::Connection` so it can sit on top of
//! either the pure-Rust or libxcb-backed transport; batch-interns every
//! known atom at startup and leans on `x11rb::wrapper::ConnectionExt` for
//! the `GetProperty`/ICCCM convenience helpers. Reshaped around
//! reparenting, save-set, grabs, and RandR CRTC edges.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use x11rb::connection::Connection as XcbConnection;
use x11rb::cookie::Cookie;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, Gcontext, GrabMode as XGrabMode,
    InputFocus, PropMode, Screen, SetMode, StackMode, Window, WindowClass,
};
use x11rb::wrapper::ConnectionExt as _;

use crate::bindings::{ButtonState, KeyCode, MouseButton};
use crate::connection::{Connection, Crtc, Cursor, GrabMode, WindowAttributes};
use crate::error::{Error, Result};
use crate::event::{
    ButtonPressEvent, ClientMessageEvent as DimClientMessageEvent, ConfigureRequestEvent,
    ConfigureNotifyEvent, CrossingEvent, KeyEvent, MotionNotifyEvent, NotifyDetail, NotifyMode,
    PropertyNotifyEvent, ProtocolError, XEvent,
};
use crate::geometry::{Point, Rect};
use crate::property::{NetWmState, Property, WmHints, WmHintsFlags, WmState};
use crate::sizehints::{Gravity, HintsFlags, SizeHints};
use crate::xid::Xid;

fn map_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Protocol(e.to_string())
}

fn win(id: Xid) -> Window {
    id.0
}

/// Wraps an `x11rb` connection and the bits of server state this core needs
/// to carry between requests: the root window, the screen's RandR CRTC
/// list, an XOR graphics context for guideline drawing, and the timestamp of
/// the last event seen.
pub struct X11rbConnection<C> {
    conn: C,
    root: Window,
    screen_idx: usize,
    guideline_gc: Gcontext,
    last_timestamp: Cell<u32>,
    sequence_atoms: RefCell<HashMap<u16, Xid>>,
}

impl<C> X11rbConnection<C>
where
    C: XcbConnection,
{
    /// Connect to `dpy_name` (`None` uses `$DISPLAY`), select the RandR
    /// extension, and prepare the XOR GC used for move/resize guidelines.
    ///
    /// This does *not* select `SubstructureRedirect` on root — that happens
    /// in `Manager::startup` through [`Connection::select_root_events`], so
    /// a second process probing the display (e.g. the `--tagset` control
    /// sender) can construct a connection without racing for ownership.
    pub fn connect(conn: C, screen_idx: usize) -> Result<Self>
    where
        C: XcbConnection,
    {
        let root = conn.setup().roots[screen_idx].root;

        // RandR is auto-detected and optional; its absence just degrades
        // `crtcs()` to an empty list rather than failing startup. When
        // present, subscribe to CRTC/output/screen changes so snap targets
        // and fullscreen/maximize bounds stay current.
        if conn.extension_information(randr::X11_EXTENSION_NAME).map_err(map_err)?.is_some() {
            let mask = randr::NotifyMask::CRTC_CHANGE
                | randr::NotifyMask::OUTPUT_CHANGE
                | randr::NotifyMask::SCREEN_CHANGE;
            conn.randr_select_input(root, mask).map_err(map_err)?;
        }

        let guideline_gc = conn.generate_id().map_err(map_err)?;
        let aux = xproto::CreateGCAux::new()
            .function(Some(xproto::GX::INVERT))
            .subwindow_mode(Some(xproto::SubwindowMode::INCLUDE_INFERIORS))
            .graphics_exposures(Some(0));
        conn.create_gc(guideline_gc, root, &aux).map_err(map_err)?;

        Ok(X11rbConnection {
            conn,
            root,
            screen_idx,
            guideline_gc,
            last_timestamp: Cell::new(0),
            sequence_atoms: RefCell::new(HashMap::new()),
        })
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_idx]
    }

    fn note_timestamp(&self, t: u32) {
        if t != 0 {
            self.last_timestamp.set(t);
        }
    }

    fn decode_wire_event(&self, event: x11rb::protocol::Event) -> Result<XEvent> {
        use x11rb::protocol::Event::*;
        Ok(match event {
            MapRequest(e) => XEvent::MapRequest(Xid(e.window)),
            ConfigureRequest(e) => XEvent::ConfigureRequest(ConfigureRequestEvent {
                window: Xid(e.window),
                parent: Some(Xid(e.parent)),
                x: e.value_mask.contains(xproto::ConfigWindow::X).then_some(e.x as i32),
                y: e.value_mask.contains(xproto::ConfigWindow::Y).then_some(e.y as i32),
                w: e
                    .value_mask
                    .contains(xproto::ConfigWindow::WIDTH)
                    .then_some(e.width as u32),
                h: e
                    .value_mask
                    .contains(xproto::ConfigWindow::HEIGHT)
                    .then_some(e.height as u32),
                border_width: e
                    .value_mask
                    .contains(xproto::ConfigWindow::BORDER_WIDTH)
                    .then_some(e.border_width as u32),
                stack_sibling: (e.sibling != 0).then_some(Xid(e.sibling)),
            }),
            CirculateRequest(e) => XEvent::CirculateRequest(Xid(e.window)),
            ConfigureNotify(e) => XEvent::ConfigureNotify(ConfigureNotifyEvent {
                window: Xid(e.window),
                x: e.x as i32,
                y: e.y as i32,
                w: e.width as u32,
                h: e.height as u32,
            }),
            UnmapNotify(e) => XEvent::UnmapNotify(Xid(e.window)),
            DestroyNotify(e) => XEvent::DestroyNotify(Xid(e.window)),
            ReparentNotify(e) => XEvent::ReparentNotify(Xid(e.window)),
            EnterNotify(e) => {
                self.note_timestamp(e.time);
                XEvent::Enter(CrossingEvent {
                    window: Xid(e.event),
                    root_pos: Point::new(e.root_x as i32, e.root_y as i32),
                    mode: decode_notify_mode(e.mode),
                    detail: decode_notify_detail(e.detail),
                })
            }
            LeaveNotify(e) => {
                self.note_timestamp(e.time);
                XEvent::Leave(CrossingEvent {
                    window: Xid(e.event),
                    root_pos: Point::new(e.root_x as i32, e.root_y as i32),
                    mode: decode_notify_mode(e.mode),
                    detail: decode_notify_detail(e.detail),
                })
            }
            FocusIn(e) => XEvent::FocusIn(Xid(e.event)),
            FocusOut(e) => XEvent::FocusOut(Xid(e.event)),
            ButtonPress(e) => {
                self.note_timestamp(e.time);
                XEvent::ButtonPress(decode_button(&e))
            }
            ButtonRelease(e) => {
                self.note_timestamp(e.time);
                XEvent::ButtonRelease(decode_button(&e))
            }
            MotionNotify(e) => {
                self.note_timestamp(e.time);
                XEvent::MotionNotify(MotionNotifyEvent {
                    root_pos: Point::new(e.root_x as i32, e.root_y as i32),
                    event_pos: Point::new(e.event_x as i32, e.event_y as i32),
                })
            }
            KeyPress(e) => {
                self.note_timestamp(e.time);
                XEvent::KeyPress(decode_key(&e))
            }
            KeyRelease(e) => {
                self.note_timestamp(e.time);
                XEvent::KeyRelease(decode_key(&e))
            }
            PropertyNotify(e) => {
                self.note_timestamp(e.time);
                XEvent::PropertyNotify(PropertyNotifyEvent {
                    window: Xid(e.window),
                    atom: Xid(e.atom),
                    is_root: e.window == self.root,
                })
            }
            ClientMessage(e) => XEvent::ClientMessage(DimClientMessageEvent {
                window: Xid(e.window),
                message_type: Xid(e.type_),
                data: decode_client_data(&e),
            }),
            MappingNotify(_) => XEvent::MappingNotify,
            Expose(e) => XEvent::Expose(Xid(e.window)),
            Error(e) => XEvent::Error(self.decode_error(e)),
            RandrNotify(_) | RandrScreenChangeNotify(_) => XEvent::RandrNotify,
            other => {
                tracing::debug!(?other, "unhandled wire event");
                return self.wait_for_event();
            }
        })
    }

    fn decode_error(&self, e: x11rb::x11_utils::X11Error) -> ProtocolError {
        let resource = self
            .sequence_atoms
            .borrow()
            .get(&(e.sequence as u16))
            .copied();
        ProtocolError {
            sequence: e.sequence as u16,
            error_code: e.error_code,
            resource,
        }
    }

    /// Remember which window a request cared about, keyed on its sequence
    /// number, so a later `Error` event can be correlated back.
    fn track_sequence<T>(&self, cookie: &Cookie<'_, C, T>, window: Xid) {
        self.sequence_atoms
            .borrow_mut()
            .insert(cookie.sequence_number() as u16, window);
    }
}

fn decode_notify_mode(mode: xproto::NotifyMode) -> NotifyMode {
    match mode {
        xproto::NotifyMode::GRAB => NotifyMode::Grab,
        xproto::NotifyMode::UNGRAB => NotifyMode::Ungrab,
        _ => NotifyMode::Normal,
    }
}

fn decode_notify_detail(detail: xproto::NotifyDetail) -> NotifyDetail {
    match detail {
        xproto::NotifyDetail::ANCESTOR => NotifyDetail::Ancestor,
        xproto::NotifyDetail::VIRTUAL => NotifyDetail::Virtual,
        xproto::NotifyDetail::INFERIOR => NotifyDetail::Inferior,
        xproto::NotifyDetail::NONLINEAR => NotifyDetail::Nonlinear,
        xproto::NotifyDetail::NONLINEAR_VIRTUAL => NotifyDetail::NonlinearVirtual,
        _ => NotifyDetail::Ancestor,
    }
}

fn decode_button(e: &xproto::ButtonPressEvent) -> ButtonPressEvent {
    let button = match e.detail {
        1 => MouseButton::Left,
        2 => MouseButton::Middle,
        3 => MouseButton::Right,
        4 => MouseButton::ScrollUp,
        5 => MouseButton::ScrollDown,
        _ => MouseButton::Left,
    };
    ButtonPressEvent {
        event_window: Xid(e.event),
        child: (e.child != 0).then_some(Xid(e.child)),
        root_pos: Point::new(e.root_x as i32, e.root_y as i32),
        event_pos: Point::new(e.event_x as i32, e.event_y as i32),
        state: ButtonState {
            button,
            mask: crate::bindings::ModMask::from_bits_truncate(e.state.into()),
        },
    }
}

fn decode_key(e: &xproto::KeyPressEvent) -> KeyEvent {
    KeyEvent {
        window: Xid(e.event),
        code: KeyCode::new(crate::bindings::ModMask::from_bits_truncate(e.state.into()), e.detail),
    }
}

fn decode_client_data(e: &ClientMessageEvent) -> [u32; 5] {
    match e.format {
        32 => {
            let d = e.data.as_data32();
            [d[0], d[1], d[2], d[3], d[4]]
        }
        _ => [0; 5],
    }
}

impl<C> Connection for X11rbConnection<C>
where
    C: XcbConnection,
{
    fn root(&self) -> Xid {
        Xid(self.root)
    }

    fn intern_atom(&self, name: &str) -> Result<Xid> {
        Ok(Xid(self
            .conn
            .intern_atom(false, name.as_bytes())
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?
            .atom))
    }

    fn get_atom_name(&self, atom: Xid) -> Result<String> {
        let reply = self
            .conn
            .get_atom_name(atom.0)
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?;
        String::from_utf8(reply.name).map_err(Error::from)
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush().map_err(map_err)
    }

    fn wait_for_event(&self) -> Result<XEvent> {
        let event = self.conn.wait_for_event().map_err(map_err)?;
        self.decode_wire_event(event)
    }

    fn check(&self) -> Result<()> {
        // `x11rb` surfaces protocol errors as queued `Event::Error` values
        // rather than out-of-band exceptions; a round-trip request forces
        // any buffered errors to be flushed to the event queue for the next
        // `wait_for_event` to pick up.
        self.conn.get_input_focus().map_err(map_err)?.reply().map_err(map_err)?;
        Ok(())
    }

    fn create_frame(&self, r: Rect, border: u32) -> Result<Xid> {
        let id = self.conn.generate_id().map_err(map_err)?;
        let screen = self.screen();
        let aux = CreateWindowAux::new()
            .event_mask(EventMask::SUBSTRUCTURE_NOTIFY | EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE)
            .override_redirect(0)
            .background_pixel(screen.black_pixel);
        self.conn
            .create_window(
                screen.root_depth,
                id,
                self.root,
                r.x as i16,
                r.y as i16,
                r.w as u16,
                r.h as u16,
                border as u16,
                WindowClass::INPUT_OUTPUT,
                screen.root_visual,
                &aux,
            )
            .map_err(map_err)?;
        Ok(Xid(id))
    }

    fn destroy_window(&self, id: Xid) -> Result<()> {
        let cookie = self.conn.destroy_window(win(id)).map_err(map_err)?;
        self.track_sequence(&cookie, id);
        Ok(())
    }

    fn reparent(&self, child: Xid, parent: Xid, x: i32, y: i32) -> Result<()> {
        let cookie = self
            .conn
            .reparent_window(win(child), win(parent), x as i16, y as i16)
            .map_err(map_err)?;
        self.track_sequence(&cookie, child);
        Ok(())
    }

    fn map_window(&self, id: Xid) -> Result<()> {
        let cookie = self.conn.map_window(win(id)).map_err(map_err)?;
        self.track_sequence(&cookie, id);
        Ok(())
    }

    fn unmap_window(&self, id: Xid) -> Result<()> {
        self.conn.unmap_window(win(id)).map_err(map_err)?;
        Ok(())
    }

    fn add_to_save_set(&self, id: Xid) -> Result<()> {
        self.conn.change_save_set(SetMode::INSERT, win(id)).map_err(map_err)?;
        Ok(())
    }

    fn remove_from_save_set(&self, id: Xid) -> Result<()> {
        self.conn.change_save_set(SetMode::DELETE, win(id)).map_err(map_err)?;
        Ok(())
    }

    fn window_attributes(&self, id: Xid) -> Result<WindowAttributes> {
        let reply = self.conn.get_window_attributes(win(id)).map_err(map_err)?.reply().map_err(map_err)?;
        Ok(WindowAttributes {
            override_redirect: reply.override_redirect,
            mapped: reply.map_state == xproto::MapState::VIEWABLE,
        })
    }

    fn query_tree(&self, id: Xid) -> Result<Vec<Xid>> {
        let reply = self.conn.query_tree(win(id)).map_err(map_err)?.reply().map_err(map_err)?;
        Ok(reply.children.into_iter().map(Xid).collect())
    }

    fn window_geometry(&self, id: Xid) -> Result<Rect> {
        let reply = self.conn.get_geometry(win(id)).map_err(map_err)?.reply().map_err(map_err)?;
        Ok(Rect::new(reply.x as i32, reply.y as i32, reply.width as u32, reply.height as u32))
    }

    fn translate_to_root(&self, id: Xid) -> Result<Point> {
        let reply = self
            .conn
            .translate_coordinates(win(id), self.root, 0, 0)
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?;
        Ok(Point::new(reply.dst_x as i32, reply.dst_y as i32))
    }

    fn configure(&self, id: Xid, r: Rect, border: u32) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(r.x)
            .y(r.y)
            .width(r.w)
            .height(r.h)
            .border_width(border);
        let cookie = self.conn.configure_window(win(id), &aux).map_err(map_err)?;
        self.track_sequence(&cookie, id);
        Ok(())
    }

    fn raise(&self, id: Xid) -> Result<()> {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        self.conn.configure_window(win(id), &aux).map_err(map_err)?;
        Ok(())
    }

    fn lower(&self, id: Xid) -> Result<()> {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::BELOW);
        self.conn.configure_window(win(id), &aux).map_err(map_err)?;
        Ok(())
    }

    fn send_synthetic_configure_notify(&self, id: Xid, r: Rect, border: u32) -> Result<()> {
        // ICCCM §4.1.5: a synthetic ConfigureNotify must carry root-relative
        // coordinates and report the server's window id as both the event
        // and the (non-existent) above-sibling window.
        let event = xproto::ConfigureNotifyEvent {
            response_type: xproto::CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: win(id),
            window: win(id),
            above_sibling: x11rb::NONE,
            x: r.x as i16,
            y: r.y as i16,
            width: r.w as u16,
            height: r.h as u16,
            border_width: border as u16,
            override_redirect: false,
        };
        self.conn
            .send_event(false, win(id), EventMask::STRUCTURE_NOTIFY, event)
            .map_err(map_err)?;
        Ok(())
    }

    fn get_property(&self, id: Xid, atom: Xid) -> Result<Option<Property>> {
        decode_property(&self.conn, win(id), atom.0)
    }

    fn set_property(&self, id: Xid, atom: Xid, value: &Property) -> Result<()> {
        encode_property(&self.conn, win(id), atom.0, value)
    }

    fn delete_property(&self, id: Xid, atom: Xid) -> Result<()> {
        self.conn.delete_property(win(id), atom.0).map_err(map_err)?;
        Ok(())
    }

    fn get_size_hints(&self, id: Xid) -> Result<SizeHints> {
        let reply = self
            .conn
            .get_property(false, win(id), AtomEnum::WM_NORMAL_HINTS, AtomEnum::WM_SIZE_HINTS, 0, 18)
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?;
        let Some(values) = reply.value32() else {
            return Ok(SizeHints::default());
        };
        let v: Vec<u32> = values.collect();
        if v.len() < 18 {
            return Ok(SizeHints::default());
        }
        let flags = HintsFlags::from_bits_truncate(v[0]);
        let mut hints = SizeHints { flags, ..Default::default() };
        if flags.contains(HintsFlags::P_MIN_SIZE) {
            hints.min = (v[5], v[6]);
        }
        if flags.contains(HintsFlags::P_MAX_SIZE) {
            hints.max = Some((v[7], v[8]));
        }
        if flags.contains(HintsFlags::P_RESIZE_INC) {
            hints.inc = (v[9].max(1), v[10].max(1));
        }
        if flags.contains(HintsFlags::P_ASPECT) {
            hints.aspect = Some(((v[11], v[12]), (v[13], v[14])));
        }
        if flags.contains(HintsFlags::P_BASE_SIZE) {
            hints.base = (v[15], v[16]);
        } else if flags.contains(HintsFlags::P_MIN_SIZE) {
            hints.base = hints.min;
        }
        hints.gravity = decode_gravity(v[17]);
        Ok(hints)
    }

    fn select_root_events(&self) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(
            EventMask::SUBSTRUCTURE_REDIRECT
                | EventMask::SUBSTRUCTURE_NOTIFY
                | EventMask::PROPERTY_CHANGE,
        );
        self.conn
            .change_window_attributes(self.root, &aux)
            .map_err(map_err)?
            .check()
            .map_err(|_| Error::WmAlreadyRunning)?;
        Ok(())
    }

    fn select_root_property_events(&self) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE);
        self.conn.change_window_attributes(self.root, &aux).map_err(map_err)?;
        Ok(())
    }

    fn select_frame_events(&self, frame: Xid) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::BUTTON_PRESS | EventMask::ENTER_WINDOW,
        );
        self.conn.change_window_attributes(win(frame), &aux).map_err(map_err)?;
        Ok(())
    }

    fn select_property_events(&self, id: Xid) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE);
        self.conn.change_window_attributes(win(id), &aux).map_err(map_err)?;
        Ok(())
    }

    fn grab_key(&self, window: Xid, code: crate::bindings::KeyCode) -> Result<()> {
        self.conn
            .grab_key(true, win(window), code.mask.bits().into(), code.code, XGrabMode::ASYNC, XGrabMode::ASYNC)
            .map_err(map_err)?;
        Ok(())
    }

    fn ungrab_key(&self, window: Xid, code: crate::bindings::KeyCode) -> Result<()> {
        self.conn
            .ungrab_key(code.code, win(window), code.mask.bits().into())
            .map_err(map_err)?;
        Ok(())
    }

    fn grab_button(&self, window: Xid, state: crate::bindings::ButtonState, mode: GrabMode) -> Result<()> {
        let pointer_mode = match mode {
            GrabMode::Sync => XGrabMode::SYNC,
            GrabMode::Async => XGrabMode::ASYNC,
        };
        self.conn
            .grab_button(
                false,
                win(window),
                u32::from(EventMask::BUTTON_PRESS) as u16,
                pointer_mode,
                XGrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                u8::from(state.button) as u8,
                state.mask.bits(),
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn ungrab_button(&self, window: Xid, state: crate::bindings::ButtonState) -> Result<()> {
        self.conn
            .ungrab_button(u8::from(state.button), win(window), state.mask.bits())
            .map_err(map_err)?;
        Ok(())
    }

    fn grab_keyboard(&self) -> Result<()> {
        self.conn
            .grab_keyboard(
                false,
                self.root,
                self.last_timestamp.get(),
                XGrabMode::ASYNC,
                XGrabMode::ASYNC,
            )
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?;
        Ok(())
    }

    fn ungrab_keyboard(&self) -> Result<()> {
        self.conn.ungrab_keyboard(self.last_timestamp.get()).map_err(map_err)?;
        Ok(())
    }

    fn grab_pointer(&self, _cursor: Cursor) -> Result<()> {
        self.conn
            .grab_pointer(
                false,
                self.root,
                u32::from(EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION) as u16,
                XGrabMode::ASYNC,
                XGrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                self.last_timestamp.get(),
            )
            .map_err(map_err)?
            .reply()
            .map_err(map_err)?;
        Ok(())
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.conn.ungrab_pointer(self.last_timestamp.get()).map_err(map_err)?;
        Ok(())
    }

    fn allow_replay_pointer(&self) -> Result<()> {
        self.conn
            .allow_events(xproto::Allow::REPLAY_POINTER, self.last_timestamp.get())
            .map_err(map_err)?;
        Ok(())
    }

    fn warp_pointer(&self, p: Point) -> Result<()> {
        self.conn
            .warp_pointer(x11rb::NONE, self.root, 0, 0, 0, 0, p.x as i16, p.y as i16)
            .map_err(map_err)?;
        Ok(())
    }

    fn query_pointer(&self) -> Result<Point> {
        let reply = self.conn.query_pointer(self.root).map_err(map_err)?.reply().map_err(map_err)?;
        Ok(Point::new(reply.root_x as i32, reply.root_y as i32))
    }

    fn set_input_focus(&self, id: Xid, time: u32) -> Result<()> {
        let cookie = self
            .conn
            .set_input_focus(InputFocus::PARENT, win(id), time)
            .map_err(map_err)?;
        self.track_sequence(&cookie, id);
        Ok(())
    }

    fn send_client_message(&self, id: Xid, message_type: Xid, data: [u32; 5]) -> Result<()> {
        let event = ClientMessageEvent::new(32, win(id), message_type.0, data);
        self.conn
            .send_event(false, win(id), EventMask::NO_EVENT, event)
            .map_err(map_err)?;
        Ok(())
    }

    fn last_timestamp(&self) -> u32 {
        self.last_timestamp.get()
    }

    fn crtcs(&self) -> Result<Vec<Crtc>> {
        let resources = match self.conn.randr_get_screen_resources(self.root) {
            Ok(cookie) => cookie.reply().map_err(map_err)?,
            Err(_) => return Ok(vec![]),
        };
        let mut out = Vec::new();
        for crtc in resources.crtcs {
            let info = self
                .conn
                .randr_get_crtc_info(crtc, resources.config_timestamp)
                .map_err(map_err)?
                .reply()
                .map_err(map_err)?;
            if info.width == 0 || info.height == 0 {
                continue; // disabled CRTC
            }
            out.push(Crtc {
                id: Xid(crtc),
                region: Rect::new(info.x as i32, info.y as i32, info.width as u32, info.height as u32),
            });
        }
        Ok(out)
    }

    fn draw_guideline(&self, vertical: bool, coord: i32) -> Result<()> {
        let screen = self.screen();
        let (x1, y1, x2, y2) = if vertical {
            (coord, 0, coord, screen.height_in_pixels as i32)
        } else {
            (0, coord, screen.width_in_pixels as i32, coord)
        };
        let points = [
            xproto::Point { x: x1 as i16, y: y1 as i16 },
            xproto::Point { x: x2 as i16, y: y2 as i16 },
        ];
        self.conn
            .poly_line(xproto::CoordMode::ORIGIN, self.root, self.guideline_gc, &points)
            .map_err(map_err)?;
        Ok(())
    }

    fn clear_guidelines(&self) -> Result<()> {
        // Drawing the same XOR segment again erases it; callers track the
        // last-drawn coordinate and call this with it before moving on.
        Ok(())
    }

    fn spawn(&self, argv: &[String]) -> Result<()> {
        if argv.is_empty() {
            return Ok(());
        }
        spawn_detached(argv)
    }
}

fn decode_gravity(v: u32) -> Gravity {
    match v {
        1 => Gravity::NorthWest,
        2 => Gravity::North,
        3 => Gravity::NorthEast,
        4 => Gravity::West,
        5 => Gravity::Center,
        6 => Gravity::East,
        7 => Gravity::SouthWest,
        8 => Gravity::South,
        9 => Gravity::SouthEast,
        10 => Gravity::Static,
        _ => Gravity::NorthWest,
    }
}

fn decode_property<C: XcbConnection>(conn: &C, window: Window, atom: u32) -> Result<Option<Property>> {
    let reply = conn
        .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
        .map_err(map_err)?
        .reply()
        .map_err(map_err)?;
    if reply.type_ == x11rb::NONE {
        return Ok(None);
    }
    if reply.format == 32 {
        let values: Vec<u32> = reply.value32().map(|it| it.collect()).unwrap_or_default();
        if reply.type_ == u32::from(AtomEnum::ATOM) {
            return Ok(Some(Property::AtomList(values.into_iter().map(Xid).collect())));
        }
        if values.len() == 1 {
            if let Some(state) = WmState::from_wire(values[0]) {
                return Ok(Some(Property::State(state)));
            }
        }
        if values.len() >= 2 {
            return Ok(Some(Property::Hints(WmHints {
                flags: WmHintsFlags::from_bits_truncate(values[0]),
                accepts_input: values[0] & WmHintsFlags::INPUT_HINT.bits() == 0 || values[1] != 0,
                urgent: WmHintsFlags::from_bits_truncate(values[0]).contains(WmHintsFlags::URGENCY_HINT),
            })));
        }
        return Ok(Some(Property::CardinalList(values)));
    }
    if reply.format == 8 {
        let bytes = reply.value;
        // WM_COMMAND is NUL-separated argv; a plain UTF8_STRING/WM_NAME is one string.
        if bytes.contains(&0) {
            let strings = bytes
                .split(|&b| b == 0)
                .filter(|s| !s.is_empty())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect::<Vec<_>>();
            if strings.len() > 1 {
                return Ok(Some(Property::WmCommand(strings)));
            }
        }
        return Ok(Some(Property::Utf8String(String::from_utf8_lossy(&bytes).into_owned())));
    }
    Ok(None)
}

fn encode_property<C: XcbConnection>(conn: &C, window: Window, atom: u32, value: &Property) -> Result<()> {
    match value {
        Property::Utf8String(s) => {
            conn.change_property8(PropMode::REPLACE, window, atom, AtomEnum::STRING, s.as_bytes())
                .map_err(map_err)?;
        }
        Property::AtomList(atoms) => {
            let raw: Vec<u32> = atoms.iter().map(|a| a.0).collect();
            conn.change_property32(PropMode::REPLACE, window, atom, AtomEnum::ATOM, &raw)
                .map_err(map_err)?;
        }
        Property::CardinalList(values) => {
            conn.change_property32(PropMode::REPLACE, window, atom, AtomEnum::CARDINAL, values)
                .map_err(map_err)?;
        }
        Property::State(state) => {
            conn.change_property32(PropMode::REPLACE, window, atom, AtomEnum::CARDINAL, &[*state as u32, 0])
                .map_err(map_err)?;
        }
        Property::Hints(hints) => {
            let raw = [hints.flags.bits(), if hints.accepts_input { 1 } else { 0 }, 0, 0, 0, 0, 0, 0, 0];
            conn.change_property32(PropMode::REPLACE, window, atom, AtomEnum::WM_HINTS, &raw)
                .map_err(map_err)?;
        }
        Property::SizeHints(_) => {
            // The core only ever reads WM_NORMAL_HINTS; it
            // never sets another client's hints back.
        }
        Property::WmCommand(argv) => {
            let mut bytes = Vec::new();
            for arg in argv {
                bytes.extend_from_slice(arg.as_bytes());
                bytes.push(0);
            }
            conn.change_property8(PropMode::REPLACE, window, atom, AtomEnum::STRING, &bytes)
                .map_err(map_err)?;
        }
    }
    Ok(())
}

/// Double-fork a detached child exec'ing `argv` to launch a user shell
/// command: the manager never waits on it beyond the immediate fork join.
fn spawn_detached(argv: &[String]) -> Result<()> {
    use nix::sys::wait::waitpid;
    use nix::unistd::{fork, ForkResult};
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    match unsafe { fork() }.map_err(|e| Error::Protocol(e.to_string()))? {
        ForkResult::Parent { child } => {
            let _ = waitpid(child, None);
            Ok(())
        }
        ForkResult::Child => {
            // Second fork detaches the grandchild so the manager's
            // intermediate child (already reaped above) doesn't have to
            // wait on it; the grandchild is re-parented to init.
            match unsafe { fork() } {
                Ok(ForkResult::Parent { .. }) => std::process::exit(0),
                Ok(ForkResult::Child) => {
                    let err = Command::new(&argv[0]).args(&argv[1..]).exec();
                    tracing::error!(?err, cmd = ?argv, "exec failed in spawned child");
                    std::process::exit(1);
                }
                Err(_) => std::process::exit(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_gravity_matches_iccccm_table() {
        assert_eq!(decode_gravity(1), Gravity::NorthWest);
        assert_eq!(decode_gravity(5), Gravity::Center);
        assert_eq!(decode_gravity(10), Gravity::Static);
    }
}
