//! Manager: lifecycle, screen setup, RandR, and the main event loop. This
//! is the top of the dependency graph: every other module is a
//! collaborator the manager owns and drives.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::atom::{Atom, AtomRegistry};
use crate::bindings::{Bindings, ChordKey, KeyCode, PressOutcome};
use crate::client::ClientTable;
use crate::config::{Config, FocusPolicyKind};
use crate::connection::{Connection, GrabMode};
use crate::draw::{ButtonTarget, Decorator, NullRenderer, TextRenderer};
use crate::error::{Error, Result};
use crate::event::{NotifyDetail, ProtocolError, XEvent};
use crate::focus::{ClickToFocus, FocusController, FocusNewWindows, FocusPolicy, FocusTarget, SloppyFocus};
use crate::focus_cycle::{self, FocusCycleModal};
use crate::geometry::Rect;
use crate::modal::{DispatchOutcome, ModalStack};
use crate::movresize::{self, Handle, MoveModal, ResizeModal};
use crate::property::{NetWmState, Property, WmState};
use crate::tags::{self, TagsetStack};
use crate::xid::Xid;

/// A resolved binding callback: the set of actions the binding engine's
/// terminal values can name.
#[derive(Debug, Clone)]
pub enum Action {
    KillClient,
    ToggleFullscreen,
    ToggleMaximize,
    StartMove,
    StartResize,
    StartFocusCycle,
    SwitchTagset(String),
    EditTags,
    Spawn(Vec<String>),
    Quit,
    Restart,
}

enum AnyPolicy {
    Sloppy(FocusNewWindows<SloppyFocus>),
    Click(FocusNewWindows<ClickToFocus>),
}

impl FocusPolicy for AnyPolicy {
    fn on_enter(&mut self, clients: &ClientTable, ev: &crate::event::CrossingEvent) -> Option<Xid> {
        match self {
            AnyPolicy::Sloppy(p) => p.on_enter(clients, ev),
            AnyPolicy::Click(p) => p.on_enter(clients, ev),
        }
    }
    fn on_map(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid> {
        match self {
            AnyPolicy::Sloppy(p) => p.on_map(clients, id),
            AnyPolicy::Click(p) => p.on_map(clients, id),
        }
    }
    fn on_button_press(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid> {
        match self {
            AnyPolicy::Sloppy(p) => p.on_button_press(clients, id),
            AnyPolicy::Click(p) => p.on_button_press(clients, id),
        }
    }
    fn on_unmanage(&mut self, id: Xid) {
        match self {
            AnyPolicy::Sloppy(p) => p.on_unmanage(id),
            AnyPolicy::Click(p) => p.on_unmanage(id),
        }
    }
}

/// In-progress interactive geometry operation, tracked outside the
/// `ModalStack` trait object so motion handling can borrow `ClientTable`
/// mutably without fighting `dyn Modal`.
enum GeometryOp {
    Move(MoveModal),
    Resize(ResizeModal),
}

/// Bookkeeping for an in-progress tag-edit minibuffer: which client it's
/// editing, and the cell the minibuffer's commit closure deposits the final
/// text into. A closure rather than a direct reference because the modal
/// lives inside `Manager::modals`, so it cannot also borrow `Manager` itself.
struct TagEditPending {
    client: Xid,
    result: Rc<RefCell<Option<String>>>,
}

pub struct Manager {
    conn: Box<dyn Connection>,
    atoms: AtomRegistry,
    pub clients: ClientTable,
    focus: FocusController,
    policy: AnyPolicy,
    bindings: Bindings<Action>,
    modals: ModalStack,
    cycle: Option<FocusCycleModal>,
    geometry_op: Option<GeometryOp>,
    tag_edit: Option<TagEditPending>,
    pub tagset: TagsetStack,
    visible: std::collections::BTreeSet<Xid>,
    decorators: HashMap<Xid, Decorator>,
    renderer: Box<dyn TextRenderer>,
    config: Config,
    running: bool,
}

impl Manager {
    pub fn new(conn: Box<dyn Connection>, config: Config, bindings: Bindings<Action>) -> Self {
        let policy = match config.focus_policy {
            FocusPolicyKind::Sloppy => AnyPolicy::Sloppy(FocusNewWindows::new(SloppyFocus)),
            FocusPolicyKind::ClickToFocus => AnyPolicy::Click(FocusNewWindows::new(ClickToFocus::default())),
        };
        Manager {
            conn,
            atoms: AtomRegistry::new(),
            clients: ClientTable::new(),
            focus: FocusController::new(),
            policy,
            bindings,
            modals: ModalStack::new(),
            cycle: None,
            geometry_op: None,
            tag_edit: None,
            tagset: TagsetStack::new(),
            visible: std::collections::BTreeSet::new(),
            decorators: HashMap::new(),
            renderer: Box::new(NullRenderer),
            config,
            running: false,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TextRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Feed one already-decoded event through the dispatcher. `run` is just
    /// this in a loop; exposed directly so a driver can step the manager
    /// through a scripted sequence without a live connection.
    pub fn dispatch_event(&mut self, ev: XEvent) -> Result<()> {
        self.dispatch(ev)
    }

    /// Replace the active tagset expression and remap clients to match.
    pub fn set_tagset(&mut self, expr: impl Into<String>) -> Result<()> {
        self.switch_tagset(expr.into())
    }

    pub fn is_visible(&self, id: Xid) -> bool {
        self.visible.contains(&id)
    }

    pub fn focused_client(&self) -> Option<Xid> {
        match self.focus.current {
            FocusTarget::Client(id) => Some(id),
            FocusTarget::RootPointer => None,
        }
    }

    /// Resolve a tag name to the atom id that identifies it, interning it
    /// on first use. Exposed so a driver can tag clients with the same id
    /// a tagset expression naming that tag will resolve to.
    pub fn tag_id(&self, name: &str) -> Option<Xid> {
        self.resolve_tag(name)
    }

    fn resolve_tag(&self, name: &str) -> Option<Xid> {
        self.atoms.intern(&*self.conn, name).ok()
    }

    /// Startup: select substructure-redirect on root, prime the atom cache, and adopt
    /// every already-mapped non-override-redirect child of root.
    pub fn startup(&mut self) -> Result<()> {
        self.conn
            .select_root_events()
            .map_err(|_| Error::WmAlreadyRunning)?;
        self.atoms.prime(&*self.conn)?;

        for win in self.conn.query_tree(self.conn.root())? {
            let attrs = self.conn.window_attributes(win)?;
            if attrs.override_redirect || !attrs.mapped {
                continue;
            }
            self.adopt(win)?;
        }
        self.running = true;
        Ok(())
    }

    fn adopt(&mut self, window: Xid) -> Result<()> {
        let geometry = self.conn.window_geometry(window)?;
        let border = self.config.border_px;
        let titlebar = self.config.titlebar_height;
        let frame = self.clients.adopt(&*self.conn, window, geometry, border, titlebar)?;

        if let Some(client) = self.clients.get_mut(window) {
            client.hints = self.conn.get_size_hints(window).unwrap_or_default();
            client.geometry = client.hints.constrain(client.geometry);
        }
        let title = self.read_title(window).unwrap_or_default();
        if let Some(client) = self.clients.get_mut(window) {
            client.title = title;
        }
        self.read_protocols(window)?;
        self.read_wm_hints(window)?;
        self.read_tags(window)?;

        let frame_geom = self.clients.get(window).map(|c| c.frame_geometry()).unwrap_or(geometry);
        let deco = Decorator::create(&*self.conn, window, frame, frame_geom, titlebar)?;
        self.decorators.insert(window, deco);
        self.visible.insert(window);

        if let Some(target) = self.policy.on_map(&self.clients, window) {
            self.focus.focus(&*self.conn, &self.clients, target)?;
        } else {
            self.focus.list.push_front(window);
        }
        self.redraw_decoration(window)?;
        Ok(())
    }

    /// Read `WM_PROTOCOLS` and populate whether the client participates in
    /// the `WM_DELETE_WINDOW`/`WM_TAKE_FOCUS` protocols (ICCCM §4.1.2.7,
    /// §4.1.7).
    fn read_protocols(&mut self, window: Xid) -> Result<()> {
        let protocols_atom = self.atoms.known(&*self.conn, Atom::WmProtocols)?;
        let delete_atom = self.atoms.known(&*self.conn, Atom::WmDeleteWindow)?;
        let take_focus_atom = self.atoms.known(&*self.conn, Atom::WmTakeFocus)?;
        let protocols = self
            .conn
            .get_property(window, protocols_atom)?
            .and_then(|p| p.as_atom_list().map(<[Xid]>::to_vec))
            .unwrap_or_default();
        if let Some(client) = self.clients.get_mut(window) {
            client.supports_delete = protocols.contains(&delete_atom);
            client.supports_take_focus = protocols.contains(&take_focus_atom);
        }
        Ok(())
    }

    /// Read `WM_HINTS` (ICCCM §4.1.2.3), most importantly `InputHint`, which
    /// governs whether focus policy ever gives this client input focus.
    fn read_wm_hints(&mut self, window: Xid) -> Result<()> {
        let atom = self.atoms.known(&*self.conn, Atom::WmHints)?;
        if let Some(Property::Hints(hints)) = self.conn.get_property(window, atom)? {
            if let Some(client) = self.clients.get_mut(window) {
                client.wm_hints = hints;
            }
        }
        Ok(())
    }

    /// Read `_DIM_TAGS` back into the client's in-memory tag set so tags
    /// survive a restart or re-adoption.
    fn read_tags(&mut self, window: Xid) -> Result<()> {
        let atom = self.atoms.known(&*self.conn, Atom::DimTags)?;
        let tags = self
            .conn
            .get_property(window, atom)?
            .and_then(|p| p.as_atom_list().map(<[Xid]>::to_vec));
        if let Some(tags) = tags {
            if let Some(client) = self.clients.get_mut(window) {
                client.tags = tags;
            }
        }
        Ok(())
    }

    /// Resolve a client's tags to their interned names, space-separated, for
    /// display as the minibuffer's initial text.
    fn tag_names(&self, tags: &[Xid]) -> Result<String> {
        let mut names = Vec::with_capacity(tags.len());
        for &tag in tags {
            names.push(self.atoms.name(&*self.conn, tag)?);
        }
        Ok(names.join(" "))
    }

    /// Update a client's tags in memory and mirror them onto `_DIM_TAGS` so
    /// they survive restart/re-adoption.
    fn set_client_tags(&mut self, id: Xid, tags: Vec<Xid>) -> Result<()> {
        if let Some(client) = self.clients.get_mut(id) {
            client.tags = tags.clone();
        } else {
            return Ok(());
        }
        let atom = self.atoms.known(&*self.conn, Atom::DimTags)?;
        self.conn.set_property(id, atom, &Property::AtomList(tags))
    }

    /// Parse whitespace-separated tag names committed from the minibuffer
    /// back into atoms and apply them to the client.
    fn apply_tag_edit(&mut self, id: Xid, text: &str) -> Result<()> {
        let mut tags = Vec::new();
        for word in text.split_whitespace() {
            if let Some(tag) = self.resolve_tag(word) {
                tags.push(tag);
            }
        }
        self.set_client_tags(id, tags)
    }

    /// Open the minibuffer, converting the client's titlebar into a text
    /// entry pre-filled with its current tags (§4.9, §4.10).
    fn start_edit_tags(&mut self, id: Xid) -> Result<()> {
        if self.modals.is_active() {
            return Ok(());
        }
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        let initial = self.tag_names(&client.tags)?;
        let Some(deco) = self.decorators.get(&id) else { return Ok(()) };

        let result = Rc::new(RefCell::new(None));
        let commit_result = result.clone();
        let modal = deco.read_from_user(
            "tags: ",
            &initial,
            Box::new(move |text| {
                *commit_result.borrow_mut() = Some(text.to_string());
            }),
            Box::new(|| {}),
        );
        self.modals.push(&*self.conn, Box::new(modal))?;
        self.tag_edit = Some(TagEditPending { client: id, result });
        Ok(())
    }

    /// Read a window's title, preferring the UTF-8 `_NET_WM_NAME` over the
    /// legacy `WM_NAME` when both are present.
    fn read_title(&self, window: Xid) -> Result<String> {
        let net_name = self.atoms.known(&*self.conn, Atom::NetWmName)?;
        if let Some(title) = self.conn.get_property(window, net_name)?.and_then(|p| p.as_utf8().map(str::to_string)) {
            return Ok(title);
        }
        let name = self.atoms.known(&*self.conn, Atom::WmName)?;
        Ok(self
            .conn
            .get_property(window, name)?
            .and_then(|p| p.as_utf8().map(str::to_string))
            .unwrap_or_default())
    }

    fn redraw_decoration(&mut self, id: Xid) -> Result<()> {
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        let focused = self.focus.current == FocusTarget::Client(id);
        let width = client.frame_geometry().w;
        if let Some(deco) = self.decorators.get_mut(&id) {
            deco.set_title(client.title.clone());
            let font = self.config.fonts.first().cloned().unwrap_or_else(|| "fixed".into());
            deco.redraw(&*self.renderer, &font, width, focused)?;
        }
        Ok(())
    }

    /// A request that cared about `err.resource` already tagged it via the
    /// connection's own sequence/resource tracking (see `backend::x11rb`'s
    /// `track_sequence`); drop the offending client if it's still one we
    /// manage, since that's the only requester that ever cares. Errors with
    /// no correlated resource, or whose resource isn't a managed client
    /// (frame creation races, grabs on a window we never adopted), are just
    /// logged, per the race-with-vanishing-client contract.
    fn on_protocol_error(&mut self, err: ProtocolError) -> Result<()> {
        match err.resource {
            Some(id) if self.clients.contains(id) => {
                tracing::debug!(?err, client = ?id, "protocol error on managed client; dropping it");
                self.unmanage(id)
            }
            _ => {
                tracing::debug!(?err, "uncorrelated protocol error");
                Ok(())
            }
        }
    }

    fn unmanage(&mut self, id: Xid) -> Result<()> {
        if let Some(deco) = self.decorators.remove(&id) {
            let _ = deco.destroy(&*self.conn);
        }
        self.clients.unmanage(&*self.conn, id)?;
        self.policy.on_unmanage(id);
        self.focus.on_unmap_or_unmanage(id);
        self.visible.remove(&id);
        self.ensure_focus()
    }

    fn ensure_focus(&mut self) -> Result<()> {
        let visible = &self.visible;
        self.focus.ensure_focus(&*self.conn, &self.clients, &|id| visible.contains(&id))
    }

    /// Run the event loop. Blocks on the connection's single suspension
    /// point and dispatches synchronously.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            let ev = match self.conn.wait_for_event() {
                Ok(ev) => ev,
                Err(e) => {
                    tracing::error!(error = %e, "event loop error; shutting down");
                    self.shutdown()?;
                    return Err(e);
                }
            };
            if let Err(e) = self.dispatch(ev) {
                tracing::warn!(error = %e, "error handling event");
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, ev: XEvent) -> Result<()> {
        if self.modals.is_active() {
            if let XEvent::MotionNotify(m) = &ev {
                self.drive_geometry_motion(m.root_pos)?;
            }
            match self.modals.dispatch(&*self.conn, &ev)? {
                DispatchOutcome::NotConsumed => {}
                DispatchOutcome::Consumed => return Ok(()),
                DispatchOutcome::Finished { aborted } => {
                    self.finish_modal(aborted)?;
                    return Ok(());
                }
            }
        }

        match ev {
            XEvent::MapRequest(win) => self.on_map_request(win)?,
            XEvent::ConfigureRequest(req) => self.on_configure_request(req)?,
            XEvent::CirculateRequest(_) => {}
            XEvent::UnmapNotify(win) => self.unmanage(win)?,
            XEvent::DestroyNotify(win) => self.unmanage(win)?,
            XEvent::Enter(crossing) => {
                if crossing.detail != NotifyDetail::Inferior {
                    if let Some(target) = self.policy.on_enter(&self.clients, &crossing) {
                        self.focus.focus(&*self.conn, &self.clients, target)?;
                        self.redraw_decoration(target)?;
                    }
                }
            }
            XEvent::ButtonPress(btn) => self.on_button_press(btn)?,
            XEvent::KeyPress(key) => self.on_key_press(key)?,
            XEvent::ClientMessage(msg) => self.on_client_message(msg)?,
            XEvent::PropertyNotify(pn) if pn.is_root => self.on_root_property(pn.atom)?,
            XEvent::PropertyNotify(pn) => self.on_client_property(pn.window, pn.atom)?,
            XEvent::Error(err) => self.on_protocol_error(err)?,
            _ => {}
        }
        Ok(())
    }

    fn on_map_request(&mut self, win: Xid) -> Result<()> {
        self.adopt(win)
    }

    fn on_configure_request(&mut self, req: crate::event::ConfigureRequestEvent) -> Result<()> {
        let Some(client) = self.clients.get(req.window) else {
            return Ok(());
        };
        if client.is_maximized() || client.is_fullscreen() {
            // Configure requests are suppressed for the constrained
            // dimensions while maximized/fullscreen.
            return Ok(());
        }
        let mut geom = client.geometry;
        if let Some(x) = req.x {
            geom.x = x;
        }
        if let Some(y) = req.y {
            geom.y = y;
        }
        if let Some(w) = req.w {
            geom.w = w;
        }
        if let Some(h) = req.h {
            geom.h = h;
        }
        geom = client.constrain(geom);
        self.clients.set_geometry(&*self.conn, req.window, geom)
    }

    fn on_button_press(&mut self, btn: crate::event::ButtonPressEvent) -> Result<()> {
        let Some(client) = self.clients.by_frame(btn.event_window) else {
            return Ok(());
        };
        let id = client.id;
        let width = client.frame_geometry().w;

        if self.focus.current != FocusTarget::Client(id) {
            if let Some(target) = self.policy.on_button_press(&self.clients, id) {
                self.conn.grab_button(btn.event_window, btn.state, GrabMode::Sync)?;
                self.focus.focus(&*self.conn, &self.clients, target)?;
                self.conn.allow_replay_pointer()?;
                self.conn.ungrab_button(btn.event_window, btn.state)?;
                self.redraw_decoration(target)?;
            }
        }

        if let Some(deco) = self.decorators.get(&id) {
            match deco.hit_test(width, btn.event_pos.x) {
                ButtonTarget::Close => self.kill_client(id)?,
                ButtonTarget::Maximize => self.toggle_maximize(id)?,
                ButtonTarget::Iconify => self.iconify(id)?,
                ButtonTarget::Drag => self.start_move(id, btn.root_pos)?,
            }
        }
        Ok(())
    }

    fn on_key_press(&mut self, key: crate::event::KeyEvent) -> Result<()> {
        match self.bindings.press(ChordKey::Key(key.code)) {
            PressOutcome::Terminal(action) => {
                let action = action.clone();
                self.run_action(action, key.code)?;
            }
            PressOutcome::IntermediatePrefix => {
                self.conn.grab_keyboard()?;
            }
            PressOutcome::NoMatch => {
                if !self.bindings.is_prefix_active() {
                    self.conn.ungrab_keyboard()?;
                }
            }
        }
        Ok(())
    }

    fn run_action(&mut self, action: Action, trigger: KeyCode) -> Result<()> {
        match action {
            Action::KillClient => {
                if let FocusTarget::Client(id) = self.focus.current {
                    self.kill_client(id)?;
                }
            }
            Action::ToggleFullscreen => {
                if let FocusTarget::Client(id) = self.focus.current {
                    self.toggle_fullscreen(id)?;
                }
            }
            Action::ToggleMaximize => {
                if let FocusTarget::Client(id) = self.focus.current {
                    self.toggle_maximize(id)?;
                }
            }
            Action::StartMove => {
                if let FocusTarget::Client(id) = self.focus.current {
                    let p = self.conn.query_pointer()?;
                    self.start_move(id, p)?;
                }
            }
            Action::StartResize => {
                if let FocusTarget::Client(id) = self.focus.current {
                    let p = self.conn.query_pointer()?;
                    self.start_resize(id, p)?;
                }
            }
            Action::StartFocusCycle => self.start_focus_cycle(trigger)?,
            Action::SwitchTagset(expr) => self.switch_tagset(expr)?,
            Action::EditTags => {
                if let FocusTarget::Client(id) = self.focus.current {
                    self.start_edit_tags(id)?;
                }
            }
            Action::Spawn(argv) => self.conn.spawn(&argv)?,
            Action::Quit => self.shutdown()?,
            Action::Restart => self.restart()?,
        }
        Ok(())
    }

    fn kill_client(&mut self, id: Xid) -> Result<()> {
        let supports_delete = self.clients.get(id).map(|c| c.supports_delete).unwrap_or(false);
        if supports_delete {
            let delete = self.atoms.known(&*self.conn, Atom::WmDeleteWindow)?;
            let protocols = self.atoms.known(&*self.conn, Atom::WmProtocols)?;
            self.conn.send_client_message(id, protocols, [delete.0, self.conn.last_timestamp(), 0, 0, 0])?;
            Ok(())
        } else {
            self.conn.destroy_window(id)
        }
    }

    fn iconify(&mut self, id: Xid) -> Result<()> {
        if let Some(client) = self.clients.get_mut(id) {
            client.state = WmState::Iconic;
            client.mapped = false;
        }
        if let Some(client) = self.clients.get(id) {
            self.conn.unmap_window(client.frame)?;
        }
        self.visible.remove(&id);
        self.focus.on_unmap_or_unmanage(id);
        self.ensure_focus()
    }

    /// Fullscreen covers the client's monitor exactly, with no border or
    /// titlebar offset, and the titlebar unmapped for the duration (§4.8,
    /// §8 scenario 5).
    fn toggle_fullscreen(&mut self, id: Xid) -> Result<()> {
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        if client.is_fullscreen() {
            let restore = client.saved_geometry.unwrap_or(client.geometry);
            let decoration = client.saved_decoration;
            if let Some(c) = self.clients.get_mut(id) {
                c.net_state.remove(NetWmState::FULLSCREEN);
                c.saved_geometry = None;
                c.saved_decoration = None;
                if let Some((border, titlebar_height)) = decoration {
                    c.border = border;
                    c.titlebar_height = titlebar_height;
                }
            }
            self.clients.set_geometry(&*self.conn, id, restore)?;
            if let Some(deco) = self.decorators.get(&id) {
                deco.map(&*self.conn)?;
            }
        } else {
            let monitor = self.monitor_for(id)?;
            if let Some(c) = self.clients.get_mut(id) {
                c.saved_geometry = Some(c.geometry);
                c.saved_decoration = Some((c.border, c.titlebar_height));
                c.border = 0;
                c.titlebar_height = 0;
                c.net_state.insert(NetWmState::FULLSCREEN);
            }
            if let Some(deco) = self.decorators.get(&id) {
                deco.unmap(&*self.conn)?;
            }
            self.clients.set_geometry(&*self.conn, id, monitor)?;
        }
        Ok(())
    }

    fn toggle_maximize(&mut self, id: Xid) -> Result<()> {
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        if client.is_maximized() {
            let restore = client.saved_geometry.unwrap_or(client.geometry);
            if let Some(c) = self.clients.get_mut(id) {
                c.net_state.remove(NetWmState::MAXIMIZED_HORZ | NetWmState::MAXIMIZED_VERT);
                c.saved_geometry = None;
            }
            self.clients.set_geometry(&*self.conn, id, restore)?;
        } else {
            let monitor = self.monitor_for(id)?;
            let constrained = client.constrain(monitor);
            if let Some(c) = self.clients.get_mut(id) {
                c.saved_geometry = Some(c.geometry);
                c.net_state.insert(NetWmState::MAXIMIZED_HORZ | NetWmState::MAXIMIZED_VERT);
            }
            self.clients.set_geometry(&*self.conn, id, constrained)?;
        }
        Ok(())
    }

    fn monitor_for(&self, id: Xid) -> Result<Rect> {
        let client = self.clients.get(id).ok_or(Error::UnknownClient(id))?;
        let crtcs = self.conn.crtcs()?;
        let (cx, cy) = (client.geometry.x, client.geometry.y);
        Ok(crtcs
            .into_iter()
            .find(|c| c.region.contains_point(crate::geometry::Point::new(cx, cy)))
            .map(|c| c.region)
            .unwrap_or(Rect::new(0, 0, 1920, 1080)))
    }

    fn start_move(&mut self, id: Xid, pointer: crate::geometry::Point) -> Result<()> {
        if self.modals.is_active() {
            return Ok(());
        }
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        let frame_geom = client.frame_geometry();
        let modal = MoveModal::with_snap_threshold(id, pointer, frame_geom, self.config.snap_threshold);
        self.geometry_op = Some(GeometryOp::Move(modal.clone()));
        self.modals.push(&*self.conn, Box::new(modal))
    }

    fn start_resize(&mut self, id: Xid, pointer: crate::geometry::Point) -> Result<()> {
        if self.modals.is_active() {
            return Ok(());
        }
        let Some(client) = self.clients.get(id) else { return Ok(()) };
        let frame_geom = client.frame_geometry();
        let handle = Handle::from_point_in_frame(pointer, frame_geom);
        let modal = ResizeModal::with_snap_threshold(id, handle, frame_geom, self.config.snap_threshold);
        self.geometry_op = Some(GeometryOp::Resize(modal.clone()));
        self.modals.push(&*self.conn, Box::new(modal))
    }

    fn drive_geometry_motion(&mut self, pointer: crate::geometry::Point) -> Result<()> {
        match self.geometry_op.as_mut() {
            Some(GeometryOp::Move(modal)) => movresize::move_motion(modal, &*self.conn, &self.clients, pointer),
            Some(GeometryOp::Resize(modal)) => movresize::resize_motion(modal, &*self.conn, &self.clients, pointer),
            None => Ok(()),
        }
    }

    /// Called once the top modal finishes (committed or aborted). Geometry
    /// ops are only committed on success; `Modal::abort` already restored
    /// the pre-operation geometry via the connection. The focus cycle
    /// similarly commits its current target or restores the originally
    /// focused client.
    fn finish_modal(&mut self, aborted: bool) -> Result<()> {
        if let Some(op) = self.geometry_op.take() {
            if !aborted {
                match op {
                    GeometryOp::Move(modal) => movresize::move_commit(&modal, &*self.conn, &mut self.clients)?,
                    GeometryOp::Resize(modal) => movresize::resize_commit(&modal, &*self.conn, &mut self.clients)?,
                }
            }
        }
        if let Some(cycle) = self.cycle.take() {
            if aborted {
                focus_cycle::abort(&cycle, &*self.conn, &self.clients, &mut self.focus)?;
            } else {
                focus_cycle::commit(&cycle, &*self.conn, &self.clients, &mut self.focus)?;
            }
        }
        if let Some(pending) = self.tag_edit.take() {
            if !aborted {
                let text = pending.result.borrow_mut().take();
                if let Some(text) = text {
                    self.apply_tag_edit(pending.client, &text)?;
                }
            }
        }
        Ok(())
    }

    fn start_focus_cycle(&mut self, trigger: KeyCode) -> Result<()> {
        if self.modals.is_active() {
            return Ok(());
        }
        let candidates: Vec<Xid> = self.focus.list.iter().filter(|id| self.visible.contains(id)).collect();
        let started_from = match self.focus.current {
            FocusTarget::Client(id) => id,
            FocusTarget::RootPointer => return Ok(()),
        };
        if let Some(cycle) = FocusCycleModal::new(candidates, started_from, trigger.mask, trigger.code) {
            self.modals.push(&*self.conn, Box::new(cycle.clone()))?;
            self.cycle = Some(cycle);
        }
        Ok(())
    }

    fn switch_tagset(&mut self, expr: String) -> Result<()> {
        let previous = self.visible.clone();
        self.tagset.replace_top(expr);
        match tags::switch_tagset(
            &*self.conn,
            &self.clients,
            &|s| self.resolve_tag(s),
            &self.tagset,
            &previous,
        ) {
            Ok(visible) => {
                for id in previous.difference(&visible) {
                    if let Some(c) = self.clients.get_mut(*id) {
                        c.mapped = false;
                    }
                }
                for id in visible.difference(&previous) {
                    if let Some(c) = self.clients.get_mut(*id) {
                        c.mapped = true;
                    }
                }
                self.visible = visible;
                self.ensure_focus()
            }
            Err(e) => {
                tracing::warn!(error = %e, "tagset expression rejected; keeping current tagset");
                Ok(())
            }
        }
    }

    fn on_client_message(&mut self, msg: crate::event::ClientMessageEvent) -> Result<()> {
        let exit_atom = self.atoms.known(&*self.conn, Atom::DimWmExit)?;
        let update_atom = self.atoms.known(&*self.conn, Atom::DimTagsetUpdate)?;
        if msg.message_type == exit_atom {
            let timestamp = msg.data[0];
            let argv = self.read_wm_command()?;
            if argv.is_empty() {
                self.restart_with_timestamp(timestamp)?;
            } else {
                self.shutdown()?;
                self.conn.spawn(&argv)?;
            }
        } else if msg.message_type == update_atom {
            let expr_atom = self.atoms.known(&*self.conn, Atom::DimTagsetExpression)?;
            if let Some(expr) = self
                .conn
                .get_property(self.conn.root(), expr_atom)?
                .and_then(|p| p.as_utf8().map(|s| s.to_string()))
            {
                self.switch_tagset(expr)?;
            }
        }
        Ok(())
    }

    fn on_root_property(&mut self, _atom: Xid) -> Result<()> {
        Ok(())
    }

    /// A watched property changed on a managed client: currently only its
    /// title (`WM_NAME`/`_NET_WM_NAME`), re-read and redrawn into its
    /// titlebar.
    fn on_client_property(&mut self, window: Xid, atom: Xid) -> Result<()> {
        if !self.clients.contains(window) {
            return Ok(());
        }
        let net_name = self.atoms.known(&*self.conn, Atom::NetWmName)?;
        let name = self.atoms.known(&*self.conn, Atom::WmName)?;
        if atom != net_name && atom != name {
            return Ok(());
        }
        let title = self.read_title(window)?;
        if let Some(client) = self.clients.get_mut(window) {
            client.title = title;
        }
        self.redraw_decoration(window)
    }

    fn read_wm_command(&self) -> Result<Vec<String>> {
        let atom = self.atoms.known(&*self.conn, Atom::WmCommand)?;
        Ok(self
            .conn
            .get_property(self.conn.root(), atom)?
            .and_then(|p| p.as_argv())
            .unwrap_or_default())
    }

    fn restart_with_timestamp(&mut self, _timestamp: u32) -> Result<()> {
        let argv: Vec<String> = std::env::args().collect();
        self.shutdown()?;
        self.conn.spawn(&argv)
    }

    fn restart(&mut self) -> Result<()> {
        self.restart_with_timestamp(self.conn.last_timestamp())
    }

    /// Idempotent teardown, safe to call from a half-initialized state:
    /// unmap frames, reparent every client back to root preserving
    /// absolute geometry, drop save-set, flush, stop the loop.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.modals.abort_all(&*self.conn)?;
        for id in self.clients.ids() {
            let _ = self.unmanage(id);
        }
        self.conn.flush()?;
        self.running = false;
        Ok(())
    }
}
