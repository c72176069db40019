//! Focus policy state machine and the most-recent-focus-first focus list.
use crate::client::ClientTable;
use crate::connection::Connection;
use crate::error::Result;
use crate::event::{CrossingEvent, NotifyDetail, NotifyMode};
use crate::property::WmState;
use crate::xid::Xid;

/// Most-recent-focus-first ordering over managed clients. Unmapped clients are absent; every mapped managed client
/// appears exactly once.
#[derive(Debug, Default)]
pub struct FocusList {
    order: Vec<Xid>,
}

impl FocusList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_front(&mut self, id: Xid) {
        self.order.retain(|&x| x != id);
        self.order.insert(0, id);
    }

    pub fn remove(&mut self, id: Xid) {
        self.order.retain(|&x| x != id);
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.order.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = Xid> + '_ {
        self.order.iter().copied()
    }

    pub fn head(&self) -> Option<Xid> {
        self.order.first().copied()
    }

    /// The head of the list that is currently visible, used by
    /// `ensure_focus`.
    pub fn head_visible(&self, visible: &dyn Fn(Xid) -> bool) -> Option<Xid> {
        self.order.iter().copied().find(|&id| visible(id))
    }
}

/// Where focus currently sits: a managed client, or the root window under
/// `PointerRoot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Client(Xid),
    RootPointer,
}

/// Capability a focus policy exposes to the manager.
pub trait FocusPolicy {
    /// `EnterNotify` on a managed frame.
    fn on_enter(&mut self, clients: &ClientTable, ev: &CrossingEvent) -> Option<Xid>;
    /// A `MapRequest` just finished adopting `id`; return `Some(id)` if this
    /// policy wants to focus it immediately.
    fn on_map(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid>;
    /// A `ButtonPress` landed on `id`, which was not already focused.
    fn on_button_press(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid>;
    /// `id` was unmanaged, unmapped, or iconified; policies that hold grabs
    /// on a previously focused client release them here.
    fn on_unmanage(&mut self, id: Xid);
}

/// Focus follows the pointer into any client; entering the root does not
/// steal focus from whatever was last focused.
#[derive(Debug, Default)]
pub struct SloppyFocus;

impl FocusPolicy for SloppyFocus {
    fn on_enter(&mut self, _clients: &ClientTable, ev: &CrossingEvent) -> Option<Xid> {
        if ev.mode == NotifyMode::Normal && ev.detail != NotifyDetail::Inferior {
            Some(ev.window)
        } else {
            None
        }
    }

    fn on_map(&mut self, _clients: &ClientTable, _id: Xid) -> Option<Xid> {
        None
    }

    fn on_button_press(&mut self, _clients: &ClientTable, _id: Xid) -> Option<Xid> {
        None
    }

    fn on_unmanage(&mut self, _id: Xid) {}
}

/// Click-to-focus: focus only moves on a `ButtonPress` in a non-focused
/// managed window. The manager grabs that button in sync mode, changes
/// focus, then replays the event so the application still receives the
/// click.
#[derive(Debug, Default)]
pub struct ClickToFocus {
    grabbed_on: Option<Xid>,
}

impl FocusPolicy for ClickToFocus {
    fn on_enter(&mut self, _clients: &ClientTable, _ev: &CrossingEvent) -> Option<Xid> {
        None
    }

    fn on_map(&mut self, _clients: &ClientTable, _id: Xid) -> Option<Xid> {
        None
    }

    fn on_button_press(&mut self, _clients: &ClientTable, id: Xid) -> Option<Xid> {
        self.grabbed_on = Some(id);
        Some(id)
    }

    fn on_unmanage(&mut self, id: Xid) {
        if self.grabbed_on == Some(id) {
            self.grabbed_on = None;
        }
    }
}

/// Decorator mixin: wraps any [`FocusPolicy`] and additionally
/// focuses newly mapped windows that ask for it, via `WM_HINTS.InputHint` or
/// `_NET_WM_TAKE_FOCUS`. Never focuses an override-redirect
/// window.
pub struct FocusNewWindows<P> {
    inner: P,
}

impl<P: FocusPolicy> FocusNewWindows<P> {
    pub fn new(inner: P) -> Self {
        FocusNewWindows { inner }
    }
}

impl<P: FocusPolicy> FocusPolicy for FocusNewWindows<P> {
    fn on_enter(&mut self, clients: &ClientTable, ev: &CrossingEvent) -> Option<Xid> {
        self.inner.on_enter(clients, ev)
    }

    fn on_map(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid> {
        if let Some(target) = self.inner.on_map(clients, id) {
            return Some(target);
        }
        let client = clients.get(id)?;
        if client.wm_hints.accepts_input || client.supports_take_focus {
            Some(id)
        } else {
            None
        }
    }

    fn on_button_press(&mut self, clients: &ClientTable, id: Xid) -> Option<Xid> {
        self.inner.on_button_press(clients, id)
    }

    fn on_unmanage(&mut self, id: Xid) {
        self.inner.on_unmanage(id)
    }
}

/// Tracks `current_focus` and drives the mechanics of changing it: sending
/// the right combination of `SetInputFocus`/`WM_TAKE_FOCUS`, updating
/// decoration, and reordering the [`FocusList`].
pub struct FocusController {
    pub current: FocusTarget,
    pub list: FocusList,
}

impl Default for FocusController {
    fn default() -> Self {
        FocusController { current: FocusTarget::RootPointer, list: FocusList::new() }
    }
}

impl FocusController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change focus to `target`, sending the appropriate protocol requests
    /// per ICCCM `WM_HINTS.input`/`WM_TAKE_FOCUS` and moving it to the head
    /// of the focus list. Never uses `CurrentTime`: the timestamp comes from `conn.last_timestamp()`.
    pub fn focus(&mut self, conn: &dyn Connection, clients: &ClientTable, id: Xid) -> Result<()> {
        let Some(client) = clients.get(id) else {
            return Ok(());
        };
        let time = conn.last_timestamp();
        if client.wm_hints.accepts_input {
            conn.set_input_focus(id, time)?;
        }
        if client.supports_take_focus {
            let atom = conn.intern_atom("WM_TAKE_FOCUS")?;
            let protocols = conn.intern_atom("WM_PROTOCOLS")?;
            conn.send_client_message(id, protocols, [atom.0, time, 0, 0, 0])?;
        }
        self.current = FocusTarget::Client(id);
        self.list.push_front(id);
        Ok(())
    }

    pub fn focus_root(&mut self, conn: &dyn Connection) -> Result<()> {
        let root = conn.root();
        conn.set_input_focus(root, conn.last_timestamp())?;
        self.current = FocusTarget::RootPointer;
        Ok(())
    }

    /// Re-establish a valid focus after any disturbance: unmap, unmanage,
    /// iconify, or a tagset switch. Picks the
    /// head of the focus list that is visible under the active tagset,
    /// falling back to `PointerRoot`.
    pub fn ensure_focus(
        &mut self,
        conn: &dyn Connection,
        clients: &ClientTable,
        visible: &dyn Fn(Xid) -> bool,
    ) -> Result<()> {
        if let FocusTarget::Client(id) = self.current {
            if clients.contains(id) && visible(id) {
                return Ok(());
            }
        }
        match self.list.head_visible(visible) {
            Some(id) => self.focus(conn, clients, id),
            None => self.focus_root(conn),
        }
    }

    pub fn on_unmap_or_unmanage(&mut self, id: Xid) {
        self.list.remove(id);
        if self.current == FocusTarget::Client(id) {
            self.current = FocusTarget::RootPointer;
        }
    }
}

/// `true` if `state` (as decoded off `WM_STATE`) counts as mapped for focus
/// purposes.
pub fn is_viewable(state: WmState) -> bool {
    state == WmState::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_front_dedupes_and_reorders() {
        let mut list = FocusList::new();
        list.push_front(Xid(1));
        list.push_front(Xid(2));
        list.push_front(Xid(1));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![Xid(1), Xid(2)]);
    }

    #[test]
    fn sloppy_focus_ignores_inferior_crossings() {
        let mut policy = SloppyFocus;
        let table = ClientTable::new();
        let ev = CrossingEvent {
            window: Xid(5),
            root_pos: Default::default(),
            mode: NotifyMode::Normal,
            detail: NotifyDetail::Inferior,
        };
        assert_eq!(policy.on_enter(&table, &ev), None);
    }

    #[test]
    fn sloppy_focus_focuses_on_normal_enter() {
        let mut policy = SloppyFocus;
        let table = ClientTable::new();
        let ev = CrossingEvent {
            window: Xid(5),
            root_pos: Default::default(),
            mode: NotifyMode::Normal,
            detail: NotifyDetail::Nonlinear,
        };
        assert_eq!(policy.on_enter(&table, &ev), Some(Xid(5)));
    }

    #[test]
    fn click_to_focus_only_on_button_press() {
        let mut policy = ClickToFocus::default();
        let table = ClientTable::new();
        let ev = CrossingEvent {
            window: Xid(5),
            root_pos: Default::default(),
            mode: NotifyMode::Normal,
            detail: NotifyDetail::Nonlinear,
        };
        assert_eq!(policy.on_enter(&table, &ev), None);
        assert_eq!(policy.on_button_press(&table, Xid(5)), Some(Xid(5)));
    }
}
