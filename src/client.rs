//! Client model: per-window state, frame, reparenting, decoration.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::Result;
use crate::geometry::Rect;
use crate::property::{NetWmState, Property, WmHints, WmState};
use crate::sizehints::SizeHints;
use crate::xid::Xid;

/// The default titlebar height and border width applied to every frame; a
/// [`crate::config::Config`] may override both.
pub const DEFAULT_TITLEBAR_HEIGHT: u32 = 18;
pub const DEFAULT_BORDER: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmClass {
    pub instance: String,
    pub class: String,
}

/// A managed top-level window.
///
/// Invariant maintained by [`ClientTable`]: whenever `state == WmState::Normal`
/// the client is reparented into `frame`, and `frame`'s geometry equals
/// `geometry` inflated by `(border, border + titlebar_height, border,
/// border)`.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: Xid,
    pub frame: Xid,
    pub geometry: Rect,
    /// Geometry to restore when un-maximizing/un-fullscreening.
    pub saved_geometry: Option<Rect>,
    /// `(border, titlebar_height)` to restore when leaving fullscreen, which
    /// zeroes both so the frame covers its CRTC exactly.
    pub saved_decoration: Option<(u32, u32)>,
    pub border: u32,
    pub titlebar_height: u32,
    pub state: WmState,
    pub net_state: NetWmState,
    pub hints: SizeHints,
    pub wm_hints: WmHints,
    pub transient_for: Option<Xid>,
    pub class: Option<WmClass>,
    pub title: String,
    pub tags: Vec<Xid>,
    pub mapped: bool,
    pub supports_take_focus: bool,
    pub supports_delete: bool,
}

impl Client {
    fn new(id: Xid, frame: Xid, geometry: Rect, border: u32, titlebar_height: u32) -> Self {
        Client {
            id,
            frame,
            geometry,
            saved_geometry: None,
            saved_decoration: None,
            border,
            titlebar_height,
            state: WmState::Withdrawn,
            net_state: NetWmState::empty(),
            hints: SizeHints::default(),
            wm_hints: WmHints::default(),
            transient_for: None,
            class: None,
            title: String::new(),
            tags: Vec::new(),
            mapped: false,
            supports_take_focus: false,
            supports_delete: false,
        }
    }

    /// Frame geometry derived from client geometry.
    pub fn frame_geometry(&self) -> Rect {
        self.geometry.inflate(self.border, self.titlebar_height)
    }

    /// `true` once the client is sticky to every tagset.
    pub fn is_sticky(&self, wildcard: Xid) -> bool {
        self.tags.iter().any(|&t| t == wildcard)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.net_state.contains(NetWmState::FULLSCREEN)
    }

    pub fn is_maximized(&self) -> bool {
        self.net_state
            .intersects(NetWmState::MAXIMIZED_HORZ | NetWmState::MAXIMIZED_VERT)
    }

    /// Snap `candidate` to this client's size hints, preserving position.
    pub fn constrain(&self, candidate: Rect) -> Rect {
        self.hints.constrain(candidate)
    }
}

/// The manager's arena of managed clients, keyed by the client's own window
/// id.
#[derive(Debug, Default)]
pub struct ClientTable {
    clients: HashMap<Xid, Client>,
    /// Frame id -> client id, so frame-targeted events (button presses on
    /// the titlebar, frame ConfigureNotify) can find their client.
    frame_to_client: HashMap<Xid, Xid>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Xid) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn get_mut(&mut self, id: Xid) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn by_frame(&self, frame: Xid) -> Option<&Client> {
        self.frame_to_client.get(&frame).and_then(|id| self.clients.get(id))
    }

    pub fn by_frame_mut(&mut self, frame: Xid) -> Option<&mut Client> {
        let id = *self.frame_to_client.get(&frame)?;
        self.clients.get_mut(&id)
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn ids(&self) -> Vec<Xid> {
        self.clients.keys().copied().collect()
    }

    /// Adopt `window` into a newly-created frame: create the frame, select
    /// its events, reparent the client in at `(border, titlebar_height)`,
    /// add the client to save-set, map frame then client.
    pub fn adopt(
        &mut self,
        conn: &dyn Connection,
        window: Xid,
        geometry: Rect,
        border: u32,
        titlebar_height: u32,
    ) -> Result<Xid> {
        let frame_geom = geometry.inflate(border, titlebar_height);
        let frame = conn.create_frame(frame_geom, 0)?;
        conn.select_frame_events(frame)?;
        conn.select_property_events(window)?;
        conn.reparent(window, frame, border as i32, (border + titlebar_height) as i32)?;
        conn.add_to_save_set(window)?;
        conn.map_window(frame)?;
        conn.map_window(window)?;

        let mut client = Client::new(window, frame, geometry, border, titlebar_height);
        client.state = WmState::Normal;
        client.mapped = true;
        self.frame_to_client.insert(frame, window);
        self.clients.insert(window, client);
        Ok(frame)
    }

    /// Unmanage a client: reparent back to root at the frame's absolute
    /// position, drop save-set membership, destroy the frame. Idempotent:
    /// missing clients are a no-op, not an error.
    pub fn unmanage(&mut self, conn: &dyn Connection, id: Xid) -> Result<()> {
        let Some(client) = self.clients.remove(&id) else {
            return Ok(());
        };
        self.frame_to_client.remove(&client.frame);

        let root = conn.root();
        let origin = conn.translate_to_root(client.frame).unwrap_or_default();
        let _ = conn.reparent(id, root, origin.x, origin.y);
        let _ = conn.remove_from_save_set(id);
        let _ = conn.destroy_window(client.frame);
        Ok(())
    }

    /// Apply a new client geometry, updating the frame to match. Size hints are enforced by the caller before this is
    /// reached (§4.5).
    pub fn set_geometry(&mut self, conn: &dyn Connection, id: Xid, geometry: Rect) -> Result<()> {
        let Some(client) = self.clients.get_mut(&id) else {
            return Err(crate::error::Error::UnknownClient(id));
        };
        client.geometry = geometry;
        let frame_geom = client.frame_geometry();
        let border = client.border;
        let frame = client.frame;
        conn.configure(frame, frame_geom, 0)?;
        conn.configure(id, Rect::new(0, 0, geometry.w, geometry.h), border)?;
        conn.send_synthetic_configure_notify(id, geometry, border)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;

    #[test]
    fn adopt_sets_frame_invariant() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        let geom = Rect::new(10, 10, 300, 200);

        let frame = table.adopt(&conn, Xid(5), geom, 2, 18).unwrap();
        let client = table.get(Xid(5)).unwrap();

        assert_eq!(client.frame, frame);
        assert_eq!(client.state, WmState::Normal);
        assert_eq!(client.frame_geometry(), geom.inflate(2, 18));
        assert_eq!(table.by_frame(frame).unwrap().id, Xid(5));
    }

    #[test]
    fn unmanage_is_idempotent() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        table.adopt(&conn, Xid(5), Rect::new(0, 0, 100, 100), 2, 18).unwrap();

        table.unmanage(&conn, Xid(5)).unwrap();
        assert!(!table.contains(Xid(5)));
        // calling again on an already-gone client must not error.
        table.unmanage(&conn, Xid(5)).unwrap();
    }

    #[test]
    fn sticky_client_carries_wildcard_tag() {
        let conn = MockConnection::new();
        let mut table = ClientTable::new();
        table.adopt(&conn, Xid(5), Rect::new(0, 0, 100, 100), 2, 18).unwrap();
        table.get_mut(Xid(5)).unwrap().tags.push(Xid(99));

        assert!(table.get(Xid(5)).unwrap().is_sticky(Xid(99)));
        assert!(!table.get(Xid(5)).unwrap().is_sticky(Xid(1)));
    }
}
