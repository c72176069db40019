//! Atom registry: name <-> id interning with a write-through cache.
use std::cell::RefCell;
use std::collections::HashMap;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

use crate::connection::Connection;
use crate::error::Result;
use crate::xid::Xid;

/// Every atom the core consumes: the ICCCM/EWMH subset plus the three
/// private `_DIM_*` atoms used for remote control and tag storage.
#[derive(AsRefStr, EnumString, EnumIter, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Atom {
    #[strum(serialize = "ATOM")]
    Atom,
    #[strum(serialize = "UTF8_STRING")]
    Utf8String,
    #[strum(serialize = "WM_CLASS")]
    WmClass,
    #[strum(serialize = "WM_STATE")]
    WmState,
    #[strum(serialize = "WM_NAME")]
    WmName,
    #[strum(serialize = "WM_HINTS")]
    WmHints,
    #[strum(serialize = "WM_NORMAL_HINTS")]
    WmNormalHints,
    #[strum(serialize = "WM_PROTOCOLS")]
    WmProtocols,
    #[strum(serialize = "WM_DELETE_WINDOW")]
    WmDeleteWindow,
    #[strum(serialize = "WM_TAKE_FOCUS")]
    WmTakeFocus,
    #[strum(serialize = "WM_TRANSIENT_FOR")]
    WmTransientFor,
    #[strum(serialize = "WM_CHANGE_STATE")]
    WmChangeState,
    #[strum(serialize = "WM_COMMAND")]
    WmCommand,
    #[strum(serialize = "_NET_WM_STATE")]
    NetWmState,
    #[strum(serialize = "_NET_WM_STATE_FULLSCREEN")]
    NetWmStateFullscreen,
    #[strum(serialize = "_NET_WM_STATE_MAXIMIZED_HORZ")]
    NetWmStateMaximizedHorz,
    #[strum(serialize = "_NET_WM_STATE_MAXIMIZED_VERT")]
    NetWmStateMaximizedVert,
    #[strum(serialize = "_NET_WM_NAME")]
    NetWmName,
    #[strum(serialize = "_NET_ACTIVE_WINDOW")]
    NetActiveWindow,
    #[strum(serialize = "_NET_WM_TAKE_FOCUS")]
    NetWmTakeFocus,
    #[strum(serialize = "_DIM_TAGS")]
    DimTags,
    #[strum(serialize = "_DIM_WM_EXIT")]
    DimWmExit,
    #[strum(serialize = "_DIM_TAGSET_EXPRESSION")]
    DimTagsetExpression,
    #[strum(serialize = "_DIM_TAGSET_UPDATE")]
    DimTagsetUpdate,
}

/// Caches `name(id)` and `intern(name)` so repeated lookups never round
/// trip to the server twice for the same atom.
#[derive(Debug, Default)]
pub struct AtomRegistry {
    by_name: RefCell<HashMap<String, Xid>>,
    by_id: RefCell<HashMap<Xid, String>>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-intern every atom this core cares about in one batch of requests
    /// at startup, pipelining them before blocking on any reply.
    pub fn prime(&self, conn: &dyn Connection) -> Result<()> {
        for atom in Atom::iter() {
            self.intern(conn, atom.as_ref())?;
        }
        Ok(())
    }

    pub fn intern(&self, conn: &dyn Connection, name: &str) -> Result<Xid> {
        if let Some(&id) = self.by_name.borrow().get(name) {
            return Ok(id);
        }
        let id = conn.intern_atom(name)?;
        self.by_name.borrow_mut().insert(name.to_string(), id);
        self.by_id.borrow_mut().insert(id, name.to_string());
        Ok(id)
    }

    pub fn known(&self, conn: &dyn Connection, atom: Atom) -> Result<Xid> {
        self.intern(conn, atom.as_ref())
    }

    pub fn name(&self, conn: &dyn Connection, id: Xid) -> Result<String> {
        if let Some(name) = self.by_id.borrow().get(&id) {
            return Ok(name.clone());
        }
        let name = conn.get_atom_name(id)?;
        self.by_id.borrow_mut().insert(id, name.clone());
        self.by_name.borrow_mut().insert(name.clone(), id);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;

    #[test]
    fn intern_is_cached() {
        let conn = MockConnection::new();
        let reg = AtomRegistry::new();

        let first = reg.intern(&conn, "_DIM_TAGS").unwrap();
        let second = reg.intern(&conn, "_DIM_TAGS").unwrap();
        assert_eq!(first, second);
        assert_eq!(conn.intern_atom_calls(), 1);
    }

    #[test]
    fn name_round_trips_through_intern() {
        let conn = MockConnection::new();
        let reg = AtomRegistry::new();

        let id = reg.intern(&conn, "_DIM_TAGSET_EXPRESSION").unwrap();
        assert_eq!(reg.name(&conn, id).unwrap(), "_DIM_TAGSET_EXPRESSION");
    }
}
