//! The single id type used throughout the core for any X resource: window,
//! atom, pixmap, or graphics context. X11 itself does not distinguish these
//! at the protocol level (all are 32-bit resource ids drawn from the same
//! namespace) and neither do we.
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Xid(pub u32);

impl Xid {
    pub const fn new(id: u32) -> Self {
        Xid(id)
    }
}

impl From<u32> for Xid {
    fn from(id: u32) -> Self {
        Xid(id)
    }
}

impl From<Xid> for u32 {
    fn from(id: Xid) -> Self {
        id.0
    }
}

impl std::fmt::Display for Xid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}
