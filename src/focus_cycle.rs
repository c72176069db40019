//! Focus cycle: modal next/prev focus traversal.
use crate::bindings::{KeyCodeValue, ModMask};
use crate::client::ClientTable;
use crate::connection::Connection;
use crate::error::Result;
use crate::event::XEvent;
use crate::focus::FocusController;
use crate::modal::{Consumed, Modal};
use crate::movresize::ESCAPE_KEYCODE;
use crate::xid::Xid;

/// A modal focus cycle. Only one may be active at a time; additional start
/// requests while one is active are no-ops, which the manager
/// enforces by checking `ModalStack::is_active` before pushing another.
#[derive(Clone)]
pub struct FocusCycleModal {
    candidates: Vec<Xid>,
    index: usize,
    started_from: Xid,
    /// Modifiers held down by the chord that started the cycle; the cycle
    /// commits once a `KeyRelease` reports none of them still held.
    cycle_mods: ModMask,
    /// The raw keycode that advances the cycle on repeated presses
    /// (direction flips while `Shift` is held).
    advance_code: KeyCodeValue,
}

impl FocusCycleModal {
    /// `candidates` is a snapshot of the focus list at cycle-start time,
    /// most-recent-first; the chord that started the cycle selects index 1
    /// (the next-most-recent) as the initial target.
    pub fn new(
        candidates: Vec<Xid>,
        started_from: Xid,
        cycle_mods: ModMask,
        advance_code: KeyCodeValue,
    ) -> Option<Self> {
        if candidates.len() < 2 {
            return None;
        }
        Some(FocusCycleModal { candidates, index: 1, started_from, cycle_mods, advance_code })
    }

    pub fn current(&self) -> Xid {
        self.candidates[self.index]
    }

    fn rotate(&mut self, forward: bool) {
        let n = self.candidates.len();
        self.index = if forward {
            (self.index + 1) % n
        } else {
            (self.index + n - 1) % n
        };
    }
}

impl Modal for FocusCycleModal {
    fn enter(&mut self, conn: &dyn Connection) -> Result<()> {
        conn.grab_keyboard()
    }

    /// Repeated presses of the advancing key rotate the target (direction
    /// flips while `Shift` is held); release of the last held modifier from
    /// the starting chord commits the current target as focus; `Escape`
    /// aborts back to the originally-focused client.
    fn handle_event(&mut self, _conn: &dyn Connection, ev: &XEvent) -> Result<Consumed> {
        match ev {
            XEvent::KeyPress(k) if k.code.code == ESCAPE_KEYCODE => Ok(Consumed::Aborted),
            XEvent::KeyPress(k) if k.code.code == self.advance_code => {
                self.rotate(!k.code.mask.contains(ModMask::SHIFT));
                Ok(Consumed::Handled)
            }
            XEvent::KeyRelease(k) if !k.code.mask.contains(self.cycle_mods) => Ok(Consumed::Done),
            _ => Ok(Consumed::Handled),
        }
    }

    fn abort(&mut self, _conn: &dyn Connection) -> Result<()> {
        Ok(())
    }

    fn exit(&mut self, conn: &dyn Connection) -> Result<()> {
        conn.ungrab_keyboard()
    }
}

/// Commit the cycle's current target as focus. Called by the manager once the modal reports `Done`.
pub fn commit(
    modal: &FocusCycleModal,
    conn: &dyn Connection,
    clients: &ClientTable,
    focus: &mut FocusController,
) -> Result<()> {
    focus.focus(conn, clients, modal.current())
}

/// Restore the originally-focused client without changing anything.
pub fn abort(
    modal: &FocusCycleModal,
    conn: &dyn Connection,
    clients: &ClientTable,
    focus: &mut FocusController,
) -> Result<()> {
    focus.focus(conn, clients, modal.started_from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;
    use crate::geometry::Rect;

    #[test]
    fn single_candidate_refuses_to_start() {
        assert!(FocusCycleModal::new(vec![Xid(1)], Xid(1), ModMask::MOD4, 23).is_none());
    }

    #[test]
    fn rotate_wraps_around() {
        let mut cycle = FocusCycleModal::new(vec![Xid(1), Xid(2), Xid(3)], Xid(1), ModMask::MOD4, 23).unwrap();
        assert_eq!(cycle.current(), Xid(2));
        cycle.rotate(true);
        assert_eq!(cycle.current(), Xid(3));
        cycle.rotate(true);
        assert_eq!(cycle.current(), Xid(1));
        cycle.rotate(false);
        assert_eq!(cycle.current(), Xid(3));
    }

    #[test]
    fn abort_restores_original_focus() {
        let conn = MockConnection::new();
        let mut clients = ClientTable::new();
        clients.adopt(&conn, Xid(1), Rect::new(0, 0, 10, 10), 0, 0).unwrap();
        clients.adopt(&conn, Xid(2), Rect::new(0, 0, 10, 10), 0, 0).unwrap();
        let mut focus = FocusController::new();
        let cycle = FocusCycleModal::new(vec![Xid(1), Xid(2)], Xid(1), ModMask::MOD4, 23).unwrap();

        abort(&cycle, &conn, &clients, &mut focus).unwrap();
        assert_eq!(focus.current, crate::focus::FocusTarget::Client(Xid(1)));
    }

    #[test]
    fn advance_key_rotates_without_committing() {
        use crate::bindings::KeyCode;
        use crate::event::KeyEvent;

        let mut cycle = FocusCycleModal::new(vec![Xid(1), Xid(2), Xid(3)], Xid(1), ModMask::MOD4, 23).unwrap();
        let conn = MockConnection::new();
        let press = XEvent::KeyPress(KeyEvent { window: Xid(0), code: KeyCode::new(ModMask::MOD4, 23) });
        let outcome = cycle.handle_event(&conn, &press).unwrap();
        assert!(matches!(outcome, Consumed::Handled));
        assert_eq!(cycle.current(), Xid(3));
    }

    #[test]
    fn releasing_the_held_modifier_commits() {
        use crate::bindings::KeyCode;
        use crate::event::KeyEvent;

        let mut cycle = FocusCycleModal::new(vec![Xid(1), Xid(2), Xid(3)], Xid(1), ModMask::MOD4, 23).unwrap();
        let conn = MockConnection::new();
        let release = XEvent::KeyRelease(KeyEvent { window: Xid(0), code: KeyCode::new(ModMask::empty(), 64) });
        let outcome = cycle.handle_event(&conn, &release).unwrap();
        assert!(matches!(outcome, Consumed::Done));
    }
}
