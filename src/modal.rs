//! Modal subsystem stack: each modal is an explicit state object with
//! enter/handle-event/exit, pushed onto a stack owned by the manager.
//!
//! Move/resize, the focus cycle, the minibuffer, and an active binding
//! prefix chain are all modals: while one is active it intercepts events
//! ahead of the normal dispatch path, and it exposes an abort that restores
//! pre-modal state.
use crate::connection::Connection;
use crate::error::Result;
use crate::event::XEvent;

/// What a modal wants to happen to the event it was just given.
pub enum Consumed {
    /// The modal handled the event; do not fall through to normal dispatch.
    Handled,
    /// The modal committed normally (release, Return, …); pop it and call
    /// `exit`.
    Done,
    /// The modal was cancelled (Escape); pop it, call `abort` then `exit`.
    Aborted,
}

/// What happened when an event was fed to the top of the stack.
pub enum DispatchOutcome {
    /// No modal was active; the event still needs normal dispatch.
    NotConsumed,
    /// The top modal swallowed the event; nothing else to do.
    Consumed,
    /// The top modal finished (committed or aborted) and was popped.
    Finished { aborted: bool },
}

/// A modal subsystem: move/resize, focus cycle, minibuffer, or a binding
/// prefix chain.
pub trait Modal {
    /// Called once when the modal is pushed.
    fn enter(&mut self, conn: &dyn Connection) -> Result<()>;
    /// Feed one event to the modal. Events not recognized as part of this
    /// modal's protocol should still return `Consumed::Handled` if the modal
    /// wants to swallow everything while active (most do).
    fn handle_event(&mut self, conn: &dyn Connection, ev: &XEvent) -> Result<Consumed>;
    /// Restore pre-modal state without committing.
    fn abort(&mut self, conn: &dyn Connection) -> Result<()>;
    /// Release any grabs/resources held by this modal. Called whether the
    /// modal committed or aborted.
    fn exit(&mut self, conn: &dyn Connection) -> Result<()>;
}

/// The manager's stack of active modals. The top of the stack gets first
/// look at every event.
#[derive(Default)]
pub struct ModalStack {
    stack: Vec<Box<dyn Modal>>,
}

impl ModalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn push(&mut self, conn: &dyn Connection, mut modal: Box<dyn Modal>) -> Result<()> {
        modal.enter(conn)?;
        self.stack.push(modal);
        Ok(())
    }

    /// Feed `ev` to the top modal, popping it (and calling `abort`/`exit`
    /// as appropriate) if it reports `Done` or `Aborted`.
    pub fn dispatch(&mut self, conn: &dyn Connection, ev: &XEvent) -> Result<DispatchOutcome> {
        let Some(top) = self.stack.last_mut() else {
            return Ok(DispatchOutcome::NotConsumed);
        };
        match top.handle_event(conn, ev)? {
            Consumed::Handled => Ok(DispatchOutcome::Consumed),
            Consumed::Done => {
                let mut modal = self.stack.pop().expect("top modal present");
                modal.exit(conn)?;
                Ok(DispatchOutcome::Finished { aborted: false })
            }
            Consumed::Aborted => {
                let mut modal = self.stack.pop().expect("top modal present");
                modal.abort(conn)?;
                modal.exit(conn)?;
                Ok(DispatchOutcome::Finished { aborted: true })
            }
        }
    }

    /// Abort every active modal, innermost first, restoring pre-modal state
    /// at each layer.
    pub fn abort_all(&mut self, conn: &dyn Connection) -> Result<()> {
        while let Some(mut modal) = self.stack.pop() {
            modal.abort(conn)?;
            modal.exit(conn)?;
        }
        Ok(())
    }
}
