//! Minibuffer: modal one-shot text entry for tags/specs/commands. The same editing logic backs the decorator's inline "convert
//! the titlebar into a text entry" mode.
use crate::connection::Connection;
use crate::error::Result;
use crate::event::XEvent;
use crate::modal::{Consumed, Modal};

/// A single line-editing buffer: cursor position plus the line-editing
/// operations (left/right/home/end, delete-char, delete-word, yank).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditLine {
    pub text: String,
    pub cursor: usize,
}

impl EditLine {
    pub fn new(initial: &str) -> Self {
        EditLine { cursor: initial.chars().count(), text: initial.to_string() }
    }

    fn char_indices(&self) -> Vec<usize> {
        self.text.char_indices().map(|(i, _)| i).chain(std::iter::once(self.text.len())).collect()
    }

    pub fn insert(&mut self, c: char) {
        let idx = self.char_indices()[self.cursor];
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    pub fn yank(&mut self, s: &str) {
        let idx = self.char_indices()[self.cursor];
        self.text.insert_str(idx, s);
        self.cursor += s.chars().count();
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        if self.cursor < self.text.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let indices = self.char_indices();
        let start = indices[self.cursor - 1];
        let end = indices[self.cursor];
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
    }

    /// Delete from the cursor back to the previous word boundary.
    pub fn delete_word(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let chars: Vec<char> = self.text.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        let indices = self.char_indices();
        let byte_start = indices[start];
        let byte_end = indices[self.cursor];
        self.text.replace_range(byte_start..byte_end, "");
        self.cursor = start;
    }
}

type CommitFn = Box<dyn FnOnce(&str)>;
type RollbackFn = Box<dyn FnOnce()>;

/// A live minibuffer prompt. Grabs the keyboard while
/// mapped; unmaps on commit or abort. Only one may be live at a time, which
/// the manager enforces the same way it enforces a single focus cycle: via
/// `ModalStack`.
pub struct MinibufferModal {
    pub prompt: String,
    pub line: EditLine,
    window: crate::xid::Xid,
    commit: Option<CommitFn>,
    rollback: Option<RollbackFn>,
    done: bool,
}

impl MinibufferModal {
    pub fn new(
        window: crate::xid::Xid,
        prompt: impl Into<String>,
        initial: &str,
        commit: CommitFn,
        rollback: RollbackFn,
    ) -> Self {
        MinibufferModal {
            prompt: prompt.into(),
            line: EditLine::new(initial),
            window,
            commit: Some(commit),
            rollback: Some(rollback),
            done: false,
        }
    }
}

const KEY_RETURN: u8 = 36;
const KEY_ESCAPE: u8 = 9;
const KEY_BACKSPACE: u8 = 22;
const KEY_LEFT: u8 = 113;
const KEY_RIGHT: u8 = 114;
const KEY_HOME: u8 = 110;
const KEY_END: u8 = 115;

impl Modal for MinibufferModal {
    fn enter(&mut self, conn: &dyn Connection) -> Result<()> {
        conn.map_window(self.window)?;
        conn.grab_keyboard()
    }

    fn handle_event(&mut self, _conn: &dyn Connection, ev: &XEvent) -> Result<Consumed> {
        let XEvent::KeyPress(k) = ev else {
            return Ok(Consumed::Handled);
        };
        match k.code.code {
            KEY_RETURN => {
                if let Some(commit) = self.commit.take() {
                    commit(&self.line.text);
                }
                self.done = true;
            }
            KEY_ESCAPE => {
                if let Some(rollback) = self.rollback.take() {
                    rollback();
                }
                self.done = true;
            }
            KEY_BACKSPACE => self.line.delete_char(),
            KEY_LEFT => self.line.left(),
            KEY_RIGHT => self.line.right(),
            KEY_HOME => self.line.home(),
            KEY_END => self.line.end(),
            _ => {}
        }
        Ok(if self.done { Consumed::Done } else { Consumed::Handled })
    }

    fn abort(&mut self, _conn: &dyn Connection) -> Result<()> {
        if let Some(rollback) = self.rollback.take() {
            rollback();
        }
        Ok(())
    }

    fn exit(&mut self, conn: &dyn Connection) -> Result<()> {
        conn.ungrab_keyboard()?;
        conn.unmap_window(self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_delete_char() {
        let mut line = EditLine::new("work");
        line.insert('!');
        assert_eq!(line.text, "work!");
        line.delete_char();
        assert_eq!(line.text, "work");
    }

    #[test]
    fn delete_word_stops_at_boundary() {
        let mut line = EditLine::new("tag work docs");
        line.end();
        line.delete_word();
        assert_eq!(line.text, "tag work ");
    }

    #[test]
    fn home_end_left_right_move_cursor() {
        let mut line = EditLine::new("abc");
        line.home();
        assert_eq!(line.cursor, 0);
        line.right();
        assert_eq!(line.cursor, 1);
        line.end();
        assert_eq!(line.cursor, 3);
        line.left();
        assert_eq!(line.cursor, 2);
    }

    #[test]
    fn yank_inserts_at_cursor() {
        let mut line = EditLine::new("ab");
        line.cursor = 1;
        line.yank("XY");
        assert_eq!(line.text, "aXYb");
        assert_eq!(line.cursor, 3);
    }
}
