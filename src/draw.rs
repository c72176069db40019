//! Decorator: the titlebar frame subwindow, its button targets, and the
//! seam to an external text-rendering collaborator.
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::xid::Xid;

/// A region of the titlebar a button press should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTarget {
    Close,
    Maximize,
    Iconify,
    Drag,
}

/// What the core asks an external font/text collaborator to do: measure and
/// draw strings into a window it does not otherwise know about. `dim_draw`
/// is one implementor, built on cairo/pango over the same XCB connection.
pub trait TextRenderer {
    fn text_width(&self, font: &str, text: &str) -> Result<u32>;
    fn draw_titlebar(&self, window: Xid, text: &str, focused: bool, width: u32, height: u32) -> Result<()>;
}

/// A renderer that measures everything as zero-width and draws nothing;
/// used where a titlebar is wanted but no `TextRenderer` has been wired in.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl TextRenderer for NullRenderer {
    fn text_width(&self, _font: &str, _text: &str) -> Result<u32> {
        Ok(0)
    }
    fn draw_titlebar(&self, _window: Xid, _text: &str, _focused: bool, _w: u32, _h: u32) -> Result<()> {
        Ok(())
    }
}

/// Pixel layout of the default close/maximize/iconify buttons, right-aligned
/// in the titlebar.
const BUTTON_WIDTH: u32 = 16;

/// The titlebar + border decoration owned by each [`crate::client::Client`].
/// Exposes `redraw`, `set_title`, and `read_from_user`, which converts the
/// titlebar into an inline text entry sharing the minibuffer's editing
/// logic.
pub struct Decorator {
    pub client: Xid,
    pub titlebar: Xid,
    title: String,
    height: u32,
}

impl Decorator {
    /// Create the titlebar subwindow as a child of `frame`, mapped at the
    /// top and spanning its width.
    pub fn create(conn: &dyn Connection, client: Xid, frame: Xid, frame_geom: Rect, height: u32) -> Result<Self> {
        let titlebar = conn.create_frame(Rect::new(0, 0, frame_geom.w, height), 0)?;
        conn.reparent(titlebar, frame, 0, 0)?;
        conn.map_window(titlebar)?;
        Ok(Decorator { client, titlebar, title: String::new(), height })
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Repaint the titlebar text and chrome, using `focused` to pick the
    /// theme.
    pub fn redraw(&self, renderer: &dyn TextRenderer, font: &str, width: u32, focused: bool) -> Result<()> {
        renderer.draw_titlebar(self.titlebar, &self.title, focused, width, self.height)
    }

    pub fn resize(&self, conn: &dyn Connection, width: u32) -> Result<()> {
        conn.configure(self.titlebar, Rect::new(0, 0, width, self.height), 0)
    }

    /// Unmap the titlebar without destroying it, used while a client is
    /// fullscreen and its frame covers the monitor with no decoration.
    pub fn unmap(&self, conn: &dyn Connection) -> Result<()> {
        conn.unmap_window(self.titlebar)
    }

    /// Re-map the titlebar after leaving fullscreen.
    pub fn map(&self, conn: &dyn Connection) -> Result<()> {
        conn.map_window(self.titlebar)
    }

    /// Classify a button-press position within the titlebar into the target
    /// it landed on.
    pub fn hit_test(&self, width: u32, x: i32) -> ButtonTarget {
        let x = x.max(0) as u32;
        if x >= width.saturating_sub(BUTTON_WIDTH) {
            ButtonTarget::Close
        } else if x >= width.saturating_sub(2 * BUTTON_WIDTH) {
            ButtonTarget::Maximize
        } else if x >= width.saturating_sub(3 * BUTTON_WIDTH) {
            ButtonTarget::Iconify
        } else {
            ButtonTarget::Drag
        }
    }

    /// Convert the titlebar into an inline text entry, sharing the
    /// minibuffer's line-editing logic.
    pub fn read_from_user(
        &self,
        prompt: &str,
        initial: &str,
        commit: Box<dyn FnOnce(&str)>,
        rollback: Box<dyn FnOnce()>,
    ) -> crate::minibuffer::MinibufferModal {
        crate::minibuffer::MinibufferModal::new(self.titlebar, prompt, initial, commit, rollback)
    }

    pub fn destroy(&self, conn: &dyn Connection) -> Result<()> {
        conn.destroy_window(self.titlebar)
    }
}

/// Validate a font name is non-empty before attempting to hand it to a
/// `TextRenderer`; a genuinely missing fixed font is fatal.
pub fn require_font(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        Err(Error::FontLoad("(empty font name)".into()))
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_test_right_aligned_buttons() {
        let deco = Decorator {
            client: Xid(1),
            titlebar: Xid(2),
            title: "x".into(),
            height: 18,
        };
        assert_eq!(deco.hit_test(200, 199), ButtonTarget::Close);
        assert_eq!(deco.hit_test(200, 185), ButtonTarget::Maximize);
        assert_eq!(deco.hit_test(200, 170), ButtonTarget::Iconify);
        assert_eq!(deco.hit_test(200, 10), ButtonTarget::Drag);
    }

    #[test]
    fn empty_font_name_is_rejected() {
        assert!(require_font("").is_err());
        assert!(require_font("fixed").is_ok());
    }
}
