//! Cairo/Pango backed text rendering for titlebars and the minibuffer.
//!
//! `dim`'s core treats font loading and text rasterization as an external
//! collaborator: the core only ever asks a `TextRenderer` implementor to
//! measure and draw strings. This crate is one such implementor, layering
//! cairo and pango directly over an existing `x11rb`/XCB connection and
//! surface per window.
use std::collections::HashMap;

use cairo::{XCBConnection, XCBDrawable, XCBSurface, XCBVisualType};
use pango::{EllipsizeMode, FontDescription, SCALE};
use pangocairo::functions::{create_layout, show_layout};
use x11rb::protocol::xproto::{Screen, Visualtype};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Cairo(#[from] cairo::Error),

    #[error(transparent)]
    CairoBorrow(#[from] cairo::BorrowError),

    #[error("no surface registered for drawable {0}")]
    UnknownDrawable(u32),

    #[error("font '{0}' has not been registered")]
    UnknownFont(String),

    #[error("unable to create pango layout")]
    LayoutCreation,
}

pub type Result<T> = std::result::Result<T, Error>;

/// RGBA color in the 0.0..=1.0 cairo convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    /// Build from a packed `0xRRGGBB` value as used in EWMH-adjacent config files.
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xff) as f64 / 255.0;
        let g = ((hex >> 8) & 0xff) as f64 / 255.0;
        let b = (hex & 0xff) as f64 / 255.0;
        Rgba { r, g, b, a: 1.0 }
    }
}

/// A measured and positioned string, ready to be asked to draw itself.
#[derive(Clone)]
pub struct TextStyle {
    pub fg: Rgba,
    pub bg: Option<Rgba>,
    pub padding: (f64, f64),
}

/// Owns the XCB connection handle and a cairo surface per managed drawable.
///
/// `new` borrows an existing raw XCB connection rather than opening its own:
/// the core already owns the one X connection per process (see `dim`'s
/// single-connection concurrency model), so this type is purely a
/// presentation layer over windows the core has already created.
pub struct CairoDraw {
    raw_conn: *mut std::ffi::c_void,
    fonts: HashMap<String, FontDescription>,
    surfaces: HashMap<u32, XCBSurface>,
}

// SAFETY: the caller guarantees `raw_conn` outlives this `CairoDraw` and that
// access to it remains confined to the single event-loop thread, matching
// the core's single-threaded ownership of the X connection.
unsafe impl Send for CairoDraw {}

impl CairoDraw {
    /// # Safety
    /// `raw_conn` must be a valid `xcb_connection_t*` for as long as this
    /// value lives, and must not be used concurrently from another thread.
    pub unsafe fn new(raw_conn: *mut std::ffi::c_void) -> Self {
        Self {
            raw_conn,
            fonts: HashMap::new(),
            surfaces: HashMap::new(),
        }
    }

    pub fn register_font(&mut self, name: &str) {
        self.fonts
            .insert(name.to_string(), FontDescription::from_string(name));
    }

    /// Create (or replace) the rendering surface backing `window`.
    pub fn bind_surface(
        &mut self,
        window: u32,
        screen: &Screen,
        visual: &Visualtype,
        w: i32,
        h: i32,
    ) -> Result<()> {
        let mut raw_visual = XcbVisualtypeT::from(visual);
        let surface = unsafe {
            cairo::XCBSurface::create(
                &XCBConnection::from_raw_none(self.raw_conn as _),
                &XCBDrawable(window),
                &XCBVisualType::from_raw_none(&mut raw_visual as *mut _ as _),
                w,
                h,
            )?
        };
        surface.set_size(w, h)?;
        self.surfaces.insert(window, surface);
        let _ = screen;
        Ok(())
    }

    pub fn resize_surface(&mut self, window: u32, w: i32, h: i32) -> Result<()> {
        if let Some(s) = self.surfaces.get(&window) {
            s.set_size(w, h)?;
        }
        Ok(())
    }

    pub fn drop_surface(&mut self, window: u32) {
        self.surfaces.remove(&window);
    }

    /// Measure `text` as it would be rendered with `font`, without painting it.
    pub fn text_extents(&self, window: u32, font: &str, text: &str) -> Result<(f64, f64)> {
        let surface = self
            .surfaces
            .get(&window)
            .ok_or(Error::UnknownDrawable(window))?;
        let ctx = cairo::Context::new(surface)?;
        let layout = create_layout(&ctx).ok_or(Error::LayoutCreation)?;
        let desc = self.fonts.get(font).ok_or_else(|| Error::UnknownFont(font.to_string()))?;
        layout.set_font_description(Some(desc));
        layout.set_text(text);
        let (w, h) = layout.pixel_size();
        Ok((w as f64, h as f64))
    }

    /// Clear `window`'s surface to `bg` and draw `text` left-padded into it.
    pub fn render(
        &self,
        window: u32,
        font: &str,
        text: &str,
        style: &TextStyle,
    ) -> Result<(f64, f64)> {
        let surface = self
            .surfaces
            .get(&window)
            .ok_or(Error::UnknownDrawable(window))?;
        let ctx = cairo::Context::new(surface)?;

        if let Some(bg) = style.bg {
            ctx.save()?;
            ctx.set_source_rgba(bg.r, bg.g, bg.b, bg.a);
            ctx.paint()?;
            ctx.restore()?;
        }

        let desc = self.fonts.get(font).ok_or_else(|| Error::UnknownFont(font.to_string()))?;
        let layout = create_layout(&ctx).ok_or(Error::LayoutCreation)?;
        layout.set_font_description(Some(desc));
        layout.set_text(text);
        layout.set_ellipsize(EllipsizeMode::End);

        ctx.set_source_rgba(style.fg.r, style.fg.g, style.fg.b, style.fg.a);
        let (l, _r) = style.padding;
        ctx.translate(l, 0.0);
        show_layout(&ctx, &layout);
        ctx.translate(-l, 0.0);

        let (w, h) = layout.pixel_size();
        surface.flush();
        Ok((w as f64 + style.padding.0 + style.padding.1, h as f64))
    }
}

// A rust mirror of xcb_visualtype_t for FFI into cairo's raw XCBSurface
// constructor, taken from the x11rb cairo-example pattern.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct XcbVisualtypeT {
    pub visual_id: u32,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub pad0: [u8; 4],
}

impl From<&Visualtype> for XcbVisualtypeT {
    fn from(v: &Visualtype) -> Self {
        XcbVisualtypeT {
            visual_id: v.visual_id,
            class: v.class.into(),
            bits_per_rgb_value: v.bits_per_rgb_value,
            colormap_entries: v.colormap_entries,
            red_mask: v.red_mask,
            green_mask: v.green_mask,
            blue_mask: v.blue_mask,
            pad0: [0; 4],
        }
    }
}
