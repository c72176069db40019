//! Geometry primitives shared by client tracking, the decorator, and the
//! move/resize engine.
use serde::{Deserialize, Serialize};

/// An absolute x,y coordinate relative to the root window.
///
/// Coordinates here are signed: once a client can be dragged interactively
/// it can legitimately end up
/// with a negative root-relative position (partially off the left or top
/// edge of a monitor), so `u32` would make that an invalid state instead of
/// a normal one.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A window's outer geometry: position plus size, border excluded.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// `(left, top, right, bottom)` edge coordinates.
    pub fn edges(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.x + self.w as i32, self.y + self.h as i32)
    }

    pub fn contains_point(&self, p: Point) -> bool {
        let (l, t, r, b) = self.edges();
        p.x >= l && p.x < r && p.y >= t && p.y < b
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        let (l1, t1, r1, b1) = self.edges();
        let (l2, t2, r2, b2) = other.edges();
        l1 < r2 && r1 > l2 && t1 < b2 && b1 > t2
    }

    /// Grow this rect outwards by `border` on every side and `titlebar` on
    /// top only — the frame/client geometry relationship a reparented
    /// window must maintain.
    pub fn inflate(&self, border: u32, titlebar: u32) -> Rect {
        Rect {
            x: self.x - border as i32,
            y: self.y - (border + titlebar) as i32,
            w: self.w + 2 * border,
            h: self.h + 2 * border + titlebar,
        }
    }

    /// Inverse of `inflate`: recover client geometry from frame geometry.
    pub fn deflate(&self, border: u32, titlebar: u32) -> Rect {
        Rect {
            x: self.x + border as i32,
            y: self.y + (border + titlebar) as i32,
            w: self.w.saturating_sub(2 * border),
            h: self.h.saturating_sub(2 * border + titlebar),
        }
    }

    pub fn with_pos(&self, p: Point) -> Rect {
        Rect { x: p.x, y: p.y, ..*self }
    }

    pub fn with_size(&self, w: u32, h: u32) -> Rect {
        Rect { w, h, ..*self }
    }
}

/// One of the four edges of a [`Rect`], used by snapping and resize handles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Rect {
    /// The coordinate of the named edge along its perpendicular axis.
    pub fn edge(&self, e: Edge) -> i32 {
        let (l, t, r, b) = self.edges();
        match e {
            Edge::Left => l,
            Edge::Right => r,
            Edge::Top => t,
            Edge::Bottom => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflate_then_deflate_round_trips() {
        let r = Rect::new(10, 10, 300, 200);
        let framed = r.inflate(2, 18);
        assert_eq!(framed.deflate(2, 18), r);
    }

    #[test]
    fn inflate_matches_frame_geometry_relationship() {
        // frame = client inflated by (border, border+titlebar, border, border)
        let r = Rect::new(0, 0, 100, 100);
        let framed = r.inflate(3, 20);
        assert_eq!(framed, Rect::new(-3, -23, 106, 143));
    }

    #[test]
    fn overlaps_detects_shared_region() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 100, 100);
        let c = Rect::new(200, 200, 10, 10);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
