//! WM_NORMAL_HINTS decoding and size-hints geometry clamping.
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

bitflags::bitflags! {
    #[derive(Default, Serialize, Deserialize)]
    pub struct HintsFlags: u32 {
        const U_POSITION    = 0b0000000001;
        const U_SIZE        = 0b0000000010;
        const P_POSITION    = 0b0000000100;
        const P_SIZE        = 0b0000001000;
        const P_MIN_SIZE    = 0b0000010000;
        const P_MAX_SIZE    = 0b0000100000;
        const P_RESIZE_INC  = 0b0001000000;
        const P_ASPECT      = 0b0010000000;
        const P_BASE_SIZE   = 0b0100000000;
        const P_WIN_GRAVITY = 0b1000000000;
    }
}

/// A decoded `WM_NORMAL_HINTS` property.
///
/// Every field defaults to the ICCCM fallback a client gets when it doesn't
/// set the corresponding flag: no minimum below 1x1, no maximum, inc of
/// 1x1 (every size is reachable), no aspect constraint, base size equal to
/// min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeHints {
    pub flags: HintsFlags,
    pub min: (u32, u32),
    pub max: Option<(u32, u32)>,
    pub base: (u32, u32),
    pub inc: (u32, u32),
    pub aspect: Option<((u32, u32), (u32, u32))>,
    pub gravity: Gravity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Default for Gravity {
    fn default() -> Self {
        Gravity::NorthWest
    }
}

impl Default for SizeHints {
    fn default() -> Self {
        SizeHints {
            flags: HintsFlags::empty(),
            min: (1, 1),
            max: None,
            base: (1, 1),
            inc: (1, 1),
            aspect: None,
            gravity: Gravity::NorthWest,
        }
    }
}

impl SizeHints {
    /// Snap `(w, h)` to satisfy `base + k*inc` within `min..=max`, aspect
    /// clamped.
    pub fn constrain_size(&self, w: u32, h: u32) -> (u32, u32) {
        let (min_w, min_h) = self.min;
        let (base_w, base_h) = self.base;
        let (inc_w, inc_h) = (self.inc.0.max(1), self.inc.1.max(1));

        let mut w = w.max(min_w).max(base_w);
        let mut h = h.max(min_h).max(base_h);

        if let Some((max_w, max_h)) = self.max {
            w = w.min(max_w.max(min_w));
            h = h.min(max_h.max(min_h));
        }

        // floor to the largest base + k*inc <= w
        w = base_w + ((w - base_w) / inc_w) * inc_w;
        h = base_h + ((h - base_h) / inc_h) * inc_h;

        if let Some(((min_a_x, min_a_y), (max_a_x, max_a_y))) = self.aspect {
            (w, h) = clamp_aspect(w, h, (min_a_x, min_a_y), (max_a_x, max_a_y));
        }

        (w.max(min_w), h.max(min_h))
    }

    /// Apply `constrain_size` to a full [`Rect`], preserving position.
    pub fn constrain(&self, r: Rect) -> Rect {
        let (w, h) = self.constrain_size(r.w, r.h);
        Rect { w, h, ..r }
    }
}

fn clamp_aspect(w: u32, h: u32, min: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    if h == 0 {
        return (w, h);
    }
    let ratio = w as f64 / h as f64;
    let min_ratio = min.0 as f64 / min.1.max(1) as f64;
    let max_ratio = max.0 as f64 / max.1.max(1) as f64;

    if ratio < min_ratio {
        (((h as f64) * min_ratio).round() as u32, h)
    } else if ratio > max_ratio {
        (w, ((w as f64) / max_ratio).round() as u32)
    } else {
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_floors_to_increment() {
        // base=(4,4) inc=(6,13) min=(80,25), drag to 500.7px wide ->
        // committed width is 496 (largest w <= 500.7 with (w - 4) % 6 == 0).
        let hints = SizeHints {
            min: (80, 25),
            base: (4, 4),
            inc: (6, 13),
            ..Default::default()
        };
        let (w, _h) = hints.constrain_size(500, 100);
        assert_eq!(w, 496);
        assert_eq!((w - 4) % 6, 0);
    }

    #[test]
    fn never_goes_below_minimum() {
        let hints = SizeHints {
            min: (80, 25),
            base: (4, 4),
            inc: (6, 13),
            ..Default::default()
        };
        let (w, h) = hints.constrain_size(1, 1);
        assert!(w >= 80);
        assert!(h >= 25);
    }

    #[test]
    fn respects_maximum() {
        let hints = SizeHints {
            min: (10, 10),
            max: Some((200, 200)),
            base: (0, 0),
            inc: (1, 1),
            ..Default::default()
        };
        let (w, h) = hints.constrain_size(10_000, 10_000);
        assert_eq!((w, h), (200, 200));
    }
}
