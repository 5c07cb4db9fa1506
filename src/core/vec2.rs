//! Screen-Space 2D Vector
//!
//! Viewport positions of hit markers. Computed once when a batch is
//! submitted and never re-derived.

use std::fmt;
use serde::{Serialize, Deserialize};

/// 2D vector in viewport pixels.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component (pixels from the left edge)
    pub x: f32,
    /// Y component (pixels from the top edge)
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.1}, {:.1})", self.x, self.y)
    }
}
