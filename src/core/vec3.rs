//! 3D Vector
//!
//! World-space vector used by the aim ray, pellet directions and hit results.
//! Plain `f32` components; every operation is a pure function of its inputs
//! so identical inputs trace identically on both authorities.

use std::fmt;
use std::ops::{Add, Sub, Neg, Mul};
use serde::{Serialize, Deserialize};

/// 3D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component (forward)
    pub x: f32,
    /// Y component (right)
    pub y: f32,
    /// Z component (up)
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Unit vector pointing forward (+X)
    pub const FORWARD: Self = Self { x: 1.0, y: 0.0, z: 0.0 };

    /// Unit vector pointing right (+Y)
    pub const RIGHT: Self = Self { x: 0.0, y: 1.0, z: 0.0 };

    /// Unit vector pointing up (+Z)
    pub const UP: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product with another vector.
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        self.sub(other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Normalize to unit length.
    /// Returns ZERO if the vector is too small to normalize safely.
    #[inline]
    pub fn normalize(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq < 1.0e-8 {
            return Self::ZERO;
        }
        self.scale(1.0 / len_sq.sqrt())
    }

    /// Check if every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Check if the vector is (nearly) zero length.
    #[inline]
    pub fn is_nearly_zero(self) -> bool {
        self.length_squared() < 1.0e-8
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Project a point onto the line through `origin` with unit `direction`.
    #[inline]
    pub fn project_onto_line(self, origin: Self, direction: Self) -> Self {
        origin.add(direction.scale(self.sub(origin).dot(direction)))
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn axis(self, index: usize) -> f32 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Unit vector along an axis, signed.
    #[inline]
    pub fn unit_axis(index: usize, sign: f32) -> Self {
        match index {
            0 => Self::new(sign, 0.0, 0.0),
            1 => Self::new(0.0, sign, 0.0),
            _ => Self::new(0.0, 0.0, sign),
        }
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Vec3::add(self, other)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Vec3::sub(self, other)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        self.scale(scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_basic_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(a.dot(b), 32.0);
    }

    #[test]
    fn test_vec3_cross_is_right_handed() {
        assert_eq!(Vec3::FORWARD.cross(Vec3::RIGHT), Vec3::UP);
        assert_eq!(Vec3::RIGHT.cross(Vec3::UP), Vec3::FORWARD);
    }

    #[test]
    fn test_vec3_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 1.0e-6);
        assert!((v.x - 0.6).abs() < 1.0e-6);

        // Zero stays zero
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_vec3_project_onto_line() {
        let p = Vec3::new(5.0, 3.0, 0.0);
        let projected = p.project_onto_line(Vec3::ZERO, Vec3::FORWARD);
        assert_eq!(projected, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_vec3_finite() {
        assert!(Vec3::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
        assert!(!Vec3::new(0.0, f32::INFINITY, 0.0).is_finite());
    }
}
