//! Cone Sampling
//!
//! Perturbs an aim direction inside a bounded cone. The radial offset is
//! `pow(u, exponent) * half_angle`, so larger exponents pull samples toward
//! the centre of the cone.

use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;

/// Two unit vectors orthogonal to `dir` and to each other.
pub fn orthonormal_basis(dir: Vec3) -> (Vec3, Vec3) {
    // Avoid a reference axis nearly parallel to dir
    let reference = if dir.z.abs() < 0.999 { Vec3::UP } else { Vec3::RIGHT };
    let u = reference.cross(dir).normalize();
    let v = dir.cross(u);
    (u, v)
}

/// Random unit direction within `half_angle_rad` of `dir`.
///
/// Draws the radial offset first, then the angle around the axis. A
/// non-positive half angle returns `dir` normalized without consuming any
/// randomness.
pub fn vrand_cone(rng: &mut DeterministicRng, dir: Vec3, half_angle_rad: f32, exponent: f32) -> Vec3 {
    let dir = dir.normalize();
    if half_angle_rad.is_nan() || half_angle_rad <= 0.0 {
        return dir;
    }

    let from_center = rng.next_unit().powf(exponent);
    let angle_from_center = from_center * half_angle_rad;
    let angle_around = rng.next_unit() * std::f32::consts::TAU;

    let (u, v) = orthonormal_basis(dir);
    let (sin_off, cos_off) = angle_from_center.sin_cos();
    let (sin_around, cos_around) = angle_around.sin_cos();

    let lateral = u * cos_around + v * sin_around;
    (dir * cos_off + lateral * sin_off).normalize()
}
