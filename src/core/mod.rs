//! Core deterministic primitives.
//!
//! Everything the firing pipeline computes is a pure function of these
//! types and an explicitly passed random source.

pub mod vec3;
pub mod vec2;
pub mod rng;
pub mod curve;
pub mod math;
pub mod tag;
pub mod hash;

// Re-export core types
pub use vec3::Vec3;
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use curve::{Curve, CurveKey, CurveError};
pub use tag::Tag;
pub use hash::{PayloadHasher, DigestBytes};
