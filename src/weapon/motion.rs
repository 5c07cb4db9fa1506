//! Pawn Motion Queries
//!
//! The movement/camera layer is external; the spread model only needs a
//! handful of read-only queries about the pawn holding the weapon.

use serde::{Serialize, Deserialize};
use crate::core::vec3::Vec3;

/// Read-only motion state of the pawn that owns a weapon.
pub trait PawnMotion {
    /// Current velocity (units/s).
    fn velocity(&self) -> Vec3;

    /// Whether the pawn is crouched.
    fn is_crouching(&self) -> bool;

    /// Whether the pawn is airborne (jumping or falling).
    fn is_falling(&self) -> bool;

    /// Whether the pawn is aiming down sights.
    fn is_aiming(&self) -> bool;

    /// How far into the aim-down-sights blend the camera is, in `[0, 1]`.
    fn aiming_weight(&self) -> f32 {
        if self.is_aiming() { 1.0 } else { 0.0 }
    }
}

/// Plain snapshot of pawn motion, as sent by clients each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSnapshot {
    /// Velocity (units/s)
    pub velocity: Vec3,
    /// Crouched
    pub crouching: bool,
    /// Airborne
    pub falling: bool,
    /// Aim-down-sights blend weight in `[0, 1]`
    pub aiming_weight: f32,
    /// World location reported by the movement layer, if it sends one
    #[serde(default)]
    pub location: Option<Vec3>,
}

impl MotionSnapshot {
    /// Pawn standing still, upright, not aiming.
    pub fn still() -> Self {
        Self::default()
    }

    /// Pawn moving at `velocity`.
    pub fn moving(velocity: Vec3) -> Self {
        Self { velocity, ..Self::default() }
    }
}

impl PawnMotion for MotionSnapshot {
    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn is_crouching(&self) -> bool {
        self.crouching
    }

    fn is_falling(&self) -> bool {
        self.falling
    }

    fn is_aiming(&self) -> bool {
        self.aiming_weight > 0.0
    }

    fn aiming_weight(&self) -> f32 {
        if self.aiming_weight.is_finite() {
            self.aiming_weight.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
