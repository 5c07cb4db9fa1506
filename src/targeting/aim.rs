//! Aim Rays
//!
//! Where a shot starts and which way it points. Player shots go from the
//! camera toward a focal point; the start is the weapon's location projected
//! onto the camera's aim line so bullets never start behind the pawn. AI
//! shots aim from the pawn's eye height.

use serde::{Serialize, Deserialize};
use crate::core::vec3::Vec3;

/// Distance of the focal point in front of the viewpoint.
pub const FOCAL_DISTANCE: f32 = 1024.0;

/// Origin and direction of a shot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AimRay {
    /// Start of the trace
    pub start: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl AimRay {
    /// Ray with a normalized direction.
    pub fn new(start: Vec3, direction: Vec3) -> Self {
        Self { start, direction: direction.normalize() }
    }

    /// Point `distance` along the ray.
    pub fn at(&self, distance: f32) -> Vec3 {
        self.start + self.direction * distance
    }

    /// Usable for tracing: finite start and non-zero direction.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.direction.is_finite() && !self.direction.is_nearly_zero()
    }
}

/// Where the targeting ray originates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingSource {
    /// From the camera (or AI eyes) toward the focal point.
    #[default]
    CameraTowardsFocus,
    /// From the pawn along its facing.
    PawnForward,
    /// From the pawn toward the focal point.
    PawnTowardsFocus,
    /// From the weapon along its facing.
    WeaponForward,
    /// From the weapon toward the focal point.
    WeaponTowardsFocus,
}

/// Who is looking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewPoint {
    /// Player camera.
    Player {
        /// Camera location
        camera_location: Vec3,
        /// Camera look direction
        camera_direction: Vec3,
    },
    /// AI controller looking from the pawn's eyes.
    Ai {
        /// Eye height above the pawn origin
        eye_height: f32,
        /// Control rotation as a direction
        control_direction: Vec3,
    },
}

/// Everything the targeting transform reads from the pawn and its view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AimContext {
    /// Pawn origin
    pub pawn_location: Vec3,
    /// Pawn facing
    pub pawn_forward: Vec3,
    /// Muzzle location
    pub weapon_location: Vec3,
    /// Muzzle facing
    pub weapon_forward: Vec3,
    /// Viewpoint
    pub view: ViewPoint,
}

/// Compute the aim ray for `source`.
pub fn targeting_transform(source: TargetingSource, ctx: &AimContext) -> AimRay {
    let source_location = match source {
        TargetingSource::WeaponForward | TargetingSource::WeaponTowardsFocus => ctx.weapon_location,
        _ => ctx.pawn_location,
    };

    match source {
        TargetingSource::PawnForward => return AimRay::new(source_location, ctx.pawn_forward),
        TargetingSource::WeaponForward => return AimRay::new(source_location, ctx.weapon_forward),
        _ => {}
    }

    let (camera_location, focal_location, aim_dir) = match ctx.view {
        ViewPoint::Player { camera_location, camera_direction } => {
            let aim_dir = camera_direction.normalize();
            // Slide the camera along its aim line to where the weapon is
            let start = ctx.weapon_location.project_onto_line(camera_location, aim_dir);
            (start, start + aim_dir * FOCAL_DISTANCE, aim_dir)
        }
        ViewPoint::Ai { eye_height, control_direction } => {
            let aim_dir = control_direction.normalize();
            let eyes = ctx.pawn_location + Vec3::UP * eye_height;
            (eyes, eyes + aim_dir * FOCAL_DISTANCE, aim_dir)
        }
    };

    match source {
        TargetingSource::CameraTowardsFocus => AimRay::new(camera_location, aim_dir),
        _ => AimRay::new(source_location, focal_location - source_location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_ctx() -> AimContext {
        AimContext {
            pawn_location: Vec3::new(0.0, 0.0, 0.0),
            pawn_forward: Vec3::FORWARD,
            weapon_location: Vec3::new(20.0, 30.0, 60.0),
            weapon_forward: Vec3::FORWARD,
            view: ViewPoint::Player {
                // Third-person camera behind and above the pawn
                camera_location: Vec3::new(-300.0, 30.0, 60.0),
                camera_direction: Vec3::FORWARD,
            },
        }
    }

    #[test]
    fn test_camera_start_projected_to_weapon() {
        let ray = targeting_transform(TargetingSource::CameraTowardsFocus, &player_ctx());
        assert_eq!(ray.start, Vec3::new(20.0, 30.0, 60.0));
        assert_eq!(ray.direction, Vec3::FORWARD);
    }

    #[test]
    fn test_pawn_towards_focus() {
        let ctx = player_ctx();
        let ray = targeting_transform(TargetingSource::PawnTowardsFocus, &ctx);
        assert_eq!(ray.start, ctx.pawn_location);

        // Aims at the focal point 1024 units past the projected start
        let focal = Vec3::new(20.0 + FOCAL_DISTANCE, 30.0, 60.0);
        let expected = (focal - ctx.pawn_location).normalize();
        assert!((ray.direction - expected).length() < 1.0e-5);
    }

    #[test]
    fn test_forward_sources() {
        let mut ctx = player_ctx();
        ctx.weapon_forward = Vec3::RIGHT;
        let ray = targeting_transform(TargetingSource::WeaponForward, &ctx);
        assert_eq!(ray.start, ctx.weapon_location);
        assert_eq!(ray.direction, Vec3::RIGHT);

        let ray = targeting_transform(TargetingSource::PawnForward, &ctx);
        assert_eq!(ray.direction, Vec3::FORWARD);
    }

    #[test]
    fn test_ai_aims_from_eyes() {
        let ctx = AimContext {
            view: ViewPoint::Ai { eye_height: 64.0, control_direction: Vec3::RIGHT },
            ..player_ctx()
        };
        let ray = targeting_transform(TargetingSource::CameraTowardsFocus, &ctx);
        assert_eq!(ray.start, Vec3::new(0.0, 0.0, 64.0));
        assert_eq!(ray.direction, Vec3::RIGHT);
    }

    #[test]
    fn test_validity() {
        assert!(AimRay::new(Vec3::ZERO, Vec3::FORWARD).is_valid());
        assert!(!AimRay::new(Vec3::ZERO, Vec3::ZERO).is_valid());
        assert!(!AimRay::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::FORWARD).is_valid());
    }
}
