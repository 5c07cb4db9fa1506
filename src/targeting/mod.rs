//! Local hit detection.
//!
//! Aim rays, cone sampling, collision queries and the two-pass bullet
//! trace that resolves each pellet of a cartridge.

pub mod hit;
pub mod scene;
pub mod cone;
pub mod aim;
pub mod trace;
pub mod cartridge;

pub use hit::{ActorId, HitResult, TargetKind};
pub use scene::{CollisionQuery, Scene, SceneObject, Shape};
pub use aim::{AimContext, AimRay, TargetingSource, ViewPoint};
pub use cartridge::{Cartridge, FireRequest, LocalTargetingEngine, Pellet};
