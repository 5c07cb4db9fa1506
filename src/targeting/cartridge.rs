//! Cartridge Tracing
//!
//! Turns one trigger pull into per-pellet hits. Each pellet's direction is
//! drawn from the weapon's current spread cone using the caller's random
//! source, so a seeded source reproduces the same cartridge exactly.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::weapon::config::WeaponConfig;
use crate::weapon::spread::SpreadSample;
use super::aim::AimRay;
use super::cone::vrand_cone;
use super::hit::{ActorId, HitResult};
use super::scene::CollisionQuery;
use super::trace::do_single_bullet_trace;

/// One trigger pull.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireRequest {
    /// Aim ray before spread
    pub origin: AimRay,
    /// Trace length
    pub max_range: f32,
    /// Pellets to simulate
    pub pellets_per_cartridge: u32,
}

impl FireRequest {
    /// Request using the weapon's range and pellet count.
    pub fn for_weapon(origin: AimRay, config: &WeaponConfig) -> Self {
        Self {
            origin,
            max_range: config.max_damage_range,
            pellets_per_cartridge: config.bullets_per_cartridge,
        }
    }
}

/// One simulated projectile.
#[derive(Clone, Debug, PartialEq)]
pub struct Pellet {
    /// Perturbed direction
    pub direction: Vec3,
    /// End of the trace
    pub endpoint: Vec3,
    /// Terminal impact (a miss at `endpoint` when nothing was hit)
    pub impact: HitResult,
    /// Every hit this pellet contributes, in trace order
    pub hits: Vec<HitResult>,
}

impl Pellet {
    /// Where a tracer should end: the blocking impact, else the endpoint.
    pub fn tracer_end(&self) -> Vec3 {
        if self.impact.is_blocking_hit {
            self.impact.impact_point
        } else {
            self.endpoint
        }
    }
}

/// All pellets of one trigger pull.
#[derive(Clone, Debug, PartialEq)]
pub struct Cartridge {
    /// Shared by every pellet of this pull
    pub cartridge_id: u32,
    /// Pellets in evaluation order
    pub pellets: Vec<Pellet>,
}

impl Cartridge {
    /// Hits of every pellet, concatenated in evaluation order.
    pub fn hits(&self) -> Vec<HitResult> {
        self.pellets.iter().flat_map(|p| p.hits.iter().cloned()).collect()
    }
}

/// Local hit detection for one shooter.
pub struct LocalTargetingEngine<'a> {
    query: &'a dyn CollisionQuery,
    instigator: Option<ActorId>,
}

impl<'a> LocalTargetingEngine<'a> {
    /// Engine tracing against `query`, ignoring `instigator`.
    pub fn new(query: &'a dyn CollisionQuery, instigator: Option<ActorId>) -> Self {
        Self { query, instigator }
    }

    /// Simulate every pellet of `request`.
    ///
    /// A pellet that hits nothing contributes one non-blocking miss record,
    /// so every pellet has a terminal point.
    pub fn trace_bullets_in_cartridge(
        &self,
        request: &FireRequest,
        spread: SpreadSample,
        config: &WeaponConfig,
        rng: &mut DeterministicRng,
        cartridge_id: u32,
    ) -> Cartridge {
        let half_angle = spread.half_angle_radians();
        let start = request.origin.start;

        let pellets = (0..request.pellets_per_cartridge)
            .map(|_| {
                let direction = vrand_cone(rng, request.origin.direction, half_angle, config.spread_exponent);
                let endpoint = start + direction * request.max_range;

                let (mut hits, impact) = do_single_bullet_trace(
                    self.query,
                    self.instigator,
                    start,
                    endpoint,
                    config.bullet_trace_sweep_radius,
                );
                if hits.is_empty() {
                    hits.push(HitResult::miss(start, endpoint));
                }

                #[cfg(feature = "debug-tracing")]
                tracing::trace!(cartridge_id, actor = ?impact.actor, distance = impact.distance, "pellet resolved");

                Pellet { direction, endpoint, impact, hits }
            })
            .collect();

        Cartridge { cartridge_id, pellets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targeting::scene::{Scene, SceneObject};

    fn target_range() -> Scene {
        let mut scene = Scene::new();
        scene.insert(SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 0.0, 0.0), 40.0));
        scene
    }

    fn pistol_request() -> FireRequest {
        FireRequest::for_weapon(AimRay::new(Vec3::ZERO, Vec3::FORWARD), &WeaponConfig::pistol())
    }

    #[test]
    fn test_perfect_accuracy_hits_center() {
        let scene = target_range();
        let engine = LocalTargetingEngine::new(&scene, None);
        let mut rng = DeterministicRng::new(1);
        let spread = SpreadSample { angle_degrees: 12.0, multiplier: 0.0 };

        let cartridge = engine.trace_bullets_in_cartridge(&pistol_request(), spread, &WeaponConfig::pistol(), &mut rng, 4);
        assert_eq!(cartridge.cartridge_id, 4);
        assert_eq!(cartridge.pellets.len(), 1);
        assert_eq!(cartridge.pellets[0].direction, Vec3::FORWARD);
        assert_eq!(cartridge.pellets[0].impact.actor, Some(ActorId(2)));
        assert!(cartridge.pellets[0].tracer_end().x < 1000.0);
    }

    #[test]
    fn test_miss_synthesized_per_pellet() {
        let scene = Scene::new();
        let engine = LocalTargetingEngine::new(&scene, None);
        let mut rng = DeterministicRng::new(1);
        let shotgun = WeaponConfig::shotgun();
        let request = FireRequest::for_weapon(AimRay::new(Vec3::ZERO, Vec3::FORWARD), &shotgun);
        let spread = SpreadSample { angle_degrees: 10.0, multiplier: 1.0 };

        let cartridge = engine.trace_bullets_in_cartridge(&request, spread, &shotgun, &mut rng, 0);
        assert_eq!(cartridge.pellets.len(), 10);

        let hits = cartridge.hits();
        assert_eq!(hits.len(), 10);
        for (pellet, hit) in cartridge.pellets.iter().zip(&hits) {
            assert!(hit.is_miss());
            assert!(!hit.is_blocking_hit);
            assert_eq!(hit.impact_point, pellet.endpoint);
            assert_eq!(pellet.tracer_end(), pellet.endpoint);
        }
    }

    #[test]
    fn test_same_seed_same_cartridge() {
        let scene = target_range();
        let engine = LocalTargetingEngine::new(&scene, None);
        let shotgun = WeaponConfig::shotgun();
        let request = FireRequest::for_weapon(AimRay::new(Vec3::ZERO, Vec3::FORWARD), &shotgun);
        let spread = SpreadSample { angle_degrees: 10.0, multiplier: 1.0 };

        let a = engine.trace_bullets_in_cartridge(&request, spread, &shotgun, &mut DeterministicRng::new(5), 1);
        let b = engine.trace_bullets_in_cartridge(&request, spread, &shotgun, &mut DeterministicRng::new(5), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_pellets_stay_in_cone() {
        let scene = Scene::new();
        let engine = LocalTargetingEngine::new(&scene, None);
        let shotgun = WeaponConfig::shotgun();
        let request = FireRequest::for_weapon(AimRay::new(Vec3::ZERO, Vec3::FORWARD), &shotgun);
        let spread = SpreadSample { angle_degrees: 14.0, multiplier: 1.5 };
        let half = spread.half_angle_radians();

        let cartridge = engine.trace_bullets_in_cartridge(&request, spread, &shotgun, &mut DeterministicRng::new(9), 0);
        for pellet in &cartridge.pellets {
            let angle = pellet.direction.dot(Vec3::FORWARD).clamp(-1.0, 1.0).acos();
            assert!(angle <= half + 1.0e-3);
        }
    }

    #[test]
    fn test_instigator_is_not_hit() {
        let mut scene = target_range();
        // Shooter standing at the muzzle
        scene.insert(SceneObject::pawn(ActorId(1), Vec3::ZERO, 40.0));
        let engine = LocalTargetingEngine::new(&scene, Some(ActorId(1)));
        let spread = SpreadSample { angle_degrees: 0.0, multiplier: 1.0 };

        let cartridge = engine.trace_bullets_in_cartridge(
            &pistol_request(),
            spread,
            &WeaponConfig::pistol(),
            &mut DeterministicRng::new(1),
            0,
        );
        assert_eq!(cartridge.pellets[0].impact.actor, Some(ActorId(2)));
    }
}
