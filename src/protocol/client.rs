//! Firing Controller
//!
//! The firing client's side of a trigger pull: simulate the cartridge
//! locally, commit through the ability gate, heat the weapon, draw predicted
//! markers, and hand back the batch to submit. Confirmations from the
//! authority are folded back in through [`FiringController::receive_confirmation`].

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::core::vec3::Vec3;
use crate::targeting::aim::AimRay;
use crate::targeting::cartridge::{Cartridge, FireRequest, LocalTargetingEngine};
use crate::targeting::hit::{ActorId, HitResult};
use crate::targeting::scene::CollisionQuery;
use crate::weapon::config::{ConfigError, WeaponConfig};
use crate::weapon::equipment::{EquippedItem, RangedWeapon, WeaponId};
use crate::weapon::motion::PawnMotion;
use super::ledger::{HitMarkerLedger, LedgerConfig};
use super::messages::{ConfirmTargetData, SubmitTargetData};
use super::reconcile::{MarkerEntry, ReconcileOutcome, ReconciliationProtocol, UnconfirmedBatch};

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Cost/cooldown gate owned by the ability layer.
pub trait AbilityGate {
    /// Whether an activation at `now` may commit.
    fn can_commit(&mut self, now: f64) -> bool;

    /// The activation at `now` committed.
    fn on_committed(&mut self, now: f64);
}

/// Gate that always commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCommit;

impl AbilityGate for AlwaysCommit {
    fn can_commit(&mut self, _now: f64) -> bool {
        true
    }

    fn on_committed(&mut self, _now: f64) {}
}

/// Gate enforcing a minimum interval between activations.
#[derive(Debug, Clone)]
pub struct FireRateGate {
    /// Seconds between activations
    pub refire_interval: f64,
    last_commit: Option<f64>,
}

impl FireRateGate {
    /// Gate allowing one activation per `refire_interval` seconds.
    pub fn new(refire_interval: f64) -> Self {
        Self { refire_interval, last_commit: None }
    }
}

impl AbilityGate for FireRateGate {
    fn can_commit(&mut self, now: f64) -> bool {
        match self.last_commit {
            Some(last) => now - last >= self.refire_interval,
            None => true,
        }
    }

    fn on_committed(&mut self, now: f64) {
        self.last_commit = Some(now);
    }
}

/// World-to-screen projection of the local viewport.
pub trait ScreenProjector {
    /// Screen position of `world`, or `None` when off screen.
    fn project(&self, world: Vec3) -> Option<Vec2>;
}

/// Pinhole camera projection.
#[derive(Debug, Clone, Copy)]
pub struct PinholeProjector {
    /// Camera location
    pub location: Vec3,
    /// Unit view direction
    pub forward: Vec3,
    /// Horizontal field of view in degrees
    pub fov_degrees: f32,
    /// Viewport size in pixels
    pub viewport: Vec2,
}

impl ScreenProjector for PinholeProjector {
    fn project(&self, world: Vec3) -> Option<Vec2> {
        let forward = self.forward.normalize();
        let (right, up) = crate::targeting::cone::orthonormal_basis(forward);
        let rel = world - self.location;

        let depth = rel.dot(forward);
        if depth <= 0.0 {
            return None;
        }

        let focal = (self.viewport.x * 0.5) / (self.fov_degrees.to_radians() * 0.5).tan();
        let x = self.viewport.x * 0.5 + rel.dot(right) / depth * focal;
        let y = self.viewport.y * 0.5 - rel.dot(up) / depth * focal;

        let on_screen = (0.0..=self.viewport.x).contains(&x) && (0.0..=self.viewport.y).contains(&y);
        on_screen.then(|| Vec2::new(x, y))
    }
}

/// Which hits the client draws as successful.
pub trait HitSuccessPolicy {
    /// Whether `hit` shows as a success marker.
    fn show_as_success(&self, hit: &HitResult) -> bool;
}

/// Success on any pawn that is not an ally.
#[derive(Debug, Clone, Default)]
pub struct HostilePawns {
    /// Pawns exempt from success markers (teammates, self)
    pub allies: BTreeSet<ActorId>,
}

impl HitSuccessPolicy for HostilePawns {
    fn show_as_success(&self, hit: &HitResult) -> bool {
        match hit.owning_pawn() {
            Some(pawn) => hit.is_blocking_hit && !self.allies.contains(&pawn),
            None => false,
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Errors from a fire attempt.
#[derive(Debug, Error)]
pub enum FireError {
    /// The held item has no ranged-weapon capability.
    #[error("no ranged weapon equipped")]
    NoRangedWeapon,

    /// The aim ray has a zero or non-finite direction.
    #[error("aim ray is degenerate")]
    DegenerateAim,

    /// Every batch id is in flight.
    #[error("no free batch id")]
    NoBatchId,
}

/// Result of a trigger pull.
#[derive(Debug, Clone)]
pub enum FireOutcome {
    /// The ability gate refused; nothing was simulated or sent.
    NotCommitted,
    /// Shot simulated; `submission` goes to the authority.
    Submitted {
        /// Batch to send
        submission: SubmitTargetData,
        /// Local simulation, for tracers and impact effects
        cartridge: Cartridge,
    },
}

/// One firing client.
pub struct FiringController {
    pawn: ActorId,
    equipped: EquippedItem,
    protocol: ReconciliationProtocol,
    rng: DeterministicRng,
    next_cartridge_id: u32,
}

impl FiringController {
    /// Controller for `pawn` with the given random source.
    pub fn new(pawn: ActorId, rng: DeterministicRng, config: &LedgerConfig) -> Self {
        Self {
            pawn,
            equipped: EquippedItem::Empty,
            protocol: ReconciliationProtocol::new(config),
            rng,
            next_cartridge_id: 0,
        }
    }

    /// Pawn this controller drives.
    pub fn pawn(&self) -> ActorId {
        self.pawn
    }

    /// Equip a ranged weapon.
    pub fn equip(&mut self, id: WeaponId, config: Arc<WeaponConfig>) -> Result<(), ConfigError> {
        self.equipped = EquippedItem::Ranged(RangedWeapon::equip(id, config)?);
        Ok(())
    }

    /// Equip something without a ranged capability.
    pub fn equip_other(&mut self, item: impl Into<String>) {
        self.equipped = EquippedItem::Other(item.into());
    }

    /// Put away whatever is held.
    pub fn unequip(&mut self) {
        self.equipped = EquippedItem::Empty;
    }

    /// Held item.
    pub fn equipped(&self) -> &EquippedItem {
        &self.equipped
    }

    /// Hit-marker read model.
    pub fn ledger(&self) -> &HitMarkerLedger {
        self.protocol.ledger()
    }

    /// Reconciliation state.
    pub fn protocol(&self) -> &ReconciliationProtocol {
        &self.protocol
    }

    /// Per-tick update: weapon accuracy and protocol housekeeping.
    pub fn tick(&mut self, delta_seconds: f32, now: f64, motion: &dyn PawnMotion) {
        if let Some(weapon) = self.equipped.as_ranged_mut() {
            weapon.spread.tick(delta_seconds, now, motion);
        }
        self.protocol.tick(now);
    }

    /// Pull the trigger.
    #[instrument(skip_all, fields(pawn = self.pawn.0))]
    pub fn fire(
        &mut self,
        aim: AimRay,
        query: &dyn CollisionQuery,
        gate: &mut dyn AbilityGate,
        projector: &dyn ScreenProjector,
        policy: &dyn HitSuccessPolicy,
        now: f64,
    ) -> Result<FireOutcome, FireError> {
        let weapon = self.equipped.as_ranged_mut().ok_or(FireError::NoRangedWeapon)?;
        if !aim.is_valid() {
            return Err(FireError::DegenerateAim);
        }
        if !gate.can_commit(now) {
            debug!("activation refused by gate");
            return Ok(FireOutcome::NotCommitted);
        }
        let unique_id = self.protocol.allocate_id().ok_or(FireError::NoBatchId)?;

        weapon.spread.record_fire_time(now);
        let spread = weapon.spread.effective_spread();
        let config = Arc::clone(weapon.spread.config());

        let cartridge_id = self.next_cartridge_id;
        self.next_cartridge_id = self.next_cartridge_id.wrapping_add(1);

        let request = FireRequest::for_weapon(aim, &config);
        let engine = LocalTargetingEngine::new(query, Some(self.pawn));
        let cartridge = engine.trace_bullets_in_cartridge(&request, spread, &config, &mut self.rng, cartridge_id);

        gate.on_committed(now);
        weapon.spread.on_shot_fired();

        let hits = cartridge.hits();
        let markers = hits
            .iter()
            .map(|hit| MarkerEntry {
                screen_position: projector.project(hit.impact_point),
                hit_zone: hit.hit_zone().cloned(),
                show_as_success: policy.show_as_success(hit),
            })
            .collect();

        self.protocol.submit(UnconfirmedBatch {
            unique_id,
            cartridge_id,
            submitted_at: now,
            markers,
        });

        debug!(unique_id, cartridge_id, hits = hits.len(), "target data submitted");
        Ok(FireOutcome::Submitted {
            submission: SubmitTargetData {
                unique_id,
                cartridge_id,
                weapon_id: weapon.id,
                hits,
            },
            cartridge,
        })
    }

    /// Apply an authority decision.
    pub fn receive_confirmation(&mut self, msg: &ConfirmTargetData, now: f64) -> ReconcileOutcome {
        self.protocol.apply_confirmation(msg, now)
    }
}
