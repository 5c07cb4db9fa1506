//! Controller Authority
//!
//! The authoritative side of the exchange for one controller. It keeps its
//! own copy of the controller's weapon state, re-validates each submitted
//! hit against its own collision data, applies damage for the survivors and
//! answers with a `ConfirmTargetData` addressed to the submitting client.
//!
//! Validation rules per hit:
//! - synthesized misses are never invalidated
//! - non-finite fields invalidate the hit
//! - a trace start away from where the authority knows the shooter to be
//!   invalidates the hit, as does any claim while that position is unknown
//! - an impact beyond the weapon's range (plus slack) invalidates the hit
//! - a different blocking object in front of the claimed impact (beyond the
//!   tolerance) invalidates the hit
//!
//! A batch is denied outright when it names a weapon the controller does not
//! hold, carries more hits than the index space addresses, or when the
//! ability gate refuses the activation. Resubmitting an already processed
//! payload replays the cached reply without applying anything again.

use std::collections::VecDeque;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::hash::DigestBytes;
use crate::core::tag::Tag;
use crate::core::vec3::Vec3;
use crate::targeting::hit::{ActorId, HitResult};
use crate::targeting::scene::CollisionQuery;
use crate::weapon::config::{ConfigError, WeaponConfig};
use crate::weapon::damage::compute_damage;
use crate::weapon::equipment::{EquippedItem, RangedWeapon, WeaponId};
use crate::weapon::motion::PawnMotion;
use super::client::AbilityGate;
use super::ledger::{ConfirmedHitLedger, LedgerConfig};
use super::messages::{ConfirmTargetData, SubmitTargetData};

/// Validation tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// How far (units) an obstruction may sit in front of the claimed impact
    /// before the hit is rejected.
    pub impact_tolerance: f32,
    /// Extra range (units) allowed past the weapon's max range.
    pub range_slack: f32,
    /// How far (units) a claimed trace start may sit from the shooter's
    /// known location.
    pub max_origin_offset: f32,
    /// Processed submissions remembered for replay.
    pub resubmission_memory: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            impact_tolerance: 10.0,
            range_slack: 50.0,
            max_origin_offset: 150.0,
            resubmission_memory: 32,
        }
    }
}

/// Damage applied for one surviving hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Trigger pull the hit came from
    pub cartridge_id: u32,
    /// Position of the hit in the batch
    pub hit_index: u8,
    /// Object damaged
    pub target: ActorId,
    /// Damage after attenuation
    pub amount: f32,
    /// Hit-zone tag, if any
    pub hit_zone: Option<Tag>,
}

/// World-space mirror of a confirmed hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedWorldHit {
    /// Object hit
    pub target: ActorId,
    /// Impact location
    pub impact_point: Vec3,
    /// Hit-zone tag, if any
    pub hit_zone: Option<Tag>,
}

/// Result of handling one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    /// Reply for the submitting client
    pub reply: ConfirmTargetData,
    /// Damage applied (empty for a replay or denial)
    pub damage: Vec<DamageEvent>,
    /// Whether the reply came from the resubmission cache
    pub replayed: bool,
}

/// Authoritative state for one controller.
pub struct ControllerAuthority {
    controller_id: Uuid,
    pawn: ActorId,
    pawn_location: Option<Vec3>,
    equipped: EquippedItem,
    gate: Box<dyn AbilityGate + Send>,
    config: AuthorityConfig,
    confirmed: ConfirmedHitLedger<ConfirmedWorldHit>,
    processed: VecDeque<(u16, DigestBytes, ConfirmTargetData)>,
}

impl ControllerAuthority {
    /// Authority for the controller driving `pawn`.
    pub fn new(
        controller_id: Uuid,
        pawn: ActorId,
        gate: Box<dyn AbilityGate + Send>,
        config: AuthorityConfig,
        ledger: &LedgerConfig,
    ) -> Self {
        Self {
            controller_id,
            pawn,
            pawn_location: None,
            equipped: EquippedItem::Empty,
            gate,
            config,
            confirmed: ConfirmedHitLedger::new(ledger.confirmed_window),
            processed: VecDeque::new(),
        }
    }

    /// Controller id.
    pub fn controller_id(&self) -> Uuid {
        self.controller_id
    }

    /// Pawn driven by this controller.
    pub fn pawn(&self) -> ActorId {
        self.pawn
    }

    /// Record where the movement layer has the pawn.
    ///
    /// Takes precedence over the collision data's idea of the pawn's
    /// location.
    pub fn set_pawn_location(&mut self, location: Vec3) {
        self.pawn_location = Some(location);
    }

    /// Last location recorded for the pawn.
    pub fn pawn_location(&self) -> Option<Vec3> {
        self.pawn_location
    }

    /// Held item.
    pub fn equipped(&self) -> &EquippedItem {
        &self.equipped
    }

    /// Mirror of the client's confirmed ledger.
    pub fn confirmed_hits(&self) -> &[ConfirmedWorldHit] {
        self.confirmed.entries()
    }

    /// Equip a ranged weapon.
    pub fn equip(&mut self, id: WeaponId, config: Arc<WeaponConfig>) -> Result<(), ConfigError> {
        self.equipped = EquippedItem::Ranged(RangedWeapon::equip(id, config)?);
        info!(controller = %self.controller_id, weapon = id.0, "weapon equipped");
        Ok(())
    }

    /// Put away whatever is held.
    pub fn unequip(&mut self) {
        self.equipped = EquippedItem::Empty;
    }

    /// Advance the authoritative weapon state.
    pub fn tick(&mut self, delta_seconds: f32, now: f64, motion: &dyn PawnMotion) {
        if let Some(weapon) = self.equipped.as_ranged_mut() {
            weapon.spread.tick(delta_seconds, now, motion);
        }
    }

    /// Validate a submission and produce the reply.
    pub fn handle_submission(
        &mut self,
        msg: &SubmitTargetData,
        query: &dyn CollisionQuery,
        now: f64,
    ) -> SubmissionResult {
        let digest = msg.digest();
        if let Some((_, _, reply)) = self
            .processed
            .iter()
            .find(|(id, d, _)| *id == msg.unique_id && *d == digest)
        {
            debug!(unique_id = msg.unique_id, digest = %hex::encode(&digest[..8]), "resubmission replayed");
            return SubmissionResult { reply: reply.clone(), damage: Vec::new(), replayed: true };
        }

        let (reply, damage) = self.process(msg, query, now);

        self.processed.push_back((msg.unique_id, digest, reply.clone()));
        while self.processed.len() > self.config.resubmission_memory {
            self.processed.pop_front();
        }

        SubmissionResult { reply, damage, replayed: false }
    }

    fn process(
        &mut self,
        msg: &SubmitTargetData,
        query: &dyn CollisionQuery,
        now: f64,
    ) -> (ConfirmTargetData, Vec<DamageEvent>) {
        let deny = || (ConfirmTargetData::deny(msg.unique_id), Vec::new());

        let Some(weapon) = self.equipped.as_ranged_mut() else {
            warn!(unique_id = msg.unique_id, "submission without a ranged weapon denied");
            return deny();
        };
        if weapon.id != msg.weapon_id {
            warn!(unique_id = msg.unique_id, held = weapon.id.0, claimed = msg.weapon_id.0, "weapon mismatch denied");
            return deny();
        }
        if !msg.fits_index_space() {
            warn!(unique_id = msg.unique_id, hits = msg.hits.len(), "oversized batch denied");
            return deny();
        }
        if !self.gate.can_commit(now) {
            debug!(unique_id = msg.unique_id, "activation refused by gate");
            return deny();
        }

        self.gate.on_committed(now);
        weapon.spread.record_fire_time(now);
        weapon.spread.on_shot_fired();
        let config = Arc::clone(weapon.spread.config());

        let origin = self.pawn_location.or_else(|| query.actor_location(self.pawn));
        if origin.is_none() {
            warn!(unique_id = msg.unique_id, pawn = self.pawn.0, "shooter location unknown, claimed hits rejected");
        }

        let invalidated: Vec<u8> = msg
            .hits
            .iter()
            .enumerate()
            .filter(|(_, hit)| !self.is_hit_valid(hit, origin, &config, query))
            .map(|(index, _)| index as u8)
            .collect();

        let mut damage = Vec::new();
        if invalidated.len() < msg.hits.len() {
            let mut promoted = false;
            for (index, hit) in msg.hits.iter().enumerate() {
                if invalidated.contains(&(index as u8)) {
                    continue;
                }
                let Some(target) = hit.actor else { continue };
                if !hit.is_blocking_hit {
                    continue;
                }

                let hit_zone = hit.hit_zone().cloned();
                if hit.is_pawn_like() {
                    if !promoted {
                        self.confirmed.begin_confirmation(now);
                        promoted = true;
                    }
                    self.confirmed.push(ConfirmedWorldHit {
                        target,
                        impact_point: hit.impact_point,
                        hit_zone: hit_zone.clone(),
                    });
                }

                let amount = compute_damage(&config, config.base_damage, hit.distance, &hit.physical_surface_tags);
                damage.push(DamageEvent {
                    cartridge_id: msg.cartridge_id,
                    hit_index: index as u8,
                    target,
                    amount,
                    hit_zone,
                });
            }
        }

        debug!(
            unique_id = msg.unique_id,
            hits = msg.hits.len(),
            invalidated = invalidated.len(),
            "submission confirmed"
        );
        (ConfirmTargetData::confirm(msg.unique_id, invalidated), damage)
    }

    fn is_hit_valid(
        &self,
        hit: &HitResult,
        origin: Option<Vec3>,
        config: &WeaponConfig,
        query: &dyn CollisionQuery,
    ) -> bool {
        if hit.is_miss() {
            return true;
        }
        if !hit.is_finite() {
            return false;
        }

        // The trace start is the client's word; pin it to the shooter
        let Some(origin) = origin else {
            return false;
        };
        if origin.distance(hit.trace_start) > self.config.max_origin_offset {
            debug!(pawn = self.pawn.0, offset = origin.distance(hit.trace_start), "trace start away from shooter");
            return false;
        }

        let claimed = hit.trace_start.distance(hit.impact_point);
        if claimed > config.max_damage_range + self.config.range_slack {
            return false;
        }

        // Re-trace a little past the claimed impact with our own data
        let dir = (hit.impact_point - hit.trace_start).normalize();
        if dir.is_nearly_zero() {
            return true;
        }
        let end = hit.impact_point + dir * self.config.impact_tolerance;
        let results = query.trace(hit.trace_start, end, 0.0, Some(self.pawn));

        let obstruction = results
            .iter()
            .find(|r| r.is_blocking_hit && r.actor != hit.actor);
        match obstruction {
            Some(blocker) => blocker.distance >= claimed - self.config.impact_tolerance,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::client::{AlwaysCommit, FireRateGate};
    use crate::targeting::hit::TargetKind;
    use crate::targeting::scene::{Scene, SceneObject};

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene.insert(SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 0.0, 0.0), 40.0)
            .with_tag("Gameplay.Zone.WeakSpot"));
        scene.insert(SceneObject::wall(
            ActorId(9),
            Vec3::new(500.0, 50.0, -100.0),
            Vec3::new(520.0, 300.0, 100.0),
        ));
        scene
    }

    fn authority(gate: Box<dyn AbilityGate + Send>) -> ControllerAuthority {
        let mut a = ControllerAuthority::new(
            Uuid::nil(),
            ActorId(1),
            gate,
            AuthorityConfig::default(),
            &LedgerConfig::default(),
        );
        a.equip(WeaponId(1), Arc::new(WeaponConfig::pistol())).unwrap();
        a.set_pawn_location(Vec3::ZERO);
        a
    }

    fn pawn_hit(start: Vec3, impact: Vec3) -> HitResult {
        let mut hit = HitResult::miss(start, start + (impact - start) * 2.0);
        hit.actor = Some(ActorId(2));
        hit.kind = TargetKind::Pawn;
        hit.impact_point = impact;
        hit.distance = start.distance(impact);
        hit.is_blocking_hit = true;
        hit.physical_surface_tags.insert(Tag::new("Gameplay.Zone.WeakSpot"));
        hit
    }

    fn submission(unique_id: u16, hits: Vec<HitResult>) -> SubmitTargetData {
        SubmitTargetData { unique_id, cartridge_id: 0, weapon_id: WeaponId(1), hits }
    }

    #[test]
    fn test_clean_hit_confirmed_with_damage() {
        let mut a = authority(Box::new(AlwaysCommit));
        let msg = submission(5, vec![pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0))]);

        let result = a.handle_submission(&msg, &scene(), 1.0);
        assert_eq!(result.reply, ConfirmTargetData::confirm(5, vec![]));
        assert_eq!(result.damage.len(), 1);
        // 18 base, no falloff under 1500, 1.5x weak spot
        assert!((result.damage[0].amount - 27.0).abs() < 1.0e-3);
        assert_eq!(a.confirmed_hits().len(), 1);
    }

    #[test]
    fn test_hit_through_wall_invalidated() {
        let mut a = authority(Box::new(AlwaysCommit));
        // Claimed line passes through the wall at x = 500
        let start = Vec3::new(0.0, 120.0, 0.0);
        let through_wall = pawn_hit(start, Vec3::new(960.0, 0.0, 0.0));
        let clean = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
        let miss = HitResult::miss(Vec3::ZERO, Vec3::new(0.0, -5000.0, 0.0));

        let msg = submission(5, vec![clean, through_wall, miss]);
        let result = a.handle_submission(&msg, &scene(), 1.0);
        assert!(result.reply.success);
        assert_eq!(result.reply.invalidated_indices, vec![1]);
        assert_eq!(result.damage.len(), 1);
        assert_eq!(result.damage[0].hit_index, 0);
    }

    #[test]
    fn test_trace_start_past_wall_invalidated() {
        let mut scene = scene();
        scene.insert(SceneObject::wall(
            ActorId(10),
            Vec3::new(500.0, -300.0, -300.0),
            Vec3::new(520.0, 300.0, 300.0),
        ));
        let mut a = authority(Box::new(AlwaysCommit));

        // Shooter at the origin, behind a full wall; the claim starts past it
        let forged = pawn_hit(Vec3::new(900.0, 0.0, 0.0), Vec3::new(960.0, 0.0, 0.0));
        let result = a.handle_submission(&submission(6, vec![forged]), &scene, 1.0);
        assert_eq!(result.reply.invalidated_indices, vec![0]);
        assert!(result.damage.is_empty());
        assert!(a.confirmed_hits().is_empty());

        // The honest line from the origin is blocked by the wall itself
        let honest = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
        let result = a.handle_submission(&submission(7, vec![honest]), &scene, 1.5);
        assert_eq!(result.reply.invalidated_indices, vec![0]);
    }

    #[test]
    fn test_shooter_location_from_scene() {
        let mut scene = scene();
        scene.insert(SceneObject::pawn(ActorId(1), Vec3::new(0.0, -200.0, 0.0), 40.0));
        let mut a = ControllerAuthority::new(
            Uuid::nil(),
            ActorId(1),
            Box::new(AlwaysCommit),
            AuthorityConfig::default(),
            &LedgerConfig::default(),
        );
        a.equip(WeaponId(1), Arc::new(WeaponConfig::pistol())).unwrap();
        assert_eq!(a.pawn_location(), None);

        let near = pawn_hit(Vec3::new(30.0, -200.0, 0.0), Vec3::new(960.0, 0.0, 0.0));
        let far = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
        let result = a.handle_submission(&submission(8, vec![near, far]), &scene, 1.0);
        assert_eq!(result.reply.invalidated_indices, vec![1]);
    }

    #[test]
    fn test_unknown_shooter_location_rejects_claims() {
        let mut a = ControllerAuthority::new(
            Uuid::nil(),
            ActorId(1),
            Box::new(AlwaysCommit),
            AuthorityConfig::default(),
            &LedgerConfig::default(),
        );
        a.equip(WeaponId(1), Arc::new(WeaponConfig::pistol())).unwrap();

        let hit = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
        let miss = HitResult::miss(Vec3::ZERO, Vec3::new(0.0, -5000.0, 0.0));
        let result = a.handle_submission(&submission(9, vec![hit, miss]), &scene(), 1.0);
        assert!(result.reply.success);
        assert_eq!(result.reply.invalidated_indices, vec![0]);
    }

    #[test]
    fn test_confirmed_mirror_expires_per_entry() {
        let mut a = authority(Box::new(AlwaysCommit));
        for (id, now) in [(1u16, 1.0), (2, 1.08), (3, 1.16)] {
            let hit = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
            a.handle_submission(&submission(id, vec![hit]), &scene(), now);
        }
        assert_eq!(a.confirmed_hits().len(), 2);
    }

    #[test]
    fn test_out_of_range_and_non_finite_invalidated() {
        let mut a = authority(Box::new(AlwaysCommit));
        let far = pawn_hit(Vec3::ZERO, Vec3::new(30_000.0, 0.0, 0.0));
        let mut broken = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));
        broken.distance = f32::NAN;

        let result = a.handle_submission(&submission(1, vec![far, broken]), &scene(), 1.0);
        assert!(result.reply.success);
        assert_eq!(result.reply.invalidated_indices, vec![0, 1]);
        assert!(result.damage.is_empty());
        assert!(a.confirmed_hits().is_empty());
    }

    #[test]
    fn test_weapon_mismatch_denied() {
        let mut a = authority(Box::new(AlwaysCommit));
        let mut msg = submission(3, vec![pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0))]);
        msg.weapon_id = WeaponId(99);

        let result = a.handle_submission(&msg, &scene(), 1.0);
        assert_eq!(result.reply, ConfirmTargetData::deny(3));
        assert!(result.damage.is_empty());
    }

    #[test]
    fn test_unarmed_denied() {
        let mut a = authority(Box::new(AlwaysCommit));
        a.unequip();
        let result = a.handle_submission(&submission(3, vec![]), &scene(), 1.0);
        assert!(!result.reply.success);
    }

    #[test]
    fn test_gate_refusal_denied() {
        let mut a = authority(Box::new(FireRateGate::new(0.5)));
        let hit = pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0));

        assert!(a.handle_submission(&submission(0, vec![hit.clone()]), &scene(), 1.0).reply.success);
        let second = a.handle_submission(&submission(1, vec![hit]), &scene(), 1.1);
        assert_eq!(second.reply, ConfirmTargetData::deny(1));
    }

    #[test]
    fn test_resubmission_replays_without_side_effects() {
        let mut a = authority(Box::new(AlwaysCommit));
        let msg = submission(4, vec![pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0))]);

        let first = a.handle_submission(&msg, &scene(), 1.0);
        let heat = a.equipped().as_ranged().unwrap().spread.state().current_heat;

        let again = a.handle_submission(&msg, &scene(), 1.01);
        assert!(again.replayed);
        assert_eq!(again.reply, first.reply);
        assert!(again.damage.is_empty());
        assert_eq!(a.equipped().as_ranged().unwrap().spread.state().current_heat, heat);
        assert_eq!(a.confirmed_hits().len(), 1);
    }

    #[test]
    fn test_reused_id_with_new_payload_processed() {
        let mut a = authority(Box::new(AlwaysCommit));
        let first = submission(4, vec![pawn_hit(Vec3::ZERO, Vec3::new(960.0, 0.0, 0.0))]);
        let second = submission(4, vec![pawn_hit(Vec3::new(0.0, 1.0, 0.0), Vec3::new(960.0, 0.0, 0.0))]);

        a.handle_submission(&first, &scene(), 1.0);
        let result = a.handle_submission(&second, &scene(), 1.02);
        assert!(!result.replayed);
        assert_eq!(result.damage.len(), 1);
    }

    #[test]
    fn test_oversized_batch_denied() {
        let mut a = authority(Box::new(AlwaysCommit));
        let hits = vec![HitResult::miss(Vec3::ZERO, Vec3::FORWARD); 300];
        assert!(!a.handle_submission(&submission(2, hits), &scene(), 1.0).reply.success);
    }
}
