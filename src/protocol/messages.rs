//! Target Data Messages
//!
//! The two messages of the reconciliation exchange:
//! - `SubmitTargetData` client -> authority, one per trigger pull
//! - `ConfirmTargetData` authority -> submitting client only
//!
//! Message identity is `unique_id`; bit-exact layout is not part of the
//! contract. `ConfirmTargetData` is flat, so it also travels as bincode.

use serde::{Serialize, Deserialize};

use crate::core::hash::{DigestBytes, PayloadHasher};
use crate::targeting::hit::{HitResult, TargetKind};
use crate::weapon::equipment::WeaponId;

/// Largest batch the index-based invalidation can address.
pub const MAX_HITS_PER_BATCH: usize = u8::MAX as usize + 1;

/// Locally computed hits of one trigger pull, submitted for validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitTargetData {
    /// Correlation id, unique among this controller's outstanding batches
    pub unique_id: u16,
    /// Shared by every pellet of the trigger pull
    pub cartridge_id: u32,
    /// Weapon the client believes it fired
    pub weapon_id: WeaponId,
    /// Hits in pellet evaluation order; positions are significant
    pub hits: Vec<HitResult>,
}

impl SubmitTargetData {
    /// Digest of the whole payload.
    ///
    /// Two submissions with the same id but different contents hash
    /// differently, so a reused id is never mistaken for a resubmission.
    pub fn digest(&self) -> DigestBytes {
        let mut hasher = PayloadHasher::for_submission();
        hasher.update_u16(self.unique_id);
        hasher.update_u32(self.cartridge_id);
        hasher.update_u32(self.weapon_id.0);
        hasher.update_u32(self.hits.len() as u32);

        for hit in &self.hits {
            match hit.actor {
                Some(actor) => {
                    hasher.update_bool(true);
                    hasher.update_u32(actor.0);
                }
                None => hasher.update_bool(false),
            }
            match hit.kind {
                TargetKind::Pawn => hasher.update_u8(0),
                TargetKind::AttachedToPawn { owner } => {
                    hasher.update_u8(1);
                    hasher.update_u32(owner.0);
                }
                TargetKind::World => hasher.update_u8(2),
            }
            hasher.update_vec3(hit.impact_point);
            hasher.update_vec3(hit.impact_normal);
            hasher.update_f32(hit.distance);
            hasher.update_bool(hit.is_blocking_hit);
            hasher.update_u32(hit.physical_surface_tags.len() as u32);
            for tag in &hit.physical_surface_tags {
                hasher.update_str(tag.as_str());
            }
            hasher.update_vec3(hit.trace_start);
            hasher.update_vec3(hit.trace_end);
        }

        hasher.finalize()
    }

    /// Whether every position is addressable by a `u8` index.
    pub fn fits_index_space(&self) -> bool {
        self.hits.len() <= MAX_HITS_PER_BATCH
    }
}

/// Authoritative decision on one submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmTargetData {
    /// Id of the batch being reconciled
    pub unique_id: u16,
    /// Whether the activation itself was accepted
    pub success: bool,
    /// Positions within the batch that were rejected
    pub invalidated_indices: Vec<u8>,
}

impl ConfirmTargetData {
    /// Accept the batch, rejecting the given positions.
    pub fn confirm(unique_id: u16, invalidated_indices: Vec<u8>) -> Self {
        Self { unique_id, success: true, invalidated_indices }
    }

    /// Reject the whole batch.
    pub fn deny(unique_id: u16) -> Self {
        Self { unique_id, success: false, invalidated_indices: Vec::new() }
    }

    /// Whether position `index` was rejected.
    pub fn is_invalidated(&self, index: usize) -> bool {
        u8::try_from(index)
            .map(|i| self.invalidated_indices.contains(&i))
            .unwrap_or(false)
    }

    /// Number of distinct rejected positions below `hit_count`.
    pub fn invalidated_count(&self, hit_count: usize) -> usize {
        let mut seen = [false; MAX_HITS_PER_BATCH];
        self.invalidated_indices
            .iter()
            .filter(|&&i| (i as usize) < hit_count && !std::mem::replace(&mut seen[i as usize], true))
            .count()
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tag::Tag;
    use crate::core::vec3::Vec3;
    use crate::targeting::hit::ActorId;

    fn submission() -> SubmitTargetData {
        let mut hit = HitResult::miss(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0));
        hit.actor = Some(ActorId(2));
        hit.kind = TargetKind::Pawn;
        hit.is_blocking_hit = true;
        hit.physical_surface_tags.insert(Tag::new("Gameplay.Zone.WeakSpot"));

        SubmitTargetData {
            unique_id: 5,
            cartridge_id: 17,
            weapon_id: WeaponId(1),
            hits: vec![hit, HitResult::miss(Vec3::ZERO, Vec3::new(0.0, 1000.0, 0.0))],
        }
    }

    #[test]
    fn test_digest_stable() {
        assert_eq!(submission().digest(), submission().digest());
    }

    #[test]
    fn test_digest_covers_contents() {
        let base = submission().digest();

        let mut other = submission();
        other.hits[0].distance += 1.0;
        assert_ne!(other.digest(), base);

        let mut other = submission();
        other.hits[0].physical_surface_tags.clear();
        assert_ne!(other.digest(), base);

        let mut other = submission();
        other.hits.swap(0, 1);
        assert_ne!(other.digest(), base);

        let mut other = submission();
        other.cartridge_id = 18;
        assert_ne!(other.digest(), base);
    }

    #[test]
    fn test_invalidated_count_ignores_duplicates_and_out_of_range() {
        let confirm = ConfirmTargetData::confirm(1, vec![1, 1, 7, 0]);
        assert_eq!(confirm.invalidated_count(3), 2);
        assert!(confirm.is_invalidated(1));
        assert!(!confirm.is_invalidated(2));
        assert!(!confirm.is_invalidated(300));
    }

    #[test]
    fn test_confirm_binary() {
        let confirm = ConfirmTargetData::confirm(5, vec![1]);
        let bytes = confirm.to_bytes().unwrap();
        assert_eq!(ConfirmTargetData::from_bytes(&bytes).unwrap(), confirm);

        let deny = ConfirmTargetData::deny(9);
        assert!(!deny.success);
        assert!(deny.invalidated_indices.is_empty());
    }

    #[test]
    fn test_submission_json() {
        let json = serde_json::to_string(&submission()).unwrap();
        let parsed: SubmitTargetData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, submission());
    }

    #[test]
    fn test_index_space() {
        let mut big = submission();
        big.hits = vec![HitResult::miss(Vec3::ZERO, Vec3::FORWARD); MAX_HITS_PER_BATCH];
        assert!(big.fits_index_space());
        big.hits.push(HitResult::miss(Vec3::ZERO, Vec3::FORWARD));
        assert!(!big.fits_index_space());
    }
}
