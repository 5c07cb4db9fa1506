//! Bullet Traces
//!
//! Resolves one pellet to its hits with the two-pass policy:
//!
//! 1. Precision: a zero-radius ray. A pawn (or something attached to one)
//!    on that ray is accepted immediately.
//! 2. Forgiveness: otherwise the same line is swept with the configured
//!    radius. A pawn found by the sweep is only adopted when no blocking
//!    object that the precision ray also saw lies in front of it, so a wall
//!    always wins over forgiveness.

use crate::core::vec3::Vec3;
use super::hit::{ActorId, HitResult};
use super::scene::CollisionQuery;

/// Index of the first pawn-like hit.
pub fn find_first_pawn_hit(hits: &[HitResult]) -> Option<usize> {
    hits.iter().position(HitResult::is_pawn_like)
}

/// Drop later records of an actor already in the list. Order is preserved.
pub fn dedup_by_actor(hits: Vec<HitResult>) -> Vec<HitResult> {
    let mut out: Vec<HitResult> = Vec::with_capacity(hits.len());
    for hit in hits {
        let seen = match hit.actor {
            Some(actor) => out.iter().any(|h| h.actor == Some(actor)),
            None => false,
        };
        if !seen {
            out.push(hit);
        }
    }
    out
}

/// One trace, filtered and deduplicated.
///
/// Hits on `instigator` or on anything attached to it are discarded.
/// Returns the list and the terminal impact: the last hit, or a miss at
/// `end` when nothing was touched.
pub fn weapon_trace(
    query: &dyn CollisionQuery,
    instigator: Option<ActorId>,
    start: Vec3,
    end: Vec3,
    sweep_radius: f32,
) -> (Vec<HitResult>, HitResult) {
    let raw = query.trace(start, end, sweep_radius, instigator);

    // Not every query honors the ignore list
    let filtered = raw
        .into_iter()
        .filter(|hit| match instigator {
            Some(me) => hit.actor != Some(me) && hit.owning_pawn() != Some(me),
            None => true,
        })
        .collect();

    let hits = dedup_by_actor(filtered);
    let impact = match hits.last() {
        Some(last) => last.clone(),
        None => HitResult::miss(start, end),
    };
    (hits, impact)
}

/// Resolve a single pellet with the precision/forgiveness policy.
///
/// Returns the adopted hit list (possibly empty) and the terminal impact of
/// that list.
pub fn do_single_bullet_trace(
    query: &dyn CollisionQuery,
    instigator: Option<ActorId>,
    start: Vec3,
    end: Vec3,
    sweep_radius: f32,
) -> (Vec<HitResult>, HitResult) {
    let (precise_hits, precise_impact) = weapon_trace(query, instigator, start, end, 0.0);
    if find_first_pawn_hit(&precise_hits).is_some() || sweep_radius <= 0.0 {
        return (precise_hits, precise_impact);
    }

    let (sweep_hits, sweep_impact) = weapon_trace(query, instigator, start, end, sweep_radius);
    let Some(first_pawn) = find_first_pawn_hit(&sweep_hits) else {
        return (precise_hits, precise_impact);
    };

    // A blocking object the precise ray also saw, in front of the pawn
    let obstructed = sweep_hits[..first_pawn].iter().any(|hit| {
        hit.is_blocking_hit
            && precise_hits
                .iter()
                .any(|p| p.actor.is_some() && p.actor == hit.actor)
    });

    if obstructed {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!(pawn = ?sweep_hits[first_pawn].actor, "sweep hit rejected: obstructed");
        (precise_hits, precise_impact)
    } else {
        (sweep_hits, sweep_impact)
    }
}
