//! Hit Results
//!
//! One record per object a trace touched. Also the unit carried inside a
//! target-data submission.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::tag::Tag;
use crate::core::vec3::Vec3;
use crate::weapon::damage;

/// Identifier of a scene object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Actor({})", self.0)
    }
}

/// What kind of object a hit landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetKind {
    /// A pawn (player or bot body).
    Pawn,
    /// Something rigidly attached to a pawn (held weapon, backpack).
    AttachedToPawn {
        /// The pawn it hangs off
        owner: ActorId,
    },
    /// Static or dynamic world geometry.
    World,
}

/// Result of one trace against one object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Object hit; `None` for a synthesized miss
    pub actor: Option<ActorId>,
    /// Classification of the object hit
    pub kind: TargetKind,
    /// World-space impact location
    pub impact_point: Vec3,
    /// Surface normal at the impact
    pub impact_normal: Vec3,
    /// Distance from trace start to impact
    pub distance: f32,
    /// Whether the object stops the trace
    pub is_blocking_hit: bool,
    /// Tags of the physical material struck
    #[serde(default)]
    pub physical_surface_tags: BTreeSet<Tag>,
    /// Start of the trace that produced this hit
    pub trace_start: Vec3,
    /// End of the trace that produced this hit
    pub trace_end: Vec3,
}

impl HitResult {
    /// Non-blocking terminal record for a pellet that hit nothing.
    pub fn miss(trace_start: Vec3, trace_end: Vec3) -> Self {
        Self {
            actor: None,
            kind: TargetKind::World,
            impact_point: trace_end,
            impact_normal: Vec3::ZERO,
            distance: trace_start.distance(trace_end),
            is_blocking_hit: false,
            physical_surface_tags: BTreeSet::new(),
            trace_start,
            trace_end,
        }
    }

    /// Pawn or something attached to one.
    pub fn is_pawn_like(&self) -> bool {
        self.actor.is_some()
            && matches!(self.kind, TargetKind::Pawn | TargetKind::AttachedToPawn { .. })
    }

    /// Whether this is a synthesized miss.
    pub fn is_miss(&self) -> bool {
        self.actor.is_none()
    }

    /// The pawn this hit counts against, if any.
    pub fn owning_pawn(&self) -> Option<ActorId> {
        match self.kind {
            TargetKind::Pawn => self.actor,
            TargetKind::AttachedToPawn { owner } => Some(owner),
            TargetKind::World => None,
        }
    }

    /// Hit-zone tag from the struck material, if it carries one.
    pub fn hit_zone(&self) -> Option<&Tag> {
        damage::hit_zone(&self.physical_surface_tags)
    }

    /// Direction of the trace that produced this hit.
    pub fn trace_direction(&self) -> Vec3 {
        (self.trace_end - self.trace_start).normalize()
    }

    /// All positional fields are finite.
    pub fn is_finite(&self) -> bool {
        self.impact_point.is_finite()
            && self.impact_normal.is_finite()
            && self.distance.is_finite()
            && self.trace_start.is_finite()
            && self.trace_end.is_finite()
    }
}
