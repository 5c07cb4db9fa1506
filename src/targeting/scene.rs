//! Collision Queries
//!
//! The physics layer is external. Targeting only needs one primitive: a ray
//! (zero radius) or sphere sweep (positive radius) that reports every object
//! touched, ordered by distance, up to and including the first blocking one.
//!
//! [`Scene`] is a small deterministic implementation over spheres and boxes,
//! used by the authority, the demo and the tests.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

use crate::core::math::SMALL_NUMBER;
use crate::core::tag::Tag;
use crate::core::vec3::Vec3;
use super::hit::{ActorId, HitResult, TargetKind};

/// Ray / sweep query primitive.
pub trait CollisionQuery {
    /// Trace from `start` to `end` with a sphere of `radius` (0 for a ray).
    ///
    /// `ignore` and anything attached to it are invisible to the trace.
    /// Results are sorted by distance and end at the first blocking hit.
    fn trace(&self, start: Vec3, end: Vec3, radius: f32, ignore: Option<ActorId>) -> Vec<HitResult>;

    /// Where `actor` currently is, if the collision data knows it.
    fn actor_location(&self, _actor: ActorId) -> Option<Vec3> {
        None
    }
}

/// Collision shape of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Sphere
    Sphere {
        /// Centre
        center: Vec3,
        /// Radius
        radius: f32,
    },
    /// Axis-aligned box
    Aabb {
        /// Minimum corner
        min: Vec3,
        /// Maximum corner
        max: Vec3,
    },
}

impl Shape {
    /// Move the shape so its centre lands on `center`.
    pub fn recentered(&self, center: Vec3) -> Self {
        match *self {
            Shape::Sphere { radius, .. } => Shape::Sphere { center, radius },
            Shape::Aabb { min, max } => {
                let half = (max - min) * 0.5;
                Shape::Aabb { min: center - half, max: center + half }
            }
        }
    }

    /// Centre of the shape.
    pub fn center(&self) -> Vec3 {
        match *self {
            Shape::Sphere { center, .. } => center,
            Shape::Aabb { min, max } => (min + max) * 0.5,
        }
    }
}

/// One object in the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Object id
    pub id: ActorId,
    /// Collision shape
    pub shape: Shape,
    /// Pawn / attachment / world
    pub kind: TargetKind,
    /// Whether traces stop here
    pub blocking: bool,
    /// Physical material tags
    #[serde(default)]
    pub surface_tags: BTreeSet<Tag>,
}

impl SceneObject {
    /// Blocking world geometry.
    pub fn wall(id: ActorId, min: Vec3, max: Vec3) -> Self {
        Self {
            id,
            shape: Shape::Aabb { min, max },
            kind: TargetKind::World,
            blocking: true,
            surface_tags: BTreeSet::new(),
        }
    }

    /// Blocking pawn body.
    pub fn pawn(id: ActorId, center: Vec3, radius: f32) -> Self {
        Self {
            id,
            shape: Shape::Sphere { center, radius },
            kind: TargetKind::Pawn,
            blocking: true,
            surface_tags: BTreeSet::new(),
        }
    }

    /// Add a surface tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.surface_tags.insert(Tag::new(tag));
        self
    }
}

/// Deterministic reference scene.
///
/// Uses BTreeMap so traces iterate objects in id order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    objects: BTreeMap<ActorId, SceneObject>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object.
    pub fn insert(&mut self, object: SceneObject) {
        self.objects.insert(object.id, object);
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ActorId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    /// Look up an object.
    pub fn get(&self, id: ActorId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Move an object's centre. Returns false if the id is unknown.
    pub fn move_object(&mut self, id: ActorId, center: Vec3) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) => {
                object.shape = object.shape.recentered(center);
                true
            }
            None => false,
        }
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl CollisionQuery for Scene {
    fn actor_location(&self, actor: ActorId) -> Option<Vec3> {
        self.get(actor).map(|object| object.shape.center())
    }

    fn trace(&self, start: Vec3, end: Vec3, radius: f32, ignore: Option<ActorId>) -> Vec<HitResult> {
        let delta = end - start;
        let length = delta.length();
        if length < SMALL_NUMBER || !start.is_finite() || !end.is_finite() {
            return Vec::new();
        }
        let dir = delta * (1.0 / length);
        let radius = radius.max(0.0);

        let mut hits: Vec<HitResult> = self
            .objects
            .values()
            .filter(|object| match ignore {
                Some(me) => object.id != me && object.kind != TargetKind::AttachedToPawn { owner: me },
                None => true,
            })
            .filter_map(|object| {
                let (t, normal) = sweep_shape(&object.shape, start, dir, length, radius)?;
                let sweep_center = start + dir * t;
                Some(HitResult {
                    actor: Some(object.id),
                    kind: object.kind,
                    impact_point: sweep_center - normal * radius,
                    impact_normal: normal,
                    distance: t,
                    is_blocking_hit: object.blocking,
                    physical_surface_tags: object.surface_tags.clone(),
                    trace_start: start,
                    trace_end: end,
                })
            })
            .collect();

        // Ties resolve by id (BTreeMap order, stable sort)
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        if let Some(first_blocking) = hits.iter().position(|h| h.is_blocking_hit) {
            hits.truncate(first_blocking + 1);
        }
        hits
    }
}

/// Entry distance and surface normal of a sphere of `radius` swept along
/// `dir` against `shape`, if it touches within `length`.
fn sweep_shape(shape: &Shape, start: Vec3, dir: Vec3, length: f32, radius: f32) -> Option<(f32, Vec3)> {
    match *shape {
        Shape::Sphere { center, radius: r } => ray_sphere(start, dir, length, center, r + radius),
        // Minkowski box expanded by the sweep radius; conservative at the corners
        Shape::Aabb { min, max } => {
            let pad = Vec3::new(radius, radius, radius);
            ray_aabb(start, dir, length, min - pad, max + pad)
        }
    }
}

fn ray_sphere(start: Vec3, dir: Vec3, length: f32, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let oc = start - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let s = discriminant.sqrt();
    let t_exit = -b + s;
    if t_exit < 0.0 {
        return None;
    }

    let t_enter = -b - s;
    if t_enter > length {
        return None;
    }

    if t_enter < 0.0 {
        // Starting inside
        return Some((0.0, -dir));
    }
    let normal = (start + dir * t_enter - center).normalize();
    Some((t_enter, normal))
}

fn ray_aabb(start: Vec3, dir: Vec3, length: f32, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_normal = -dir;

    for axis in 0..3 {
        let s = start.axis(axis);
        let d = dir.axis(axis);
        let lo = min.axis(axis);
        let hi = max.axis(axis);

        if d.abs() < SMALL_NUMBER {
            if s < lo || s > hi {
                return None;
            }
            continue;
        }

        let mut t0 = (lo - s) / d;
        let mut t1 = (hi - s) / d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        if t0 > t_enter {
            t_enter = t0;
            enter_normal = Vec3::unit_axis(axis, -d.signum());
        }
        t_exit = t_exit.min(t1);
    }

    if t_exit < t_enter.max(0.0) || t_enter > length {
        return None;
    }

    if t_enter < 0.0 {
        return Some((0.0, -dir));
    }
    Some((t_enter, enter_normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Scene {
        let mut scene = Scene::new();
        scene.insert(SceneObject::wall(
            ActorId(1),
            Vec3::new(500.0, -100.0, -100.0),
            Vec3::new(520.0, 100.0, 100.0),
        ));
        scene.insert(SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 0.0, 0.0), 40.0));
        scene
    }

    #[test]
    fn test_ray_hits_sphere() {
        let mut scene = Scene::new();
        scene.insert(SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 0.0, 0.0), 40.0));

        let hits = scene.trace(Vec3::ZERO, Vec3::new(2000.0, 0.0, 0.0), 0.0, None);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 960.0).abs() < 1.0e-2);
        assert!((hits[0].impact_point.x - 960.0).abs() < 1.0e-2);
        assert!((hits[0].impact_normal.x + 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn test_stops_at_first_blocking() {
        let hits = corridor().trace(Vec3::ZERO, Vec3::new(2000.0, 0.0, 0.0), 0.0, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].actor, Some(ActorId(1)));
        assert!((hits[0].distance - 500.0).abs() < 1.0e-2);
        assert_eq!(hits[0].impact_normal, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_non_blocking_hits_pass_through() {
        let mut scene = corridor();
        let mut glass = SceneObject::wall(
            ActorId(3),
            Vec3::new(200.0, -100.0, -100.0),
            Vec3::new(210.0, 100.0, 100.0),
        );
        glass.blocking = false;
        scene.insert(glass);

        let hits = scene.trace(Vec3::ZERO, Vec3::new(2000.0, 0.0, 0.0), 0.0, None);
        let ids: Vec<_> = hits.iter().filter_map(|h| h.actor).collect();
        assert_eq!(ids, vec![ActorId(3), ActorId(1)]);
    }

    #[test]
    fn test_sweep_radius_widens_hit() {
        let mut scene = Scene::new();
        scene.insert(SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 45.0, 0.0), 40.0));

        // Ray passes 5 units wide of the sphere
        let start = Vec3::ZERO;
        let end = Vec3::new(2000.0, 0.0, 0.0);
        assert!(scene.trace(start, end, 0.0, None).is_empty());

        let swept = scene.trace(start, end, 6.0, None);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].actor, Some(ActorId(2)));
    }

    #[test]
    fn test_out_of_range() {
        let hits = corridor().trace(Vec3::ZERO, Vec3::new(400.0, 0.0, 0.0), 0.0, None);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_move_object() {
        let mut scene = corridor();
        assert!(scene.move_object(ActorId(2), Vec3::new(300.0, 0.0, 0.0)));
        assert!(!scene.move_object(ActorId(99), Vec3::ZERO));

        let hits = scene.trace(Vec3::ZERO, Vec3::new(2000.0, 0.0, 0.0), 0.0, None);
        assert_eq!(hits[0].actor, Some(ActorId(2)));
    }

    #[test]
    fn test_ignored_actor_and_attachments() {
        let mut scene = corridor();
        scene.insert(SceneObject::pawn(ActorId(7), Vec3::ZERO, 40.0));
        let mut rifle = SceneObject::pawn(ActorId(8), Vec3::new(45.0, 0.0, 0.0), 5.0);
        rifle.kind = TargetKind::AttachedToPawn { owner: ActorId(7) };
        scene.insert(rifle);

        let end = Vec3::new(2000.0, 0.0, 0.0);
        assert_eq!(scene.trace(Vec3::ZERO, end, 0.0, None)[0].actor, Some(ActorId(7)));

        let hits = scene.trace(Vec3::ZERO, end, 0.0, Some(ActorId(7)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].actor, Some(ActorId(1)));
    }

    #[test]
    fn test_actor_location() {
        let mut scene = corridor();
        scene.insert(SceneObject::pawn(ActorId(7), Vec3::new(10.0, 20.0, 0.0), 40.0));
        assert_eq!(scene.actor_location(ActorId(7)), Some(Vec3::new(10.0, 20.0, 0.0)));

        scene.move_object(ActorId(7), Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(scene.actor_location(ActorId(7)), Some(Vec3::new(50.0, 0.0, 0.0)));
        assert_eq!(scene.actor_location(ActorId(99)), None);
    }

    #[test]
    fn test_degenerate_trace() {
        assert!(corridor().trace(Vec3::ZERO, Vec3::ZERO, 0.0, None).is_empty());
    }
}
