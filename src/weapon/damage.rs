//! Damage Attenuation
//!
//! Authority-side damage computation for a validated hit: base damage scaled
//! by distance falloff and by the struck surface's material multipliers.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::core::tag::Tag;
use super::config::WeaponConfig;

/// Immutable lookups shared by every damage computation.
#[derive(Debug)]
pub struct DamageStatics {
    /// Parent of every hit-zone tag (`Gameplay.Zone`)
    pub hit_zone_root: Tag,
}

/// Process-lifetime statics, built on first use.
pub fn damage_statics() -> &'static DamageStatics {
    static STATICS: OnceLock<DamageStatics> = OnceLock::new();
    STATICS.get_or_init(|| DamageStatics {
        hit_zone_root: Tag::new("Gameplay.Zone"),
    })
}

/// First surface tag under `Gameplay.Zone`, if any.
pub fn hit_zone(surface_tags: &BTreeSet<Tag>) -> Option<&Tag> {
    let root = &damage_statics().hit_zone_root;
    surface_tags.iter().find(|tag| tag.matches_tag(root))
}

/// Distance falloff multiplier. No falloff curve means full damage.
pub fn distance_attenuation(config: &WeaponConfig, distance: f32) -> f32 {
    if config.distance_damage_falloff.has_data() {
        config.distance_damage_falloff.eval(distance)
    } else {
        1.0
    }
}

/// Product of the multipliers of every surface tag the weapon lists.
pub fn physical_material_attenuation(config: &WeaponConfig, surface_tags: &BTreeSet<Tag>) -> f32 {
    surface_tags
        .iter()
        .filter_map(|tag| config.material_damage_multiplier.get(tag))
        .product()
}

/// Final damage for a hit at `distance` on a surface carrying `surface_tags`.
pub fn compute_damage(
    config: &WeaponConfig,
    base_damage: f32,
    distance: f32,
    surface_tags: &BTreeSet<Tag>,
) -> f32 {
    let distance_factor = distance_attenuation(config, distance).max(0.0);
    let material_factor = physical_material_attenuation(config, surface_tags);
    (base_damage * distance_factor * material_factor).max(0.0)
}
