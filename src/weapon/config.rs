//! Ranged Weapon Configuration
//!
//! All tunables of a ranged weapon. Loaded once (JSON or preset) and
//! validated before any instance is equipped; a malformed configuration is
//! a load-time error, never a fire-time one.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::curve::{Curve, CurveError};
use crate::core::tag::Tag;

/// Configuration errors. Fatal at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The heat -> spread curve has no keys, so there is no heat range.
    #[error("weapon '{weapon}': heat_to_spread curve has no domain")]
    NoHeatDomain {
        /// Weapon name
        weapon: String,
    },

    /// A curve is malformed.
    #[error("weapon '{weapon}': curve {curve} is invalid: {source}")]
    Curve {
        /// Weapon name
        weapon: String,
        /// Field name of the curve
        curve: &'static str,
        /// Underlying curve error
        #[source]
        source: CurveError,
    },

    /// A scalar field is out of its valid range.
    #[error("weapon '{weapon}': {field} = {value} is out of range ({expected})")]
    OutOfRange {
        /// Weapon name
        weapon: String,
        /// Field name
        field: &'static str,
        /// Offending value
        value: f32,
        /// Human readable constraint
        expected: &'static str,
    },

    /// JSON could not be parsed.
    #[error("failed to parse weapon config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Inclusive heat range of a weapon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatRange {
    /// Minimum heat (floor)
    pub min: f32,
    /// Maximum heat (ceiling)
    pub max: f32,
}

impl HeatRange {
    /// Clamp a heat value into the range.
    #[inline]
    pub fn clamp(&self, heat: f32) -> f32 {
        heat.clamp(self.min, self.max)
    }

    /// Midpoint, the heat a freshly equipped weapon starts at.
    #[inline]
    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) * 0.5
    }
}

/// Tunables for one ranged weapon type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Display name (for logs and errors).
    pub name: String,

    // --- Spread / fire params ---
    /// How tightly pellets cluster around the aim line: the radial offset is
    /// `pow(uniform(0,1), spread_exponent)`. 1.0 is uniform across the cone.
    pub spread_exponent: f32,
    /// Heat -> full spread angle in degrees. Its domain normally defines the
    /// weapon's heat range.
    pub heat_to_spread: Curve,
    /// Heat -> heat added by one shot.
    pub heat_to_heat_per_shot: Curve,
    /// Heat -> heat removed per second while recovering.
    pub heat_to_cooldown_per_second: Curve,
    /// Seconds after a shot before heat starts recovering.
    pub spread_recovery_cooldown_delay: f32,
    /// Grant a perfectly accurate shot when weapon and player are settled.
    pub allow_first_shot_accuracy: bool,

    // --- Player params ---
    /// Multiplier while fully aiming down sights.
    pub spread_multiplier_aiming: f32,
    /// Transition rate of the aiming multiplier.
    pub transition_rate_aiming: f32,
    /// Multiplier while standing still.
    pub spread_multiplier_standing_still: f32,
    /// Transition rate of the standing-still multiplier.
    pub transition_rate_standing_still: f32,
    /// Speed (units/s) at or below which the pawn counts as standing still.
    pub standing_still_speed_threshold: f32,
    /// Speed span over which standing-still blends to moving.
    pub standing_still_to_moving_speed_range: f32,
    /// Multiplier while crouching.
    pub spread_multiplier_crouching: f32,
    /// Transition rate of the crouching multiplier.
    pub transition_rate_crouching: f32,
    /// Multiplier while jumping or falling.
    pub spread_multiplier_jumping_or_falling: f32,
    /// Transition rate of the jumping/falling multiplier.
    pub transition_rate_jumping_or_falling: f32,

    // --- Weapon config ---
    /// Damage of one pellet before attenuation.
    pub base_damage: f32,
    /// Pellets per trigger pull (1 for most weapons, more for shotguns).
    pub bullets_per_cartridge: u32,
    /// Maximum trace distance; beyond it the weapon deals no damage.
    pub max_damage_range: f32,
    /// Radius of the forgiveness sweep (0 disables the second pass).
    pub bullet_trace_sweep_radius: f32,
    /// Distance -> base damage multiplier. Empty means no falloff.
    pub distance_damage_falloff: Curve,
    /// Surface tag -> damage multiplier; multiple matches multiply.
    pub material_damage_multiplier: BTreeMap<Tag, f32>,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            name: "weapon".to_string(),
            spread_exponent: 1.0,
            heat_to_spread: Curve::empty(),
            heat_to_heat_per_shot: Curve::constant(1.0),
            heat_to_cooldown_per_second: Curve::constant(2.0),
            spread_recovery_cooldown_delay: 0.0,
            allow_first_shot_accuracy: false,
            spread_multiplier_aiming: 1.0,
            transition_rate_aiming: 5.0,
            spread_multiplier_standing_still: 1.0,
            transition_rate_standing_still: 5.0,
            standing_still_speed_threshold: 80.0,
            standing_still_to_moving_speed_range: 20.0,
            spread_multiplier_crouching: 1.0,
            transition_rate_crouching: 5.0,
            spread_multiplier_jumping_or_falling: 1.0,
            transition_rate_jumping_or_falling: 5.0,
            base_damage: 10.0,
            bullets_per_cartridge: 1,
            max_damage_range: 25_000.0,
            bullet_trace_sweep_radius: 0.0,
            distance_damage_falloff: Curve::empty(),
            material_damage_multiplier: BTreeMap::new(),
        }
    }
}

impl WeaponConfig {
    /// Sidearm: heat 0..8, spread 2.5..12 degrees, 12 heat per shot,
    /// falloff to zero damage past 2000 units, 6 unit forgiveness sweep.
    pub fn pistol() -> Self {
        Self {
            name: "pistol".to_string(),
            heat_to_spread: curve(&[(0.0, 2.5), (8.0, 12.0)]),
            heat_to_heat_per_shot: Curve::constant(12.0),
            heat_to_cooldown_per_second: Curve::constant(10.0),
            spread_recovery_cooldown_delay: 0.2,
            allow_first_shot_accuracy: true,
            spread_multiplier_aiming: 0.65,
            spread_multiplier_standing_still: 0.9,
            spread_multiplier_crouching: 0.65,
            spread_multiplier_jumping_or_falling: 1.25,
            base_damage: 18.0,
            max_damage_range: 25_000.0,
            bullet_trace_sweep_radius: 6.0,
            distance_damage_falloff: curve(&[(0.0, 1.0), (1500.0, 1.0), (2000.0, 0.0)]),
            material_damage_multiplier: head_multiplier(1.5),
            ..Self::default()
        }
    }

    /// Automatic rifle: slower heat build-up with a long recovery tail.
    pub fn rifle() -> Self {
        Self {
            name: "rifle".to_string(),
            spread_exponent: 1.5,
            heat_to_spread: curve(&[(0.0, 0.5), (10.0, 5.0), (30.0, 9.0)]),
            heat_to_heat_per_shot: curve(&[(0.0, 1.5), (30.0, 2.5)]),
            heat_to_cooldown_per_second: curve(&[(0.0, 20.0), (30.0, 12.0)]),
            spread_recovery_cooldown_delay: 0.15,
            allow_first_shot_accuracy: false,
            spread_multiplier_aiming: 0.5,
            spread_multiplier_standing_still: 0.8,
            spread_multiplier_crouching: 0.75,
            spread_multiplier_jumping_or_falling: 2.0,
            base_damage: 12.0,
            bullet_trace_sweep_radius: 4.0,
            distance_damage_falloff: curve(&[(0.0, 1.0), (4000.0, 1.0), (8000.0, 0.5)]),
            material_damage_multiplier: head_multiplier(2.0),
            ..Self::default()
        }
    }

    /// Shotgun: ten pellets in a wide cone biased toward the centre.
    pub fn shotgun() -> Self {
        Self {
            name: "shotgun".to_string(),
            spread_exponent: 2.0,
            heat_to_spread: curve(&[(0.0, 10.0), (4.0, 14.0)]),
            heat_to_heat_per_shot: Curve::constant(4.0),
            heat_to_cooldown_per_second: Curve::constant(6.0),
            spread_recovery_cooldown_delay: 0.4,
            spread_multiplier_aiming: 0.8,
            spread_multiplier_jumping_or_falling: 1.5,
            base_damage: 9.0,
            bullets_per_cartridge: 10,
            max_damage_range: 5_000.0,
            bullet_trace_sweep_radius: 3.0,
            distance_damage_falloff: curve(&[(0.0, 1.0), (500.0, 1.0), (1500.0, 0.1)]),
            ..Self::default()
        }
    }

    /// Preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "pistol" => Some(Self::pistol()),
            "rifle" => Some(Self::rifle()),
            "shotgun" => Some(Self::shotgun()),
            _ => None,
        }
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Heat range: union of the three heat curves' domains.
    ///
    /// Curves without keys contribute nothing; `None` only when none of the
    /// curves has a domain.
    pub fn heat_range(&self) -> Option<HeatRange> {
        [
            &self.heat_to_heat_per_shot,
            &self.heat_to_cooldown_per_second,
            &self.heat_to_spread,
        ]
        .iter()
        .filter_map(|c| c.time_range())
        .fold(None, |acc: Option<HeatRange>, (lo, hi)| {
            Some(match acc {
                Some(r) => HeatRange { min: r.min.min(lo), max: r.max.max(hi) },
                None => HeatRange { min: lo, max: hi },
            })
        })
    }

    /// Spread range in degrees: value range of the heat -> spread curve.
    pub fn spread_range(&self) -> Option<(f32, f32)> {
        self.heat_to_spread.value_range()
    }

    /// Check every field. Call once at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let curves: [(&'static str, &Curve); 4] = [
            ("heat_to_spread", &self.heat_to_spread),
            ("heat_to_heat_per_shot", &self.heat_to_heat_per_shot),
            ("heat_to_cooldown_per_second", &self.heat_to_cooldown_per_second),
            ("distance_damage_falloff", &self.distance_damage_falloff),
        ];
        for (name, c) in curves {
            c.validate().map_err(|source| self.curve_error(name, source))?;
        }

        if !self.heat_to_spread.has_data() {
            return Err(ConfigError::NoHeatDomain { weapon: self.name.clone() });
        }
        self.heat_to_spread
            .validate_monotonic()
            .map_err(|source| self.curve_error("heat_to_spread", source))?;

        self.check("spread_exponent", self.spread_exponent, self.spread_exponent >= 0.1, ">= 0.1")?;
        self.check(
            "spread_recovery_cooldown_delay",
            self.spread_recovery_cooldown_delay,
            self.spread_recovery_cooldown_delay >= 0.0,
            ">= 0",
        )?;
        self.check(
            "bullets_per_cartridge",
            self.bullets_per_cartridge as f32,
            (1..=255).contains(&self.bullets_per_cartridge),
            "1..=255",
        )?;
        self.check("base_damage", self.base_damage, self.base_damage >= 0.0, ">= 0")?;
        self.check("max_damage_range", self.max_damage_range, self.max_damage_range > 0.0, "> 0")?;
        self.check(
            "bullet_trace_sweep_radius",
            self.bullet_trace_sweep_radius,
            self.bullet_trace_sweep_radius >= 0.0,
            ">= 0",
        )?;
        self.check(
            "standing_still_to_moving_speed_range",
            self.standing_still_to_moving_speed_range,
            self.standing_still_to_moving_speed_range >= 0.0,
            ">= 0",
        )?;

        let multipliers = [
            ("spread_multiplier_aiming", self.spread_multiplier_aiming),
            ("spread_multiplier_standing_still", self.spread_multiplier_standing_still),
            ("spread_multiplier_crouching", self.spread_multiplier_crouching),
            ("spread_multiplier_jumping_or_falling", self.spread_multiplier_jumping_or_falling),
        ];
        for (field, value) in multipliers {
            self.check(field, value, value.is_finite() && value > 0.0, "> 0")?;
        }

        let rates = [
            ("transition_rate_aiming", self.transition_rate_aiming),
            ("transition_rate_standing_still", self.transition_rate_standing_still),
            ("transition_rate_crouching", self.transition_rate_crouching),
            ("transition_rate_jumping_or_falling", self.transition_rate_jumping_or_falling),
        ];
        for (field, value) in rates {
            self.check(field, value, value.is_finite() && value >= 0.0, ">= 0")?;
        }

        for value in self.material_damage_multiplier.values() {
            self.check("material_damage_multiplier", *value, value.is_finite() && *value >= 0.0, ">= 0")?;
        }

        Ok(())
    }

    fn check(&self, field: &'static str, value: f32, ok: bool, expected: &'static str) -> Result<(), ConfigError> {
        // NaN fails every comparison above, so it lands here too
        if ok && !value.is_nan() {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange { weapon: self.name.clone(), field, value, expected })
        }
    }

    fn curve_error(&self, curve: &'static str, source: CurveError) -> ConfigError {
        ConfigError::Curve { weapon: self.name.clone(), curve, source }
    }
}

/// Preset curves are literals known to be sorted and finite.
fn curve(points: &[(f32, f32)]) -> Curve {
    Curve::from_points(points).unwrap_or_default()
}

fn head_multiplier(value: f32) -> BTreeMap<Tag, f32> {
    let mut map = BTreeMap::new();
    map.insert(Tag::new("Gameplay.Zone.WeakSpot"), value);
    map
}
