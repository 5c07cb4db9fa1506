//! Spread / Heat Model
//!
//! Per-instance accuracy state of an equipped ranged weapon. Firing adds
//! heat; heat maps to a spread cone through the configured curve; after a
//! recovery delay heat bleeds off again. Four motion multipliers (standing
//! still, crouching, airborne, aiming) chase their targets independently and
//! scale the cone.
//!
//! Every update is a pure function of the previous state, the elapsed time
//! and the pawn's motion. No randomness lives here.

use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::core::math::{finterp_to, map_range_clamped, nearly_equal, KINDA_SMALL_NUMBER};
use super::config::{ConfigError, HeatRange, WeaponConfig};
use super::motion::PawnMotion;

/// Tolerance for the crouch, airborne and aiming "ready" checks.
pub const MULTIPLIER_NEARLY_EQUAL_THRESHOLD: f32 = 0.05;

/// Standing-still counts as ready within this fraction of its multiplier.
pub const STANDING_STILL_TOLERANCE_FRACTION: f32 = 0.1;

/// Mutable accuracy state of one weapon instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponAccuracyState {
    /// Current heat, always within the weapon's heat range
    pub current_heat: f32,
    /// Full spread angle in degrees, derived from heat
    pub current_spread_angle: f32,
    /// Smoothed standing-still multiplier
    pub standing_still_multiplier: f32,
    /// Smoothed crouching multiplier
    pub crouching_multiplier: f32,
    /// Smoothed jumping/falling multiplier
    pub jump_fall_multiplier: f32,
    /// Smoothed aiming multiplier
    pub aiming_multiplier: f32,
    /// Product of the four motion multipliers
    pub combined_multiplier: f32,
    /// Next shot is perfectly accurate
    pub has_first_shot_accuracy: bool,
    /// Simulation time of the last activation, if any
    pub last_fire_time: Option<f64>,
}

impl Default for WeaponAccuracyState {
    fn default() -> Self {
        Self {
            current_heat: 0.0,
            current_spread_angle: 0.0,
            standing_still_multiplier: 1.0,
            crouching_multiplier: 1.0,
            jump_fall_multiplier: 1.0,
            aiming_multiplier: 1.0,
            combined_multiplier: 1.0,
            has_first_shot_accuracy: false,
            last_fire_time: None,
        }
    }
}

/// Spread a shot should use right now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpreadSample {
    /// Full cone angle in degrees
    pub angle_degrees: f32,
    /// Multiplier to apply (0 for a first-shot-accurate shot)
    pub multiplier: f32,
}

impl SpreadSample {
    /// Half of the effective cone, in radians.
    pub fn half_angle_radians(&self) -> f32 {
        (self.angle_degrees * self.multiplier * 0.5).to_radians()
    }
}

/// Accuracy state machine for a single equipped weapon.
#[derive(Clone, Debug)]
pub struct SpreadHeatModel {
    config: Arc<WeaponConfig>,
    heat_range: HeatRange,
    state: WeaponAccuracyState,
}

impl SpreadHeatModel {
    /// Create the model for a freshly equipped weapon.
    ///
    /// Validates the configuration; a weapon without a heat domain is
    /// rejected here rather than at fire time.
    pub fn new(config: Arc<WeaponConfig>) -> Result<Self, ConfigError> {
        config.validate()?;
        let heat_range = config
            .heat_range()
            .ok_or_else(|| ConfigError::NoHeatDomain { weapon: config.name.clone() })?;

        let mut model = Self {
            config,
            heat_range,
            state: WeaponAccuracyState::default(),
        };
        model.on_equip();
        Ok(model)
    }

    /// Weapon configuration.
    pub fn config(&self) -> &Arc<WeaponConfig> {
        &self.config
    }

    /// Current state (read-only).
    pub fn state(&self) -> &WeaponAccuracyState {
        &self.state
    }

    /// Heat range derived from the configured curves.
    pub fn heat_range(&self) -> HeatRange {
        self.heat_range
    }

    /// Reset to the equipped state: heat at the midpoint, multipliers at 1.
    pub fn on_equip(&mut self) {
        let heat = self.heat_range.midpoint();
        self.state = WeaponAccuracyState {
            current_heat: heat,
            current_spread_angle: self.config.heat_to_spread.eval(heat),
            ..WeaponAccuracyState::default()
        };
    }

    /// Remember when the weapon last fired. Called on ability activation.
    pub fn record_fire_time(&mut self, now: f64) {
        self.state.last_fire_time = Some(now);
    }

    /// Advance one simulation step.
    pub fn tick(&mut self, delta_seconds: f32, now: f64, motion: &dyn PawnMotion) {
        let dt = if delta_seconds.is_finite() { delta_seconds.max(0.0) } else { 0.0 };

        let heat_at_floor = self.update_spread(dt, now);
        let multipliers_ready = self.update_multipliers(dt, motion);

        self.state.has_first_shot_accuracy =
            self.config.allow_first_shot_accuracy && heat_at_floor && multipliers_ready;
    }

    /// Add the per-shot heat. Called once per committed trigger pull.
    pub fn on_shot_fired(&mut self) {
        let heat = self.state.current_heat;
        let to_add = self.config.heat_to_heat_per_shot.eval(heat);
        self.set_heat(heat + to_add);

        // Spent on this shot; a later tick may grant it again
        self.state.has_first_shot_accuracy = false;
    }

    /// Spread angle and the multiplier to apply to it.
    pub fn effective_spread(&self) -> SpreadSample {
        SpreadSample {
            angle_degrees: self.state.current_spread_angle,
            multiplier: if self.state.has_first_shot_accuracy {
                0.0
            } else {
                self.state.combined_multiplier
            },
        }
    }

    fn set_heat(&mut self, heat: f32) {
        let heat = self.heat_range.clamp(heat);
        self.state.current_heat = heat;
        self.state.current_spread_angle = self.config.heat_to_spread.eval(heat);
    }

    /// Cool down once the recovery delay has passed. Returns whether heat is
    /// at its floor afterwards.
    fn update_spread(&mut self, dt: f32, now: f64) -> bool {
        let cooling = match self.state.last_fire_time {
            Some(last) => now - last > f64::from(self.config.spread_recovery_cooldown_delay),
            None => true,
        };

        if cooling {
            let heat = self.state.current_heat;
            let rate = self.config.heat_to_cooldown_per_second.eval(heat);
            self.set_heat(heat - rate * dt);
        }

        nearly_equal(self.state.current_heat, self.heat_range.min, KINDA_SMALL_NUMBER)
    }

    /// Chase every motion multiplier toward its target. Returns whether all
    /// four are settled at their ready values.
    fn update_multipliers(&mut self, dt: f32, motion: &dyn PawnMotion) -> bool {
        let config = &*self.config;
        let state = &mut self.state;

        // Standing still blends to 1.0 across the configured speed span
        let speed = motion.velocity().length();
        let standing_still_target = map_range_clamped(
            (
                config.standing_still_speed_threshold,
                config.standing_still_speed_threshold + config.standing_still_to_moving_speed_range,
            ),
            (config.spread_multiplier_standing_still, 1.0),
            speed,
        );
        state.standing_still_multiplier = finterp_to(
            state.standing_still_multiplier,
            standing_still_target,
            dt,
            config.transition_rate_standing_still,
        );
        let standing_still_ready = nearly_equal(
            state.standing_still_multiplier,
            config.spread_multiplier_standing_still,
            config.spread_multiplier_standing_still * STANDING_STILL_TOLERANCE_FRACTION,
        );

        let crouching_target = if motion.is_crouching() {
            config.spread_multiplier_crouching
        } else {
            1.0
        };
        state.crouching_multiplier = finterp_to(
            state.crouching_multiplier,
            crouching_target,
            dt,
            config.transition_rate_crouching,
        );
        let crouching_ready = nearly_equal(
            state.crouching_multiplier,
            crouching_target,
            MULTIPLIER_NEARLY_EQUAL_THRESHOLD,
        );

        let jump_fall_target = if motion.is_falling() {
            config.spread_multiplier_jumping_or_falling
        } else {
            1.0
        };
        state.jump_fall_multiplier = finterp_to(
            state.jump_fall_multiplier,
            jump_fall_target,
            dt,
            config.transition_rate_jumping_or_falling,
        );
        let jump_fall_ready = nearly_equal(
            state.jump_fall_multiplier,
            1.0,
            MULTIPLIER_NEARLY_EQUAL_THRESHOLD,
        );

        let aiming_target = map_range_clamped(
            (0.0, 1.0),
            (1.0, config.spread_multiplier_aiming),
            motion.aiming_weight(),
        );
        state.aiming_multiplier = finterp_to(
            state.aiming_multiplier,
            aiming_target,
            dt,
            config.transition_rate_aiming,
        );
        let aiming_ready = nearly_equal(
            state.aiming_multiplier,
            config.spread_multiplier_aiming,
            MULTIPLIER_NEARLY_EQUAL_THRESHOLD,
        );

        state.combined_multiplier = state.aiming_multiplier
            * state.standing_still_multiplier
            * state.crouching_multiplier
            * state.jump_fall_multiplier;

        standing_still_ready && crouching_ready && jump_fall_ready && aiming_ready
    }
}
