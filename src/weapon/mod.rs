//! Ranged weapon state.
//!
//! Configuration, the spread/heat accuracy model, pawn motion queries,
//! damage attenuation, and the equipped-item capability.

pub mod config;
pub mod motion;
pub mod spread;
pub mod damage;
pub mod equipment;

pub use config::{ConfigError, HeatRange, WeaponConfig};
pub use motion::{MotionSnapshot, PawnMotion};
pub use spread::{SpreadHeatModel, SpreadSample, WeaponAccuracyState};
pub use equipment::{EquippedItem, RangedWeapon, WeaponId};
