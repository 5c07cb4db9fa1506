//! Equipped Items
//!
//! What a controller currently holds. Only ranged weapons carry an accuracy
//! model; callers ask for the capability instead of inspecting types.

use std::sync::Arc;
use serde::{Serialize, Deserialize};

use super::config::{ConfigError, WeaponConfig};
use super::spread::SpreadHeatModel;

/// Identifier of a weapon instance, shared by client and authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeaponId(pub u32);

/// An equipped ranged weapon.
#[derive(Clone, Debug)]
pub struct RangedWeapon {
    /// Instance id
    pub id: WeaponId,
    /// Accuracy state
    pub spread: SpreadHeatModel,
}

impl RangedWeapon {
    /// Equip a ranged weapon built from `config`.
    pub fn equip(id: WeaponId, config: Arc<WeaponConfig>) -> Result<Self, ConfigError> {
        Ok(Self { id, spread: SpreadHeatModel::new(config)? })
    }

    /// Weapon configuration.
    pub fn config(&self) -> &WeaponConfig {
        self.spread.config()
    }
}

/// Item currently held by a controller.
#[derive(Clone, Debug, Default)]
pub enum EquippedItem {
    /// Nothing in hand.
    #[default]
    Empty,
    /// A hitscan ranged weapon.
    Ranged(RangedWeapon),
    /// Any other item (melee, grenade, tool) identified by name.
    Other(String),
}

impl EquippedItem {
    /// The ranged-weapon capability, if this item has one.
    pub fn as_ranged(&self) -> Option<&RangedWeapon> {
        match self {
            EquippedItem::Ranged(weapon) => Some(weapon),
            _ => None,
        }
    }

    /// Mutable ranged-weapon capability.
    pub fn as_ranged_mut(&mut self) -> Option<&mut RangedWeapon> {
        match self {
            EquippedItem::Ranged(weapon) => Some(weapon),
            _ => None,
        }
    }

    /// Id of the held ranged weapon, if any.
    pub fn ranged_weapon_id(&self) -> Option<WeaponId> {
        self.as_ranged().map(|w| w.id)
    }
}
