//! Equipment - catalog definitions, equipped slots and the bonus aggregate.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::serde_ext::null_default;

/// Multipliers an item contributes while equipped. Missing values count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentAttributes {
    pub exp_multiplier: f64,
    pub gain_multiplier: f64,
    pub rare_chance_bonus: f64,
}

/// Static catalog entry for an equippable item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentDefinition {
    pub id: String,
    pub name: String,
    pub slot: String,
    pub quality: String,
    pub description: String,
    pub attributes: EquipmentAttributes,
}

/// Catalog of equippable items keyed by item id.
pub type EquipmentCatalog = BTreeMap<String, EquipmentDefinition>;

/// What the server reports as occupying a slot.
///
/// The embedded attributes are informational; the bonus aggregate is always
/// derived from the catalog entry for `item_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquippedItem {
    #[serde(default, deserialize_with = "null_default")]
    pub item_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub slot: String,
    #[serde(default, deserialize_with = "null_default")]
    pub quality: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub enhancement: i32,
    #[serde(default, deserialize_with = "null_default")]
    pub attributes: EquipmentAttributes,
}

impl EquippedItem {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Self::default()
        }
    }
}

/// Equipped items keyed by slot id.
pub type EquipmentMap = BTreeMap<String, EquippedItem>;

/// Sum of the attribute contributions of every equipped item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentBonus {
    pub exp_multiplier: f64,
    pub gain_multiplier: f64,
    pub rare_chance_bonus: f64,
}

impl AddAssign<&EquipmentAttributes> for EquipmentBonus {
    fn add_assign(&mut self, attrs: &EquipmentAttributes) {
        self.exp_multiplier += attrs.exp_multiplier;
        self.gain_multiplier += attrs.gain_multiplier;
        self.rare_chance_bonus += attrs.rare_chance_bonus;
    }
}

impl EquipmentBonus {
    /// Recompute the aggregate from scratch over every occupied slot.
    ///
    /// Slots whose item id is empty or unknown to the catalog contribute
    /// nothing. Iteration follows slot order, so the result is stable for a
    /// given map.
    pub fn aggregate(equipment: &EquipmentMap, catalog: &EquipmentCatalog) -> Self {
        let mut bonus = Self::default();
        for equipped in equipment.values() {
            if equipped.item_id.is_empty() {
                continue;
            }
            if let Some(definition) = catalog.get(&equipped.item_id) {
                bonus += &definition.attributes;
            }
        }
        bonus
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}
