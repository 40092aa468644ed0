//! Player mirror - the client's copy of authoritative player state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::equipment::{EquipmentBonus, EquipmentMap};

/// Per-sequence levels keyed by sequence id.
pub type SequenceLevels = BTreeMap<String, u32>;

/// A bag slot: either a plain stack count or a structured slot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BagEntry {
    Count(i64),
    Slot(serde_json::Map<String, serde_json::Value>),
}

impl BagEntry {
    /// Stack size when the entry is a plain count.
    pub fn count(&self) -> Option<i64> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Slot(_) => None,
        }
    }
}

/// Inventory keyed by item id.
pub type Inventory = BTreeMap<String, BagEntry>;

/// Player progress as last reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerMirror {
    pub exp: i64,
    pub seq_levels: SequenceLevels,
    pub inventory: Inventory,
    pub equipment: EquipmentMap,
    pub equipment_bonus: EquipmentBonus,
}

/// Status of the sequence currently running on the server, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatus {
    pub is_running: bool,
    pub seq_id: String,
    pub seq_level: u32,
    pub current_seq_exp: i64,
    pub active_sub_project: String,
}

impl RunStatus {
    /// The active sub-project, only while a sequence is actually running.
    pub fn active_sub_project(&self) -> Option<&str> {
        if self.is_running && !self.seq_id.is_empty() && !self.active_sub_project.is_empty() {
            Some(&self.active_sub_project)
        } else {
            None
        }
    }

    /// The running sequence id, if any.
    pub fn active_sequence(&self) -> Option<&str> {
        if self.is_running && !self.seq_id.is_empty() {
            Some(&self.seq_id)
        } else {
            None
        }
    }
}
