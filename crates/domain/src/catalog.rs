//! Static catalog - sequence configuration and the equipment catalog.
//!
//! The catalog is reference data loaded once per process. The session layer
//! only reads it through [`CatalogProvider`], so tests can substitute a mock
//! and callers decide where the documents come from.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::equipment::EquipmentCatalog;
use crate::error::DomainError;

/// Tick interval used when a sequence has no usable base interval.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(3000);

/// Lower bound on any effective tick interval.
pub const MIN_EFFECTIVE_INTERVAL: Duration = Duration::from_millis(500);

/// A variant of a sequence, gated behind a sequence level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubProject {
    pub id: String,
    pub name: String,
    pub unlock_level: u32,
    pub description: String,
    pub gain_multiplier: f64,
    pub rare_chance_bonus: f64,
    pub exp_multiplier: f64,
    pub interval_modifier: f64,
}

/// Configuration for one idle sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub id: String,
    pub name: String,
    pub tick_interval_ms: i64,
    /// Base interval in seconds, used when `tick_interval_ms` is unset
    pub tick_interval: f64,
    pub sub_projects: Vec<SubProject>,
}

impl SequenceConfig {
    pub fn sub_project(&self, sub_project_id: &str) -> Option<&SubProject> {
        self.sub_projects.iter().find(|s| s.id == sub_project_id)
    }

    pub fn summary(&self) -> SequenceSummary {
        SequenceSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            sub_projects: self
                .sub_projects
                .iter()
                .map(|s| SubProjectBrief {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    unlock_level: s.unlock_level,
                })
                .collect(),
        }
    }

    fn base_interval(&self) -> Duration {
        u64::try_from(self.tick_interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .or_else(|| {
                Some(self.tick_interval)
                    .filter(|secs| *secs > 0.0)
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            })
            .unwrap_or(DEFAULT_BASE_INTERVAL)
    }
}

/// Listing entry for sequence pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub id: String,
    pub name: String,
    pub sub_projects: Vec<SubProjectBrief>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProjectBrief {
    pub id: String,
    pub name: String,
    pub unlock_level: u32,
}

/// Tick interval for a sequence, scaled by the sub-project modifier.
///
/// A missing sequence or a non-positive base falls back to
/// [`DEFAULT_BASE_INTERVAL`]. Only a positive modifier scales the base; a
/// product too large for a `Duration` saturates. The result never drops
/// below [`MIN_EFFECTIVE_INTERVAL`].
pub fn effective_interval(
    sequence: Option<&SequenceConfig>,
    sub_project: Option<&SubProject>,
) -> Duration {
    let base = sequence
        .map(SequenceConfig::base_interval)
        .unwrap_or(DEFAULT_BASE_INTERVAL);

    let scaled = match sub_project.map(|s| s.interval_modifier) {
        Some(modifier) if modifier > 0.0 && modifier.is_finite() => {
            Duration::try_from_secs_f64(base.as_secs_f64() * modifier).unwrap_or(Duration::MAX)
        }
        _ => base,
    };

    scaled.max(MIN_EFFECTIVE_INTERVAL)
}

/// Read access to the static catalog.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CatalogProvider: Send + Sync {
    /// All sequences, ordered by id.
    fn sequence_summaries(&self) -> Vec<SequenceSummary>;

    fn sequence_config(&self, sequence_id: &str) -> Option<SequenceConfig>;

    fn sub_project(&self, sequence_id: &str, sub_project_id: &str) -> Option<SubProject>;

    fn equipment_catalog(&self) -> EquipmentCatalog;

    /// Effective tick interval. An empty `sub_project_id` means none.
    fn effective_interval(&self, sequence_id: &str, sub_project_id: &str) -> Duration {
        let sequence = self.sequence_config(sequence_id);
        let sub_project = if sub_project_id.is_empty() {
            None
        } else {
            sequence
                .as_ref()
                .and_then(|s| s.sub_project(sub_project_id))
                .cloned()
        };
        effective_interval(sequence.as_ref(), sub_project.as_ref())
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    sequences: BTreeMap<String, SequenceConfig>,
    equipment: EquipmentCatalog,
}

impl StaticCatalog {
    pub fn new(
        sequences: impl IntoIterator<Item = SequenceConfig>,
        equipment: EquipmentCatalog,
    ) -> Self {
        Self {
            sequences: sequences.into_iter().map(|s| (s.id.clone(), s)).collect(),
            equipment,
        }
    }

    /// Build a catalog from the two JSON documents the game ships.
    ///
    /// `sequences_json` maps sequence id to config; `equipment_json` maps item
    /// id to definition. Entries without an explicit `id` take their key.
    pub fn from_json(sequences_json: &str, equipment_json: &str) -> Result<Self, DomainError> {
        let sequences: BTreeMap<String, SequenceConfig> = serde_json::from_str(sequences_json)
            .map_err(|e| DomainError::catalog("sequences", e))?;
        let mut equipment: EquipmentCatalog = serde_json::from_str(equipment_json)
            .map_err(|e| DomainError::catalog("equipment", e))?;

        let sequences = sequences.into_iter().map(|(key, mut config)| {
            if config.id.is_empty() {
                config.id = key;
            }
            config
        });
        for (key, definition) in equipment.iter_mut() {
            if definition.id.is_empty() {
                definition.id = key.clone();
            }
        }

        let catalog = Self::new(sequences, equipment);
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), DomainError> {
        for (key, config) in &self.sequences {
            if key.trim().is_empty() {
                return Err(DomainError::validation("sequence id cannot be empty"));
            }
            if config.sub_projects.iter().any(|s| s.id.trim().is_empty()) {
                return Err(DomainError::validation(format!(
                    "sequence '{key}' has a sub-project without an id"
                )));
            }
        }
        Ok(())
    }
}

impl CatalogProvider for StaticCatalog {
    fn sequence_summaries(&self) -> Vec<SequenceSummary> {
        self.sequences.values().map(SequenceConfig::summary).collect()
    }

    fn sequence_config(&self, sequence_id: &str) -> Option<SequenceConfig> {
        self.sequences.get(sequence_id).cloned()
    }

    fn sub_project(&self, sequence_id: &str, sub_project_id: &str) -> Option<SubProject> {
        self.sequences
            .get(sequence_id)
            .and_then(|s| s.sub_project(sub_project_id))
            .cloned()
    }

    fn equipment_catalog(&self) -> EquipmentCatalog {
        self.equipment.clone()
    }
}
