//! IdleMMO domain types.
//!
//! Pure data shared by the wire protocol and the client session runtime:
//!
//! - `session` - the authenticated identity of the current account
//! - `catalog` - static sequence and equipment reference data
//! - `equipment` - equipped items and the derived bonus aggregate
//! - `player` - the local mirror of player progress and run status
//!
//! Nothing here performs I/O. Loading catalog files and talking to the
//! gateway belong to the caller and to `idlemmo-player` respectively.

pub mod catalog;
pub mod equipment;
pub mod error;
pub mod player;
pub mod serde_ext;
pub mod session;

pub use catalog::{
    effective_interval, CatalogProvider, SequenceConfig, SequenceSummary, StaticCatalog,
    SubProject, SubProjectBrief, DEFAULT_BASE_INTERVAL, MIN_EFFECTIVE_INTERVAL,
};
#[cfg(any(test, feature = "testing"))]
pub use catalog::MockCatalogProvider;
pub use equipment::{
    EquipmentAttributes, EquipmentBonus, EquipmentCatalog, EquipmentDefinition, EquipmentMap,
    EquippedItem,
};
pub use error::DomainError;
pub use player::{BagEntry, Inventory, PlayerMirror, RunStatus, SequenceLevels};
pub use session::SessionIdentity;
