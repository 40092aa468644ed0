//! Local mirror of authoritative player state.
//!
//! [`reduce`] is the only code that mutates a [`GameState`]; [`GameStore`]
//! wraps it in a `watch` channel so views can read snapshots or await
//! changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use idlemmo_domain::{
    CatalogProvider, EquipmentBonus, EquipmentCatalog, PlayerMirror, RunStatus, SequenceConfig,
    SubProject,
};
use idlemmo_shared::{Envelope, PlayerSnapshot, ServerMessage};

/// Everything the client knows about the logged-in player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub player: PlayerMirror,
    pub run: RunStatus,
    pub player_id: Option<String>,
    /// Message of the most recent `S_Error`
    pub last_error: Option<String>,
}

impl GameState {
    /// Level of a sequence, 1 when the server has not reported one.
    pub fn sequence_level(&self, seq_id: &str) -> u32 {
        self.player
            .seq_levels
            .get(seq_id)
            .copied()
            .filter(|level| *level > 0)
            .unwrap_or(1)
    }

    pub fn is_sub_project_unlocked(&self, seq_id: &str, sub_project: &SubProject) -> bool {
        self.sequence_level(seq_id) >= sub_project.unlock_level
    }

    /// Catalog entry for the running sequence.
    pub fn current_sequence_config(&self, catalog: &dyn CatalogProvider) -> Option<SequenceConfig> {
        catalog.sequence_config(self.run.active_sequence()?)
    }

    /// Catalog entry for the running sub-project.
    pub fn current_sub_project_config(&self, catalog: &dyn CatalogProvider) -> Option<SubProject> {
        let seq_id = self.run.active_sequence()?;
        catalog.sub_project(seq_id, self.run.active_sub_project()?)
    }

    /// Tick interval of the running sequence, `None` when idle.
    pub fn current_effective_interval(&self, catalog: &dyn CatalogProvider) -> Option<Duration> {
        let seq_id = self.run.active_sequence()?;
        Some(catalog.effective_interval(seq_id, self.run.active_sub_project().unwrap_or("")))
    }
}

/// Apply one server message to the mirror.
///
/// Snapshots replace wholesale; deltas replace only the field they carry.
/// Every equipment change recomputes the bonus from `catalog`. Replaying a
/// message yields the same state.
pub fn reduce(state: &mut GameState, message: &ServerMessage, catalog: &EquipmentCatalog) {
    match message {
        ServerMessage::LoginOk(snapshot)
        | ServerMessage::Reconnected(snapshot)
        | ServerMessage::LoadOk(snapshot)
        | ServerMessage::PlayerData(snapshot) => apply_snapshot(state, snapshot, catalog),

        ServerMessage::SeqStarted(started) => {
            state.run = RunStatus {
                is_running: true,
                seq_id: started.seq_id.clone(),
                seq_level: started.level,
                current_seq_exp: 0,
                active_sub_project: started.sub_project_id.clone(),
            };
        }
        ServerMessage::SeqEnded(ended) => {
            state.run = RunStatus {
                is_running: ended.is_running,
                seq_id: ended.seq_id.clone(),
                seq_level: ended.seq_level,
                current_seq_exp: ended.current_seq_exp,
                active_sub_project: ended.active_sub_project.clone(),
            };
        }
        ServerMessage::SeqResult(result) => {
            if !result.seq_id.is_empty() {
                state
                    .player
                    .seq_levels
                    .insert(result.seq_id.clone(), result.level);
            }
            if let Some(bag) = &result.bag {
                state.player.inventory = bag.clone();
            }
            if state.run.active_sequence() == Some(result.seq_id.as_str()) {
                state.run.seq_level = result.level;
                state.run.current_seq_exp = result.cur_exp;
                if !result.sub_project_id.is_empty() {
                    state.run.active_sub_project = result.sub_project_id.clone();
                }
            }
        }

        ServerMessage::BagInfo(payload) | ServerMessage::InventoryUpdate(payload) => {
            state.player.inventory = payload.bag.clone();
        }
        ServerMessage::ExpUpdate(payload) => state.player.exp = payload.exp,

        ServerMessage::EquipmentState(payload)
        | ServerMessage::EquipmentChanged(payload)
        | ServerMessage::EquipmentUpdate(payload) => {
            state.player.equipment = payload.equipment.clone();
            state.player.equipment_bonus =
                EquipmentBonus::aggregate(&state.player.equipment, catalog);
            if let Some(bag) = &payload.bag {
                state.player.inventory = bag.clone();
            }
        }

        ServerMessage::Error(payload) => state.last_error = Some(payload.msg.clone()),

        ServerMessage::Pong
        | ServerMessage::OfflineReward(_)
        | ServerMessage::ItemUsed(_)
        | ServerMessage::ItemRemoved(_)
        | ServerMessage::Unknown => {}
    }
}

fn apply_snapshot(state: &mut GameState, snapshot: &PlayerSnapshot, catalog: &EquipmentCatalog) {
    // A bare ack keeps the mirror.
    if snapshot.carries_player_data() {
        let equipment_bonus = snapshot
            .equipment_bonus
            .unwrap_or_else(|| EquipmentBonus::aggregate(&snapshot.equipment, catalog));

        state.player = PlayerMirror {
            exp: snapshot.exp.unwrap_or_default(),
            seq_levels: snapshot.seq_levels.clone(),
            inventory: snapshot.bag.clone(),
            equipment: snapshot.equipment.clone(),
            equipment_bonus,
        };
    }
    if !snapshot.player_id.is_empty() {
        state.player_id = Some(snapshot.player_id.clone());
    }
    if let Some(run) = snapshot.run_status() {
        state.run = run;
    }
}

/// Shared, observable [`GameState`].
#[derive(Clone)]
pub struct GameStore {
    tx: Arc<watch::Sender<GameState>>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GameState::default());
        Self { tx: Arc::new(tx) }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> GameState {
        self.tx.borrow().clone()
    }

    /// A receiver notified on every effective change.
    pub fn watch(&self) -> watch::Receiver<GameState> {
        self.tx.subscribe()
    }

    /// Reduce `message` into the store. Returns whether anything changed.
    pub fn apply(&self, message: &ServerMessage, catalog: &EquipmentCatalog) -> bool {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            reduce(state, message, catalog);
            *state != before
        })
    }

    /// Back to defaults, as on logout.
    pub fn reset(&self) {
        self.tx.send_replace(GameState::default());
    }

    /// Dispatcher callback that decodes envelopes and reduces them.
    ///
    /// Starts from `catalog` and folds in any catalog the server attaches to
    /// an equipment message, so later bonus recomputation sees it.
    pub fn reducer(&self, catalog: EquipmentCatalog) -> impl FnMut(&Envelope) + Send + 'static {
        let store = self.clone();
        let mut catalog = catalog;
        move |envelope| match ServerMessage::from_envelope(envelope) {
            Ok(message) => {
                if let Some(attached) = attached_catalog(&message) {
                    catalog.extend(attached);
                }
                if store.apply(&message, &catalog) {
                    tracing::debug!(kind = %envelope.kind, "Game state updated");
                }
            }
            Err(e) => {
                tracing::warn!(kind = %envelope.kind, error = %e, "Ignoring undecodable server message");
            }
        }
    }
}

fn attached_catalog(message: &ServerMessage) -> Option<EquipmentCatalog> {
    match message {
        ServerMessage::EquipmentState(payload)
        | ServerMessage::EquipmentChanged(payload)
        | ServerMessage::EquipmentUpdate(payload) => payload.catalog_definitions(),
        _ => None,
    }
}
