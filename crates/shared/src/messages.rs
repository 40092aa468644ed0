//! Gateway message types
//!
//! `ClientMessage` is everything the player sends; `ServerMessage` is
//! everything the gateway pushes. Both use the flat tagged layout
//! `{"type": "<name>", ...fields}`.
//!
//! ## Compatibility
//!
//! - Unknown server types deserialize to `ServerMessage::Unknown`
//! - Absent or `null` payload fields become zero values
//! - Renaming a wire name is a breaking change

use serde::{Deserialize, Serialize};
use serde_json::Value;

use idlemmo_domain::serde_ext::null_default;
use idlemmo_domain::{
    EquipmentBonus, EquipmentCatalog, EquipmentDefinition, EquipmentMap, Inventory, RunStatus,
    SequenceLevels,
};

use crate::envelope::Envelope;
use crate::error::CodecError;

/// Wire names, for code that inspects raw envelopes.
pub mod message_types {
    pub const C_LOGIN: &str = "C_Login";
    pub const C_PING: &str = "C_Ping";
    pub const C_LIST_SEQ: &str = "C_ListSeq";
    pub const C_START_SEQ: &str = "C_StartSeq";
    pub const C_STOP_SEQ: &str = "C_StopSeq";
    pub const C_LIST_BAG: &str = "C_ListBag";
    pub const C_LIST_EQUIPMENT: &str = "C_ListEquipment";
    pub const C_EQUIP_ITEM: &str = "C_EquipItem";
    pub const C_UNEQUIP_ITEM: &str = "C_UnequipItem";
    pub const C_USE_ITEM: &str = "C_UseItem";
    pub const C_REMOVE_ITEM: &str = "C_RemoveItem";

    pub const S_LOGIN_OK: &str = "S_LoginOK";
    pub const S_RECONNECTED: &str = "S_Reconnected";
    pub const S_LOAD_OK: &str = "S_LoadOK";
    pub const S_PLAYER_DATA: &str = "S_PlayerData";
    pub const S_PONG: &str = "S_Pong";
    pub const S_SEQ_STARTED: &str = "S_SeqStarted";
    pub const S_SEQ_ENDED: &str = "S_SeqEnded";
    pub const S_SEQ_RESULT: &str = "S_SeqResult";
    pub const S_BAG_INFO: &str = "S_BagInfo";
    pub const S_INVENTORY_UPDATE: &str = "S_InventoryUpdate";
    pub const S_EXP_UPDATE: &str = "S_ExpUpdate";
    pub const S_EQUIPMENT_STATE: &str = "S_EquipmentState";
    pub const S_EQUIPMENT_CHANGED: &str = "S_EquipmentChanged";
    pub const S_EQUIPMENT_UPDATE: &str = "S_EquipmentUpdate";
    pub const S_OFFLINE_REWARD: &str = "S_OfflineReward";
    pub const S_ITEM_USED: &str = "S_ItemUsed";
    pub const S_ITEM_REMOVED: &str = "S_ItemRemoved";
    pub const S_ERROR: &str = "S_Error";

    /// Types that confirm authentication.
    pub const LOGIN_CONFIRMATIONS: [&str; 2] = [S_LOGIN_OK, S_RECONNECTED];
}

// =============================================================================
// Client Messages (Player → Gateway)
// =============================================================================

/// Commands sent from the player to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Authenticate the freshly opened connection
    #[serde(rename = "C_Login")]
    Login { token: String },
    /// Heartbeat ping
    #[serde(rename = "C_Ping")]
    Ping,
    #[serde(rename = "C_ListSeq")]
    ListSequences,
    #[serde(rename = "C_StartSeq")]
    StartSequence {
        seq_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_project_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<i64>,
    },
    #[serde(rename = "C_StopSeq")]
    StopSequence,
    #[serde(rename = "C_ListBag")]
    ListBag,
    #[serde(rename = "C_ListEquipment")]
    ListEquipment,
    #[serde(rename = "C_EquipItem")]
    EquipItem { item_id: String, enhancement: i32 },
    #[serde(rename = "C_UnequipItem")]
    UnequipItem { slot: String },
    #[serde(rename = "C_UseItem")]
    UseItem { item_id: String, count: i64 },
    #[serde(rename = "C_RemoveItem")]
    RemoveItem { item_id: String, count: i64 },
}

impl ClientMessage {
    pub fn login(token: impl Into<String>) -> Self {
        Self::Login {
            token: token.into(),
        }
    }

    pub fn start_sequence(seq_id: impl Into<String>, sub_project_id: Option<String>) -> Self {
        Self::StartSequence {
            seq_id: seq_id.into(),
            sub_project_id: sub_project_id.filter(|s| !s.is_empty()),
            target: None,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, CodecError> {
        Envelope::from_value(serde_json::to_value(self)?)
    }
}

// =============================================================================
// Server Messages (Gateway → Player)
// =============================================================================

/// Full player snapshot carried by login, reconnect and load messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(
        rename = "playerId",
        alias = "player_id",
        default,
        deserialize_with = "null_default"
    )]
    pub player_id: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub seq_levels: SequenceLevels,
    #[serde(default, deserialize_with = "null_default")]
    pub bag: Inventory,
    #[serde(default, deserialize_with = "null_default")]
    pub equipment: EquipmentMap,
    #[serde(default)]
    pub equipment_bonus: Option<EquipmentBonus>,
    #[serde(default)]
    pub is_running: Option<bool>,
    #[serde(default, deserialize_with = "null_default")]
    pub seq_id: String,
    #[serde(default)]
    pub seq_level: u32,
    #[serde(default, alias = "cur_exp")]
    pub current_seq_exp: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub active_sub_project: String,
    #[serde(default)]
    pub offline_limit_hours: Option<f64>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl PlayerSnapshot {
    /// Whether the payload carries player data rather than being a bare ack
    /// such as `{"type": "S_Reconnected", "msg": "..."}`.
    pub fn carries_player_data(&self) -> bool {
        self.exp.is_some()
            || self.equipment_bonus.is_some()
            || !self.seq_levels.is_empty()
            || !self.bag.is_empty()
            || !self.equipment.is_empty()
    }

    /// Run status, when the snapshot reports one.
    pub fn run_status(&self) -> Option<RunStatus> {
        let is_running = self.is_running?;
        Some(RunStatus {
            is_running,
            seq_id: self.seq_id.clone(),
            seq_level: self.seq_level,
            current_seq_exp: self.current_seq_exp,
            active_sub_project: self.active_sub_project.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeqStartedPayload {
    #[serde(default, deserialize_with = "null_default")]
    pub seq_id: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_project_id: String,
    /// Effective tick interval in seconds, informational
    #[serde(default)]
    pub tick_interval: f64,
    #[serde(default)]
    pub equipment_bonus: Option<EquipmentBonus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeqEndedPayload {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub seq_id: String,
    #[serde(default)]
    pub seq_level: u32,
    #[serde(default)]
    pub current_seq_exp: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub active_sub_project: String,
}

/// Outcome of one sequence tick.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeqResultPayload {
    #[serde(default)]
    pub gains: i64,
    #[serde(default)]
    pub rare: Value,
    #[serde(default)]
    pub bag: Option<Inventory>,
    #[serde(default, deserialize_with = "null_default")]
    pub seq_id: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub cur_exp: i64,
    #[serde(default)]
    pub leveled: bool,
    #[serde(default)]
    pub items: Value,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_project_id: String,
    #[serde(default)]
    pub equipment_bonus: Option<EquipmentBonus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BagPayload {
    #[serde(default, deserialize_with = "null_default")]
    pub bag: Inventory,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExpPayload {
    #[serde(default)]
    pub exp: i64,
}

/// Equipment snapshot, optionally with the bag and the server's catalog.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EquipmentPayload {
    #[serde(default, deserialize_with = "null_default")]
    pub equipment: EquipmentMap,
    #[serde(default, alias = "equipment_bonus")]
    pub bonus: Option<EquipmentBonus>,
    #[serde(default)]
    pub bag: Option<Inventory>,
    /// Catalog summary keyed by item id, in the equipped-item view shape.
    #[serde(default)]
    pub catalog: Option<EquipmentMap>,
}

impl EquipmentPayload {
    /// The attached catalog converted to definitions.
    pub fn catalog_definitions(&self) -> Option<EquipmentCatalog> {
        let catalog = self.catalog.as_ref()?;
        Some(
            catalog
                .iter()
                .map(|(key, view)| {
                    let id = if view.item_id.is_empty() {
                        key.clone()
                    } else {
                        view.item_id.clone()
                    };
                    let definition = EquipmentDefinition {
                        id: id.clone(),
                        name: view.name.clone(),
                        slot: view.slot.clone(),
                        quality: view.quality.clone(),
                        description: view.description.clone(),
                        attributes: view.attributes,
                    };
                    (id, definition)
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OfflineRewardPayload {
    #[serde(default)]
    pub gains: i64,
    #[serde(default)]
    pub offline_duration: i64,
    #[serde(default)]
    pub offline_items: Value,
    #[serde(default)]
    pub bag: Option<Inventory>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemPayload {
    #[serde(default, deserialize_with = "null_default")]
    pub item_id: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(
        default,
        alias = "message",
        alias = "error",
        deserialize_with = "null_default"
    )]
    pub msg: String,
}

/// Messages pushed from the gateway to the player.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "S_LoginOK")]
    LoginOk(PlayerSnapshot),
    #[serde(rename = "S_Reconnected")]
    Reconnected(PlayerSnapshot),
    #[serde(rename = "S_LoadOK")]
    LoadOk(PlayerSnapshot),
    #[serde(rename = "S_PlayerData")]
    PlayerData(PlayerSnapshot),
    /// Heartbeat response, consumed by the connection manager
    #[serde(rename = "S_Pong")]
    Pong,
    #[serde(rename = "S_SeqStarted")]
    SeqStarted(SeqStartedPayload),
    #[serde(rename = "S_SeqEnded")]
    SeqEnded(SeqEndedPayload),
    #[serde(rename = "S_SeqResult")]
    SeqResult(SeqResultPayload),
    #[serde(rename = "S_BagInfo")]
    BagInfo(BagPayload),
    #[serde(rename = "S_InventoryUpdate")]
    InventoryUpdate(BagPayload),
    #[serde(rename = "S_ExpUpdate")]
    ExpUpdate(ExpPayload),
    #[serde(rename = "S_EquipmentState")]
    EquipmentState(EquipmentPayload),
    #[serde(rename = "S_EquipmentChanged")]
    EquipmentChanged(EquipmentPayload),
    #[serde(rename = "S_EquipmentUpdate")]
    EquipmentUpdate(EquipmentPayload),
    #[serde(rename = "S_OfflineReward")]
    OfflineReward(OfflineRewardPayload),
    #[serde(rename = "S_ItemUsed")]
    ItemUsed(ItemPayload),
    #[serde(rename = "S_ItemRemoved")]
    ItemRemoved(ItemPayload),
    #[serde(rename = "S_Error", alias = "S_Err")]
    Error(ErrorPayload),
    /// Any type this client does not know about
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, CodecError> {
        Ok(serde_json::from_value(envelope.to_value())?)
    }

    /// Full snapshot payload, for the messages that carry one.
    pub fn snapshot(&self) -> Option<&PlayerSnapshot> {
        match self {
            Self::LoginOk(s) | Self::Reconnected(s) | Self::LoadOk(s) | Self::PlayerData(s) => {
                Some(s)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: Value) -> ServerMessage {
        let envelope = Envelope::from_value(value).unwrap();
        ServerMessage::from_envelope(&envelope).unwrap()
    }

    #[test]
    fn test_login_envelope_is_flat() {
        let envelope = ClientMessage::login("tok").to_envelope().unwrap();
        assert_eq!(envelope.kind, message_types::C_LOGIN);
        assert_eq!(envelope.get("token"), Some(&json!("tok")));
    }

    #[test]
    fn test_unit_commands_have_empty_payload() {
        let envelope = ClientMessage::Ping.to_envelope().unwrap();
        assert_eq!(envelope, Envelope::empty("C_Ping"));
    }

    #[test]
    fn test_start_sequence_omits_absent_options() {
        let envelope = ClientMessage::start_sequence("mining", Some(String::new()))
            .to_envelope()
            .unwrap();
        assert_eq!(envelope.kind, "C_StartSeq");
        assert_eq!(envelope.get("seq_id"), Some(&json!("mining")));
        assert!(envelope.get("sub_project_id").is_none());
        assert!(envelope.get("target").is_none());
    }

    #[test]
    fn test_login_ok_snapshot_with_nulls() {
        let msg = decode(json!({
            "type": "S_LoginOK",
            "playerId": "p1",
            "exp": 10,
            "seq_levels": null,
            "bag": {"ore": 3},
            "equipment": null,
        }));
        let ServerMessage::LoginOk(snapshot) = msg else {
            panic!("expected LoginOk");
        };
        assert_eq!(snapshot.player_id, "p1");
        assert_eq!(snapshot.exp, Some(10));
        assert!(snapshot.seq_levels.is_empty());
        assert!(snapshot.equipment.is_empty());
        assert_eq!(snapshot.bag.len(), 1);
        assert!(snapshot.run_status().is_none());
        assert!(snapshot.carries_player_data());
    }

    #[test]
    fn test_gateway_login_and_error_field_names() {
        let msg = decode(json!({"type": "S_LoginOK", "token": "", "player_id": "p9"}));
        let snapshot = msg.snapshot().unwrap();
        assert_eq!(snapshot.player_id, "p9");
        assert!(!snapshot.carries_player_data());

        let msg = decode(json!({"type": "S_Error", "error": "invalid token"}));
        assert_eq!(
            msg,
            ServerMessage::Error(ErrorPayload {
                msg: "invalid token".into()
            })
        );
    }

    #[test]
    fn test_bare_reconnected_ack_carries_no_player_data() {
        let msg = decode(json!({"type": "S_Reconnected", "msg": "ok"}));
        let snapshot = msg.snapshot().unwrap();
        assert!(!snapshot.carries_player_data());
        assert!(snapshot.run_status().is_none());
    }

    #[test]
    fn test_seq_started_accepts_fractional_interval() {
        for seconds in [2.4, 0.5, 3.0] {
            let msg = decode(json!({
                "type": "S_SeqStarted",
                "seq_id": "mining",
                "level": 2,
                "tick_interval": seconds,
            }));
            let ServerMessage::SeqStarted(started) = msg else {
                panic!("expected SeqStarted");
            };
            assert_eq!(started.tick_interval, seconds);
            assert_eq!(started.seq_id, "mining");
        }
    }

    #[test]
    fn test_reconnected_carries_run_status() {
        let msg = decode(json!({
            "type": "S_Reconnected",
            "is_running": true,
            "seq_id": "mining",
            "seq_level": 4,
            "active_sub_project": "deep_vein",
        }));
        let status = msg.snapshot().and_then(PlayerSnapshot::run_status).unwrap();
        assert!(status.is_running);
        assert_eq!(status.seq_level, 4);
        assert_eq!(status.active_sub_project(), Some("deep_vein"));
    }

    #[test]
    fn test_pong_and_unknown() {
        assert_eq!(decode(json!({"type": "S_Pong"})), ServerMessage::Pong);
        assert_eq!(
            decode(json!({"type": "S_SomethingNew", "x": 1})),
            ServerMessage::Unknown
        );
    }

    #[test]
    fn test_error_alias() {
        let msg = decode(json!({"type": "S_Err", "msg": "bad"}));
        assert_eq!(
            msg,
            ServerMessage::Error(ErrorPayload { msg: "bad".into() })
        );
    }

    #[test]
    fn test_equipment_payload_catalog_conversion() {
        let msg = decode(json!({
            "type": "S_EquipmentState",
            "equipment": {"weapon": {"item_id": "sword1", "slot": "weapon"}},
            "bonus": {"exp_multiplier": 0.1},
            "catalog": {
                "sword1": {"item_id": "sword1", "name": "Sword", "slot": "weapon",
                           "attributes": {"exp_multiplier": 0.1}}
            }
        }));
        let ServerMessage::EquipmentState(payload) = msg else {
            panic!("expected EquipmentState");
        };
        assert_eq!(payload.bonus.map(|b| b.exp_multiplier), Some(0.1));
        let catalog = payload.catalog_definitions().unwrap();
        assert_eq!(catalog["sword1"].name, "Sword");
        assert_eq!(catalog["sword1"].attributes.exp_multiplier, 0.1);
    }
}
