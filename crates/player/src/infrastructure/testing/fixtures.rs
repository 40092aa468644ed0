//! Gateway payloads and catalogs used across unit tests.

use serde_json::{json, Value};

use idlemmo_domain::{
    EquipmentAttributes, EquipmentCatalog, EquipmentDefinition, SequenceConfig, StaticCatalog,
    SubProject,
};

pub fn login_ok(player_id: &str, exp: i64) -> Value {
    json!({
        "type": "S_LoginOK",
        "playerId": player_id,
        "exp": exp,
        "msg": "login ok",
    })
}

pub fn pong() -> Value {
    json!({ "type": "S_Pong" })
}

pub fn bag_info(items: &[(&str, i64)]) -> Value {
    let bag: serde_json::Map<String, Value> = items
        .iter()
        .map(|(id, count)| (id.to_string(), json!(count)))
        .collect();
    json!({ "type": "S_BagInfo", "bag": bag })
}

pub fn equipment_changed(slot: &str, item_id: &str) -> Value {
    json!({
        "type": "S_EquipmentChanged",
        "equipment": {
            slot: { "item_id": item_id, "slot": slot, "enhancement": 0 }
        },
    })
}

pub fn seq_started(seq_id: &str, level: u32, sub_project_id: &str) -> Value {
    json!({
        "type": "S_SeqStarted",
        "seq_id": seq_id,
        "level": level,
        "sub_project_id": sub_project_id,
        "tick_interval": 2.0,
    })
}

/// `sword1` (+0.1 exp) and `charm1` (+0.2 gain, +0.05 rare).
pub fn sample_equipment_catalog() -> EquipmentCatalog {
    [
        EquipmentDefinition {
            id: "sword1".into(),
            name: "Bronze Sword".into(),
            slot: "weapon".into(),
            quality: "common".into(),
            description: String::new(),
            attributes: EquipmentAttributes {
                exp_multiplier: 0.1,
                ..EquipmentAttributes::default()
            },
        },
        EquipmentDefinition {
            id: "charm1".into(),
            name: "Lucky Charm".into(),
            slot: "accessory".into(),
            quality: "rare".into(),
            description: String::new(),
            attributes: EquipmentAttributes {
                gain_multiplier: 0.2,
                rare_chance_bonus: 0.05,
                ..EquipmentAttributes::default()
            },
        },
    ]
    .into_iter()
    .map(|d| (d.id.clone(), d))
    .collect()
}

/// `mining` (2000 ms) with `deep_vein` (unlock 5, x1.5) and `quick` (x0.1).
pub fn sample_catalog() -> StaticCatalog {
    let mining = SequenceConfig {
        id: "mining".into(),
        name: "Mining".into(),
        tick_interval_ms: 2000,
        tick_interval: 0.0,
        sub_projects: vec![
            SubProject {
                id: "deep_vein".into(),
                name: "Deep Vein".into(),
                unlock_level: 5,
                interval_modifier: 1.5,
                ..SubProject::default()
            },
            SubProject {
                id: "quick".into(),
                name: "Surface Dig".into(),
                unlock_level: 1,
                interval_modifier: 0.1,
                ..SubProject::default()
            },
        ],
    };
    StaticCatalog::new([mining], sample_equipment_catalog())
}
