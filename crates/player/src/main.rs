//! IdleMMO Player - headless session runner.
//!
//! Logs in with `IDLEMMO_TOKEN`, keeps the session alive and logs state
//! changes until interrupted. Useful for exercising a gateway without a UI.

use std::sync::Arc;

use anyhow::Context;

use idlemmo_domain::{CatalogProvider, StaticCatalog};
use idlemmo_player::logging::init_tracing;
use idlemmo_player::{GameSession, SessionConfig, TungsteniteConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Also loads .env
    let config = SessionConfig::from_env().context("loading session config")?;

    tracing::info!(gateway = %config.gateway_url, "Starting IdleMMO player session");

    let account = std::env::var("IDLEMMO_ACCOUNT").unwrap_or_else(|_| "player".into());
    let token = std::env::var("IDLEMMO_TOKEN").context("IDLEMMO_TOKEN must be set")?;
    let catalog = load_catalog()?;

    let session = GameSession::start(config, Arc::new(TungsteniteConnector), catalog)?;
    session.login(account, token).await?;

    let mut states = session.subscribe_state();
    let mut game = session.store().watch();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = states.recv() => match state {
                Ok(state) => tracing::info!(%state, "Connection state changed"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "State updates lagged");
                }
                Err(_) => break,
            },
            changed = game.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = game.borrow_and_update().clone();
                tracing::info!(
                    exp = snapshot.player.exp,
                    running = snapshot.run.is_running,
                    seq = %snapshot.run.seq_id,
                    interval_ms = ?session.current_effective_interval().map(|d| d.as_millis()),
                    "Game state updated"
                );
            }
        }
    }

    tracing::info!("Shutting down");
    session.logout().await;
    Ok(())
}

/// Catalog from `IDLEMMO_SEQUENCES_PATH` and `IDLEMMO_EQUIPMENT_PATH`, empty
/// when neither is set.
fn load_catalog() -> anyhow::Result<Arc<dyn CatalogProvider>> {
    let sequences_path = std::env::var("IDLEMMO_SEQUENCES_PATH").ok();
    let equipment_path = std::env::var("IDLEMMO_EQUIPMENT_PATH").ok();
    if sequences_path.is_none() && equipment_path.is_none() {
        tracing::warn!("No catalog paths configured, equipment bonuses will read as zero");
        return Ok(Arc::new(StaticCatalog::default()));
    }

    let read = |path: Option<String>| -> anyhow::Result<String> {
        match path {
            Some(path) => {
                std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))
            }
            None => Ok("{}".to_string()),
        }
    };
    let catalog = StaticCatalog::from_json(&read(sequences_path)?, &read(equipment_path)?)?;
    tracing::info!(
        sequences = catalog.sequence_summaries().len(),
        items = catalog.equipment_catalog().len(),
        "Catalog loaded"
    );
    Ok(Arc::new(catalog))
}
