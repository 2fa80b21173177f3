// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Audit
//!
//! Replays the journal into a fresh engine and recounts every derived field.
//! Exits non-zero when any invariant is broken.
//!
//! Run with: cargo run --bin inventory-audit
//!
//! Environment:
//! - `INVENTORY_JOURNAL` path of the JSON-lines journal (required)
//! - `RUST_LOG` log filter, `info` by default

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use cim_inventory::{EngineConfig, FileJournal, InventoryEngine};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = EngineConfig::from_env().context("loading INVENTORY_* configuration")?;
    let path = config
        .journal_path
        .clone()
        .context("INVENTORY_JOURNAL not set")?;

    info!("Auditing journal {}", path.display());
    let journal = Arc::new(FileJournal::new(path.clone(), config.sync_journal));
    let engine = InventoryEngine::open(config, journal)
        .await
        .with_context(|| format!("replaying {}", path.display()))?;

    let violations = engine.audit().await;
    if violations.is_empty() {
        info!("Inventory at version {} is consistent", engine.version().await);
        return Ok(ExitCode::SUCCESS);
    }

    for violation in &violations {
        error!("{}", violation);
    }
    error!("{} violations found", violations.len());
    Ok(ExitCode::FAILURE)
}
