//! Command implementations
//! This module implements the commands exposed by the command line.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::{info, warn};

use crate::config::AppConfig;
use crate::core::bluetooth::{DeviceListSnapshot, Script, ScriptedAdapter};
use crate::state::AppState;

/// Replays a recorded adapter session through a fresh manager.
///
/// Returns the snapshot after every event when `each` is set, otherwise only
/// the final one.
pub async fn replay(config: &AppConfig, script_path: &Path, each: bool) -> Result<Vec<DeviceListSnapshot>> {
    let script = Script::load(script_path).await?;
    let adapter = Arc::new(ScriptedAdapter::new(script));
    let (app_state, _events) = AppState::new(adapter.clone(), config.clone()).await?;
    let manager = app_state.get_bluetooth_manager_arc();

    let mut snapshots = Vec::new();
    for event in adapter.events() {
        if let Err(e) = manager.handle_event(event.clone()).await {
            warn!("Dropped adapter event: {:#}", e);
        }
        if each {
            snapshots.push(manager.snapshot().await);
        }
    }
    if !each || snapshots.is_empty() {
        snapshots.push(manager.snapshot().await);
    }

    info!("Replayed {} event(s).", adapter.events().len());
    Ok(snapshots)
}

/// Writes the default configuration to `path`.
pub async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists, pass --force to overwrite it", path);
    }
    AppConfig::default().save(path).await
}

/// The effective configuration as pretty JSON.
pub fn show_config(config: &AppConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
