//! Application state management
//! This module wires the configuration, the adapter and the Bluetooth manager together.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::bluetooth::{AdapterEvent, BluetoothAdapter, BluetoothManager};

/// Application state
pub struct AppState {
    pub config: AppConfig,
    /// The Bluetooth manager instance
    pub bluetooth_manager: Arc<BluetoothManager>,
}

impl AppState {
    /// Creates the manager and loads the paired devices.
    ///
    /// Returns the receiving end of the adapter event channel; hand it to
    /// [`AppState::spawn_event_loop`] or drive the manager directly.
    pub async fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        config: AppConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AdapterEvent>)> {
        info!("Initializing BluetoothManager...");
        let (manager, events) = BluetoothManager::new(adapter, &config);
        manager.load_paired_devices().await?;
        Ok((
            Self {
                config,
                bluetooth_manager: Arc::new(manager),
            },
            events,
        ))
    }

    /// Gets a reference to the Bluetooth manager
    pub fn get_bluetooth_manager_arc(&self) -> Arc<BluetoothManager> {
        self.bluetooth_manager.clone()
    }

    /// Runs the manager's event loop on the Tokio runtime.
    pub fn spawn_event_loop(
        &self,
        events: mpsc::UnboundedReceiver<AdapterEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.get_bluetooth_manager_arc();
        tokio::spawn(async move { manager.run(events, shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::{Script, ScriptedAdapter};

    #[tokio::test]
    async fn event_loop_runs_until_shutdown() {
        let adapter = Arc::new(ScriptedAdapter::new(Script::default()));
        let (state, events) = AppState::new(adapter, AppConfig::default()).await.unwrap();
        let manager = state.get_bluetooth_manager_arc();
        let mut snapshots = manager.subscribe();

        let shutdown = CancellationToken::new();
        let handle = state.spawn_event_loop(events, shutdown.clone());
        manager
            .event_sender()
            .send(AdapterEvent::DeviceFound {
                device_id: "00:11:22:33:44:55".to_string(),
            })
            .unwrap();

        snapshots
            .wait_for(|snapshot| snapshot.available.len() == 1)
            .await
            .unwrap();
        shutdown.cancel();
        handle.await.unwrap();
    }
}
