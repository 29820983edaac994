//! An in-memory adapter driven by a recorded session.
//!
//! The script lists the devices the stack knows about and the events it
//! emitted. The adapter answers queries from that table and records every
//! command it receives instead of touching a radio.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::adapter::BluetoothAdapter;
use crate::core::bluetooth::events::{AdapterEvent, RawProfileRecord};
use crate::core::bluetooth::types::ProfileId;
use crate::utils::canonical_device_id;

/// A device entry in a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedDevice {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub paired: bool,
    #[serde(default)]
    pub profiles: Vec<RawProfileRecord>,
}

/// A recorded adapter session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub devices: Vec<ScriptedDevice>,
    #[serde(default)]
    pub events: Vec<AdapterEvent>,
}

impl Script {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read script {:?}", path))?;
        let script: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse script {:?}", path))?;
        info!(
            "Loaded script {:?}: {} device(s), {} event(s)",
            path,
            script.devices.len(),
            script.events.len()
        );
        Ok(script)
    }
}

/// A command the adapter received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    StartDiscovery,
    StopDiscovery,
    PairDevice(String),
    CancelPairedDevice(String),
    SetPairingConfirmation(String, bool),
    ConnectProfile(ProfileId, String),
    DisconnectProfile(ProfileId, String),
}

pub struct ScriptedAdapter {
    devices: Mutex<Vec<ScriptedDevice>>,
    events: Vec<AdapterEvent>,
    calls: Mutex<Vec<AdapterCall>>,
    connect_failures: AtomicU32,
}

impl ScriptedAdapter {
    /// Device ids in the table are canonicalised, and so is every id the
    /// adapter is queried with.
    pub fn new(script: Script) -> Self {
        let devices = script
            .devices
            .into_iter()
            .map(|device| ScriptedDevice {
                device_id: canonical_device_id(&device.device_id),
                ..device
            })
            .collect();
        Self {
            devices: Mutex::new(devices),
            events: script.events,
            calls: Mutex::new(Vec::new()),
            connect_failures: AtomicU32::new(0),
        }
    }

    /// The recorded events, in emission order.
    pub fn events(&self) -> &[AdapterEvent] {
        &self.events
    }

    /// Every command received so far.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Makes the next `count` connect requests fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Changes what `profile_device_state` reports for a device, adding the
    /// device if the table does not have it.
    pub fn set_profile_state(&self, device_id: &str, profile_id: ProfileId, connection_state: i32) {
        let device_id = canonical_device_id(device_id);
        let mut devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
        let index = match devices.iter().position(|d| d.device_id == device_id) {
            Some(index) => index,
            None => {
                devices.push(ScriptedDevice {
                    device_id,
                    ..ScriptedDevice::default()
                });
                devices.len() - 1
            }
        };
        let device = &mut devices[index];
        match device.profiles.iter_mut().find(|p| p.profile_id == profile_id.0) {
            Some(record) => record.connection_state = connection_state,
            None => device.profiles.push(RawProfileRecord {
                profile_id: profile_id.0,
                connection_state,
            }),
        }
    }

    fn record(&self, call: AdapterCall) {
        debug!("Adapter call: {:?}", call);
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    fn with_devices<T>(&self, f: impl FnOnce(&mut Vec<ScriptedDevice>) -> T) -> Result<T> {
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| anyhow!("scripted device table is poisoned"))?;
        Ok(f(&mut devices))
    }
}

#[async_trait::async_trait]
impl BluetoothAdapter for ScriptedAdapter {
    async fn paired_devices(&self) -> Result<Vec<String>> {
        self.with_devices(|devices| {
            devices
                .iter()
                .filter(|d| d.paired)
                .map(|d| d.device_id.clone())
                .collect()
        })
    }

    async fn remote_device_name(&self, device_id: &str) -> Result<Option<String>> {
        let device_id = canonical_device_id(device_id);
        self.with_devices(|devices| {
            devices
                .iter()
                .find(|d| d.device_id == device_id)
                .and_then(|d| d.name.clone())
        })
    }

    async fn profile_device_state(&self, profile_id: ProfileId, device_id: &str) -> Result<i32> {
        let device_id = canonical_device_id(device_id);
        self.with_devices(|devices| {
            devices
                .iter()
                .find(|d| d.device_id == device_id)
                .and_then(|d| d.profiles.iter().find(|p| p.profile_id == profile_id.0))
                .map_or(0, |p| p.connection_state)
        })
    }

    async fn start_discovery(&self) -> Result<()> {
        self.record(AdapterCall::StartDiscovery);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.record(AdapterCall::StopDiscovery);
        Ok(())
    }

    async fn pair_device(&self, device_id: &str) -> Result<()> {
        self.record(AdapterCall::PairDevice(device_id.to_string()));
        Ok(())
    }

    async fn cancel_paired_device(&self, device_id: &str) -> Result<()> {
        self.record(AdapterCall::CancelPairedDevice(device_id.to_string()));
        let device_id = canonical_device_id(device_id);
        self.with_devices(|devices| {
            if let Some(device) = devices.iter_mut().find(|d| d.device_id == device_id) {
                device.paired = false;
            }
        })
    }

    async fn set_pairing_confirmation(&self, device_id: &str, accept: bool) -> Result<()> {
        self.record(AdapterCall::SetPairingConfirmation(device_id.to_string(), accept));
        Ok(())
    }

    async fn connect_profile(&self, profile_id: ProfileId, device_id: &str) -> Result<()> {
        self.record(AdapterCall::ConnectProfile(profile_id, device_id.to_string()));
        let failing = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("{} refused connection on {}", device_id, profile_id));
        }
        Ok(())
    }

    async fn disconnect_profile(&self, profile_id: ProfileId, device_id: &str) -> Result<()> {
        self.record(AdapterCall::DisconnectProfile(profile_id, device_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Script {
        serde_json::from_str(
            r#"{
                "devices": [
                    {"deviceId": "00:11:22:33:44:55", "name": "Car kit", "paired": true,
                     "profiles": [{"profileId": 4, "connectionState": 2}]},
                    {"deviceId": "66:77:88:99:AA:BB"}
                ],
                "events": [{"type": "discovery_finished"}]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn answers_queries_from_the_table() {
        let adapter = ScriptedAdapter::new(script());
        assert_eq!(adapter.paired_devices().await.unwrap(), vec!["00:11:22:33:44:55"]);
        assert_eq!(
            adapter.remote_device_name("00:11:22:33:44:55").await.unwrap().as_deref(),
            Some("Car kit")
        );
        let states = adapter.device_profile_states("00:11:22:33:44:55").await.unwrap();
        assert_eq!(
            states,
            vec![
                RawProfileRecord { profile_id: 1, connection_state: 0 },
                RawProfileRecord { profile_id: 4, connection_state: 2 },
            ]
        );
        assert_eq!(adapter.events().len(), 1);
    }

    #[tokio::test]
    async fn lookups_ignore_mac_formatting() {
        let adapter = ScriptedAdapter::new(Script {
            devices: vec![ScriptedDevice {
                device_id: "aa-bb-cc-dd-ee-ff".to_string(),
                name: Some("Speaker".to_string()),
                paired: true,
                profiles: vec![RawProfileRecord { profile_id: 4, connection_state: 2 }],
            }],
            events: Vec::new(),
        });

        assert_eq!(adapter.paired_devices().await.unwrap(), vec!["AA:BB:CC:DD:EE:FF"]);
        assert_eq!(
            adapter.remote_device_name("aa:bb:cc:dd:ee:ff").await.unwrap().as_deref(),
            Some("Speaker")
        );
        assert_eq!(
            adapter
                .profile_device_state(ProfileId::HANDS_FREE_AUDIO_GATEWAY, "AA:BB:CC:DD:EE:FF")
                .await
                .unwrap(),
            2
        );

        adapter.set_profile_state("aa:bb:cc:dd:ee:ff", ProfileId::A2DP_SOURCE, 1);
        assert_eq!(
            adapter.profile_device_state(ProfileId::A2DP_SOURCE, "AA:BB:CC:DD:EE:FF").await.unwrap(),
            1
        );

        adapter.cancel_paired_device("AA-BB-CC-DD-EE-FF").await.unwrap();
        assert!(adapter.paired_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fails_the_requested_number_of_connects() {
        let adapter = ScriptedAdapter::new(Script::default());
        adapter.fail_next_connects(1);
        assert!(adapter.connect_profile(ProfileId::A2DP_SOURCE, "dev").await.is_err());
        assert!(adapter.connect_profile(ProfileId::A2DP_SOURCE, "dev").await.is_ok());
        assert_eq!(adapter.calls().len(), 2);
    }

    #[tokio::test]
    async fn load_reads_json_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, serde_json::to_string(&script()).unwrap()).unwrap();
        let loaded = Script::load(&path).await.unwrap();
        assert_eq!(loaded, script());
    }
}
