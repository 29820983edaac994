//! Bluetooth manager for the device monitor
//! This module keeps the device lists and feeds adapter events into them

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::bluetooth::adapter::BluetoothAdapter;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::device::BluetoothDevice;
use crate::core::bluetooth::events::{AdapterEvent, RawProfileStateChange};
use crate::core::bluetooth::scanner::DiscoveryScanner;
use crate::core::bluetooth::types::{
    AdapterPowerState, BondState, ConnectionState, DeviceListSnapshot, DeviceSnapshot,
    PairingRequest, ProfileId, StateCodePolicy,
};
use crate::error::MonitorError;
use crate::utils::canonical_device_id;

/// Paired and available devices plus the state the presentation layer shows
/// next to them.
#[derive(Default)]
struct DeviceRegistry {
    paired: HashMap<String, BluetoothDevice>,
    available: HashMap<String, BluetoothDevice>,
    discovering: bool,
    pending_pairing: Option<PairingRequest>,
}

impl DeviceRegistry {
    fn contains(&self, device_id: &str) -> bool {
        self.paired.contains_key(device_id) || self.available.contains_key(device_id)
    }

    fn device_mut(&mut self, device_id: &str) -> Option<&mut BluetoothDevice> {
        if self.paired.contains_key(device_id) {
            return self.paired.get_mut(device_id);
        }
        self.available.get_mut(device_id)
    }

    fn clear_pending_pairing(&mut self, device_id: &str) {
        if self
            .pending_pairing
            .as_ref()
            .is_some_and(|request| request.device_id == device_id)
        {
            self.pending_pairing = None;
        }
    }

    fn snapshot(&self) -> DeviceListSnapshot {
        DeviceListSnapshot {
            paired: sorted_snapshots(&self.paired),
            available: sorted_snapshots(&self.available),
            discovering: self.discovering,
            pending_pairing: self.pending_pairing.clone(),
            ..DeviceListSnapshot::empty()
        }
    }
}

fn sorted_snapshots(devices: &HashMap<String, BluetoothDevice>) -> Vec<DeviceSnapshot> {
    let mut snapshots: Vec<DeviceSnapshot> = devices.values().map(BluetoothDevice::snapshot).collect();
    snapshots.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    snapshots
}

/// Manages the device lists
///
/// Adapter events are handled one at a time by [`BluetoothManager::run`].
/// Every device mutation happens under the registry lock, and the lock is
/// never held across an adapter call.
pub struct BluetoothManager {
    adapter: Arc<dyn BluetoothAdapter>,
    registry: Mutex<DeviceRegistry>,
    scanner: Mutex<DiscoveryScanner>,
    connection_manager: ConnectionManager,
    policy: StateCodePolicy,
    discovery_duration: Duration,
    auto_confirm_pairing: bool,
    events_tx: mpsc::UnboundedSender<AdapterEvent>,
    snapshot_tx: watch::Sender<DeviceListSnapshot>,
}

impl BluetoothManager {
    /// Creates a manager and the receiving end of its event channel.
    pub fn new(
        adapter: Arc<dyn BluetoothAdapter>,
        config: &AppConfig,
    ) -> (Self, mpsc::UnboundedReceiver<AdapterEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(DeviceListSnapshot::empty());

        let connection_manager = ConnectionManager::new(
            adapter.clone(),
            config.connection.max_retries,
            config.connection.retry_delay_ms,
        );
        let scanner = DiscoveryScanner::new(adapter.clone(), events_tx.clone());

        let manager = Self {
            adapter,
            registry: Mutex::new(DeviceRegistry::default()),
            scanner: Mutex::new(scanner),
            connection_manager,
            policy: config.state_code_policy,
            discovery_duration: Duration::from_secs(config.discovery.duration_secs),
            auto_confirm_pairing: config.pairing.auto_confirm,
            events_tx,
            snapshot_tx,
        };
        (manager, events_rx)
    }

    /// Sender half of the shared callback channel, for adapter glue code.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<AdapterEvent> {
        self.events_tx.clone()
    }

    /// Receives a fresh snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<DeviceListSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn snapshot(&self) -> DeviceListSnapshot {
        self.registry.lock().await.snapshot()
    }

    /// A copy of a paired or available device.
    pub async fn device(&self, device_id: &str) -> Option<BluetoothDevice> {
        let device_id = canonical_device_id(device_id);
        let registry = self.registry.lock().await;
        registry
            .paired
            .get(&device_id)
            .or_else(|| registry.available.get(&device_id))
            .cloned()
    }

    fn publish(&self, registry: &DeviceRegistry) {
        self.snapshot_tx.send_replace(registry.snapshot());
    }

    /// Handles events until `shutdown` fires or every sender is gone.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<AdapterEvent>,
        shutdown: CancellationToken,
    ) {
        info!("Event loop started.");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!("Dropped adapter event: {:#}", e);
                        }
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Event loop stopped.");
    }

    /// Replaces the paired list with what the adapter reports.
    ///
    /// A device whose profiles cannot be read is kept with no profiles.
    pub async fn load_paired_devices(&self) -> Result<()> {
        let device_ids = self.adapter.paired_devices().await?;
        let mut devices = HashMap::with_capacity(device_ids.len());
        for device_id in device_ids {
            let device_id = canonical_device_id(&device_id);
            let name = self.query_name(&device_id).await;
            let mut device = BluetoothDevice::new(device_id.clone(), name);
            match self.initial_profiles(&device_id).await {
                Ok(profiles) => device.load_initial_profiles(profiles),
                Err(e) => warn!("Could not read the profiles of {}: {}", device_id, e),
            }
            devices.insert(device_id, device);
        }

        let mut registry = self.registry.lock().await;
        for device_id in devices.keys() {
            registry.available.remove(device_id);
        }
        registry.paired = devices;
        info!("Loaded {} paired device(s).", registry.paired.len());
        self.publish(&registry);
        Ok(())
    }

    async fn query_name(&self, device_id: &str) -> Option<String> {
        match self.adapter.remote_device_name(device_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not read the name of {}: {}", device_id, e);
                None
            }
        }
    }

    async fn initial_profiles(&self, device_id: &str) -> Result<Vec<(ProfileId, ConnectionState)>> {
        let records = self.adapter.device_profile_states(device_id).await?;
        let mut profiles = Vec::with_capacity(records.len());
        for record in records {
            match self.policy.decode_connection_state(record.connection_state) {
                Ok(state) => profiles.push((ProfileId(record.profile_id), state)),
                Err(e) => warn!(
                    "Skipping profile {} of {}: {}",
                    ProfileId(record.profile_id),
                    device_id,
                    e
                ),
            }
        }
        Ok(profiles)
    }

    /// Decodes a bond or adapter state code. Unknown codes are an error under
    /// the strict policy and are skipped otherwise.
    fn decode_code<T>(&self, code: i32) -> Result<Option<T>>
    where
        T: TryFrom<i32, Error = MonitorError>,
    {
        match T::try_from(code) {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.policy == StateCodePolicy::Permissive => {
                warn!("Ignoring event: {}", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies one adapter event to the device lists.
    pub async fn handle_event(&self, event: AdapterEvent) -> Result<()> {
        debug!("Handling {:?}", event);
        match event {
            AdapterEvent::ProfileStateChanged(raw) => self.on_profile_state_changed(&raw).await,
            AdapterEvent::DeviceFound { device_id } => {
                self.on_device_found(canonical_device_id(&device_id)).await
            }
            AdapterEvent::DeviceLost { device_id } => {
                self.on_device_lost(&canonical_device_id(&device_id)).await;
                Ok(())
            }
            AdapterEvent::BondStateChanged { device_id, state } => {
                let device_id = canonical_device_id(&device_id);
                match self.decode_code::<BondState>(state)? {
                    Some(BondState::Bonded) => self.on_bonded(device_id).await,
                    Some(BondState::Invalid) => {
                        self.on_unbonded(&device_id).await;
                        Ok(())
                    }
                    Some(BondState::Bonding) => {
                        info!("Pairing with {} in progress.", device_id);
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
            AdapterEvent::PinRequired { device_id, pin_code } => {
                self.on_pin_required(canonical_device_id(&device_id), pin_code).await
            }
            AdapterEvent::AdapterStateChanged { state } => {
                match self.decode_code::<AdapterPowerState>(state)? {
                    Some(AdapterPowerState::Off | AdapterPowerState::TurningOff) => {
                        self.on_adapter_off().await
                    }
                    Some(AdapterPowerState::On) => self.load_paired_devices().await,
                    Some(other) => {
                        debug!("Adapter state is now {:?}.", other);
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
            AdapterEvent::DiscoveryFinished => {
                self.on_discovery_finished().await;
                Ok(())
            }
        }
    }

    async fn on_profile_state_changed(&self, raw: &RawProfileStateChange) -> Result<()> {
        let update = raw.decode(self.policy)?;
        let mut registry = self.registry.lock().await;
        match registry.device_mut(&update.device_id) {
            Some(device) => {
                device.apply_profile_update(&update);
                debug!(
                    "{} is {} after {} went {}",
                    update.device_id,
                    device.connection_state(),
                    update.profile_id,
                    update.connection_state
                );
            }
            None => {
                debug!("Profile update for unknown device {}", update.device_id);
                return Ok(());
            }
        }
        self.publish(&registry);
        Ok(())
    }

    async fn on_device_found(&self, device_id: String) -> Result<()> {
        if self.registry.lock().await.contains(&device_id) {
            return Ok(());
        }

        let name = self.query_name(&device_id).await;
        let mut registry = self.registry.lock().await;
        if registry.contains(&device_id) {
            return Ok(());
        }
        info!("Found device {} ({:?})", device_id, name);
        registry
            .available
            .insert(device_id.clone(), BluetoothDevice::new(device_id, name));
        self.publish(&registry);
        Ok(())
    }

    async fn on_device_lost(&self, device_id: &str) {
        let mut registry = self.registry.lock().await;
        if registry.available.remove(device_id).is_some() {
            info!("Device {} is no longer available.", device_id);
            self.publish(&registry);
        }
    }

    async fn on_bonded(&self, device_id: String) -> Result<()> {
        let known_name = {
            let registry = self.registry.lock().await;
            registry
                .available
                .get(&device_id)
                .or_else(|| registry.paired.get(&device_id))
                .map(|device| device.name().map(str::to_string))
        };
        let name = match known_name {
            Some(name) => name,
            None => self.query_name(&device_id).await,
        };
        let profiles = self.initial_profiles(&device_id).await?;

        let mut registry = self.registry.lock().await;
        let mut device = registry
            .available
            .remove(&device_id)
            .or_else(|| registry.paired.remove(&device_id))
            .unwrap_or_else(|| BluetoothDevice::new(device_id.clone(), name));
        device.load_initial_profiles(profiles);
        info!("Paired with {}, now {}.", device_id, device.connection_state());
        registry.paired.insert(device_id.clone(), device);
        registry.clear_pending_pairing(&device_id);
        self.publish(&registry);
        Ok(())
    }

    async fn on_unbonded(&self, device_id: &str) {
        let mut registry = self.registry.lock().await;
        if registry.paired.remove(device_id).is_some() {
            info!("Device {} is no longer paired.", device_id);
        } else {
            info!("Pairing with {} did not complete.", device_id);
        }
        registry.clear_pending_pairing(device_id);
        self.publish(&registry);
    }

    async fn on_pin_required(&self, device_id: String, pin_code: String) -> Result<()> {
        if self.auto_confirm_pairing {
            info!("Confirming pairing with {} automatically.", device_id);
            return self.adapter.set_pairing_confirmation(&device_id, true).await;
        }

        let mut registry = self.registry.lock().await;
        info!("Pairing with {} waits for confirmation.", device_id);
        registry.pending_pairing = Some(PairingRequest { device_id, pin_code });
        self.publish(&registry);
        Ok(())
    }

    async fn on_adapter_off(&self) -> Result<()> {
        self.scanner.lock().await.stop().await?;
        let mut registry = self.registry.lock().await;
        registry.available.clear();
        registry.discovering = false;
        registry.pending_pairing = None;
        info!("Adapter is off, cleared available devices.");
        self.publish(&registry);
        Ok(())
    }

    async fn on_discovery_finished(&self) {
        if self.scanner.lock().await.is_running() {
            debug!("Stale discovery-finished event ignored.");
            return;
        }
        let mut registry = self.registry.lock().await;
        if registry.discovering {
            registry.discovering = false;
            info!("Discovery finished with {} available device(s).", registry.available.len());
            self.publish(&registry);
        }
    }

    /// Starts a timed discovery session with a fresh available list.
    pub async fn start_discovery(&self) -> Result<()> {
        // flag first, a zero-length session may finish before start returns
        {
            let mut registry = self.registry.lock().await;
            registry.available.clear();
            registry.discovering = true;
            self.publish(&registry);
        }

        if let Err(e) = self.scanner.lock().await.start(self.discovery_duration).await {
            let mut registry = self.registry.lock().await;
            registry.discovering = false;
            self.publish(&registry);
            return Err(e);
        }
        Ok(())
    }

    pub async fn stop_discovery(&self) -> Result<()> {
        self.scanner.lock().await.stop().await?;
        let mut registry = self.registry.lock().await;
        registry.discovering = false;
        self.publish(&registry);
        Ok(())
    }

    /// Starts pairing with an available device.
    pub async fn pair_device(&self, device_id: &str) -> Result<()> {
        let device_id = canonical_device_id(device_id);
        if !self.registry.lock().await.available.contains_key(&device_id) {
            return Err(MonitorError::DeviceNotFound(device_id).into());
        }
        info!("Pairing with {}", device_id);
        self.adapter.pair_device(&device_id).await
    }

    /// Answers a pending PIN request.
    pub async fn confirm_pairing(&self, device_id: &str, accept: bool) -> Result<()> {
        let device_id = canonical_device_id(device_id);
        self.adapter.set_pairing_confirmation(&device_id, accept).await?;
        let mut registry = self.registry.lock().await;
        registry.clear_pending_pairing(&device_id);
        self.publish(&registry);
        Ok(())
    }

    /// Asks the adapter to forget a paired device. The device leaves the
    /// paired list when the adapter reports the bond is gone.
    pub async fn unpair_device(&self, device_id: &str) -> Result<()> {
        let device_id = canonical_device_id(device_id);
        if !self.registry.lock().await.paired.contains_key(&device_id) {
            return Err(MonitorError::DeviceNotFound(device_id).into());
        }
        info!("Unpairing {}", device_id);
        self.adapter.cancel_paired_device(&device_id).await
    }

    /// Connects every supported profile of a paired device that is not up yet.
    pub async fn connect_device(&self, device_id: &str) -> Result<()> {
        let device_id = canonical_device_id(device_id);
        let profiles: Vec<(ProfileId, ConnectionState)> = {
            let registry = self.registry.lock().await;
            let device = registry
                .paired
                .get(&device_id)
                .ok_or_else(|| MonitorError::DeviceNotFound(device_id.clone()))?;
            self.adapter
                .supported_profiles()
                .into_iter()
                .map(|profile_id| {
                    let state = device.profile_state(profile_id).unwrap_or_default();
                    (profile_id, state)
                })
                .collect()
        };
        self.connection_manager.connect(&device_id, &profiles).await
    }

    /// Disconnects every profile of a paired device that is up or coming up.
    pub async fn disconnect_device(&self, device_id: &str) -> Result<()> {
        let device_id = canonical_device_id(device_id);
        let mut profiles: Vec<(ProfileId, ConnectionState)> = {
            let registry = self.registry.lock().await;
            let device = registry
                .paired
                .get(&device_id)
                .ok_or_else(|| MonitorError::DeviceNotFound(device_id.clone()))?;
            device
                .profiles()
                .iter()
                .map(|(profile_id, state)| (*profile_id, *state))
                .collect()
        };
        profiles.sort_by_key(|(profile_id, _)| *profile_id);
        self.connection_manager.disconnect(&device_id, &profiles).await
    }
}
