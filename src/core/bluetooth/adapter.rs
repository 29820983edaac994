//! The boundary to the platform Bluetooth stack.
//!
//! Implementations are constructed by the caller and injected into the
//! [`BluetoothManager`](crate::core::bluetooth::BluetoothManager); events flow back
//! through the manager's event channel.

use anyhow::Result;

use crate::core::bluetooth::events::RawProfileRecord;
use crate::core::bluetooth::types::ProfileId;

/// Profiles queried when a device is first loaded.
pub const DEFAULT_PROFILES: [ProfileId; 2] =
    [ProfileId::A2DP_SOURCE, ProfileId::HANDS_FREE_AUDIO_GATEWAY];

/// Bluetooth stack operations
#[async_trait::async_trait]
pub trait BluetoothAdapter: Send + Sync {
    /// Ids of the devices paired with this host.
    async fn paired_devices(&self) -> Result<Vec<String>>;

    /// Human readable name of a remote device, if it has one.
    async fn remote_device_name(&self, device_id: &str) -> Result<Option<String>>;

    fn supported_profiles(&self) -> Vec<ProfileId> {
        DEFAULT_PROFILES.to_vec()
    }

    /// Raw connection state code of one profile for one device.
    async fn profile_device_state(&self, profile_id: ProfileId, device_id: &str) -> Result<i32>;

    /// Current state of every supported profile of a device.
    async fn device_profile_states(&self, device_id: &str) -> Result<Vec<RawProfileRecord>> {
        let mut records = Vec::new();
        for profile_id in self.supported_profiles() {
            let connection_state = self.profile_device_state(profile_id, device_id).await?;
            records.push(RawProfileRecord {
                profile_id: profile_id.0,
                connection_state,
            });
        }
        Ok(records)
    }

    async fn start_discovery(&self) -> Result<()>;

    async fn stop_discovery(&self) -> Result<()>;

    async fn pair_device(&self, device_id: &str) -> Result<()>;

    async fn cancel_paired_device(&self, device_id: &str) -> Result<()>;

    async fn set_pairing_confirmation(&self, device_id: &str, accept: bool) -> Result<()>;

    async fn connect_profile(&self, profile_id: ProfileId, device_id: &str) -> Result<()>;

    async fn disconnect_profile(&self, profile_id: ProfileId, device_id: &str) -> Result<()>;
}
