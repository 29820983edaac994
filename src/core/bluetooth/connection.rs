//! Profile connection handling
//! Issues connect and disconnect requests for a device's profiles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use crate::core::bluetooth::adapter::BluetoothAdapter;
use crate::core::bluetooth::types::{ConnectionState, ProfileId};
use crate::error::MonitorError;

/// Connection manager for remote devices
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Arc<dyn BluetoothAdapter>,
    max_retries: u32,
    retry_delay: u64,
}

impl ConnectionManager {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>, max_retries: u32, retry_delay: u64) -> Self {
        Self {
            adapter,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Requests a connection on every profile that is not already up.
    ///
    /// The adapter reports the resulting state changes as events. Succeeds if
    /// at least one profile accepted the request.
    pub async fn connect(
        &self,
        device_id: &str,
        profiles: &[(ProfileId, ConnectionState)],
    ) -> Result<()> {
        let pending: Vec<ProfileId> = profiles
            .iter()
            .filter(|(_, state)| !state.is_active())
            .map(|(profile_id, _)| *profile_id)
            .collect();

        if pending.is_empty() {
            info!("Device {} has no profile left to connect.", device_id);
            return Ok(());
        }

        let mut accepted = 0;
        for profile_id in pending {
            match self.connect_with_retry(profile_id, device_id).await {
                Ok(()) => accepted += 1,
                Err(e) => warn!("Giving up on {} for {}: {}", profile_id, device_id, e),
            }
        }

        if accepted == 0 {
            return Err(MonitorError::ConnectFailed {
                device_id: device_id.to_string(),
                attempts: self.max_retries,
            }
            .into());
        }
        info!("Connect requested on {} profile(s) of {}.", accepted, device_id);
        Ok(())
    }

    async fn connect_with_retry(&self, profile_id: ProfileId, device_id: &str) -> Result<()> {
        let mut retry_count = 0;
        loop {
            match self.adapter.connect_profile(profile_id, device_id).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retry_count += 1;
                    warn!(
                        "Connect attempt {} of {} on {} failed: {}",
                        retry_count, profile_id, device_id, e
                    );
                    if retry_count >= self.max_retries {
                        return Err(e);
                    }
                    info!("Retrying connection in {} ms...", self.retry_delay);
                    tokio::time::sleep(Duration::from_millis(self.retry_delay)).await;
                }
            }
        }
    }

    /// Requests a disconnect on every profile that is connected or connecting.
    pub async fn disconnect(
        &self,
        device_id: &str,
        profiles: &[(ProfileId, ConnectionState)],
    ) -> Result<()> {
        for (profile_id, state) in profiles {
            if !state.is_active() {
                continue;
            }
            info!("Disconnecting {} from {}", profile_id, device_id);
            self.adapter.disconnect_profile(*profile_id, device_id).await?;
        }
        Ok(())
    }
}
