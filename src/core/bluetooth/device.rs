//! Bluetooth device representation and per-profile state aggregation

use std::collections::HashMap;

use log::trace;

use crate::core::bluetooth::types::{ConnectionState, DeviceSnapshot, ProfileId, ProfileRecord};

/// A decoded profile connection-state change for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStateUpdate {
    pub device_id: String,
    pub profile_id: ProfileId,
    pub connection_state: ConnectionState,
}

impl ProfileStateUpdate {
    pub fn new(
        device_id: impl Into<String>,
        profile_id: ProfileId,
        connection_state: ConnectionState,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            profile_id,
            connection_state,
        }
    }
}

/// Derives a device state from its profile states.
///
/// Any connected or disconnecting profile makes the device connected. Failing
/// that, any connecting profile makes it connecting. Otherwise it is
/// disconnected, which includes having no profiles at all.
pub fn aggregate_connection_state<'a, I>(states: I) -> ConnectionState
where
    I: IntoIterator<Item = &'a ConnectionState>,
{
    let mut counts = [0usize; 4];
    for state in states {
        counts[state.code() as usize] += 1;
    }

    let connected = counts[ConnectionState::Connected.code() as usize];
    let disconnecting = counts[ConnectionState::Disconnecting.code() as usize];
    let connecting = counts[ConnectionState::Connecting.code() as usize];

    if connected > 0 || disconnecting > 0 {
        ConnectionState::Connected
    } else if connecting > 0 {
        ConnectionState::Connecting
    } else {
        ConnectionState::Disconnected
    }
}

/// A remote device and the connection state of each of its profiles.
#[derive(Debug, Clone)]
pub struct BluetoothDevice {
    device_id: String,
    name: Option<String>,
    profiles: HashMap<ProfileId, ConnectionState>,
    /// Always `aggregate_connection_state(profiles.values())`.
    connection_state: ConnectionState,
}

impl BluetoothDevice {
    /// Creates a device with no known profiles.
    pub fn new(device_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name,
            profiles: HashMap::new(),
            connection_state: ConnectionState::Disconnected,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn profile_state(&self, profile_id: ProfileId) -> Option<ConnectionState> {
        self.profiles.get(&profile_id).copied()
    }

    pub fn profiles(&self) -> &HashMap<ProfileId, ConnectionState> {
        &self.profiles
    }

    /// Records a profile state change and recomputes the device state.
    ///
    /// Updates addressed to another device are ignored.
    pub fn apply_profile_update(&mut self, update: &ProfileStateUpdate) {
        if update.device_id != self.device_id {
            trace!(
                "Ignoring {} update for {} on device {}",
                update.profile_id, update.device_id, self.device_id
            );
            return;
        }
        self.upsert(update.profile_id, update.connection_state);
    }

    /// Loads the profile states reported when the device was first seen.
    pub fn load_initial_profiles<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (ProfileId, ConnectionState)>,
    {
        for (profile_id, connection_state) in records {
            self.upsert(profile_id, connection_state);
        }
    }

    fn upsert(&mut self, profile_id: ProfileId, connection_state: ConnectionState) {
        self.profiles.insert(profile_id, connection_state);
        let previous = self.connection_state;
        self.connection_state = aggregate_connection_state(self.profiles.values());
        if previous != self.connection_state {
            trace!(
                "Device {} went {} -> {} ({} = {})",
                self.device_id, previous, self.connection_state, profile_id, connection_state
            );
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let mut profiles: Vec<ProfileRecord> = self
            .profiles
            .iter()
            .map(|(profile_id, connection_state)| ProfileRecord {
                profile_id: *profile_id,
                connection_state: *connection_state,
            })
            .collect();
        profiles.sort_by_key(|record| record.profile_id);

        DeviceSnapshot {
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            connection_state: self.connection_state,
            profiles,
        }
    }
}
