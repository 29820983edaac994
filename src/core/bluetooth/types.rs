//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Connection state of a single profile, and the derived state of a device.
///
/// Integer codes match the platform binding: 0 disconnected, 1 connecting,
/// 2 connected, 3 disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 4] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Connected,
        ConnectionState::Disconnecting,
    ];

    /// The platform integer code for this state.
    pub fn code(self) -> i32 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Disconnecting => 3,
        }
    }

    /// Connected or on its way there.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connected | Self::Connecting)
    }
}

impl TryFrom<i32> for ConnectionState {
    type Error = MonitorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Disconnected),
            1 => Ok(Self::Connecting),
            2 => Ok(Self::Connected),
            3 => Ok(Self::Disconnecting),
            other => Err(MonitorError::UnknownConnectionState(other)),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// Identifier of a communication profile.
///
/// Values outside the known profiles are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub i32);

impl ProfileId {
    pub const A2DP_SOURCE: ProfileId = ProfileId(1);
    pub const HANDS_FREE_AUDIO_GATEWAY: ProfileId = ProfileId(4);

    pub fn name(self) -> &'static str {
        match self {
            Self::A2DP_SOURCE => "a2dp-source",
            Self::HANDS_FREE_AUDIO_GATEWAY => "hands-free-audio-gateway",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Pairing state of a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondState {
    Invalid,
    Bonding,
    Bonded,
}

impl TryFrom<i32> for BondState {
    type Error = MonitorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Invalid),
            1 => Ok(Self::Bonding),
            2 => Ok(Self::Bonded),
            other => Err(MonitorError::UnknownBondState(other)),
        }
    }
}

/// Power state of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterPowerState {
    Off,
    TurningOn,
    On,
    TurningOff,
    BleTurningOn,
    BleOn,
    BleTurningOff,
}

impl TryFrom<i32> for AdapterPowerState {
    type Error = MonitorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::TurningOn),
            2 => Ok(Self::On),
            3 => Ok(Self::TurningOff),
            4 => Ok(Self::BleTurningOn),
            5 => Ok(Self::BleOn),
            6 => Ok(Self::BleTurningOff),
            other => Err(MonitorError::UnknownAdapterState(other)),
        }
    }
}

/// How integer state codes outside the known range are handled when events
/// are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCodePolicy {
    /// Unknown connection states count as disconnected.
    #[default]
    Permissive,
    /// Unknown connection states reject the event.
    Strict,
}

impl StateCodePolicy {
    pub fn decode_connection_state(self, code: i32) -> Result<ConnectionState, MonitorError> {
        match ConnectionState::try_from(code) {
            Ok(state) => Ok(state),
            Err(e) if self == Self::Permissive => {
                warn!("{}, treating it as disconnected", e);
                Ok(ConnectionState::Disconnected)
            }
            Err(e) => Err(e),
        }
    }
}

/// A single profile record as exposed in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_id: ProfileId,
    pub connection_state: ConnectionState,
}

/// Read-only view of a device for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub name: Option<String>,
    pub connection_state: ConnectionState,
    /// Sorted by profile id.
    pub profiles: Vec<ProfileRecord>,
}

/// A pairing request waiting for user confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
    pub device_id: String,
    pub pin_code: String,
}

/// Everything the presentation layer renders, published after each change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceListSnapshot {
    /// Sorted by device id.
    pub paired: Vec<DeviceSnapshot>,
    /// Sorted by device id.
    pub available: Vec<DeviceSnapshot>,
    pub discovering: bool,
    pub pending_pairing: Option<PairingRequest>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceListSnapshot {
    pub fn empty() -> Self {
        Self {
            paired: Vec::new(),
            available: Vec::new(),
            discovering: false,
            pending_pairing: None,
            updated_at: Utc::now(),
        }
    }

    pub fn paired_device(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.paired.iter().find(|d| d.device_id == device_id)
    }

    pub fn available_device(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.available.iter().find(|d| d.device_id == device_id)
    }
}
