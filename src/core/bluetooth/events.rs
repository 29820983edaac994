//! Events delivered by the adapter over the shared callback channel.
//!
//! State fields keep the adapter's integer codes; they are decoded by the
//! manager under the configured [`StateCodePolicy`].

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::device::ProfileStateUpdate;
use crate::core::bluetooth::types::{ProfileId, StateCodePolicy};
use crate::error::MonitorError;
use crate::utils::canonical_device_id;

/// A profile connection-state change as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfileStateChange {
    pub profile_id: i32,
    pub device_id: String,
    pub connection_state: i32,
}

impl RawProfileStateChange {
    pub fn new(profile_id: ProfileId, device_id: impl Into<String>, connection_state: i32) -> Self {
        Self {
            profile_id: profile_id.0,
            device_id: device_id.into(),
            connection_state,
        }
    }

    pub fn decode(&self, policy: StateCodePolicy) -> Result<ProfileStateUpdate, MonitorError> {
        let connection_state = policy.decode_connection_state(self.connection_state)?;
        Ok(ProfileStateUpdate::new(
            canonical_device_id(&self.device_id),
            ProfileId(self.profile_id),
            connection_state,
        ))
    }
}

/// One profile's state as returned by a device state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfileRecord {
    pub profile_id: i32,
    pub connection_state: i32,
}

/// Everything the adapter can tell the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AdapterEvent {
    ProfileStateChanged(RawProfileStateChange),
    DeviceFound { device_id: String },
    DeviceLost { device_id: String },
    BondStateChanged { device_id: String, state: i32 },
    PinRequired { device_id: String, pin_code: String },
    AdapterStateChanged { state: i32 },
    DiscoveryFinished,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::ConnectionState;

    #[test]
    fn parses_wire_shape() {
        let json = r#"{"type":"profile_state_changed","profileId":4,"deviceId":"aa-bb-cc-dd-ee-ff","connectionState":2}"#;
        let event: AdapterEvent = serde_json::from_str(json).unwrap();
        let AdapterEvent::ProfileStateChanged(raw) = event else {
            panic!("expected a profile change, got {:?}", event);
        };
        let update = raw.decode(StateCodePolicy::Strict).unwrap();
        assert_eq!(update.device_id, "AA:BB:CC:DD:EE:FF");
        assert_eq!(update.profile_id, ProfileId::HANDS_FREE_AUDIO_GATEWAY);
        assert_eq!(update.connection_state, ConnectionState::Connected);
    }

    #[test]
    fn parses_struct_and_unit_variants() {
        let found: AdapterEvent =
            serde_json::from_str(r#"{"type":"pin_required","deviceId":"X","pinCode":"0000"}"#).unwrap();
        assert_eq!(
            found,
            AdapterEvent::PinRequired {
                device_id: "X".to_string(),
                pin_code: "0000".to_string()
            }
        );
        let done: AdapterEvent = serde_json::from_str(r#"{"type":"discovery_finished"}"#).unwrap();
        assert_eq!(done, AdapterEvent::DiscoveryFinished);
    }

    #[test]
    fn strict_decode_rejects_unknown_state() {
        let raw = RawProfileStateChange::new(ProfileId::A2DP_SOURCE, "dev", 9);
        assert_eq!(
            raw.decode(StateCodePolicy::Strict),
            Err(MonitorError::UnknownConnectionState(9))
        );
        let update = raw.decode(StateCodePolicy::Permissive).unwrap();
        assert_eq!(update.connection_state, ConnectionState::Disconnected);
    }
}
