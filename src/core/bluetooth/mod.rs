//! Bluetooth functionality for the device monitor
//! This module tracks remote devices and their profile connection states,
//! driven by events from an injected platform adapter.

mod adapter;
mod connection;
mod constants;
mod device;
mod events;
mod manager;
mod scanner;
mod scripted;
mod types;

// Re-export types that should be publicly accessible
pub use adapter::{BluetoothAdapter, DEFAULT_PROFILES};
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use device::{BluetoothDevice, ProfileStateUpdate, aggregate_connection_state};
pub use events::{AdapterEvent, RawProfileRecord, RawProfileStateChange};
pub use manager::BluetoothManager;
pub use scanner::DiscoveryScanner;
pub use scripted::{AdapterCall, Script, ScriptedAdapter, ScriptedDevice};
pub use types::{
    AdapterPowerState, BondState, ConnectionState, DeviceListSnapshot, DeviceSnapshot,
    PairingRequest, ProfileId, ProfileRecord, StateCodePolicy,
};
