//! Core functionality for the device monitor
//! This module contains the device model and everything that talks to the adapter

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BluetoothAdapter, BluetoothDevice, BluetoothManager, ConnectionState};
