//! Bluetooth device monitor library
//! Aggregates per-profile connection events into one connection state per
//! device and publishes the device lists to a presentation layer.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use error::MonitorError;
