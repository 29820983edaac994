//! Error types for the device monitor.

use thiserror::Error;

/// Errors raised by the monitor itself, as opposed to failures reported by
/// the platform adapter (those travel as `anyhow::Error`).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A profile connection state code outside 0..=3.
    #[error("unknown profile connection state code: {0}")]
    UnknownConnectionState(i32),

    /// A bond state code outside 0..=2.
    #[error("unknown bond state code: {0}")]
    UnknownBondState(i32),

    /// An adapter power state code outside 0..=6.
    #[error("unknown adapter state code: {0}")]
    UnknownAdapterState(i32),

    /// The device is not in the list the operation requires.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// No profile accepted a connect request.
    #[error("failed to connect {device_id} after {attempts} attempts")]
    ConnectFailed { device_id: String, attempts: u32 },
}
