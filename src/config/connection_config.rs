use serde::{Deserialize, Serialize};

use crate::core::bluetooth::{CONNECT_RETRY_DELAY_MS, MAX_CONNECT_RETRIES};

/// Profile connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Attempts per profile before a connect request is abandoned.
    pub max_retries: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            max_retries: MAX_CONNECT_RETRIES,
            retry_delay_ms: CONNECT_RETRY_DELAY_MS,
        }
    }
}

/// Pairing settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Accept PIN requests without asking.
    pub auto_confirm: bool,
}
