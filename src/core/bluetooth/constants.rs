//! Constants used throughout the application
//! Default timings and limits for discovery and connection handling.

/// Maximum number of attempts per profile connect request
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Delay between connection retries in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;

/// Discovery duration in seconds
pub const DEFAULT_DISCOVERY_DURATION_SECS: u64 = 10;
