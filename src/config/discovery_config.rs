use serde::{Deserialize, Serialize};

use crate::core::bluetooth::DEFAULT_DISCOVERY_DURATION_SECS;

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long a discovery session runs before the adapter is told to stop.
    pub duration_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            duration_secs: DEFAULT_DISCOVERY_DURATION_SECS,
        }
    }
}
