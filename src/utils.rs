use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use log::{error, info};
use regex::Regex;
use tokio::fs;

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("MAC address pattern is valid")
});

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Normalizes MAC-address device ids to `AA:BB:CC:DD:EE:FF`.
/// Other ids are returned unchanged.
pub fn canonical_device_id(device_id: &str) -> String {
    if MAC_ADDRESS.is_match(device_id) {
        device_id.replace('-', ":").to_uppercase()
    } else {
        device_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_mac_addresses() {
        assert_eq!(canonical_device_id("00:1a:7d:da:71:13"), "00:1A:7D:DA:71:13");
        assert_eq!(canonical_device_id("00-1A-7D-DA-71-13"), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn leaves_other_ids_alone() {
        assert_eq!(canonical_device_id("hci0/dev_1"), "hci0/dev_1");
        assert_eq!(canonical_device_id("00:1a:7d:da:71"), "00:1a:7d:da:71");
    }

    #[tokio::test]
    async fn creates_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        ensure_directory_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_directory_exists(&nested).await.unwrap();
    }
}
