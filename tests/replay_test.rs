//! Replays recorded sessions the way the `replay` command does.

use std::path::PathBuf;

use bt_device_monitor_lib::commands;
use bt_device_monitor_lib::config::AppConfig;
use bt_device_monitor_lib::core::bluetooth::ConnectionState;

const HEADSET: &str = "00:1A:7D:DA:71:13";
const CAR_KIT: &str = "10:20:30:40:50:60";
const SPEAKER: &str = "AA:BB:CC:DD:EE:FF";

fn demo_session() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("session.json")
}

#[tokio::test]
async fn replay_prints_the_final_lists() {
    let snapshots = commands::replay(&AppConfig::default(), &demo_session(), false)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);

    let last = &snapshots[0];
    assert_eq!(
        last.paired_device(CAR_KIT).unwrap().connection_state,
        ConnectionState::Connected
    );
    assert_eq!(
        last.paired_device(HEADSET).unwrap().connection_state,
        ConnectionState::Disconnected
    );
    assert_eq!(last.available_device(SPEAKER).unwrap().name.as_deref(), Some("Speaker"));
    assert_eq!(last.pending_pairing.as_ref().unwrap().pin_code, "482913");
}

#[tokio::test]
async fn replay_each_follows_every_event() {
    let snapshots = commands::replay(&AppConfig::default(), &demo_session(), true)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 6);

    let car_kit: Vec<ConnectionState> = snapshots
        .iter()
        .map(|s| s.paired_device(CAR_KIT).unwrap().connection_state)
        .collect();
    assert_eq!(car_kit[0], ConnectionState::Connecting);
    assert_eq!(car_kit[1], ConnectionState::Connected);

    // disconnecting still counts as connected
    assert_eq!(
        snapshots[3].paired_device(HEADSET).unwrap().connection_state,
        ConnectionState::Connected
    );
    assert_eq!(
        snapshots[4].paired_device(HEADSET).unwrap().connection_state,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn strict_replay_skips_unknown_codes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(
        &path,
        format!(
            r#"{{
                "devices": [{{"deviceId": "{HEADSET}", "paired": true}}],
                "events": [
                    {{"type": "profile_state_changed", "profileId": 1, "deviceId": "{HEADSET}", "connectionState": 2}},
                    {{"type": "profile_state_changed", "profileId": 1, "deviceId": "{HEADSET}", "connectionState": 42}}
                ]
            }}"#
        ),
    )
    .unwrap();

    let mut config = AppConfig::default();
    let permissive = commands::replay(&config, &path, false).await.unwrap();
    assert_eq!(
        permissive[0].paired_device(HEADSET).unwrap().connection_state,
        ConnectionState::Disconnected
    );

    config.state_code_policy = bt_device_monitor_lib::core::bluetooth::StateCodePolicy::Strict;
    let strict = commands::replay(&config, &path, false).await.unwrap();
    assert_eq!(
        strict[0].paired_device(HEADSET).unwrap().connection_state,
        ConnectionState::Connected
    );
}

#[tokio::test]
async fn script_ids_match_in_any_mac_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(
        &path,
        r#"{
            "devices": [
                {"deviceId": "aa:bb:cc:dd:ee:ff", "name": "Speaker", "paired": true,
                 "profiles": [{"profileId": 4, "connectionState": 2}]},
                {"deviceId": "10-20-30-40-50-60", "name": "Car kit", "paired": true}
            ],
            "events": [
                {"type": "profile_state_changed", "profileId": 1, "deviceId": "10:20:30:40:50:60", "connectionState": 1}
            ]
        }"#,
    )
    .unwrap();

    let snapshots = commands::replay(&AppConfig::default(), &path, false).await.unwrap();
    let last = &snapshots[0];

    let speaker = last.paired_device(SPEAKER).unwrap();
    assert_eq!(speaker.name.as_deref(), Some("Speaker"));
    assert_eq!(speaker.connection_state, ConnectionState::Connected);

    let car_kit = last.paired_device(CAR_KIT).unwrap();
    assert_eq!(car_kit.name.as_deref(), Some("Car kit"));
    assert_eq!(car_kit.connection_state, ConnectionState::Connecting);
}

#[tokio::test]
async fn missing_script_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = commands::replay(&AppConfig::default(), &dir.path().join("absent.json"), false).await;
    assert!(result.is_err());
}
