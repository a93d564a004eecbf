use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::connection::DeviceNotification;
use crate::net::CertificateVariant;
use crate::testing::{
    AttemptOutcome, MockLink, MockTransport, RecordingSink, create_test_device,
    write_certificates,
};
use crate::types::{AccessPoint, PlaybackStatus};

const WAIT: Duration = Duration::from_secs(1);

struct Fixture {
    _certificates: tempfile::TempDir,
    link: Arc<MockLink>,
    transport: Arc<MockTransport>,
    sink: Arc<RecordingSink>,
    session: Arc<SessionController>,
}

fn device(id: &str) -> CastDevice {
    create_test_device(id, "Living Room", "192.168.1.20".parse().unwrap(), 4433)
}

async fn fixture_with(link: MockLink) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = CastConfig::builder()
        .certificates(write_certificates(dir.path()).unwrap())
        .build();

    let link = Arc::new(link);
    let transport = Arc::new(MockTransport::new(link.clone()));
    let registry = Arc::new(DeviceRegistry::new());
    registry.insert(device("dev-1")).await;
    let sink = Arc::new(RecordingSink::new());
    let session = Arc::new(SessionController::new(
        &config,
        transport.clone(),
        registry,
        sink.clone(),
    ));

    Fixture {
        _certificates: dir,
        link,
        transport,
        sink,
        session,
    }
}

async fn fixture() -> Fixture {
    fixture_with(MockLink::new()).await
}

async fn connected() -> Fixture {
    let f = fixture().await;
    f.session
        .connect_to_device("dev-1", "receiver")
        .await
        .unwrap();
    f
}

fn status(state: PlayerState) -> PlaybackStatus {
    PlaybackStatus {
        duration: 100.0,
        position: 10.0,
        volume: 0.42,
        muted: false,
        state,
    }
}

async fn connected_in_state(state: PlayerState) -> Fixture {
    let f = connected().await;
    f.link.set_status(status(state));
    f.session.update_playback_status().await.unwrap();
    f
}

// ===== Selection =====

#[tokio::test]
async fn test_pair_unknown_device() {
    let f = fixture().await;

    assert!(f.session.pair_device("dev-9").await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::Pairing]);
    assert_eq!(f.session.generation().await, 0);
    assert!(f.session.selected_device().await.is_none());
    assert_eq!(f.transport.attempts(), 0);
}

#[tokio::test]
async fn test_connect_unknown_device() {
    let f = fixture().await;

    assert!(f.session.connect_to_device("dev-9", "receiver").await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::ConnectFailed]);
    assert!(f.session.selected_device().await.is_none());
    assert!(f.session.application_name().await.is_none());
}

#[tokio::test]
async fn test_connect_launches_application() {
    let f = connected().await;

    assert_eq!(f.sink.names(), vec!["DEVICE_CONNECTED"]);
    assert_eq!(f.link.calls(), vec!["start_application:receiver"]);
    assert_eq!(f.session.connection_state().await, ConnectionState::Connected);
    assert_eq!(f.session.application_name().await.as_deref(), Some("receiver"));
    assert_eq!(
        f.session.registry().get("dev-1").await.unwrap().state,
        ConnectionState::Connected
    );

    let payload = f.sink.events()[0].payload();
    assert_eq!(payload["id"], "dev-1");
    assert_eq!(payload["ipAddress"], "192.168.1.20");
}

#[tokio::test]
async fn test_connect_falls_back_to_legacy_certificate() {
    let f = fixture().await;
    f.transport
        .set_outcome(CertificateVariant::Primary, AttemptOutcome::Reject);

    f.session
        .connect_to_device("dev-1", "receiver")
        .await
        .unwrap();

    assert_eq!(f.transport.attempts(), 2);
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 1);
    assert_eq!(
        f.session.negotiation_state().await,
        NegotiationState::Connected(CertificateVariant::Fallback)
    );
}

#[tokio::test]
async fn test_connect_fails_with_both_certificates() {
    let f = fixture().await;
    f.transport
        .set_outcome(CertificateVariant::Primary, AttemptOutcome::Reject);
    f.transport
        .set_outcome(CertificateVariant::Fallback, AttemptOutcome::Reject);

    assert!(f.session.connect_to_device("dev-1", "receiver").await.is_err());

    assert_eq!(f.transport.attempts(), 2);
    assert_eq!(f.sink.errors(), vec![ErrorCode::ConnectFailed]);
    assert_eq!(
        f.session.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn test_launch_failure_closes_link() {
    let f = fixture().await;
    f.link.fail("start_application");

    assert!(f.session.connect_to_device("dev-1", "receiver").await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::ConnectFailed]);
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 0);
    assert_eq!(f.link.call_count("disconnect"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_connect_is_discarded() {
    let f = fixture().await;
    f.session.registry().insert(device("dev-2")).await;
    f.transport
        .set_outcome(CertificateVariant::Primary, AttemptOutcome::Hang);
    f.transport
        .set_outcome(CertificateVariant::Fallback, AttemptOutcome::Reject);

    let first = {
        let session = Arc::clone(&f.session);
        tokio::spawn(async move { session.connect_to_device("dev-1", "receiver").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    f.transport
        .set_outcome(CertificateVariant::Primary, AttemptOutcome::Accept);
    f.session
        .connect_to_device("dev-2", "receiver")
        .await
        .unwrap();

    assert!(first.await.unwrap().is_err());
    assert!(f.sink.errors().is_empty());
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 1);
    assert_eq!(f.session.selected_device().await.unwrap().id, "dev-2");
}

// ===== ensure_connected =====

#[tokio::test]
async fn test_ensure_connected_without_selection() {
    let f = fixture().await;

    assert!(f.session.stop().await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::StopFailed]);
    assert_eq!(f.transport.attempts(), 0);
}

#[tokio::test]
async fn test_ensure_connected_reuses_live_session() {
    let f = connected().await;

    f.session.ensure_connected().await.unwrap();
    f.session.stop().await.unwrap();

    assert_eq!(f.transport.attempts(), 1);
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 1);
}

#[tokio::test]
async fn test_dead_link_reconnects_before_command() {
    let f = connected().await;
    f.link.drop_connection();

    f.session.stop().await.unwrap();

    assert_eq!(f.transport.attempts(), 2);
    assert_eq!(
        f.link.calls(),
        vec![
            "start_application:receiver",
            "disconnect",
            "start_application:receiver",
            "stop"
        ]
    );
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_commands_reconnect_once() {
    let f = connected().await;
    f.link.drop_connection();

    let stop = tokio::spawn({
        let session = Arc::clone(&f.session);
        async move { session.stop().await }
    });
    let mute = tokio::spawn({
        let session = Arc::clone(&f.session);
        async move { session.set_mute(true).await }
    });
    stop.await.unwrap().unwrap();
    mute.await.unwrap().unwrap();

    assert_eq!(f.transport.attempts(), 2);
    assert_eq!(f.link.call_count("start_application"), 2);
    assert_eq!(f.link.call_count("disconnect"), 1);
    assert_eq!(f.link.call_count("stop"), 1);
    assert_eq!(f.link.call_count("set_mute"), 1);
    assert_eq!(f.sink.count("DEVICE_CONNECTED"), 2);
    assert_eq!(
        f.session.connection_state().await,
        ConnectionState::Connected
    );
}

// ===== Media commands =====

#[tokio::test]
async fn test_resume_skipped_unless_paused() {
    let f = connected().await;

    f.session.resume().await.unwrap();

    assert_eq!(f.link.call_count("resume"), 0);
    assert_eq!(f.session.player_state().await, None);
}

#[tokio::test]
async fn test_resume_when_paused() {
    let f = connected_in_state(PlayerState::Paused).await;

    f.session.resume().await.unwrap();

    assert_eq!(f.link.call_count("resume"), 1);
    assert_eq!(f.session.player_state().await, Some(PlayerState::Playing));
}

#[tokio::test]
async fn test_pause_failure_keeps_state() {
    let f = connected_in_state(PlayerState::Playing).await;
    f.link.fail("pause");

    assert!(f.session.pause().await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::PauseFailed]);
    assert_eq!(f.session.player_state().await, Some(PlayerState::Playing));
}

#[tokio::test]
async fn test_seek_resumes_paused_player() {
    let f = connected_in_state(PlayerState::Paused).await;

    f.session.seek(5000).await.unwrap();

    let calls = f.link.calls();
    assert_eq!(&calls[calls.len() - 2..], ["resume", "seek:5"]);
    assert_eq!(f.session.player_state().await, Some(PlayerState::Playing));
}

#[tokio::test]
async fn test_seek_stops_when_resume_fails() {
    let f = connected_in_state(PlayerState::Paused).await;
    f.link.fail("resume");

    assert!(f.session.seek(5000).await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::ResumeFailed]);
    assert_eq!(f.link.call_count("seek"), 0);
    assert_eq!(f.session.player_state().await, Some(PlayerState::Paused));
}

#[tokio::test]
async fn test_seek_while_playing() {
    let f = connected_in_state(PlayerState::Playing).await;

    f.session.seek(61_500).await.unwrap();

    assert_eq!(f.link.call_count("resume"), 0);
    assert_eq!(f.link.calls().last().unwrap(), "seek:61");
}

#[tokio::test]
async fn test_volume_and_mute() {
    let f = connected().await;

    f.session.set_volume(50.0).await.unwrap();
    f.session.set_mute(true).await.unwrap();
    f.session.set_audio_track("fr").await.unwrap();

    assert_eq!(
        &f.link.calls()[1..],
        ["set_volume:0.5", "set_mute:true", "set_track:fr"]
    );
}

#[tokio::test]
async fn test_cast_media() {
    let f = connected().await;
    let params = PrepareParams::from_value(json!({
        "url": "http://media.example/live.m3u8",
        "frequency": 1,
        "title": "Live",
        "subtitle": "News",
        "mediaType": "video",
        "transferMode": "streamed",
        "autoplay": true,
        "options": { "drm": false },
    }))
    .unwrap();

    f.session.cast_media(params).await.unwrap();

    assert_eq!(
        f.link.calls().last().unwrap(),
        "prepare:http://media.example/live.m3u8"
    );
}

#[tokio::test]
async fn test_status_pull_emits_percent_volume() {
    let f = connected_in_state(PlayerState::Paused).await;

    let event = f.sink.events().last().cloned().unwrap();
    assert_eq!(event.name(), "PLAYBACK_STATUS_CHANGED");
    assert_eq!(event.payload()["volume"], 42);
    assert_eq!(event.payload()["state"], 3);
}

#[tokio::test]
async fn test_metadata_pull_failure() {
    let f = connected().await;
    f.link.fail("metadata");

    assert!(f.session.update_metadata().await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::MetadataUpdateFailed]);
}

// ===== Notifications =====

#[tokio::test]
async fn test_status_notification_updates_state() {
    let f = connected().await;

    f.link
        .notify(DeviceNotification::StatusChanged(status(PlayerState::Paused)))
        .await;

    assert!(f.sink.wait_for("PLAYBACK_STATUS_CHANGED", 1, WAIT).await);
    assert_eq!(f.session.player_state().await, Some(PlayerState::Paused));
}

#[tokio::test]
async fn test_channel_failure_reports_device_error() {
    let f = connected().await;

    f.link
        .notify(DeviceNotification::ChannelFailed {
            message: "socket closed".to_string(),
        })
        .await;

    assert!(f.sink.wait_for("ERROR_EVENT", 1, WAIT).await);
    assert_eq!(f.sink.errors(), vec![ErrorCode::DeviceError]);
    assert_eq!(f.link.call_count("disconnect"), 1);
    assert_eq!(
        f.session.connection_state().await,
        ConnectionState::Disconnected
    );
}

// ===== Disconnect =====

#[tokio::test]
async fn test_disconnect() {
    let f = connected().await;
    let generation = f.session.generation().await;

    f.session.disconnect().await.unwrap();

    assert_eq!(f.sink.names(), vec!["DEVICE_CONNECTED", "DEVICE_DISCONNECTED"]);
    assert_eq!(f.link.call_count("disconnect"), 1);
    assert_eq!(f.session.generation().await, generation + 1);
    assert_eq!(
        f.session.registry().get("dev-1").await.unwrap().state,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn test_disconnect_without_selection_is_noop() {
    let f = fixture().await;

    f.session.disconnect().await.unwrap();

    assert!(f.sink.events().is_empty());
}

#[tokio::test]
async fn test_disconnect_failure_is_log_only() {
    let f = connected().await;
    f.link.fail("disconnect");

    assert!(f.session.disconnect().await.is_err());

    assert_eq!(f.sink.names(), vec!["DEVICE_CONNECTED"]);
}

// ===== Pairing =====

#[tokio::test]
async fn test_pair_emits_pin_needed() {
    let f = fixture().await;

    f.session.pair_device("dev-1").await.unwrap();

    assert_eq!(f.sink.names(), vec!["PIN_NEEDED"]);
    let settings = f.link.settings().unwrap();
    assert_eq!(settings.calls(), vec!["version_info"]);
    assert!(f.link.calls().is_empty());
}

#[tokio::test]
async fn test_pair_version_failure() {
    let f = fixture().await;
    f.link.settings().unwrap().fail("version_info");

    assert!(f.session.pair_device("dev-1").await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::Pairing]);
    assert_eq!(f.link.call_count("disconnect"), 1);
}

#[tokio::test]
async fn test_pair_without_settings_channel() {
    let f = fixture_with(MockLink::without_settings()).await;

    assert!(f.session.pair_device("dev-1").await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::Pairing]);
}

#[tokio::test]
async fn test_scan_access_points() {
    let f = fixture().await;
    f.session.pair_device("dev-1").await.unwrap();
    f.link.settings().unwrap().set_access_points(vec![AccessPoint {
        ssid: "home".to_string(),
        rssi: -40,
        security: 3,
    }]);

    f.session.scan_access_points(1234).await.unwrap();

    let event = f.sink.events().last().cloned().unwrap();
    assert_eq!(event.name(), "AP_LIST_OBTAINED");
    assert_eq!(event.payload()["pinCode"], 1234);
    assert_eq!(event.payload()["aps"][0]["ssid"], "home");
}

#[tokio::test]
async fn test_pairing_reconnect_does_not_report_connected() {
    let f = fixture().await;
    f.session.pair_device("dev-1").await.unwrap();
    f.link.settings().unwrap().set_access_points(vec![AccessPoint {
        ssid: "home".to_string(),
        rssi: -40,
        security: 3,
    }]);
    f.link.drop_connection();

    f.session.scan_access_points(1234).await.unwrap();

    assert_eq!(f.transport.attempts(), 2);
    assert_eq!(f.sink.names(), vec!["PIN_NEEDED", "AP_LIST_OBTAINED"]);
    assert_eq!(f.link.call_count("start_application"), 0);
}

#[tokio::test]
async fn test_empty_scan_is_pairing_error() {
    let f = fixture().await;
    f.session.pair_device("dev-1").await.unwrap();

    assert!(f.session.scan_access_points(1234).await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::Pairing]);
}

#[tokio::test]
async fn test_set_access_point_emits_paired() {
    let f = fixture().await;
    f.session.pair_device("dev-1").await.unwrap();
    let params = AccessPointParams::from_value(json!({
        "ssid": "home",
        "password": "secret",
        "security": 3,
        "pinCode": 1234,
    }))
    .unwrap();

    f.session.set_access_point(params).await.unwrap();

    assert_eq!(f.sink.names(), vec!["PIN_NEEDED", "DEVICE_PAIRED"]);
}

#[tokio::test]
async fn test_invalid_access_point_is_pairing_error() {
    let f = fixture().await;
    f.session.pair_device("dev-1").await.unwrap();
    let params = AccessPointParams {
        ssid: String::new(),
        password: "secret".to_string(),
        bssid: String::new(),
        security: 3,
        pin_code: 1234,
    };

    assert!(f.session.set_access_point(params).await.is_err());

    assert_eq!(f.sink.errors(), vec![ErrorCode::Pairing]);
    let settings = f.link.settings().unwrap();
    assert_eq!(settings.calls(), vec!["version_info"]);
}

#[tokio::test]
async fn test_log_only_settings_commands() {
    let f = fixture().await;

    // No session yet
    assert!(f.session.reset().await.is_err());
    assert!(f.session.access_points().await.is_err());

    f.session.pair_device("dev-1").await.unwrap();
    f.link.settings().unwrap().fail("set_device_name");
    assert!(f.session.set_device_name("Kitchen").await.is_err());

    assert_eq!(f.sink.names(), vec!["PIN_NEEDED"]);
}
