//! End-to-end session flows through the host bridge

mod common;

use castlink::net::CertificateVariant;
use castlink::testing::AttemptOutcome;
use castlink::{ConnectionState, DeviceNotification, ErrorCode, PlaybackStatus, PlayerState};
use common::{EVENT_WAIT, TestBridge};
use serde_json::json;

fn status(state: PlayerState, volume: f64) -> PlaybackStatus {
    PlaybackStatus {
        duration: 300.0,
        position: 12.0,
        volume,
        muted: false,
        state,
    }
}

#[tokio::test]
async fn test_discover_connect_and_control() {
    common::init_logging();
    let t = TestBridge::new();
    t.discover().await;

    t.bridge
        .connect_to_device("dev-1".to_string(), "receiver".to_string())
        .await
        .unwrap();
    t.bridge
        .cast_media(json!({
            "url": "http://media.example/movie.mp4",
            "frequency": 1,
            "title": "Movie",
            "subtitle": "Trailer",
            "logo": "http://media.example/logo.png",
            "mediaType": "video",
            "transferMode": "buffered",
            "autoplay": true,
            "options": {},
        }))
        .await
        .unwrap();

    t.link.set_status(status(PlayerState::Paused, 0.42));
    t.bridge.update_playback_status().await.unwrap();
    t.bridge.seek(5000).await.unwrap();
    t.bridge.volume(50.0).await.unwrap();

    assert_eq!(
        t.sink.names(),
        vec![
            "DEVICE_AVAILABLE",
            "DEVICE_CONNECTED",
            "PLAYBACK_STATUS_CHANGED"
        ]
    );
    assert_eq!(t.sink.events()[2].payload()["volume"], 42);
    assert_eq!(
        t.link.calls(),
        vec![
            "start_application:receiver",
            "prepare:http://media.example/movie.mp4",
            "playback_status",
            "resume",
            "seek:5",
            "set_volume:0.5",
        ]
    );
    assert_eq!(
        t.bridge.session().player_state().await,
        Some(PlayerState::Playing)
    );
}

#[tokio::test]
async fn test_channel_failure_then_reconnect() {
    common::init_logging();
    let t = TestBridge::new();
    t.discover().await;
    t.bridge
        .connect_to_device("dev-1".to_string(), "receiver".to_string())
        .await
        .unwrap();

    t.link
        .notify(DeviceNotification::ChannelFailed {
            message: "connection reset".to_string(),
        })
        .await;
    assert!(t.sink.wait_for("ERROR_EVENT", 1, EVENT_WAIT).await);
    assert_eq!(t.sink.errors(), vec![ErrorCode::DeviceError]);
    assert_eq!(
        t.bridge.session().connection_state().await,
        ConnectionState::Disconnected
    );

    // The next command brings the session back up first
    t.bridge.stop().await.unwrap();

    assert_eq!(t.transport.attempts(), 2);
    assert_eq!(t.sink.count("DEVICE_CONNECTED"), 2);
    assert_eq!(t.link.calls().last().map(String::as_str), Some("stop"));
}

#[tokio::test]
async fn test_pairing_flow() {
    common::init_logging();
    let t = TestBridge::new();
    t.discover().await;
    t.link
        .settings()
        .unwrap()
        .set_access_points(vec![castlink::types::AccessPoint {
            ssid: "home".to_string(),
            rssi: -52,
            security: 3,
        }]);

    t.bridge.pair_device("dev-1".to_string()).await.unwrap();
    t.bridge.scan_aps(4321).await.unwrap();
    t.bridge
        .set_ap(json!({
            "ssid": "home",
            "password": "secret",
            "security": 3,
            "pinCode": 4321,
        }))
        .await
        .unwrap();

    assert_eq!(
        t.sink.names(),
        vec![
            "DEVICE_AVAILABLE",
            "PIN_NEEDED",
            "AP_LIST_OBTAINED",
            "DEVICE_PAIRED"
        ]
    );
    assert_eq!(
        t.link.settings().unwrap().calls(),
        vec![
            "version_info",
            "scan_access_points:4321",
            "set_access_point:home"
        ]
    );
    assert_eq!(t.transport.attempts(), 1);
}

#[tokio::test]
async fn test_connect_fails_with_both_certificates() {
    common::init_logging();
    let t = TestBridge::new();
    t.discover().await;
    t.transport
        .set_outcome(CertificateVariant::Primary, AttemptOutcome::Reject);
    t.transport
        .set_outcome(CertificateVariant::Fallback, AttemptOutcome::Reject);

    t.bridge
        .connect_to_device("dev-1".to_string(), "receiver".to_string())
        .await
        .unwrap();

    assert_eq!(t.transport.attempts(), 2);
    assert_eq!(
        t.transport.variants(),
        vec![CertificateVariant::Primary, CertificateVariant::Fallback]
    );
    assert_eq!(t.sink.errors(), vec![ErrorCode::ConnectFailed]);
    assert_eq!(t.sink.count("DEVICE_CONNECTED"), 0);
}

#[tokio::test]
async fn test_disconnect_keeps_device_selected() {
    common::init_logging();
    let t = TestBridge::new();
    t.discover().await;
    t.bridge
        .connect_to_device("dev-1".to_string(), "receiver".to_string())
        .await
        .unwrap();

    t.bridge.disconnect().await.unwrap();
    assert_eq!(t.sink.count("DEVICE_DISCONNECTED"), 1);
    assert_eq!(
        t.bridge.session().selected_device().await.map(|d| d.id),
        Some("dev-1".to_string())
    );

    t.bridge.mute(true).await.unwrap();
    assert_eq!(t.transport.attempts(), 2);
    assert_eq!(t.link.calls().last().map(String::as_str), Some("set_mute:true"));
}
