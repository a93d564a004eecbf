use super::*;
use serde_json::json;
use std::net::IpAddr;
use std::time::Duration;

// --- config.rs tests ---

#[test]
fn test_config_defaults() {
    let config = CastConfig::default();

    assert_eq!(config.discovery_interval, Duration::from_secs(5));
    assert_eq!(config.background_discovery_interval, Duration::from_secs(30));
    assert_eq!(config.operation_timeout, Duration::from_secs(5));
    assert_eq!(config.lost_after_missed_scans, 2);
    assert_eq!(config.service_type, DEFAULT_SERVICE_TYPE);
    assert_eq!(config.event_prefix, "OCast:");
}

#[test]
fn test_config_builder() {
    let config = CastConfig::builder()
        .discovery_interval(Duration::from_secs(1))
        .operation_timeout(Duration::from_millis(250))
        .lost_after_missed_scans(0)
        .client_certificate("primary.p12", "one")
        .fallback_certificate("legacy.p12", "two")
        .build();

    assert_eq!(config.discovery_interval, Duration::from_secs(1));
    assert_eq!(config.operation_timeout, Duration::from_millis(250));
    // Clamped to at least one round
    assert_eq!(config.lost_after_missed_scans, 1);
    assert_eq!(config.certificates.client_certificate_file, "primary.p12");
    assert_eq!(config.certificates.fallback_certificate_password, "two");
}

// --- device.rs tests ---

#[test]
fn test_device_prefers_ipv4() {
    let mut device = CastDevice::new("dev-1", "Stick", "fe80::1".parse().unwrap(), 8443);
    device.addresses.push("192.168.1.20".parse().unwrap());

    assert_eq!(device.address(), "192.168.1.20".parse::<IpAddr>().unwrap());
}

#[test]
fn test_device_merge_keeps_connection_state() {
    let mut device = CastDevice::new("dev-1", "Old", "10.0.0.2".parse().unwrap(), 8443);
    device.state = ConnectionState::Connected;

    device.merge(CastDevice::new("dev-1", "New", "10.0.0.3".parse().unwrap(), 8443));

    assert_eq!(device.name, "New");
    assert_eq!(device.state, ConnectionState::Connected);
}

// --- media.rs tests ---

#[test]
fn test_player_state_codes() {
    for state in PlayerState::ALL {
        assert_eq!(PlayerState::from_code(state.code()), state);
    }
    assert_eq!(PlayerState::from_code(42), PlayerState::Unknown);
}

#[test]
fn test_prepare_params_from_value() {
    let params = PrepareParams::from_value(json!({
        "url": "https://cdn.example.com/movie.m3u8",
        "frequency": 1,
        "title": "Movie",
        "subtitle": "Trailer",
        "mediaType": "video",
        "transferMode": "streamed",
        "autoplay": true,
        "options": { "drm": "none" }
    }))
    .unwrap();

    assert_eq!(params.media_type, MediaType::Video);
    assert_eq!(params.transfer_mode, TransferMode::Streamed);
    assert!(params.autoplay);
    assert!(params.logo.is_none());
    assert_eq!(params.options["drm"], "none");
}

#[test]
fn test_prepare_params_missing_field() {
    let err = PrepareParams::from_value(json!({ "url": "http://x" })).unwrap_err();
    assert!(matches!(err, crate::CastError::InvalidParameter { .. }));
}

#[test]
fn test_prepare_params_empty_url() {
    let err = PrepareParams::from_value(json!({
        "url": " ",
        "frequency": 1,
        "title": "",
        "subtitle": "",
        "mediaType": "audio",
        "transferMode": "buffered",
        "autoplay": false
    }))
    .unwrap_err();
    assert!(matches!(err, crate::CastError::InvalidParameter { ref name, .. } if name == "url"));
}

#[test]
fn test_metadata_serializes_camel_case() {
    let metadata = Metadata {
        title: "T".to_string(),
        subtitle: "S".to_string(),
        audio_tracks: vec![MediaTrack {
            id: "a1".to_string(),
            enabled: true,
            label: "English".to_string(),
            language: "en".to_string(),
        }],
        subtitle_tracks: vec![],
    };

    let value = serde_json::to_value(&metadata).unwrap();
    assert_eq!(value["audioTracks"][0]["label"], "English");
    assert!(value["subtitleTracks"].as_array().unwrap().is_empty());
}

// --- settings.rs tests ---

#[test]
fn test_access_point_params_from_value() {
    let params = AccessPointParams::from_value(json!({
        "ssid": "home",
        "password": "secret",
        "security": 3,
        "pinCode": 1234
    }))
    .unwrap();

    assert_eq!(params.ssid, "home");
    assert_eq!(params.bssid, "");
    assert_eq!(params.pin_code, 1234);
}

#[test]
fn test_access_point_params_missing_pin() {
    let err = AccessPointParams::from_value(json!({
        "ssid": "home",
        "password": "secret",
        "security": 3
    }))
    .unwrap_err();
    assert!(matches!(err, crate::CastError::InvalidParameter { .. }));
}
