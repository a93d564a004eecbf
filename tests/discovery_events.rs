//! Discovery announcements as seen by a host subscribed to the event bus

mod common;

use std::sync::Arc;
use std::time::Duration;

use castlink::state::{EventBus, EventFilter};
use castlink::testing::{MockLink, MockTransport, StaticScanner};
use castlink::{CastBridge, CastEvent};

#[tokio::test(start_paused = true)]
async fn test_devices_come_and_go() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(&dir);

    let scanner = Arc::new(StaticScanner::new(vec![common::living_room()]));
    let bus = Arc::new(EventBus::new());
    let mut events = EventFilter::device_events(&bus);
    let transport = Arc::new(MockTransport::new(Arc::new(MockLink::new())));
    let bridge = CastBridge::new(config, transport, scanner.clone(), bus);

    bridge.start_scan().await.unwrap();
    bridge.start_scan().await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(bridge.event_name(&event), "OCast:DEVICE_AVAILABLE");
    assert_eq!(event.payload()["name"], "Living Room");

    // Two empty rounds remove the device
    scanner.set_devices(Vec::new());
    let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
        .await
        .expect("device should be lost")
        .unwrap();
    assert!(matches!(event, CastEvent::DeviceLost(ref d) if d.id == "dev-1"));
    assert!(bridge.discovery().registry().is_empty().await);

    bridge.stop_scan().await.unwrap();
    assert!(!bridge.discovery().is_running().await);
}

#[tokio::test(start_paused = true)]
async fn test_background_scans_less_often() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(&dir);

    let scanner = Arc::new(StaticScanner::new(vec![common::living_room()]));
    let bus = Arc::new(EventBus::new());
    let transport = Arc::new(MockTransport::new(Arc::new(MockLink::new())));
    let bridge = CastBridge::new(config, transport, scanner.clone(), bus);

    bridge.start_scan().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scanner.scans(), 1);

    bridge.enter_background().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(scanner.scans(), 1);
    assert_eq!(
        bridge.discovery().interval(),
        bridge.config().background_discovery_interval
    );

    bridge.enter_foreground().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scanner.scans(), 2);
    assert_eq!(
        bridge.discovery().interval(),
        bridge.config().discovery_interval
    );
}
