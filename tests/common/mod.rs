//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use castlink::testing::{
    MockLink, MockTransport, RecordingSink, StaticScanner, create_test_device,
    write_certificates,
};
use castlink::{CastBridge, CastConfig, CastDevice};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("castlink=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// How long to wait for an asynchronous event
pub const EVENT_WAIT: Duration = Duration::from_secs(2);

/// Device as the static scanner reports it
pub fn living_room() -> CastDevice {
    create_test_device("dev-1", "Living Room", "192.168.1.20".parse().unwrap(), 4433)
}

/// Configuration with a placeholder certificate bundle in `dir`
pub fn test_config(dir: &tempfile::TempDir) -> CastConfig {
    CastConfig::builder()
        .certificates(write_certificates(dir.path()).unwrap())
        .operation_timeout(Duration::from_millis(500))
        .build()
}

/// A bridge wired to scripted collaborators
pub struct TestBridge {
    pub certificates: tempfile::TempDir,
    pub link: Arc<MockLink>,
    pub transport: Arc<MockTransport>,
    pub scanner: Arc<StaticScanner>,
    pub sink: Arc<RecordingSink>,
    pub bridge: CastBridge,
}

impl TestBridge {
    pub fn new() -> Self {
        let certificates = tempfile::tempdir().unwrap();
        let config = test_config(&certificates);

        let link = Arc::new(MockLink::new());
        let transport = Arc::new(MockTransport::new(link.clone()));
        let scanner = Arc::new(StaticScanner::new(vec![living_room()]));
        let sink = Arc::new(RecordingSink::new());
        let bridge = CastBridge::new(config, transport.clone(), scanner.clone(), sink.clone());

        Self {
            certificates,
            link,
            transport,
            scanner,
            sink,
            bridge,
        }
    }

    /// Discover the scripted device and wait for it to be announced
    pub async fn discover(&self) {
        self.bridge.start_scan().await.unwrap();
        assert!(
            self.sink.wait_for("DEVICE_AVAILABLE", 1, EVENT_WAIT).await,
            "device should be announced"
        );
    }
}
