//! Test doubles for the device SDK, the discovery backend and the host

pub mod mock_device;

pub use mock_device::{AttemptOutcome, MockLink, MockSettings, MockTransport};

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::discovery::DeviceScanner;
use crate::error::{CastError, Result};
use crate::state::{CastEvent, ErrorCode, EventSink};
use crate::types::{CastDevice, CertificateConfig, ConnectionState};

/// Helper to create a `CastDevice` for testing.
///
/// This bypasses discovery and directly populates fields.
#[must_use]
pub fn create_test_device(id: &str, name: &str, address: IpAddr, port: u16) -> CastDevice {
    CastDevice {
        id: id.to_string(),
        name: name.to_string(),
        model: Some("TestModel".to_string()),
        addresses: vec![address],
        port,
        txt_records: HashMap::new(),
        state: ConnectionState::Disconnected,
    }
}

/// Write a placeholder certificate bundle into `directory`.
///
/// The files are not valid certificates; they satisfy the loader so the
/// scripted transport can decide the outcome of each attempt.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be written.
pub fn write_certificates(directory: &Path) -> std::io::Result<CertificateConfig> {
    let config = CertificateConfig {
        directory: directory.to_path_buf(),
        ..CertificateConfig::default()
    };

    for file in [
        &config.root_ca_file,
        &config.server_ca_file,
        &config.client_certificate_file,
        &config.fallback_certificate_file,
    ] {
        std::fs::write(directory.join(file), file.as_bytes())?;
    }
    Ok(config)
}

/// Event sink keeping every event in order
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CastEvent>>,
    changed: Notify,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far
    #[must_use]
    pub fn events(&self) -> Vec<CastEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of every event received so far
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CastEvent::name).collect()
    }

    /// Number of events named `name`
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    /// Codes of every `ERROR_EVENT` received so far
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorCode> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CastEvent::Error(code) => Some(code),
                _ => None,
            })
            .collect()
    }

    /// Wait until `count` events named `name` were received, up to `timeout`
    pub async fn wait_for(&self, name: &str, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let changed = self.changed.notified();
            if self.count(name) >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return self.count(name) >= count;
            }
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: CastEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.changed.notify_waiters();
    }
}

/// Scanner returning a fixed, replaceable device list
#[derive(Default)]
pub struct StaticScanner {
    devices: Mutex<Vec<CastDevice>>,
    failing: AtomicBool,
    scans: AtomicUsize,
}

impl StaticScanner {
    /// Scanner that sees `devices`
    #[must_use]
    pub fn new(devices: Vec<CastDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    /// Replace the visible devices
    pub fn set_devices(&self, devices: Vec<CastDevice>) {
        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = devices;
    }

    /// Make every following scan fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of scans performed
    #[must_use]
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceScanner for StaticScanner {
    async fn scan(&self, _window: Duration) -> Result<Vec<CastDevice>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CastError::DiscoveryFailed {
                message: "scripted scan failure".to_string(),
                source: None,
            });
        }
        Ok(self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
