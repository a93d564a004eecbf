//! Scripted device transport for tests
//!
//! [`MockTransport`] accepts or rejects connection attempts per certificate
//! variant and hands out a shared [`MockLink`]. The link records every command
//! it receives and fails the operations it was told to fail.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connection::{
    DeviceConnection, DeviceLink, DeviceNotification, DeviceTransport, PrivateSettings,
};
use crate::control::Volume;
use crate::error::{CastError, Result};
use crate::net::{CertificateVariant, SecureChannelConfig};
use crate::types::{
    AccessPoint, AccessPointParams, CastDevice, Metadata, PlaybackStatus, PrepareParams,
    TrackParams, VersionInfo,
};

/// How the mock transport answers an attempt with a given certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Connection succeeds
    Accept,
    /// Connection is refused
    Reject,
    /// Connection never completes
    Hang,
}

/// Device transport with scripted outcomes
pub struct MockTransport {
    link: Arc<MockLink>,
    outcomes: Mutex<HashMap<CertificateVariant, AttemptOutcome>>,
    attempts: AtomicUsize,
    variants: Mutex<Vec<CertificateVariant>>,
}

impl MockTransport {
    /// Transport accepting every certificate and connecting to `link`
    #[must_use]
    pub fn new(link: Arc<MockLink>) -> Self {
        Self {
            link,
            outcomes: Mutex::new(HashMap::new()),
            attempts: AtomicUsize::new(0),
            variants: Mutex::new(Vec::new()),
        }
    }

    /// Script the outcome for one certificate variant
    #[must_use]
    pub fn with_outcome(self, variant: CertificateVariant, outcome: AttemptOutcome) -> Self {
        self.set_outcome(variant, outcome);
        self
    }

    /// Change the outcome for one certificate variant
    pub fn set_outcome(&self, variant: CertificateVariant, outcome: AttemptOutcome) {
        lock(&self.outcomes).insert(variant, outcome);
    }

    /// Number of connection attempts received
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Certificate variants of every attempt, in order
    #[must_use]
    pub fn variants(&self) -> Vec<CertificateVariant> {
        lock(&self.variants).clone()
    }

    /// The link handed to successful connections
    #[must_use]
    pub fn link(&self) -> Arc<MockLink> {
        Arc::clone(&self.link)
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn connect(
        &self,
        device: &CastDevice,
        channel: &SecureChannelConfig,
    ) -> Result<DeviceConnection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.variants).push(channel.variant);

        let outcome = lock(&self.outcomes)
            .get(&channel.variant)
            .copied()
            .unwrap_or(AttemptOutcome::Accept);

        match outcome {
            AttemptOutcome::Accept => {
                let (tx, rx) = mpsc::channel(32);
                self.link.attach(tx);
                let link: Arc<dyn DeviceLink> = self.link.clone();
                Ok(DeviceConnection::new(link, rx))
            }
            AttemptOutcome::Reject => Err(CastError::ConnectionFailed {
                device_name: device.name.clone(),
                message: format!("{:?} certificate rejected", channel.variant),
                source: None,
            }),
            AttemptOutcome::Hang => {
                futures::future::pending::<()>().await;
                Err(CastError::InternalError {
                    message: "pending future resolved".to_string(),
                })
            }
        }
    }
}

/// Recording device link
pub struct MockLink {
    connected: AtomicBool,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    status: Mutex<PlaybackStatus>,
    metadata: Mutex<Metadata>,
    notifier: Mutex<Option<mpsc::Sender<DeviceNotification>>>,
    settings: Option<Arc<MockSettings>>,
}

impl MockLink {
    /// Link exposing a private settings channel
    #[must_use]
    pub fn new() -> Self {
        Self::build(Some(Arc::new(MockSettings::new())))
    }

    /// Link without a private settings channel
    #[must_use]
    pub fn without_settings() -> Self {
        Self::build(None)
    }

    fn build(settings: Option<Arc<MockSettings>>) -> Self {
        Self {
            connected: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            status: Mutex::new(PlaybackStatus::default()),
            metadata: Mutex::new(Metadata::default()),
            notifier: Mutex::new(None),
            settings,
        }
    }

    /// Make `operation` (e.g. `"resume"`) fail from now on
    pub fn fail(&self, operation: &str) {
        lock(&self.failing).insert(operation.to_string());
    }

    /// Make `operation` succeed again
    pub fn succeed(&self, operation: &str) {
        lock(&self.failing).remove(operation);
    }

    /// Every command received, formatted as `operation` or `operation:argument`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of times `operation` was called
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .count()
    }

    /// Status returned by status pulls
    pub fn set_status(&self, status: PlaybackStatus) {
        *lock(&self.status) = status;
    }

    /// Metadata returned by metadata pulls
    pub fn set_metadata(&self, metadata: Metadata) {
        *lock(&self.metadata) = metadata;
    }

    /// Simulate the channel dropping without a notification
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Push a notification to the current connection; false if none is attached
    pub async fn notify(&self, notification: DeviceNotification) -> bool {
        let sender = lock(&self.notifier).clone();
        match sender {
            Some(tx) => tx.send(notification).await.is_ok(),
            None => false,
        }
    }

    /// The private settings channel, if any
    #[must_use]
    pub fn settings(&self) -> Option<Arc<MockSettings>> {
        self.settings.clone()
    }

    fn attach(&self, notifier: mpsc::Sender<DeviceNotification>) {
        self.connected.store(true, Ordering::SeqCst);
        *lock(&self.notifier) = Some(notifier);
    }

    fn record(&self, operation: &str, argument: Option<String>) -> Result<()> {
        let call = match argument {
            Some(argument) => format!("{operation}:{argument}"),
            None => operation.to_string(),
        };
        lock(&self.calls).push(call);

        if lock(&self.failing).contains(operation) {
            return Err(CastError::device(operation, "rejected by mock device"));
        }
        Ok(())
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn start_application(&self, name: &str) -> Result<()> {
        self.record("start_application", Some(name.to_string()))
    }

    async fn prepare(&self, params: &PrepareParams) -> Result<()> {
        self.record("prepare", Some(params.url.clone()))
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume", None)
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause", None)
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.record("seek", Some(position.to_string()))
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop", None)
    }

    async fn set_volume(&self, volume: Volume) -> Result<()> {
        self.record("set_volume", Some(volume.as_f64().to_string()))
    }

    async fn set_mute(&self, muted: bool) -> Result<()> {
        self.record("set_mute", Some(muted.to_string()))
    }

    async fn set_track(&self, params: &TrackParams) -> Result<()> {
        self.record("set_track", Some(params.track_id.clone()))
    }

    async fn metadata(&self) -> Result<Metadata> {
        self.record("metadata", None)?;
        Ok(lock(&self.metadata).clone())
    }

    async fn playback_status(&self) -> Result<PlaybackStatus> {
        self.record("playback_status", None)?;
        Ok(lock(&self.status).clone())
    }

    fn private_settings(&self) -> Option<Arc<dyn PrivateSettings>> {
        self.settings
            .clone()
            .map(|settings| settings as Arc<dyn PrivateSettings>)
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect", None)?;
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.notifier).take();
        Ok(())
    }
}

/// Recording private settings channel
pub struct MockSettings {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    access_points: Mutex<Vec<AccessPoint>>,
    version: Mutex<VersionInfo>,
}

impl MockSettings {
    /// Settings channel with firmware "1.0.0" and no access points
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            access_points: Mutex::new(Vec::new()),
            version: Mutex::new(VersionInfo {
                firmware: "1.0.0".to_string(),
                hardware: None,
            }),
        }
    }

    /// Access points returned by scans
    pub fn set_access_points(&self, access_points: Vec<AccessPoint>) {
        *lock(&self.access_points) = access_points;
    }

    /// Make `operation` (e.g. `"scan_access_points"`) fail from now on
    pub fn fail(&self, operation: &str) {
        lock(&self.failing).insert(operation.to_string());
    }

    /// Every command received
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, operation: &str, argument: Option<String>) -> Result<()> {
        let call = match argument {
            Some(argument) => format!("{operation}:{argument}"),
            None => operation.to_string(),
        };
        lock(&self.calls).push(call);

        if lock(&self.failing).contains(operation) {
            return Err(CastError::device(operation, "rejected by mock settings"));
        }
        Ok(())
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrivateSettings for MockSettings {
    async fn version_info(&self) -> Result<VersionInfo> {
        self.record("version_info", None)?;
        Ok(lock(&self.version).clone())
    }

    async fn scan_access_points(&self, pin_code: u32) -> Result<Vec<AccessPoint>> {
        self.record("scan_access_points", Some(pin_code.to_string()))?;
        Ok(lock(&self.access_points).clone())
    }

    async fn access_points(&self) -> Result<Vec<AccessPoint>> {
        self.record("access_points", None)?;
        Ok(lock(&self.access_points).clone())
    }

    async fn set_access_point(&self, params: &AccessPointParams) -> Result<()> {
        self.record("set_access_point", Some(params.ssid.clone()))
    }

    async fn set_device_name(&self, name: &str) -> Result<()> {
        self.record("set_device_name", Some(name.to_string()))
    }

    async fn reset(&self) -> Result<()> {
        self.record("reset", None)
    }
}

/// Lock a mock's bookkeeping, ignoring poisoning from a panicked test thread
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
