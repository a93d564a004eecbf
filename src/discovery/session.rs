//! Periodic discovery feeding the device registry

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::DeviceScanner;
use super::registry::DeviceRegistry;
use crate::state::{CastEvent, DeviceSummary, EventSink};
use crate::types::{CastConfig, CastDevice};

/// Scan timing taken from `CastConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTiming {
    /// Pause between rounds in the foreground
    pub foreground_interval: Duration,
    /// Pause between rounds in the background
    pub background_interval: Duration,
    /// How long one round listens
    pub scan_window: Duration,
    /// Consecutive missed rounds before a device is lost
    pub lost_after_missed_scans: u32,
}

impl From<&CastConfig> for DiscoveryTiming {
    fn from(config: &CastConfig) -> Self {
        Self {
            foreground_interval: config.discovery_interval,
            background_interval: config.background_discovery_interval,
            scan_window: config.scan_window,
            lost_after_missed_scans: config.lost_after_missed_scans.max(1),
        }
    }
}

struct Runner {
    task: Option<JoinHandle<()>>,
    /// Incremented on every start so a stale task cannot clear a newer one
    epoch: u64,
}

/// Discovery session
///
/// Runs scan rounds on a background task while started. Devices entering the
/// registry emit `DEVICE_AVAILABLE`; devices missing from enough consecutive
/// rounds are removed and emit `DEVICE_LOST`.
pub struct DiscoverySession {
    scanner: Arc<dyn DeviceScanner>,
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn EventSink>,
    timing: DiscoveryTiming,
    interval: watch::Sender<Duration>,
    runner: Mutex<Runner>,
    misses: Mutex<HashMap<String, u32>>,
}

impl DiscoverySession {
    /// Create a stopped session
    #[must_use]
    pub fn new(
        scanner: Arc<dyn DeviceScanner>,
        registry: Arc<DeviceRegistry>,
        sink: Arc<dyn EventSink>,
        timing: DiscoveryTiming,
    ) -> Self {
        let (interval, _) = watch::channel(timing.foreground_interval);
        Self {
            scanner,
            registry,
            sink,
            timing,
            interval,
            runner: Mutex::new(Runner {
                task: None,
                epoch: 0,
            }),
            misses: Mutex::new(HashMap::new()),
        }
    }

    /// The registry this session feeds
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Current pause between rounds
    #[must_use]
    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Change the pause between rounds; a running session picks it up immediately
    pub fn set_interval(&self, interval: Duration) {
        self.interval.send_replace(interval);
    }

    /// Check if scan rounds are running
    pub async fn is_running(&self) -> bool {
        self.runner
            .lock()
            .await
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start (or resume) discovery; a running session is left alone
    pub async fn start(self: &Arc<Self>) {
        let mut runner = self.runner.lock().await;
        if runner.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Discovery already running");
            return;
        }

        runner.epoch += 1;
        let epoch = runner.epoch;
        let session = Arc::clone(self);
        let interval = self.interval.subscribe();
        runner.task = Some(tokio::spawn(async move {
            session.run(epoch, interval).await;
        }));
        tracing::info!("Discovery started, interval {:?}", self.interval());
    }

    /// Pause discovery; a stopped session is left alone
    pub async fn stop(&self) {
        match self.runner.lock().await.task.take() {
            Some(task) => {
                task.abort();
                tracing::info!("Discovery stopped");
            }
            None => tracing::debug!("Discovery already stopped"),
        }
    }

    /// Widen the interval and pause
    pub async fn enter_background(&self) {
        self.set_interval(self.timing.background_interval);
        self.stop().await;
    }

    /// Restore the foreground interval and start
    pub async fn enter_foreground(self: &Arc<Self>) {
        self.set_interval(self.timing.foreground_interval);
        self.start().await;
    }

    /// Register a sighting; emits `DEVICE_AVAILABLE` for a new id.
    ///
    /// Returns true if the device was new.
    pub async fn device_found(&self, device: CastDevice) -> bool {
        self.misses.lock().await.remove(&device.id);

        let summary = DeviceSummary::from(&device);
        let added = self.registry.insert(device).await;
        if added {
            tracing::info!("Device available: {} ({})", summary.name, summary.id);
            self.sink.emit(CastEvent::DeviceAvailable(summary));
        }
        added
    }

    /// Remove a device; emits `DEVICE_LOST` if it was registered.
    ///
    /// Returns true if the device was registered.
    pub async fn device_lost(&self, id: &str) -> bool {
        self.misses.lock().await.remove(id);

        match self.registry.remove(id).await {
            Some(device) => {
                tracing::info!("Device lost: {} ({})", device.name, device.id);
                self.sink.emit(CastEvent::DeviceLost(DeviceSummary::from(&device)));
                true
            }
            None => false,
        }
    }

    /// Fold one scan round into the registry
    pub async fn apply_scan(&self, devices: Vec<CastDevice>) {
        let seen: HashSet<String> = devices.iter().map(|d| d.id.clone()).collect();
        for device in devices {
            self.device_found(device).await;
        }

        let mut lost = Vec::new();
        {
            let mut misses = self.misses.lock().await;
            for id in self.registry.ids().await {
                if seen.contains(&id) {
                    continue;
                }
                let count = misses.entry(id.clone()).or_insert(0);
                *count += 1;
                if *count >= self.timing.lost_after_missed_scans {
                    lost.push(id);
                }
            }
        }

        for id in lost {
            self.device_lost(&id).await;
        }
    }

    async fn run(&self, epoch: u64, mut interval: watch::Receiver<Duration>) {
        loop {
            match self.scanner.scan(self.timing.scan_window).await {
                Ok(devices) => {
                    tracing::debug!("Scan round saw {} device(s)", devices.len());
                    self.apply_scan(devices).await;
                }
                Err(e) => {
                    tracing::warn!("Discovery stopped after scan failure: {}", e);
                    let mut runner = self.runner.lock().await;
                    if runner.epoch == epoch {
                        // Dropping our own handle detaches it; the task ends right after
                        runner.task = None;
                    }
                    return;
                }
            }

            let mut period = *interval.borrow_and_update();
            loop {
                tokio::select! {
                    () = tokio::time::sleep(period) => break,
                    changed = interval.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        period = *interval.borrow_and_update();
                    }
                }
            }
        }
    }
}
