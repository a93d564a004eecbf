//! Host-facing command surface
//!
//! [`CastBridge`] is what a UI layer talks to. Every command returns at once;
//! the work runs on a spawned tokio task and its outcome reaches the host only
//! through the event sink. The returned [`JoinHandle`] may be dropped.

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

use crate::connection::DeviceTransport;
use crate::discovery::{
    DeviceRegistry, DeviceScanner, DiscoverySession, DiscoveryTiming, MdnsScanner,
};
use crate::error::Result;
use crate::session::SessionController;
use crate::state::{CastEvent, ErrorCode, EventSink};
use crate::types::{
    AccessPointParams, CastConfig, MediaType, PlayerState, PrepareParams, TransferMode,
};


/// Fire-and-forget bridge between a host application and one cast session
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use castlink::state::EventBus;
/// use castlink::testing::{MockLink, MockTransport};
/// use castlink::{CastBridge, CastConfig};
///
/// # async fn example() {
/// let bus = Arc::new(EventBus::new());
/// let mut events = bus.subscribe();
///
/// let transport = Arc::new(MockTransport::new(Arc::new(MockLink::new())));
/// let bridge = CastBridge::with_mdns(CastConfig::default(), transport, bus);
///
/// bridge.start_scan();
/// while let Ok(event) = events.recv().await {
///     if event.name() == "DEVICE_AVAILABLE" {
///         let id = event.payload()["id"].as_str().unwrap_or_default().to_string();
///         bridge.connect_to_device(id, "receiver".to_string());
///     }
/// }
/// # }
/// ```
pub struct CastBridge {
    config: CastConfig,
    sink: Arc<dyn EventSink>,
    session: Arc<SessionController>,
    discovery: Arc<DiscoverySession>,
}

impl CastBridge {
    /// Create a bridge over `transport`, discovering with `scanner`
    #[must_use]
    pub fn new(
        config: CastConfig,
        transport: Arc<dyn DeviceTransport>,
        scanner: Arc<dyn DeviceScanner>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let discovery = Arc::new(DiscoverySession::new(
            scanner,
            Arc::clone(&registry),
            Arc::clone(&sink),
            DiscoveryTiming::from(&config),
        ));
        let session = Arc::new(SessionController::new(
            &config,
            transport,
            registry,
            Arc::clone(&sink),
        ));

        Self {
            config,
            sink,
            session,
            discovery,
        }
    }

    /// Create a bridge discovering over mDNS with the configured service type
    #[must_use]
    pub fn with_mdns(
        config: CastConfig,
        transport: Arc<dyn DeviceTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let scanner = Arc::new(MdnsScanner::new(config.service_type.clone()));
        Self::new(config, transport, scanner, sink)
    }

    /// Bridge configuration
    #[must_use]
    pub fn config(&self) -> &CastConfig {
        &self.config
    }

    /// The underlying session controller
    #[must_use]
    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    /// The underlying discovery session
    #[must_use]
    pub fn discovery(&self) -> &Arc<DiscoverySession> {
        &self.discovery
    }

    /// Name of `event` as the host sees it
    #[must_use]
    pub fn event_name(&self, event: &CastEvent) -> String {
        event.qualified_name(&self.config.event_prefix)
    }

    /// Every event name the host may subscribe to
    #[must_use]
    pub fn supported_events(&self) -> Vec<String> {
        CastEvent::NAMES
            .iter()
            .map(|name| format!("{}{name}", self.config.event_prefix))
            .collect()
    }

    /// Constants exported to the host: event names, player-state codes,
    /// media types and transfer modes
    #[must_use]
    pub fn constants(&self) -> Value {
        let mut constants = Map::new();

        for name in CastEvent::NAMES {
            constants.insert(
                name.to_string(),
                json!(format!("{}{name}", self.config.event_prefix)),
            );
        }

        for media_type in [MediaType::Audio, MediaType::Image, MediaType::Video] {
            constants.insert(
                format!("MEDIA_TYPE_{}", media_type.as_str().to_uppercase()),
                json!(media_type.as_str()),
            );
        }

        for mode in [TransferMode::Buffered, TransferMode::Streamed] {
            constants.insert(
                format!("TRANSFER_MODE_{}", mode.as_str().to_uppercase()),
                json!(mode.as_str()),
            );
        }

        for state in PlayerState::ALL {
            constants.insert(
                format!("PLAYBACK_STATE_KEY_{}", state_key(state)),
                json!(state.code()),
            );
        }

        Value::Object(constants)
    }

    // ===== Discovery =====

    /// Start or resume discovery
    pub fn start_scan(&self) -> JoinHandle<()> {
        let discovery = Arc::clone(&self.discovery);
        tokio::spawn(async move { discovery.start().await })
    }

    /// Pause discovery
    pub fn stop_scan(&self) -> JoinHandle<()> {
        let discovery = Arc::clone(&self.discovery);
        tokio::spawn(async move { discovery.stop().await })
    }

    /// Widen the discovery interval and pause discovery
    pub fn enter_background(&self) -> JoinHandle<()> {
        let discovery = Arc::clone(&self.discovery);
        tokio::spawn(async move { discovery.enter_background().await })
    }

    /// Restore the discovery interval and resume discovery
    pub fn enter_foreground(&self) -> JoinHandle<()> {
        let discovery = Arc::clone(&self.discovery);
        tokio::spawn(async move { discovery.enter_foreground().await })
    }

    // ===== Session =====

    /// Select a device for pairing; emits `PIN_NEEDED`
    pub fn pair_device(&self, device_id: String) -> JoinHandle<()> {
        self.spawn("pairDevice", move |session| async move {
            session.pair_device(&device_id).await
        })
    }

    /// Connect to a device and launch `application`; emits `DEVICE_CONNECTED`
    pub fn connect_to_device(&self, device_id: String, application: String) -> JoinHandle<()> {
        self.spawn("connectToDevice", move |session| async move {
            session.connect_to_device(&device_id, &application).await
        })
    }

    /// Tear down the session; emits `DEVICE_DISCONNECTED`
    pub fn disconnect(&self) -> JoinHandle<()> {
        self.spawn("disconnect", |session| async move { session.disconnect().await })
    }

    // ===== Pairing =====

    /// Scan for access points; emits `AP_LIST_OBTAINED`
    pub fn scan_aps(&self, pin_code: u32) -> JoinHandle<()> {
        self.spawn("scanAPs", move |session| async move {
            session.scan_access_points(pin_code).await
        })
    }

    /// Log the device's access point list
    pub fn get_ap_list(&self) -> JoinHandle<()> {
        self.spawn("getAPList", |session| async move {
            session.access_points().await.map(|_| ())
        })
    }

    /// Join the device to an access point; emits `DEVICE_PAIRED`
    ///
    /// `payload` needs `ssid`, `password`, `security` and `pinCode`; `bssid`
    /// is optional.
    pub fn set_ap(&self, payload: Value) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        self.spawn("setAP", move |session| async move {
            let params = AccessPointParams::from_value(payload);
            let params = reject(&*sink, ErrorCode::Pairing, params)?;
            session.set_access_point(params).await
        })
    }

    /// Rename the device
    pub fn set_name(&self, name: String) -> JoinHandle<()> {
        self.spawn("setName", move |session| async move {
            session.set_device_name(&name).await
        })
    }

    /// Reset the device settings
    pub fn reset(&self) -> JoinHandle<()> {
        self.spawn("reset", |session| async move { session.reset().await })
    }

    // ===== Media =====

    /// Load media described by `payload` into the receiver
    pub fn cast_media(&self, payload: Value) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        self.spawn("castMedia", move |session| async move {
            let params = PrepareParams::from_value(payload);
            let params = reject(&*sink, ErrorCode::CastFailed, params)?;
            session.cast_media(params).await
        })
    }

    /// Resume a paused player
    pub fn resume(&self) -> JoinHandle<()> {
        self.spawn("resume", |session| async move { session.resume().await })
    }

    /// Pause a playing player
    pub fn pause(&self) -> JoinHandle<()> {
        self.spawn("pause", |session| async move { session.pause().await })
    }

    /// Seek to `position_ms`
    pub fn seek(&self, position_ms: u64) -> JoinHandle<()> {
        self.spawn("seek", move |session| async move {
            session.seek(position_ms).await
        })
    }

    /// Stop playback
    pub fn stop(&self) -> JoinHandle<()> {
        self.spawn("stop", |session| async move { session.stop().await })
    }

    /// Set volume from a 0 - 100 level
    pub fn volume(&self, level: f64) -> JoinHandle<()> {
        self.spawn("volume", move |session| async move {
            session.set_volume(level).await
        })
    }

    /// Mute or unmute
    pub fn mute(&self, muted: bool) -> JoinHandle<()> {
        self.spawn("mute", move |session| async move { session.set_mute(muted).await })
    }

    /// Pull metadata; emits `METADATA_CHANGED`
    pub fn update_metadata(&self) -> JoinHandle<()> {
        self.spawn("updateMetadata", |session| async move {
            session.update_metadata().await
        })
    }

    /// Pull playback status; emits `PLAYBACK_STATUS_CHANGED`
    pub fn update_playback_status(&self) -> JoinHandle<()> {
        self.spawn("updatePlaybackStatus", |session| async move {
            session.update_playback_status().await
        })
    }

    /// Enable an audio track
    pub fn set_audio_track(&self, track_id: String) -> JoinHandle<()> {
        self.spawn("setAudioTrack", move |session| async move {
            session.set_audio_track(&track_id).await
        })
    }

    fn spawn<F, Fut>(&self, command: &'static str, operation: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<SessionController>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tracing::debug!("{} requested", command);
        let fut = operation(Arc::clone(&self.session));
        tokio::spawn(async move {
            // Failures were already reported through the sink
            if let Err(e) = fut.await {
                tracing::debug!("{} ended with: {}", command, e);
            }
        })
    }
}

/// Report a malformed host payload under `code`
fn reject<T>(sink: &dyn EventSink, code: ErrorCode, parsed: Result<T>) -> Result<T> {
    if let Err(e) = &parsed {
        tracing::warn!("{}: {}", code, e);
        sink.emit(CastEvent::Error(code));
    }
    parsed
}

fn state_key(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Unknown => "FAILED",
        PlayerState::Idle => "IDLE",
        PlayerState::Playing => "PLAYING",
        PlayerState::Paused => "PAUSED",
        PlayerState::Buffering => "BUFFERING",
    }
}
