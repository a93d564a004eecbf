//! Boundary events and the sinks that deliver them

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::control::Volume;
use crate::types::{AccessPoint, CastDevice, Metadata, PlaybackStatus};

/// Error codes reported through `ERROR_EVENT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Pairing, access point or version-info failure
    Pairing,
    /// Connection or receiver launch failure
    ConnectFailed,
    /// Prepare/cast failure
    CastFailed,
    /// Resume failure
    ResumeFailed,
    /// Pause failure
    PauseFailed,
    /// Seek failure
    SeekFailed,
    /// Stop failure
    StopFailed,
    /// Volume failure
    VolumeFailed,
    /// Mute failure
    MuteFailed,
    /// Metadata pull failure
    MetadataUpdateFailed,
    /// Playback status pull failure
    PlaybackStatusUpdateFailed,
    /// Track selection failure
    SettingTrackFailed,
    /// Disconnect failure (kept for host compatibility, never emitted)
    DisconnectFailed,
    /// TLS failure (kept for host compatibility, never emitted)
    SslError,
    /// Asynchronous device channel failure
    DeviceError,
}

impl ErrorCode {
    /// Every code, for exporting to the host
    pub const ALL: [ErrorCode; 15] = [
        ErrorCode::Pairing,
        ErrorCode::ConnectFailed,
        ErrorCode::CastFailed,
        ErrorCode::ResumeFailed,
        ErrorCode::PauseFailed,
        ErrorCode::SeekFailed,
        ErrorCode::StopFailed,
        ErrorCode::VolumeFailed,
        ErrorCode::MuteFailed,
        ErrorCode::MetadataUpdateFailed,
        ErrorCode::PlaybackStatusUpdateFailed,
        ErrorCode::SettingTrackFailed,
        ErrorCode::DisconnectFailed,
        ErrorCode::SslError,
        ErrorCode::DeviceError,
    ];

    /// Code string sent to the host
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Pairing => "PAIRING_ERROR",
            ErrorCode::ConnectFailed => "CONNECT_FAILED",
            ErrorCode::CastFailed => "CAST_FAILED",
            ErrorCode::ResumeFailed => "RESUME_FAILED",
            ErrorCode::PauseFailed => "PAUSE_FAILED",
            ErrorCode::SeekFailed => "SEEK_FAILED",
            ErrorCode::StopFailed => "STOP_FAILED",
            ErrorCode::VolumeFailed => "VOLUME_FAILED",
            ErrorCode::MuteFailed => "MUTE_FAILED",
            ErrorCode::MetadataUpdateFailed => "METADATA_UPDATE_FAILED",
            ErrorCode::PlaybackStatusUpdateFailed => "PLAYBACK_STATUS_UPDATE_FAILED",
            ErrorCode::SettingTrackFailed => "SETTING_TRACK_FAILED",
            ErrorCode::DisconnectFailed => "DISCONNECT_FAILED",
            ErrorCode::SslError => "SSL_ERROR",
            ErrorCode::DeviceError => "DEVICE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Device identity as exposed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Device id
    pub id: String,
    /// Display name
    pub name: String,
    /// Primary address, when one is known
    pub ip_address: Option<String>,
}

impl From<&CastDevice> for DeviceSummary {
    fn from(device: &CastDevice) -> Self {
        let address = device.address();
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            ip_address: (!address.is_unspecified()).then(|| address.to_string()),
        }
    }
}

/// Events delivered to the host application
#[derive(Debug, Clone, PartialEq)]
pub enum CastEvent {
    /// Device appeared during discovery
    DeviceAvailable(DeviceSummary),
    /// Device disappeared from discovery
    DeviceLost(DeviceSummary),
    /// Receiver application launched, session ready
    DeviceConnected(DeviceSummary),
    /// Session torn down
    DeviceDisconnected(DeviceSummary),
    /// Device joined the configured access point
    DevicePaired(DeviceSummary),
    /// Device is reachable and waits for its PIN
    PinNeeded(DeviceSummary),
    /// Access point scan finished
    ApListObtained {
        /// PIN the scan was authorized with
        pin_code: u32,
        /// Access points seen by the device
        access_points: Vec<AccessPoint>,
    },
    /// Media metadata pulled or pushed
    MetadataChanged(Metadata),
    /// Playback status pulled or pushed
    PlaybackStatusChanged(PlaybackStatus),
    /// Operation failed
    Error(ErrorCode),
}

impl CastEvent {
    /// Unprefixed event name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CastEvent::DeviceAvailable(_) => "DEVICE_AVAILABLE",
            CastEvent::DeviceLost(_) => "DEVICE_LOST",
            CastEvent::DeviceConnected(_) => "DEVICE_CONNECTED",
            CastEvent::DeviceDisconnected(_) => "DEVICE_DISCONNECTED",
            CastEvent::DevicePaired(_) => "DEVICE_PAIRED",
            CastEvent::PinNeeded(_) => "PIN_NEEDED",
            CastEvent::ApListObtained { .. } => "AP_LIST_OBTAINED",
            CastEvent::MetadataChanged(_) => "METADATA_CHANGED",
            CastEvent::PlaybackStatusChanged(_) => "PLAYBACK_STATUS_CHANGED",
            CastEvent::Error(_) => "ERROR_EVENT",
        }
    }

    /// Event name with the host prefix applied
    #[must_use]
    pub fn qualified_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }

    /// JSON payload for the host
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            CastEvent::DeviceAvailable(device)
            | CastEvent::DeviceLost(device)
            | CastEvent::DeviceConnected(device)
            | CastEvent::DeviceDisconnected(device)
            | CastEvent::DevicePaired(device)
            | CastEvent::PinNeeded(device) => json!(device),
            CastEvent::ApListObtained {
                pin_code,
                access_points,
            } => json!({ "pinCode": pin_code, "aps": access_points }),
            CastEvent::MetadataChanged(metadata) => json!(metadata),
            CastEvent::PlaybackStatusChanged(status) => json!({
                "duration": status.duration,
                "muted": status.muted,
                "position": status.position,
                "state": status.state.code(),
                "volume": Volume::new(status.volume).as_percent(),
            }),
            CastEvent::Error(code) => json!(code),
        }
    }

    /// Every unprefixed event name, for exporting to the host
    pub const NAMES: [&'static str; 10] = [
        "AP_LIST_OBTAINED",
        "DEVICE_AVAILABLE",
        "DEVICE_CONNECTED",
        "DEVICE_DISCONNECTED",
        "DEVICE_LOST",
        "DEVICE_PAIRED",
        "ERROR_EVENT",
        "METADATA_CHANGED",
        "PIN_NEEDED",
        "PLAYBACK_STATUS_CHANGED",
    ];
}

/// Destination for boundary events
pub trait EventSink: Send + Sync {
    /// Deliver one event; must not block
    fn emit(&self, event: CastEvent);
}

/// Event sink forwarding to a closure, for host bridges
pub struct CallbackSink {
    callback: Box<dyn Fn(CastEvent) + Send + Sync>,
}

impl CallbackSink {
    /// Wrap a closure
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(CastEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl EventSink for CallbackSink {
    fn emit(&self, event: CastEvent) {
        (self.callback)(event);
    }
}

/// Event bus for distributing events
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<CastEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CastEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: CastEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<CastEvent>,
    filter: Box<dyn Fn(&CastEvent) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&CastEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<CastEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Helper functions for common filters
impl EventFilter {
    /// Filter for discovery and session lifecycle events
    #[must_use]
    pub fn device_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                CastEvent::DeviceAvailable(_)
                    | CastEvent::DeviceLost(_)
                    | CastEvent::DeviceConnected(_)
                    | CastEvent::DeviceDisconnected(_)
            )
        })
    }

    /// Filter for playback events only
    #[must_use]
    pub fn playback_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                CastEvent::PlaybackStatusChanged(_) | CastEvent::MetadataChanged(_)
            )
        })
    }

    /// Filter for error events only
    #[must_use]
    pub fn error_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| matches!(e, CastEvent::Error(_)))
    }
}
