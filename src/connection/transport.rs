//! Seams to the device SDK
//!
//! The wire protocol spoken with the device is owned by the vendor SDK. The
//! core drives it through these traits: a [`DeviceTransport`] opens a
//! [`DeviceConnection`], whose [`DeviceLink`] carries media commands and whose
//! notification channel carries what the device pushes back.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::control::Volume;
use crate::error::Result;
use crate::net::SecureChannelConfig;
use crate::types::{
    AccessPoint, AccessPointParams, CastDevice, Metadata, PlaybackStatus, PrepareParams,
    TrackParams, VersionInfo,
};

/// Asynchronous notifications pushed by a connected device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceNotification {
    /// Remote player status changed
    StatusChanged(PlaybackStatus),
    /// Loaded media metadata changed
    MetadataChanged(Metadata),
    /// The device channel failed and the link is gone
    ChannelFailed {
        /// Failure reported by the channel
        message: String,
    },
}

/// Opens authenticated connections to devices
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Connect and authenticate using the given channel material
    async fn connect(
        &self,
        device: &CastDevice,
        channel: &SecureChannelConfig,
    ) -> Result<DeviceConnection>;
}

/// An established connection: the command link plus its notification stream
pub struct DeviceConnection {
    /// Command link
    pub link: Arc<dyn DeviceLink>,
    /// Notifications pushed by the device
    pub notifications: mpsc::Receiver<DeviceNotification>,
}

impl DeviceConnection {
    /// Bundle a link with its notification stream
    #[must_use]
    pub fn new(
        link: Arc<dyn DeviceLink>,
        notifications: mpsc::Receiver<DeviceNotification>,
    ) -> Self {
        Self {
            link,
            notifications,
        }
    }
}

impl fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("connected", &self.link.is_connected())
            .finish_non_exhaustive()
    }
}

/// Command channel to a connected device
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Whether the underlying channel is still usable
    fn is_connected(&self) -> bool;

    /// Launch the named receiver application
    async fn start_application(&self, name: &str) -> Result<()>;

    /// Load media into the receiver
    async fn prepare(&self, params: &PrepareParams) -> Result<()>;

    /// Resume playback
    async fn resume(&self) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;

    /// Seek to `position` seconds
    async fn seek(&self, position: f64) -> Result<()>;

    /// Stop playback
    async fn stop(&self) -> Result<()>;

    /// Set output volume
    async fn set_volume(&self, volume: Volume) -> Result<()>;

    /// Mute or unmute output
    async fn set_mute(&self, muted: bool) -> Result<()>;

    /// Enable or disable a media track
    async fn set_track(&self, params: &TrackParams) -> Result<()>;

    /// Pull the current metadata
    async fn metadata(&self) -> Result<Metadata>;

    /// Pull the current playback status
    async fn playback_status(&self) -> Result<PlaybackStatus>;

    /// Private settings channel, if the device exposes one
    fn private_settings(&self) -> Option<Arc<dyn PrivateSettings>>;

    /// Close the link
    async fn disconnect(&self) -> Result<()>;
}

/// Vendor settings channel used for pairing and device administration
#[async_trait]
pub trait PrivateSettings: Send + Sync {
    /// Firmware version information
    async fn version_info(&self) -> Result<VersionInfo>;

    /// Scan for Wi-Fi access points, authorized by the PIN shown on the device
    async fn scan_access_points(&self, pin_code: u32) -> Result<Vec<AccessPoint>>;

    /// Access points from the last scan
    async fn access_points(&self) -> Result<Vec<AccessPoint>>;

    /// Join the device to an access point
    async fn set_access_point(&self, params: &AccessPointParams) -> Result<()>;

    /// Rename the device
    async fn set_device_name(&self, name: &str) -> Result<()>;

    /// Factory-reset the device settings
    async fn reset(&self) -> Result<()>;
}
