//! Device pairing and administration over the private settings channel

use std::sync::Arc;
use std::time::Duration;

use crate::connection::{DeviceLink, PrivateSettings};
use crate::error::{CastError, Result};
use crate::net::bounded;
use crate::state::ErrorCode;
use crate::types::{AccessPoint, AccessPointParams, VersionInfo};

/// Pairing controller
///
/// Every failure is tagged `PAIRING_ERROR`.
#[derive(Clone)]
pub struct PairingController {
    settings: Arc<dyn PrivateSettings>,
    timeout: Duration,
}

impl PairingController {
    /// Wrap a private settings channel
    #[must_use]
    pub fn new(settings: Arc<dyn PrivateSettings>, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    /// Open the private settings channel of a connected link
    ///
    /// # Errors
    ///
    /// Returns `Device` tagged `PAIRING_ERROR` if the device exposes no settings channel.
    pub fn for_link(link: &dyn DeviceLink, timeout: Duration) -> Result<Self> {
        let settings = link.private_settings().ok_or_else(|| {
            CastError::device("private_settings", "device exposes no settings channel")
                .tagged(ErrorCode::Pairing)
        })?;
        Ok(Self::new(settings, timeout))
    }

    /// Read the firmware version, proving the device is reachable
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `PAIRING_ERROR`.
    pub async fn version_info(&self) -> Result<VersionInfo> {
        let info = self
            .call("version_info", self.settings.version_info())
            .await?;
        tracing::debug!("Device firmware {}", info.firmware);
        Ok(info)
    }

    /// Scan for access points; an empty result is a failure
    ///
    /// # Errors
    ///
    /// Returns the device failure, or `Device` when nothing was found, tagged `PAIRING_ERROR`.
    pub async fn scan_access_points(&self, pin_code: u32) -> Result<Vec<AccessPoint>> {
        let access_points = self
            .call(
                "scan_access_points",
                self.settings.scan_access_points(pin_code),
            )
            .await?;

        if access_points.is_empty() {
            return Err(CastError::device("scan_access_points", "no access point found")
                .tagged(ErrorCode::Pairing));
        }
        tracing::debug!("Scan found {} access point(s)", access_points.len());
        Ok(access_points)
    }

    /// Access points from the last scan
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `PAIRING_ERROR`.
    pub async fn access_points(&self) -> Result<Vec<AccessPoint>> {
        self.call("access_points", self.settings.access_points())
            .await
    }

    /// Join the device to an access point
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` or the device failure, tagged `PAIRING_ERROR`.
    pub async fn set_access_point(&self, params: &AccessPointParams) -> Result<()> {
        params.validate().map_err(|e| e.tagged(ErrorCode::Pairing))?;
        tracing::info!("Joining device to {}", params.ssid);
        self.call("set_access_point", self.settings.set_access_point(params))
            .await
    }

    /// Rename the device
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty name or the device failure, tagged `PAIRING_ERROR`.
    pub async fn set_device_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(CastError::invalid_parameter("name", "must not be empty")
                .tagged(ErrorCode::Pairing));
        }
        self.call("set_device_name", self.settings.set_device_name(name))
            .await
    }

    /// Reset the device settings
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `PAIRING_ERROR`.
    pub async fn reset(&self) -> Result<()> {
        self.call("reset", self.settings.reset()).await
    }

    async fn call<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        bounded(operation, self.timeout, future)
            .await
            .map_err(|e| e.tagged(ErrorCode::Pairing))
    }
}
