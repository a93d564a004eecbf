use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CastError, Result};

/// Wi-Fi access point seen by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Network name
    pub ssid: String,
    /// Signal strength (dBm)
    pub rssi: i32,
    /// Vendor security code, forwarded verbatim
    pub security: u8,
}

/// Parameters for joining the device to an access point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointParams {
    /// Network name
    pub ssid: String,
    /// Network password
    pub password: String,
    /// Specific BSSID, empty for any
    #[serde(default)]
    pub bssid: String,
    /// Vendor security code
    pub security: u8,
    /// PIN shown on the device
    pub pin_code: u32,
}

impl AccessPointParams {
    /// Parse and validate a loose host payload
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if ssid, password, security or pinCode is missing
    /// or malformed.
    pub fn from_value(value: Value) -> Result<Self> {
        let params: Self = serde_json::from_value(value)
            .map_err(|e| CastError::invalid_parameter("setAP", e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Check field contents beyond their types
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the SSID is empty.
    pub fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() {
            return Err(CastError::invalid_parameter("ssid", "must not be empty"));
        }
        Ok(())
    }
}

/// Firmware information returned by the private settings channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    /// Firmware version
    pub firmware: String,
    /// Hardware/model revision, when reported
    pub hardware: Option<String>,
}
