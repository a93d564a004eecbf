//! Volume scale conversion between host and device

/// Volume level (0.0 = silent, 1.0 = max), the device unit
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f64);

impl Volume {
    /// Minimum volume (silent)
    pub const MIN: Self = Self(0.0);
    /// Maximum volume
    pub const MAX: Self = Self(1.0);

    /// Create a new volume level
    #[must_use]
    pub fn new(level: f64) -> Self {
        if level.is_nan() {
            return Self::MIN;
        }
        Self(level.clamp(0.0, 1.0))
    }

    /// Get as f64 (0.0 - 1.0)
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Get as percentage (0 - 100), the host unit
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Volume percentage fits in u8"
    )]
    pub fn as_percent(&self) -> u8 {
        (self.0 * 100.0).round() as u8
    }

    /// Create from a host percentage (0 - 100)
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        Self::new(percent / 100.0)
    }

    /// Check if effectively silent
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.0 < 0.001
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<f64> for Volume {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}
