use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::state::ErrorCode;

/// Errors that can occur while driving a cast device
#[derive(Debug, Error)]
pub enum CastError {
    // ===== Discovery Errors =====
    /// Device is not in the discovered set
    #[error("device not found: {device_id}")]
    DeviceNotFound {
        /// The ID of the device that was not found
        device_id: String,
    },

    /// Discovery backend failed
    #[error("discovery failed: {message}")]
    DiscoveryFailed {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Connection Errors =====
    /// Failed to establish connection to device
    #[error("connection failed to {device_name}: {message}")]
    ConnectionFailed {
        /// The name of the device
        device_name: String,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No device is selected or no link is established
    #[error("no device connected")]
    NotConnected,

    /// Certificate material could not be loaded
    #[error("certificate unavailable: {message}")]
    Certificate {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// TLS connector could not be built from the channel configuration
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    // ===== Device Errors =====
    /// The device rejected or failed a command
    #[error("{operation} failed on device: {message}")]
    Device {
        /// The operation that failed
        operation: String,
        /// Description of the failure reported by the device
        message: String,
    },

    /// Operation did not complete in time
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The timeout that elapsed
        duration: Duration,
    },

    // ===== Caller Errors =====
    /// Invalid parameter provided
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    // ===== Session Errors =====
    /// A newer session replaced the one this completion belongs to
    #[error("session superseded")]
    SessionSuperseded,

    /// Failure of a boundary operation, tagged with its error code
    #[error("{code}: {source}")]
    Operation {
        /// Code reported to the event sink
        code: ErrorCode,
        /// The underlying failure
        #[source]
        source: Box<CastError>,
    },

    // ===== I/O Errors =====
    /// Network I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    // ===== Internal Errors =====
    /// Internal library error
    #[error("internal error: {message}")]
    InternalError {
        /// Description of the error
        message: String,
    },
}

impl CastError {
    /// Shorthand for a device-side failure of `operation`
    pub fn device(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Device {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an invalid caller-supplied parameter
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Tag this error with a boundary code.
    ///
    /// An error that already carries a code keeps it, so the innermost
    /// failing step of a chain decides what the caller sees.
    #[must_use]
    pub fn tagged(self, code: ErrorCode) -> Self {
        match self {
            Self::Operation { .. } | Self::SessionSuperseded => self,
            other => Self::Operation {
                code,
                source: Box::new(other),
            },
        }
    }

    /// The boundary code this error was tagged with, if any
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Operation { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The tagged code, or `default` for untagged errors
    #[must_use]
    pub fn code_or(&self, default: ErrorCode) -> ErrorCode {
        self.code().unwrap_or(default)
    }

    /// Check if this completion belongs to a replaced session
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        match self {
            Self::SessionSuperseded => true,
            Self::Operation { source, .. } => source.is_superseded(),
            _ => false,
        }
    }

    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NetworkError(_) | Self::ConnectionFailed { .. } => true,
            Self::Operation { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Check if this error indicates connection loss
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => true,
            Self::Operation { source, .. } => source.is_connection_lost(),
            _ => false,
        }
    }
}

/// Result type alias for cast operations
pub type Result<T> = std::result::Result<T, CastError>;
