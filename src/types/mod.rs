//! Core types module

mod config;
mod device;
mod media;
mod settings;

#[cfg(test)]
mod tests;

pub use config::{CastConfig, CastConfigBuilder, CertificateConfig, DEFAULT_SERVICE_TYPE};
pub use device::{CastDevice, ConnectionState};
pub use media::{
    MediaTrack, MediaType, Metadata, PlaybackStatus, PlayerState, PrepareParams, TrackKind,
    TrackParams, TransferMode,
};
pub use settings::{AccessPoint, AccessPointParams, VersionInfo};
