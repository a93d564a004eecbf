//! Media commands and the player state they are gated on

use std::sync::Arc;
use std::time::Duration;

use super::volume::Volume;
use crate::connection::DeviceLink;
use crate::error::{CastError, Result};
use crate::net::bounded;
use crate::state::ErrorCode;
use crate::types::{Metadata, PlaybackStatus, PlayerState, PrepareParams, TrackParams};

/// Last known remote player state.
///
/// Advisory only: it gates resume, pause and the resume-before-seek step, and
/// is updated from successful commands and device status reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStateTracker {
    last: Option<PlayerState>,
}

impl PlayerStateTracker {
    /// Tracker with no state observed yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed state, if any
    #[must_use]
    pub fn last(&self) -> Option<PlayerState> {
        self.last
    }

    /// Resume is only sent to a paused player
    #[must_use]
    pub fn should_resume(&self) -> bool {
        self.last == Some(PlayerState::Paused)
    }

    /// Pause is only sent to a playing player
    #[must_use]
    pub fn should_pause(&self) -> bool {
        self.last == Some(PlayerState::Playing)
    }

    /// A paused player is resumed before it is seeked
    #[must_use]
    pub fn needs_resume_before_seek(&self) -> bool {
        self.should_resume()
    }

    /// Record a successful resume
    pub fn confirm_resumed(&mut self) {
        self.last = Some(PlayerState::Playing);
    }

    /// Record a successful pause
    pub fn confirm_paused(&mut self) {
        self.last = Some(PlayerState::Paused);
    }

    /// Record a status reported by the device
    pub fn observe(&mut self, status: &PlaybackStatus) {
        self.last = Some(status.state);
    }

    /// Forget the state, for a new session
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Convert a host position in milliseconds to whole device seconds
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    reason = "Positions in seconds stay far below 2^52"
)]
pub fn seek_position(position_ms: u64) -> f64 {
    (position_ms / 1000) as f64
}

/// Issues media commands on a connected link.
///
/// Every call is bounded by the operation timeout and tagged with the error
/// code of its command.
#[derive(Clone)]
pub struct MediaCommandQueue {
    link: Arc<dyn DeviceLink>,
    timeout: Duration,
}

impl MediaCommandQueue {
    /// Bind to a connected link
    #[must_use]
    pub fn new(link: Arc<dyn DeviceLink>, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    /// The bound link
    #[must_use]
    pub fn link(&self) -> &Arc<dyn DeviceLink> {
        &self.link
    }

    /// Launch the receiver application
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `CONNECT_FAILED`.
    pub async fn launch(&self, application: &str) -> Result<()> {
        tracing::debug!("Starting receiver application {}", application);
        self.call(
            "start_application",
            ErrorCode::ConnectFailed,
            self.link.start_application(application),
        )
        .await
    }

    /// Load media into the receiver
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` or the device failure, tagged `CAST_FAILED`.
    pub async fn prepare(&self, params: &PrepareParams) -> Result<()> {
        params.validate().map_err(|e| e.tagged(ErrorCode::CastFailed))?;
        tracing::debug!("Preparing {} ({})", params.url, params.media_type.as_str());
        self.call("prepare", ErrorCode::CastFailed, self.link.prepare(params))
            .await
    }

    /// Resume playback
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `RESUME_FAILED`.
    pub async fn resume(&self) -> Result<()> {
        self.call("resume", ErrorCode::ResumeFailed, self.link.resume())
            .await
    }

    /// Pause playback
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `PAUSE_FAILED`.
    pub async fn pause(&self) -> Result<()> {
        self.call("pause", ErrorCode::PauseFailed, self.link.pause())
            .await
    }

    /// Seek to a host position in milliseconds
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `SEEK_FAILED`.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        let position = seek_position(position_ms);
        tracing::debug!("Seeking to {}s", position);
        self.call("seek", ErrorCode::SeekFailed, self.link.seek(position))
            .await
    }

    /// Stop playback
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `STOP_FAILED`.
    pub async fn stop(&self) -> Result<()> {
        self.call("stop", ErrorCode::StopFailed, self.link.stop())
            .await
    }

    /// Set volume from a host percentage; out-of-range levels are clamped
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for NaN or the device failure, tagged `VOLUME_FAILED`.
    pub async fn set_volume(&self, percent: f64) -> Result<()> {
        if percent.is_nan() {
            return Err(CastError::invalid_parameter("volume", "not a number")
                .tagged(ErrorCode::VolumeFailed));
        }
        let volume = Volume::from_percent(percent);
        self.call(
            "set_volume",
            ErrorCode::VolumeFailed,
            self.link.set_volume(volume),
        )
        .await
    }

    /// Mute or unmute
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `MUTE_FAILED`.
    pub async fn set_mute(&self, muted: bool) -> Result<()> {
        self.call("set_mute", ErrorCode::MuteFailed, self.link.set_mute(muted))
            .await
    }

    /// Enable an audio track
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `SETTING_TRACK_FAILED`.
    pub async fn set_audio_track(&self, track_id: &str) -> Result<()> {
        let params = TrackParams::audio(track_id);
        self.call(
            "set_track",
            ErrorCode::SettingTrackFailed,
            self.link.set_track(&params),
        )
        .await
    }

    /// Pull the current metadata
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `METADATA_UPDATE_FAILED`.
    pub async fn metadata(&self) -> Result<Metadata> {
        self.call(
            "metadata",
            ErrorCode::MetadataUpdateFailed,
            self.link.metadata(),
        )
        .await
    }

    /// Pull the current playback status
    ///
    /// # Errors
    ///
    /// Returns the device failure tagged `PLAYBACK_STATUS_UPDATE_FAILED`.
    pub async fn playback_status(&self) -> Result<PlaybackStatus> {
        self.call(
            "playback_status",
            ErrorCode::PlaybackStatusUpdateFailed,
            self.link.playback_status(),
        )
        .await
    }

    async fn call<T, F>(&self, operation: &str, code: ErrorCode, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        bounded(operation, self.timeout, future)
            .await
            .map_err(|e| e.tagged(code))
    }
}
