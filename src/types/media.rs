use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CastError, Result};

/// Playback state reported by the receiver application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// State could not be determined
    #[default]
    Unknown,
    /// Nothing loaded or playback finished
    Idle,
    /// Media is playing
    Playing,
    /// Playback is paused
    Paused,
    /// Waiting for data
    Buffering,
}

impl PlayerState {
    /// Every state, in code order
    pub const ALL: [PlayerState; 5] = [
        PlayerState::Unknown,
        PlayerState::Idle,
        PlayerState::Playing,
        PlayerState::Paused,
        PlayerState::Buffering,
    ];

    /// Integer code exchanged with the host
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            PlayerState::Unknown => 0,
            PlayerState::Idle => 1,
            PlayerState::Playing => 2,
            PlayerState::Paused => 3,
            PlayerState::Buffering => 4,
        }
    }

    /// Decode a host/device code; anything unrecognized is `Unknown`
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PlayerState::Idle,
            2 => PlayerState::Playing,
            3 => PlayerState::Paused,
            4 => PlayerState::Buffering,
            _ => PlayerState::Unknown,
        }
    }
}

/// Snapshot of the remote player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStatus {
    /// Media duration (seconds)
    pub duration: f64,
    /// Current position (seconds)
    pub position: f64,
    /// Device volume (0.0 - 1.0)
    pub volume: f64,
    /// Whether output is muted
    pub muted: bool,
    /// Player state
    pub state: PlayerState,
}

/// One selectable audio or subtitle track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    /// Track identifier
    pub id: String,
    /// Whether the track is currently active
    pub enabled: bool,
    /// Display label
    pub label: String,
    /// Language tag
    pub language: String,
}

/// Metadata of the loaded media
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Title
    pub title: String,
    /// Subtitle
    pub subtitle: String,
    /// Available audio tracks
    pub audio_tracks: Vec<MediaTrack>,
    /// Available subtitle tracks
    pub subtitle_tracks: Vec<MediaTrack>,
}

/// Kind of media being cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Audio only
    Audio,
    /// Still image
    Image,
    /// Video
    Video,
}

impl MediaType {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// How the receiver fetches the media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Progressive download
    Buffered,
    /// Live stream
    Streamed,
}

impl TransferMode {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Buffered => "buffered",
            TransferMode::Streamed => "streamed",
        }
    }
}

/// Parameters of a prepare (cast) command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareParams {
    /// Media URL
    pub url: String,
    /// Status update frequency requested from the receiver (seconds)
    pub frequency: u32,
    /// Title shown on the receiver
    pub title: String,
    /// Subtitle shown on the receiver
    pub subtitle: String,
    /// Logo URL shown on the receiver
    #[serde(default)]
    pub logo: Option<String>,
    /// Media kind
    pub media_type: MediaType,
    /// Transfer mode
    pub transfer_mode: TransferMode,
    /// Start playback as soon as the media is loaded
    pub autoplay: bool,
    /// Free-form receiver options
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl PrepareParams {
    /// Parse and validate a loose host payload
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a required field is missing or has the wrong type.
    pub fn from_value(value: Value) -> Result<Self> {
        let params: Self = serde_json::from_value(value)
            .map_err(|e| CastError::invalid_parameter("castMedia", e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Check field contents beyond their types
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the URL is empty.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(CastError::invalid_parameter("url", "must not be empty"));
        }
        Ok(())
    }
}

/// Kind of track addressed by a track command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Subtitle/text track
    Text,
    /// Video track
    Video,
}

/// Parameters of a track selection command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackParams {
    /// Track identifier
    pub track_id: String,
    /// Track kind
    pub kind: TrackKind,
    /// Enable or disable the track
    pub enabled: bool,
}

impl TrackParams {
    /// Enable the given audio track
    #[must_use]
    pub fn audio(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            kind: TrackKind::Audio,
            enabled: true,
        }
    }
}
