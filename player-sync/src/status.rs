//! Canonical player status and the values published to delegates

use chrono::{DateTime, Utc};
use player_signal::{ItemHandle, PlaybackPosition, SubtitleTrack, TimeControlStatus, TrackHandle};
use serde::{Deserialize, Serialize};

/// Message used when a native error has no readable description
pub const GENERIC_ERROR_MESSAGE: &str = "Unknown playback error";

/// Single derived playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[default]
    Idle,
    Loading,
    ReadyToPlay,
    Error,
}

impl PlayerStatus {
    /// Whether the current item counts as loaded in this status
    pub fn is_settled(&self) -> bool {
        matches!(self, PlayerStatus::ReadyToPlay | PlayerStatus::Error)
    }
}

/// Where a playback failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Engine,
    Item,
}

/// A playback failure with a best-effort message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Derived state owned by the observer's worker
///
/// `error` is `Some` exactly when `status` is [`PlayerStatus::Error`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalState {
    pub status: PlayerStatus,
    pub is_playing: bool,
    pub error: Option<ErrorInfo>,
    pub current_item: Option<ItemHandle>,
    pub current_video_track: Option<TrackHandle>,
    pub loaded_current_item: bool,
}

/// Audio session mixing policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioMixingMode {
    MixWithOthers,
    DuckOthers,
    #[default]
    Auto,
    DoNotMix,
}

/// Copy of everything the observer knows, published after each event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(flatten)]
    pub state: CanonicalState,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub time_control: TimeControlStatus,
    pub likely_to_keep_up: bool,
    pub audio_mixing_mode: AudioMixingMode,
    pub subtitle: Option<SubtitleTrack>,
}

/// One media-time sample delivered to delegates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSample {
    /// Playhead position in seconds
    pub current_time: f64,
    pub current_live_timestamp: Option<DateTime<Utc>>,
    /// Seconds between the live edge (`now`) and the playhead date
    pub current_offset_from_live: Option<f64>,
    /// End of the furthest buffered range in seconds
    pub buffered_position: f64,
}

impl TimeSample {
    pub fn from_position(position: &PlaybackPosition, now: DateTime<Utc>) -> Self {
        let offset = position
            .live_timestamp
            .map(|live| (now - live).num_milliseconds() as f64 / 1000.0);

        Self {
            current_time: position.current_time,
            current_live_timestamp: position.live_timestamp,
            current_offset_from_live: offset,
            buffered_position: position.buffered_position,
        }
    }
}
