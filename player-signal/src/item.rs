//! Playable items, tracks and access-log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one playable item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::new(s)
    }
}

const HLS_CONTENT_TYPES: [&str; 3] = [
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "audio/mpegurl",
];

/// One playable unit bound to the engine
///
/// The handle is a plain value: observers keep their own copy so that
/// "old item" notifications stay valid after the engine drops the item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemHandle {
    pub id: ItemId,
    /// Source URI the item was created from
    pub uri: String,
    pub content_type: Option<String>,
}

impl ItemHandle {
    pub fn new(id: impl Into<ItemId>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether the item is an adaptive (HLS) stream
    ///
    /// Adaptive streams never report the active video track directly; it has
    /// to be inferred from the access log.
    pub fn is_adaptive(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            let content_type = content_type.to_ascii_lowercase();
            if HLS_CONTENT_TYPES.contains(&content_type.as_str()) {
                return true;
            }
        }
        let path = self.uri.split(['?', '#']).next().unwrap_or_default();
        path.to_ascii_lowercase().ends_with(".m3u8")
    }
}

/// The item the engine reports after a replacement
#[derive(Debug, Clone, PartialEq)]
pub enum NativeItem {
    /// An item of the kind observers know how to watch
    Playable(ItemHandle),
    /// Something else was bound to the engine
    Foreign { description: String },
}

impl NativeItem {
    pub fn playable(&self) -> Option<&ItemHandle> {
        match self {
            NativeItem::Playable(item) => Some(item),
            NativeItem::Foreign { .. } => None,
        }
    }
}

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

/// One selectable track of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackHandle {
    /// Identifier, for adaptive streams the variant playlist path relative
    /// to the master playlist
    pub id: String,
    pub kind: TrackKind,
    pub label: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: Option<u64>,
    pub frame_rate: Option<f32>,
}

impl TrackHandle {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            width: None,
            height: None,
            bitrate: None,
            frame_rate: None,
        }
    }

    pub fn video(id: impl Into<String>) -> Self {
        Self::new(id, TrackKind::Video)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }
}

/// A subtitle choice, owned by whoever drives subtitle selection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub id: String,
    pub language: Option<String>,
    pub label: Option<String>,
}

impl SubtitleTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: None,
            label: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// One entry of an item's streaming access log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// URI of the segment or playlist fetched; engines may omit it
    pub uri: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AccessLogEntry {
    pub fn new(uri: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self { uri, timestamp }
    }
}

/// Playhead and buffer position as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    /// Current playhead position in seconds
    pub current_time: f64,
    /// Wall-clock date of the playhead, for live streams
    pub live_timestamp: Option<DateTime<Utc>>,
    /// End of the furthest buffered range, in seconds
    pub buffered_position: f64,
}
