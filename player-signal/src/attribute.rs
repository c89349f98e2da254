//! Observable engine attributes and their values

use serde::{Deserialize, Serialize};

use crate::item::TrackHandle;

/// Where an attribute lives on the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeScope {
    /// Bound to the player object for its whole lifetime
    Player,
    /// Bound to the current playable item, replaced with it
    Item,
}

/// A named attribute of the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    EngineStatus,
    Rate,
    Volume,
    Muted,
    TimeControlStatus,
    ItemStatus,
    PlaybackBufferEmpty,
    PlaybackLikelyToKeepUp,
    Tracks,
    /// Event-only attribute, its value is always [`AttributeValue::Unset`]
    PlayedToEnd,
}

impl Attribute {
    /// Attributes observed on the player for its whole lifetime
    pub const PLAYER: [Attribute; 5] = [
        Attribute::EngineStatus,
        Attribute::Rate,
        Attribute::Volume,
        Attribute::Muted,
        Attribute::TimeControlStatus,
    ];

    /// Attributes observed on the current item
    pub const ITEM: [Attribute; 5] = [
        Attribute::ItemStatus,
        Attribute::PlaybackBufferEmpty,
        Attribute::PlaybackLikelyToKeepUp,
        Attribute::Tracks,
        Attribute::PlayedToEnd,
    ];

    pub fn scope(&self) -> AttributeScope {
        match self {
            Attribute::EngineStatus
            | Attribute::Rate
            | Attribute::Volume
            | Attribute::Muted
            | Attribute::TimeControlStatus => AttributeScope::Player,
            Attribute::ItemStatus
            | Attribute::PlaybackBufferEmpty
            | Attribute::PlaybackLikelyToKeepUp
            | Attribute::Tracks
            | Attribute::PlayedToEnd => AttributeScope::Item,
        }
    }

    /// Stable key used in logs
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::EngineStatus => "status",
            Attribute::Rate => "rate",
            Attribute::Volume => "volume",
            Attribute::Muted => "muted",
            Attribute::TimeControlStatus => "time_control_status",
            Attribute::ItemStatus => "item_status",
            Attribute::PlaybackBufferEmpty => "playback_buffer_empty",
            Attribute::PlaybackLikelyToKeepUp => "playback_likely_to_keep_up",
            Attribute::Tracks => "tracks",
            Attribute::PlayedToEnd => "played_to_end",
        }
    }
}

/// Engine-level readiness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Readiness of the current playable item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// What the engine is doing with the playhead
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeControlStatus {
    #[default]
    Paused,
    WaitingToPlay,
    Playing,
}

/// Value of an attribute as reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    EngineStatus(EngineStatus),
    ItemStatus(ItemStatus),
    TimeControl(TimeControlStatus),
    Flag(bool),
    Scalar(f32),
    Tracks(Vec<TrackHandle>),
    /// No value (event-only attributes, or an item attribute with no item)
    Unset,
}

impl AttributeValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            AttributeValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_engine_status(&self) -> Option<EngineStatus> {
        match self {
            AttributeValue::EngineStatus(status) => Some(*status),
            _ => None,
        }
    }

    pub fn as_item_status(&self) -> Option<ItemStatus> {
        match self {
            AttributeValue::ItemStatus(status) => Some(*status),
            _ => None,
        }
    }

    pub fn as_time_control(&self) -> Option<TimeControlStatus> {
        match self {
            AttributeValue::TimeControl(status) => Some(*status),
            _ => None,
        }
    }

    pub fn as_tracks(&self) -> Option<&[TrackHandle]> {
        match self {
            AttributeValue::Tracks(tracks) => Some(tracks),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, AttributeValue::Unset)
    }
}

/// Options for a single attribute registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Deliver the current value once, as both old and new, on subscribe
    pub initial: bool,
}

impl ObserveOptions {
    pub fn initial() -> Self {
        Self { initial: true }
    }

    pub fn changes_only() -> Self {
        Self { initial: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_partition_attributes() {
        for attribute in Attribute::PLAYER {
            assert_eq!(attribute.scope(), AttributeScope::Player);
        }
        for attribute in Attribute::ITEM {
            assert_eq!(attribute.scope(), AttributeScope::Item);
        }
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(AttributeValue::Flag(true).as_flag(), Some(true));
        assert_eq!(AttributeValue::Scalar(0.5).as_flag(), None);
        assert_eq!(
            AttributeValue::ItemStatus(ItemStatus::Failed).as_item_status(),
            Some(ItemStatus::Failed)
        );
        assert!(AttributeValue::Unset.is_unset());
    }
}
