use thiserror::Error;

use crate::item::{ItemId, TrackKind};

/// Errors reported by a signal source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Loading the tracks of an item failed
    #[error("Failed to load {kind:?} tracks for item {item}: {reason}")]
    TrackLoad {
        item: ItemId,
        kind: TrackKind,
        reason: String,
    },

    /// The engine cannot answer right now (torn down, not attached)
    #[error("Signal source unavailable: {0}")]
    Unavailable(String),

    /// A native error could not be turned into text
    #[error("Failed to describe native error: {0}")]
    Description(String),
}

/// Result type for signal source operations
pub type Result<T> = std::result::Result<T, SignalError>;
