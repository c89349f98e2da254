//! Signal source capability for observed media engines
//!
//! A media engine exposes a handful of attributes (engine status, rate,
//! volume, time-control status, per-item status and buffering flags) that
//! change on threads the observer does not own. This crate describes that
//! engine as a capability, [`SignalSource`], without committing to any
//! particular observation mechanism.
//!
//! # Architecture
//!
//! ```text
//! Media engine ──► SignalSource ──► (old, new) callbacks ──► observer
//!                      │
//!                      ├── subscribe / subscribe_item    (attribute changes)
//!                      ├── subscribe_item_change         (item replacement)
//!                      ├── subscribe_periodic            (media-time ticks)
//!                      ├── access_log / load_tracks      (track discovery)
//!                      └── playback_position / error_description
//! ```
//!
//! Every registration returns a [`Subscription`], an RAII handle that cancels
//! the native registration when cancelled or dropped.
//!
//! # Testing
//!
//! With the `test-support` feature enabled, [`testing::ScriptedSource`]
//! provides an in-memory engine whose attributes, items, access logs and
//! track loads are driven by the test.

pub mod attribute;
pub mod error;
pub mod item;
pub mod source;
pub mod subscription;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use attribute::{
    Attribute, AttributeScope, AttributeValue, EngineStatus, ItemStatus, ObserveOptions,
    TimeControlStatus,
};
pub use error::{Result, SignalError};
pub use item::{
    AccessLogEntry, ItemHandle, ItemId, NativeItem, PlaybackPosition, SubtitleTrack, TrackHandle,
    TrackKind,
};
pub use source::{
    ChangeCallback, ErrorScope, ItemChangeCallback, SignalSource, TickCallback, TracksCallback,
};
pub use subscription::{wall_clock_ticker, Subscription};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::attribute::{
        Attribute, AttributeValue, EngineStatus, ItemStatus, ObserveOptions, TimeControlStatus,
    };
    pub use crate::item::{ItemHandle, ItemId, NativeItem, TrackHandle, TrackKind};
    pub use crate::source::SignalSource;
    pub use crate::subscription::Subscription;
}
