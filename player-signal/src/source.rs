//! The signal source capability

use std::time::Duration;

use crate::attribute::{Attribute, AttributeValue, ObserveOptions};
use crate::error::Result;
use crate::item::{AccessLogEntry, ItemHandle, NativeItem, PlaybackPosition, TrackHandle, TrackKind};
use crate::subscription::{wall_clock_ticker, Subscription};

/// Receives `(old, new)` for one attribute
pub type ChangeCallback = Box<dyn Fn(AttributeValue, AttributeValue) + Send + Sync>;

/// Receives `(old, new)` when the engine replaces its current item
///
/// `None` means no item is bound.
pub type ItemChangeCallback = Box<dyn Fn(Option<NativeItem>, Option<NativeItem>) + Send + Sync>;

/// Completion of an asynchronous track load
pub type TracksCallback = Box<dyn FnOnce(Result<Vec<TrackHandle>>) + Send>;

/// Periodic media-time tick
pub type TickCallback = Box<dyn Fn() + Send + Sync>;

/// Which native error to describe
#[derive(Debug, Clone, Copy)]
pub enum ErrorScope<'a> {
    Engine,
    Item(&'a ItemHandle),
}

/// A media engine as seen by an observer
///
/// Callbacks may be invoked on any thread, including synchronously from
/// inside the registering call (for example the initial notification
/// requested through [`ObserveOptions::initial`]). Implementations must not
/// hold internal locks while invoking callbacks.
pub trait SignalSource: Send + Sync + 'static {
    /// Current value of a player-level attribute
    fn attribute(&self, attribute: Attribute) -> AttributeValue;

    /// Current value of an item-level attribute
    fn item_attribute(&self, item: &ItemHandle, attribute: Attribute) -> AttributeValue;

    /// Observe a player-level attribute
    fn subscribe(
        &self,
        attribute: Attribute,
        options: ObserveOptions,
        on_change: ChangeCallback,
    ) -> Subscription;

    /// Observe an attribute of one specific item
    fn subscribe_item(
        &self,
        item: &ItemHandle,
        attribute: Attribute,
        options: ObserveOptions,
        on_change: ChangeCallback,
    ) -> Subscription;

    /// Observe replacement of the current item
    fn subscribe_item_change(
        &self,
        options: ObserveOptions,
        on_change: ItemChangeCallback,
    ) -> Subscription;

    /// Streaming access log of an item, oldest entry first
    fn access_log(&self, item: &ItemHandle) -> Vec<AccessLogEntry>;

    /// Load the tracks of one kind; `done` may run on any thread, or inline
    fn load_tracks(&self, item: &ItemHandle, kind: TrackKind, done: TracksCallback);

    /// Current playhead, live date and buffered position
    fn playback_position(&self) -> Result<PlaybackPosition>;

    /// Human readable text for the engine or item error, if any
    fn error_description(&self, scope: ErrorScope<'_>) -> Result<Option<String>>;

    /// Tick every `interval` of media time
    ///
    /// The default implementation ticks on the wall clock, for engines that
    /// have no media clock of their own.
    fn subscribe_periodic(&self, interval: Duration, on_tick: TickCallback) -> Subscription {
        if interval.is_zero() {
            tracing::warn!("Refusing periodic subscription with zero interval");
            return Subscription::noop("periodic");
        }
        wall_clock_ticker(interval, on_tick)
    }
}

