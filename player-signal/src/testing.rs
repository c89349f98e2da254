//! Scripted in-memory signal source
//!
//! `ScriptedSource` plays the part of a media engine in tests: the test sets
//! attribute values, replaces items, appends access-log entries and decides
//! when track loads complete. Every change is delivered synchronously on the
//! calling thread, with `(old, new)` values, exactly like a key-value
//! observation would be.
//!
//! ```rust,ignore
//! let source = ScriptedSource::new();
//! let item = ItemHandle::new("movie", "https://cdn/movie.mp4");
//! source.replace_item(Some(NativeItem::Playable(item.clone())));
//! source.set_item_attribute(&item.id, Attribute::ItemStatus,
//!     AttributeValue::ItemStatus(ItemStatus::ReadyToPlay));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::attribute::{
    Attribute, AttributeValue, EngineStatus, ItemStatus, ObserveOptions, TimeControlStatus,
};
use crate::error::{Result, SignalError};
use crate::item::{
    AccessLogEntry, ItemHandle, ItemId, NativeItem, PlaybackPosition, TrackHandle, TrackKind,
};
use crate::source::{
    ChangeCallback, ErrorScope, ItemChangeCallback, SignalSource, TickCallback, TracksCallback,
};
use crate::subscription::Subscription;

type SharedChange = Arc<dyn Fn(AttributeValue, AttributeValue) + Send + Sync>;
type SharedItemChange = Arc<dyn Fn(Option<NativeItem>, Option<NativeItem>) + Send + Sync>;
type SharedTick = Arc<dyn Fn() + Send + Sync>;

struct PendingLoad {
    item: ItemId,
    kind: TrackKind,
    done: TracksCallback,
}

#[derive(Default)]
struct ScriptState {
    player_values: HashMap<Attribute, AttributeValue>,
    item_values: HashMap<(ItemId, Attribute), AttributeValue>,
    current_item: Option<NativeItem>,

    player_subs: HashMap<u64, (Attribute, SharedChange)>,
    item_subs: HashMap<u64, (ItemId, Attribute, SharedChange)>,
    item_change_subs: HashMap<u64, SharedItemChange>,
    periodic_subs: HashMap<u64, (Duration, SharedTick)>,

    access_logs: HashMap<ItemId, Vec<AccessLogEntry>>,
    tracks: HashMap<ItemId, std::result::Result<Vec<TrackHandle>, String>>,
    defer_track_loads: bool,
    pending_loads: Vec<PendingLoad>,
    load_requests: usize,

    position: PlaybackPosition,
    position_error: Option<String>,
    engine_error: Option<String>,
    item_errors: HashMap<ItemId, String>,
    broken_descriptions: bool,
}

impl ScriptState {
    fn remove(&mut self, id: u64) {
        self.player_subs.remove(&id);
        self.item_subs.remove(&id);
        self.item_change_subs.remove(&id);
        self.periodic_subs.remove(&id);
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<ScriptState>,
    next_id: AtomicU64,
}

/// In-memory media engine driven by the test
#[derive(Clone, Default)]
pub struct ScriptedSource {
    inner: Arc<Inner>,
}

/// Value an attribute has before anything was set
pub fn default_value(attribute: Attribute) -> AttributeValue {
    match attribute {
        Attribute::EngineStatus => AttributeValue::EngineStatus(EngineStatus::Unknown),
        Attribute::Rate => AttributeValue::Scalar(0.0),
        Attribute::Volume => AttributeValue::Scalar(1.0),
        Attribute::Muted => AttributeValue::Flag(false),
        Attribute::TimeControlStatus => AttributeValue::TimeControl(TimeControlStatus::Paused),
        Attribute::ItemStatus => AttributeValue::ItemStatus(ItemStatus::Unknown),
        Attribute::PlaybackBufferEmpty => AttributeValue::Flag(true),
        Attribute::PlaybackLikelyToKeepUp => AttributeValue::Flag(false),
        Attribute::Tracks => AttributeValue::Tracks(Vec::new()),
        Attribute::PlayedToEnd => AttributeValue::Unset,
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, insert: impl FnOnce(&mut ScriptState, u64), label: &'static str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.inner.state.lock();
            insert(&mut *state, id);
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(label, move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.lock().remove(id);
            }
        })
    }

    // ------------------------------------------------------------------
    // Driving the engine
    // ------------------------------------------------------------------

    /// Set a player-level attribute and notify its observers
    pub fn set_attribute(&self, attribute: Attribute, value: AttributeValue) {
        let (old, callbacks) = {
            let mut state = self.inner.state.lock();
            let old = state
                .player_values
                .insert(attribute, value.clone())
                .unwrap_or_else(|| default_value(attribute));
            let callbacks: Vec<SharedChange> = state
                .player_subs
                .values()
                .filter(|(observed, _)| *observed == attribute)
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            (old, callbacks)
        };

        for callback in callbacks {
            callback(old.clone(), value.clone());
        }
    }

    /// Set an attribute of one item and notify that item's observers
    pub fn set_item_attribute(&self, item: &ItemId, attribute: Attribute, value: AttributeValue) {
        let (old, callbacks) = {
            let mut state = self.inner.state.lock();
            let old = state
                .item_values
                .insert((item.clone(), attribute), value.clone())
                .unwrap_or_else(|| default_value(attribute));
            let callbacks: Vec<SharedChange> = state
                .item_subs
                .values()
                .filter(|(observed_item, observed, _)| observed_item == item && *observed == attribute)
                .map(|(_, _, callback)| Arc::clone(callback))
                .collect();
            (old, callbacks)
        };

        for callback in callbacks {
            callback(old.clone(), value.clone());
        }
    }

    /// Report that an item played to its end
    pub fn finish_item(&self, item: &ItemId) {
        self.set_item_attribute(item, Attribute::PlayedToEnd, AttributeValue::Unset);
    }

    /// Replace the current item and notify item-change observers
    pub fn replace_item(&self, item: Option<NativeItem>) {
        let (old, callbacks) = {
            let mut state = self.inner.state.lock();
            let old = std::mem::replace(&mut state.current_item, item.clone());
            let callbacks: Vec<SharedItemChange> =
                state.item_change_subs.values().map(Arc::clone).collect();
            (old, callbacks)
        };

        for callback in callbacks {
            callback(old.clone(), item.clone());
        }
    }

    pub fn current_item(&self) -> Option<NativeItem> {
        self.inner.state.lock().current_item.clone()
    }

    /// Append an access-log entry for an item
    pub fn push_access_log(&self, item: &ItemId, uri: Option<&str>) {
        let entry = AccessLogEntry::new(uri.map(str::to_string), Utc::now());
        self.inner
            .state
            .lock()
            .access_logs
            .entry(item.clone())
            .or_default()
            .push(entry);
    }

    /// Tracks returned by subsequent loads for an item
    pub fn set_tracks(&self, item: &ItemId, tracks: Vec<TrackHandle>) {
        self.inner.state.lock().tracks.insert(item.clone(), Ok(tracks));
    }

    /// Make subsequent loads for an item fail
    pub fn fail_tracks(&self, item: &ItemId, reason: &str) {
        self.inner
            .state
            .lock()
            .tracks
            .insert(item.clone(), Err(reason.to_string()));
    }

    /// Hold track loads until [`ScriptedSource::resolve_pending_loads`]
    pub fn defer_track_loads(&self, defer: bool) {
        self.inner.state.lock().defer_track_loads = defer;
    }

    /// Complete every deferred track load, returning how many completed
    pub fn resolve_pending_loads(&self) -> usize {
        let pending = std::mem::take(&mut self.inner.state.lock().pending_loads);
        let count = pending.len();
        for load in pending {
            let result = self.track_result(&load.item, load.kind);
            (load.done)(result);
        }
        count
    }

    pub fn set_position(&self, position: PlaybackPosition) {
        let mut state = self.inner.state.lock();
        state.position = position;
        state.position_error = None;
    }

    pub fn fail_position(&self, reason: &str) {
        self.inner.state.lock().position_error = Some(reason.to_string());
    }

    /// Fire every periodic observer once
    pub fn tick(&self) {
        let callbacks: Vec<SharedTick> = self
            .inner
            .state
            .lock()
            .periodic_subs
            .values()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn set_engine_error(&self, description: Option<&str>) {
        self.inner.state.lock().engine_error = description.map(str::to_string);
    }

    pub fn set_item_error(&self, item: &ItemId, description: &str) {
        self.inner
            .state
            .lock()
            .item_errors
            .insert(item.clone(), description.to_string());
    }

    /// Make every error description request fail
    pub fn break_error_descriptions(&self) {
        self.inner.state.lock().broken_descriptions = true;
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn player_subscription_count(&self) -> usize {
        self.inner.state.lock().player_subs.len()
    }

    pub fn item_subscription_count(&self, item: &ItemId) -> usize {
        self.inner
            .state
            .lock()
            .item_subs
            .values()
            .filter(|(observed_item, _, _)| observed_item == item)
            .count()
    }

    pub fn item_change_subscription_count(&self) -> usize {
        self.inner.state.lock().item_change_subs.len()
    }

    pub fn periodic_intervals(&self) -> Vec<Duration> {
        self.inner
            .state
            .lock()
            .periodic_subs
            .values()
            .map(|(interval, _)| *interval)
            .collect()
    }

    /// Registrations of any kind still alive
    pub fn total_subscription_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.player_subs.len()
            + state.item_subs.len()
            + state.item_change_subs.len()
            + state.periodic_subs.len()
    }

    pub fn load_requests(&self) -> usize {
        self.inner.state.lock().load_requests
    }

    fn track_result(&self, item: &ItemId, kind: TrackKind) -> Result<Vec<TrackHandle>> {
        match self.inner.state.lock().tracks.get(item) {
            Some(Ok(tracks)) => Ok(tracks.iter().filter(|t| t.kind == kind).cloned().collect()),
            Some(Err(reason)) => Err(SignalError::TrackLoad {
                item: item.clone(),
                kind,
                reason: reason.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

impl SignalSource for ScriptedSource {
    fn attribute(&self, attribute: Attribute) -> AttributeValue {
        self.inner
            .state
            .lock()
            .player_values
            .get(&attribute)
            .cloned()
            .unwrap_or_else(|| default_value(attribute))
    }

    fn item_attribute(&self, item: &ItemHandle, attribute: Attribute) -> AttributeValue {
        self.inner
            .state
            .lock()
            .item_values
            .get(&(item.id.clone(), attribute))
            .cloned()
            .unwrap_or_else(|| default_value(attribute))
    }

    fn subscribe(
        &self,
        attribute: Attribute,
        options: ObserveOptions,
        on_change: ChangeCallback,
    ) -> Subscription {
        let callback: SharedChange = Arc::from(on_change);
        let stored = Arc::clone(&callback);
        let subscription = self.register(
            move |state, id| {
                state.player_subs.insert(id, (attribute, stored));
            },
            attribute.key(),
        );

        if options.initial {
            let current = self.attribute(attribute);
            callback(current.clone(), current);
        }
        subscription
    }

    fn subscribe_item(
        &self,
        item: &ItemHandle,
        attribute: Attribute,
        options: ObserveOptions,
        on_change: ChangeCallback,
    ) -> Subscription {
        let callback: SharedChange = Arc::from(on_change);
        let stored = Arc::clone(&callback);
        let item_id = item.id.clone();
        let subscription = self.register(
            move |state, id| {
                state.item_subs.insert(id, (item_id, attribute, stored));
            },
            attribute.key(),
        );

        if options.initial {
            let current = self.item_attribute(item, attribute);
            callback(current.clone(), current);
        }
        subscription
    }

    fn subscribe_item_change(
        &self,
        options: ObserveOptions,
        on_change: ItemChangeCallback,
    ) -> Subscription {
        let callback: SharedItemChange = Arc::from(on_change);
        let stored = Arc::clone(&callback);
        let subscription = self.register(
            move |state, id| {
                state.item_change_subs.insert(id, stored);
            },
            "current_item",
        );

        if options.initial {
            let current = self.current_item();
            callback(current.clone(), current);
        }
        subscription
    }

    fn access_log(&self, item: &ItemHandle) -> Vec<AccessLogEntry> {
        self.inner
            .state
            .lock()
            .access_logs
            .get(&item.id)
            .cloned()
            .unwrap_or_default()
    }

    fn load_tracks(&self, item: &ItemHandle, kind: TrackKind, done: TracksCallback) {
        let defer = {
            let mut state = self.inner.state.lock();
            state.load_requests += 1;
            state.defer_track_loads
        };

        if defer {
            self.inner.state.lock().pending_loads.push(PendingLoad {
                item: item.id.clone(),
                kind,
                done,
            });
            return;
        }

        let result = self.track_result(&item.id, kind);
        done(result);
    }

    fn playback_position(&self) -> Result<PlaybackPosition> {
        let state = self.inner.state.lock();
        match &state.position_error {
            Some(reason) => Err(SignalError::Unavailable(reason.clone())),
            None => Ok(state.position.clone()),
        }
    }

    fn error_description(&self, scope: ErrorScope<'_>) -> Result<Option<String>> {
        let state = self.inner.state.lock();
        if state.broken_descriptions {
            return Err(SignalError::Description(
                "native error has no readable description".to_string(),
            ));
        }
        Ok(match scope {
            ErrorScope::Engine => state.engine_error.clone(),
            ErrorScope::Item(item) => state.item_errors.get(&item.id).cloned(),
        })
    }

    fn subscribe_periodic(&self, interval: Duration, on_tick: TickCallback) -> Subscription {
        let callback: SharedTick = Arc::from(on_tick);
        self.register(
            move |state, id| {
                state.periodic_subs.insert(id, (interval, callback));
            },
            "periodic",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_initial_notification_reports_current_value() {
        let source = ScriptedSource::new();
        source.set_attribute(Attribute::Volume, AttributeValue::Scalar(0.25));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = source.subscribe(
            Attribute::Volume,
            ObserveOptions::initial(),
            Box::new(move |old, new| sink.lock().push((old, new))),
        );

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![(AttributeValue::Scalar(0.25), AttributeValue::Scalar(0.25))]
        );
    }

    #[test]
    fn test_cancelled_subscription_is_not_notified() {
        let source = ScriptedSource::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let subscription = source.subscribe(
            Attribute::Rate,
            ObserveOptions::changes_only(),
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        source.set_attribute(Attribute::Rate, AttributeValue::Scalar(1.0));
        subscription.cancel();
        source.set_attribute(Attribute::Rate, AttributeValue::Scalar(2.0));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(source.total_subscription_count(), 0);
    }

    #[test]
    fn test_item_attributes_are_scoped_to_their_item() {
        let source = ScriptedSource::new();
        let first = ItemHandle::new("first", "https://cdn/a.mp4");
        let second = ItemHandle::new("second", "https://cdn/b.mp4");

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _subscription = source.subscribe_item(
            &first,
            Attribute::ItemStatus,
            ObserveOptions::changes_only(),
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        source.set_item_attribute(
            &second.id,
            Attribute::ItemStatus,
            AttributeValue::ItemStatus(ItemStatus::ReadyToPlay),
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(source.item_subscription_count(&first.id), 1);
    }

    #[test]
    fn test_deferred_track_loads() {
        let source = ScriptedSource::new();
        let item = ItemHandle::new("movie", "https://cdn/movie.mp4");
        source.set_tracks(
            &item.id,
            vec![TrackHandle::video("v1"), TrackHandle::new("a1", TrackKind::Audio)],
        );
        source.defer_track_loads(true);

        let loaded = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&loaded);
        source.load_tracks(
            &item,
            TrackKind::Video,
            Box::new(move |result| *sink.lock() = Some(result)),
        );
        assert!(loaded.lock().is_none());

        assert_eq!(source.resolve_pending_loads(), 1);
        let result = loaded.lock().take().unwrap().unwrap();
        assert_eq!(result, vec![TrackHandle::video("v1")]);
    }
}
