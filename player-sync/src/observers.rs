//! Attribute observers and the typed events they produce
//!
//! Each observer wraps one native registration on the signal source. Raw
//! `(old, new)` values are decoded into [`SignalEvent`]s before they reach
//! the worker, the same way property changes are decoded from raw device
//! events before they are applied to a store.

use player_signal::{
    Attribute, AttributeValue, EngineStatus, ItemHandle, ItemStatus, NativeItem, ObserveOptions,
    SignalSource, Subscription, TimeControlStatus, TrackHandle,
};

/// Typed change of one engine signal
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    EngineStatus(EngineStatus),
    Rate(f32),
    Volume(f32),
    Muted(bool),
    TimeControl(TimeControlStatus),
    ItemStatus(ItemStatus),
    BufferEmpty(bool),
    LikelyToKeepUp(bool),
    TracksChanged(Vec<TrackHandle>),
    PlayedToEnd,
}

/// Raw notification for one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub attribute: Attribute,
    pub old: AttributeValue,
    pub new: AttributeValue,
}

impl AttributeChange {
    pub fn new(attribute: Attribute, old: AttributeValue, new: AttributeValue) -> Self {
        Self {
            attribute,
            old,
            new,
        }
    }

    /// Decode the new value into a typed event
    ///
    /// Returns `None` when the value does not have the attribute's type,
    /// which is how engines report an attribute with nothing behind it.
    pub fn decode(&self) -> Option<SignalEvent> {
        let new = &self.new;
        match self.attribute {
            Attribute::EngineStatus => new.as_engine_status().map(SignalEvent::EngineStatus),
            Attribute::Rate => new.as_scalar().map(SignalEvent::Rate),
            Attribute::Volume => new.as_scalar().map(SignalEvent::Volume),
            Attribute::Muted => new.as_flag().map(SignalEvent::Muted),
            Attribute::TimeControlStatus => new.as_time_control().map(SignalEvent::TimeControl),
            Attribute::ItemStatus => new.as_item_status().map(SignalEvent::ItemStatus),
            Attribute::PlaybackBufferEmpty => new.as_flag().map(SignalEvent::BufferEmpty),
            Attribute::PlaybackLikelyToKeepUp => new.as_flag().map(SignalEvent::LikelyToKeepUp),
            Attribute::Tracks => new
                .as_tracks()
                .map(|tracks| SignalEvent::TracksChanged(tracks.to_vec())),
            Attribute::PlayedToEnd => Some(SignalEvent::PlayedToEnd),
        }
    }
}

/// Whether an attribute gets the immediate initial notification
pub fn wants_initial(attribute: Attribute) -> bool {
    matches!(
        attribute,
        Attribute::EngineStatus
            | Attribute::TimeControlStatus
            | Attribute::ItemStatus
            | Attribute::PlaybackBufferEmpty
            | Attribute::PlaybackLikelyToKeepUp
    )
}

/// What an observer is attached to
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverTarget {
    Player,
    Item(ItemHandle),
}

/// One watched attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeObserver {
    pub target: ObserverTarget,
    pub attribute: Attribute,
    pub options: ObserveOptions,
}

impl AttributeObserver {
    fn new(target: ObserverTarget, attribute: Attribute, initial_notify: bool) -> Self {
        let options = if initial_notify && wants_initial(attribute) {
            ObserveOptions::initial()
        } else {
            ObserveOptions::changes_only()
        };
        Self {
            target,
            attribute,
            options,
        }
    }

    pub fn player(attribute: Attribute, initial_notify: bool) -> Self {
        Self::new(ObserverTarget::Player, attribute, initial_notify)
    }

    pub fn item(item: &ItemHandle, attribute: Attribute, initial_notify: bool) -> Self {
        Self::new(ObserverTarget::Item(item.clone()), attribute, initial_notify)
    }

    /// Register with the source; the handle cancels the registration
    pub fn start<F>(&self, source: &dyn SignalSource, on_change: F) -> Subscription
    where
        F: Fn(AttributeChange) + Send + Sync + 'static,
    {
        let attribute = self.attribute;
        let callback = Box::new(move |old: AttributeValue, new: AttributeValue| {
            on_change(AttributeChange::new(attribute, old, new));
        });

        match &self.target {
            ObserverTarget::Player => source.subscribe(attribute, self.options, callback),
            ObserverTarget::Item(item) => {
                source.subscribe_item(item, attribute, self.options, callback)
            }
        }
    }
}

/// Observers kept for the whole lifetime of the player
pub fn player_observers(initial_notify: bool) -> Vec<AttributeObserver> {
    Attribute::PLAYER
        .iter()
        .map(|attribute| AttributeObserver::player(*attribute, initial_notify))
        .collect()
}

/// Observers rebuilt every time the current item changes
pub fn item_observers(item: &ItemHandle, initial_notify: bool) -> Vec<AttributeObserver> {
    Attribute::ITEM
        .iter()
        .map(|attribute| AttributeObserver::item(item, *attribute, initial_notify))
        .collect()
}

/// Observe replacement of the current item
pub fn observe_item_change<F>(
    source: &dyn SignalSource,
    initial_notify: bool,
    on_change: F,
) -> Subscription
where
    F: Fn(Option<NativeItem>, Option<NativeItem>) + Send + Sync + 'static,
{
    let options = if initial_notify {
        ObserveOptions::initial()
    } else {
        ObserveOptions::changes_only()
    };
    source.subscribe_item_change(options, Box::new(on_change))
}

/// Active registrations of one observer
///
/// Player-level registrations live until [`SubscriptionSet::close`]; the
/// item-level group is cancelled as a whole before the next item's group is
/// installed. After `close`, anything added is cancelled on the spot.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    player: Vec<Subscription>,
    item: Vec<Subscription>,
    periodic: Option<Subscription>,
    closed: bool,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, subscription: Subscription) {
        if self.closed {
            subscription.cancel();
            return;
        }
        self.player.push(subscription);
    }

    /// Cancel every item-level registration
    pub fn cancel_item(&mut self) {
        for subscription in self.item.drain(..) {
            subscription.cancel();
        }
    }

    /// Replace the item-level group; the previous group is cancelled first
    pub fn install_item(&mut self, subscriptions: Vec<Subscription>) {
        self.cancel_item();
        if self.closed {
            subscriptions.into_iter().for_each(Subscription::cancel);
            return;
        }
        self.item = subscriptions;
    }

    /// Replace the periodic sampler registration
    pub fn set_periodic(&mut self, subscription: Option<Subscription>) {
        if let Some(previous) = self.periodic.take() {
            previous.cancel();
        }
        match subscription {
            Some(subscription) if self.closed => subscription.cancel(),
            other => self.periodic = other,
        }
    }

    /// Cancel everything and refuse further registrations
    pub fn close(&mut self) {
        self.closed = true;
        self.cancel_item();
        if let Some(periodic) = self.periodic.take() {
            periodic.cancel();
        }
        for subscription in self.player.drain(..) {
            subscription.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn player_count(&self) -> usize {
        self.player.len()
    }

    pub fn item_count(&self) -> usize {
        self.item.len()
    }

    pub fn has_periodic(&self) -> bool {
        self.periodic.is_some()
    }
}
