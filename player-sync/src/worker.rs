//! Confinement worker owning the canonical state
//!
//! Everything that mutates [`CanonicalState`] or calls a delegate runs on a
//! single worker thread draining a command channel:
//!
//! ```text
//! attribute observers ─┐
//! item change observer ┼─► Inbox ──► mpsc ──► run_worker ──► CoreState ──► delegates
//! track loads, ticks  ─┤                                        │
//! PlayerObserver API  ─┘                                        └──► watch<PlayerSnapshot>
//! ```
//!
//! Native callbacks never touch state directly; they only enqueue. Item-level
//! events and track loads are tagged with the item generation they were
//! registered under and dropped when that generation is no longer current.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use player_signal::{
    ErrorScope, ItemHandle, NativeItem, SignalSource, SubtitleTrack, TimeControlStatus,
    TrackHandle, TrackKind,
};
use tokio::sync::watch;

use crate::config::ObserverConfig;
use crate::delegate::{DelegateRegistry, PlayerDelegate};
use crate::error::{ObserverError, Result};
use crate::logging::PlayerLogger;
use crate::observers::{item_observers, AttributeChange, SignalEvent, SubscriptionSet};
use crate::sampler::PeriodicSampler;
use crate::state_machine::{derive, SignalInputs, Transition};
use crate::status::{
    AudioMixingMode, CanonicalState, ErrorInfo, ErrorKind, PlayerSnapshot, PlayerStatus,
    TimeSample, GENERIC_ERROR_MESSAGE,
};
use crate::track_matcher::{find_active_track, first_video_track};

/// Work handed to the confinement worker
pub(crate) enum Command {
    /// Raw attribute notification; item-level ones carry their generation
    Attribute {
        generation: Option<u64>,
        change: AttributeChange,
    },
    /// Typed event pushed directly by the host
    Event(SignalEvent),
    /// The engine replaced its current item
    ItemReplaced { new: Option<NativeItem> },
    /// Video tracks finished loading for an item generation
    TracksLoaded {
        generation: u64,
        result: player_signal::Result<Vec<TrackHandle>>,
    },
    /// Periodic sampler tick from the given sampling run
    Tick { epoch: u64 },
    SetTimeUpdateInterval(Option<Duration>),
    SelectSubtitle(Option<SubtitleTrack>),
    SetAudioMixingMode(AudioMixingMode),
    /// Synchronous read; the closure sends its own reply
    Query(Box<dyn FnOnce(&mut CoreState) + Send>),
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Attribute { .. } => "attribute",
            Command::Event(_) => "event",
            Command::ItemReplaced { .. } => "item_replaced",
            Command::TracksLoaded { .. } => "tracks_loaded",
            Command::Tick { .. } => "tick",
            Command::SetTimeUpdateInterval(_) => "set_time_update_interval",
            Command::SelectSubtitle(_) => "select_subtitle",
            Command::SetAudioMixingMode(_) => "set_audio_mixing_mode",
            Command::Query(_) => "query",
            Command::Shutdown => "shutdown",
        }
    }
}

/// State shared between the worker and every handle onto it
pub(crate) struct Shared {
    closed: AtomicBool,
    torn_down: AtomicBool,
    pub(crate) delegates: DelegateRegistry,
    pub(crate) subscriptions: Mutex<SubscriptionSet>,
    pub(crate) snapshot: watch::Sender<PlayerSnapshot>,
    worker_thread: OnceLock<ThreadId>,
    pub(crate) logger: Arc<dyn PlayerLogger>,
}

impl Shared {
    pub(crate) fn new(logger: Arc<dyn PlayerLogger>) -> Self {
        let (snapshot, _) = watch::channel(PlayerSnapshot::default());
        Self {
            closed: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            delegates: DelegateRegistry::new(),
            subscriptions: Mutex::new(SubscriptionSet::new()),
            snapshot,
            worker_thread: OnceLock::new(),
            logger,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed; returns `true` for the first caller only
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn bind_worker(&self, id: ThreadId) {
        let _ = self.worker_thread.set(id);
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    /// Set once native registrations and delegates have been released
    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Cancel every native registration, then forget every delegate
    pub(crate) fn teardown(&self) {
        self.torn_down.store(true, Ordering::Release);
        self.subscriptions.lock().close();
        self.delegates.clear();
    }
}

/// Sending side of the worker's command channel
#[derive(Clone)]
pub(crate) struct Inbox {
    tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl Inbox {
    pub(crate) fn new(tx: mpsc::Sender<Command>, shared: Arc<Shared>) -> Self {
        Self { tx, shared }
    }

    /// Enqueue a command; refused once the observer is closed
    pub(crate) fn send(&self, command: Command) -> Result<()> {
        if self.shared.is_closed() {
            return Err(ObserverError::Closed);
        }
        self.force_send(command)
    }

    /// Enqueue regardless of the closed flag
    pub(crate) fn force_send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| ObserverError::WorkerDisconnected)
    }
}

/// Everything the worker owns
pub(crate) struct CoreState {
    source: Arc<dyn SignalSource>,
    shared: Arc<Shared>,
    inbox: Inbox,
    config: ObserverConfig,

    canonical: CanonicalState,
    inputs: SignalInputs,
    rate: Option<f32>,
    volume: Option<f32>,
    muted: Option<bool>,
    subtitle: Option<SubtitleTrack>,
    audio_mixing_mode: AudioMixingMode,
    video_tracks: Vec<TrackHandle>,

    generation: u64,
    /// The last item notification named no item at all
    last_item_absent: bool,
    sampler: PeriodicSampler,
    warned_unsupported_item: bool,
}

impl CoreState {
    pub(crate) fn new(
        source: Arc<dyn SignalSource>,
        shared: Arc<Shared>,
        inbox: Inbox,
        config: ObserverConfig,
    ) -> Self {
        Self {
            source,
            shared,
            inbox,
            config,
            canonical: CanonicalState::default(),
            inputs: SignalInputs::default(),
            rate: None,
            volume: None,
            muted: None,
            subtitle: None,
            audio_mixing_mode: AudioMixingMode::default(),
            video_tracks: Vec::new(),
            generation: 0,
            last_item_absent: false,
            sampler: PeriodicSampler::new(),
            warned_unsupported_item: false,
        }
    }

    pub(crate) fn handle(&mut self, command: Command) {
        match command {
            Command::Attribute { generation, change } => {
                if let Some(generation) = generation {
                    if generation != self.generation {
                        tracing::debug!(
                            attribute = change.attribute.key(),
                            generation,
                            current = self.generation,
                            "Dropping notification for replaced item"
                        );
                        return;
                    }
                }
                match change.decode() {
                    Some(event) => self.on_attribute_event(event),
                    None => tracing::trace!(
                        attribute = change.attribute.key(),
                        "Ignoring notification without a typed value"
                    ),
                }
            }
            Command::Event(event) => self.on_attribute_event(event),
            Command::ItemReplaced { new } => self.on_item_replaced(new),
            Command::TracksLoaded { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(generation, "Dropping tracks loaded for replaced item");
                    return;
                }
                self.on_tracks_loaded(result);
            }
            Command::Tick { epoch } => {
                if self.sampler.accepts(epoch) {
                    self.on_tick();
                } else {
                    tracing::trace!(epoch, "Dropping tick from stopped sampler");
                }
            }
            Command::SetTimeUpdateInterval(interval) => self.set_time_update_interval(interval),
            Command::SelectSubtitle(subtitle) => self.select_subtitle(subtitle),
            Command::SetAudioMixingMode(mode) => self.set_audio_mixing_mode(mode),
            Command::Query(query) => query(self),
            Command::Shutdown => {}
        }
    }

    // ========================================================================
    // Attribute events
    // ========================================================================

    pub(crate) fn on_attribute_event(&mut self, event: SignalEvent) {
        tracing::debug!(?event, "Applying signal event");

        match event {
            SignalEvent::EngineStatus(status) => {
                self.inputs.engine_status = status;
                self.refresh_status();
            }
            SignalEvent::Rate(rate) => {
                let old = self.rate.replace(rate);
                if old != Some(rate) {
                    self.emit(|d| d.on_rate_changed(rate, old));
                }
            }
            SignalEvent::Volume(volume) => {
                let old = self.volume.replace(volume);
                if old != Some(volume) {
                    self.emit(|d| d.on_volume_changed(volume, old));
                }
            }
            SignalEvent::Muted(muted) => {
                let old = self.muted.replace(muted);
                if old != Some(muted) {
                    self.emit(|d| d.on_is_muted_changed(muted, old));
                }
            }
            SignalEvent::TimeControl(time_control) => {
                self.inputs.time_control = time_control;
                self.refresh_status();
            }
            SignalEvent::ItemStatus(status) => {
                let old = std::mem::replace(&mut self.inputs.item_status, status);
                if old != status {
                    self.emit(|d| d.on_item_status_changed(status, old));
                }
                self.refresh_status();
            }
            SignalEvent::BufferEmpty(empty) => {
                self.inputs.buffer_empty = empty;
                self.refresh_status();
            }
            SignalEvent::LikelyToKeepUp(likely) => {
                self.inputs.likely_to_keep_up = likely;
                self.publish();
            }
            SignalEvent::TracksChanged(tracks) => self.on_tracks_changed(tracks),
            SignalEvent::PlayedToEnd => self.emit(|d| d.on_played_to_end()),
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    fn refresh_status(&mut self) {
        let transition = derive(&self.inputs, self.canonical.current_item.is_some());
        self.apply_transition(transition);
    }

    fn apply_transition(&mut self, transition: Transition) {
        let old_status = self.canonical.status;
        let old_playing = self.canonical.is_playing;

        let error = match transition.failure {
            Some(kind) => match self.canonical.error.take() {
                Some(existing) if existing.kind == kind => Some(existing),
                _ => Some(self.describe_failure(kind)),
            },
            None => None,
        };

        self.canonical.status = transition.status;
        self.canonical.is_playing = transition.is_playing;
        self.canonical.error = error;

        if old_status != transition.status {
            tracing::info!(from = ?old_status, to = ?transition.status, "Player status changed");
            if let Some(error) = &self.canonical.error {
                self.shared
                    .logger
                    .error(&format!("Playback failed: {}", error.message));
            }
            let error = self.canonical.error.clone();
            self.emit(|d| d.on_status_changed(transition.status, old_status, error.as_ref()));
        }
        if old_playing != transition.is_playing {
            self.emit(|d| d.on_is_playing_changed(transition.is_playing, old_playing));
        }

        if transition.status.is_settled()
            && self.canonical.current_item.is_some()
            && !self.canonical.loaded_current_item
        {
            self.mark_item_loaded();
        }

        self.publish();
    }

    /// Best-effort text for a failure, item description first
    fn describe_failure(&self, kind: ErrorKind) -> ErrorInfo {
        let mut scopes = Vec::with_capacity(2);
        if let Some(item) = &self.canonical.current_item {
            scopes.push(ErrorScope::Item(item));
        }
        scopes.push(ErrorScope::Engine);

        for scope in scopes {
            match self.source.error_description(scope) {
                Ok(Some(message)) if !message.trim().is_empty() => {
                    return ErrorInfo::new(kind, message);
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Failed to describe {:?} error: {}", kind, e);
                    break;
                }
            }
        }

        ErrorInfo::new(kind, GENERIC_ERROR_MESSAGE)
    }

    fn mark_item_loaded(&mut self) {
        self.canonical.loaded_current_item = true;
        let item = self.canonical.current_item.clone();
        tracing::debug!(item = ?item.as_ref().map(|i| i.id.as_str()), "Item loaded");
        self.emit(|d| d.on_loaded_item(item.as_ref()));
        self.reset_subtitle();
    }

    /// No playable item: report it as loaded right away
    fn mark_null_item_loaded(&mut self) {
        self.canonical.loaded_current_item = true;
        self.emit(|d| d.on_loaded_item(None));
        self.reset_subtitle();
        self.publish();
    }

    fn reset_subtitle(&mut self) {
        let old = self.subtitle.take();
        self.emit(|d| d.on_subtitle_selection_changed(None, old.as_ref()));
    }

    // ========================================================================
    // Item replacement
    // ========================================================================

    fn on_item_replaced(&mut self, new: Option<NativeItem>) {
        match &new {
            Some(NativeItem::Playable(item))
                if self.canonical.current_item.as_ref().map(|c| &c.id) == Some(&item.id) =>
            {
                tracing::debug!(item = %item.id, "Item notification for the bound item, ignoring");
                return;
            }
            None if self.last_item_absent => {
                tracing::debug!("Repeated notification without an item, ignoring");
                return;
            }
            _ => {}
        }
        self.last_item_absent = new.is_none();

        // Cancel the old item's observers before anything else can be installed
        self.generation += 1;
        self.shared.subscriptions.lock().cancel_item();

        self.video_tracks.clear();
        self.set_video_track(None);

        self.inputs.reset_item();
        self.canonical.loaded_current_item = false;
        let old = self.canonical.current_item.take();

        match new {
            Some(NativeItem::Playable(item)) => {
                tracing::info!(item = %item.id, uri = %item.uri, "Binding item");
                self.install_item_observers(&item);
                self.canonical.current_item = Some(item.clone());
                self.emit(|d| d.on_item_changed(Some(&item), old.as_ref()));
                self.request_video_tracks(&item);
                self.refresh_status();
            }
            None => {
                tracing::info!("Item removed");
                self.emit(|d| d.on_item_changed(None, old.as_ref()));
                self.apply_transition(Transition {
                    status: PlayerStatus::Idle,
                    is_playing: self.inputs.time_control == TimeControlStatus::Playing,
                    failure: None,
                });
                self.mark_null_item_loaded();
            }
            Some(NativeItem::Foreign { description }) => {
                if old.is_some() {
                    self.emit(|d| d.on_item_changed(None, old.as_ref()));
                }
                if !self.warned_unsupported_item {
                    self.warned_unsupported_item = true;
                    self.shared.logger.warn(&format!(
                        "Unsupported item bound to player ({}); observing as if no item were bound",
                        description
                    ));
                }
                self.refresh_status();
                self.mark_null_item_loaded();
            }
        }
    }

    fn install_item_observers(&mut self, item: &ItemHandle) {
        let generation = self.generation;
        let subscriptions = item_observers(item, self.config.initial_notify)
            .iter()
            .map(|observer| {
                let inbox = self.inbox.clone();
                observer.start(self.source.as_ref(), move |change| {
                    let _ = inbox.send(Command::Attribute {
                        generation: Some(generation),
                        change,
                    });
                })
            })
            .collect();

        self.shared.subscriptions.lock().install_item(subscriptions);
    }

    // ========================================================================
    // Video tracks
    // ========================================================================

    fn request_video_tracks(&self, item: &ItemHandle) {
        let generation = self.generation;
        let inbox = self.inbox.clone();
        self.source.load_tracks(
            item,
            TrackKind::Video,
            Box::new(move |result| {
                let _ = inbox.send(Command::TracksLoaded { generation, result });
            }),
        );
    }

    fn on_tracks_loaded(&mut self, result: player_signal::Result<Vec<TrackHandle>>) {
        match result {
            Ok(tracks) => {
                tracing::debug!(count = tracks.len(), "Video tracks loaded");
                self.video_tracks = tracks.into_iter().filter(TrackHandle::is_video).collect();
                self.update_video_track();
            }
            Err(e) => {
                tracing::warn!("Failed to load video tracks: {}", e);
                self.shared
                    .logger
                    .warn(&format!("Video tracks unavailable: {}", e));
            }
        }
    }

    fn on_tracks_changed(&mut self, tracks: Vec<TrackHandle>) {
        let video: Vec<TrackHandle> = tracks.into_iter().filter(TrackHandle::is_video).collect();
        if !video.is_empty() {
            self.video_tracks = video;
        }
        self.update_video_track();
    }

    fn update_video_track(&mut self) {
        let Some(item) = self.canonical.current_item.clone() else {
            return;
        };

        let active = if item.is_adaptive() {
            let log = self.source.access_log(&item);
            find_active_track(&item.uri, &log, &self.video_tracks).cloned()
        } else {
            first_video_track(&self.video_tracks).cloned()
        };

        match active {
            Some(track) => self.set_video_track(Some(track)),
            None => tracing::trace!(item = %item.id, "No active video track identified"),
        }
    }

    fn set_video_track(&mut self, track: Option<TrackHandle>) {
        if self.canonical.current_video_track == track {
            return;
        }
        let old = std::mem::replace(&mut self.canonical.current_video_track, track.clone());
        self.emit(|d| d.on_video_track_changed(track.as_ref(), old.as_ref()));
    }

    // ========================================================================
    // Sampler, subtitles, audio mixing
    // ========================================================================

    fn set_time_update_interval(&mut self, interval: Option<Duration>) {
        self.shared.subscriptions.lock().set_periodic(None);

        let interval = interval.filter(|i| !i.is_zero());
        match interval {
            Some(interval) => {
                let inbox = self.inbox.clone();
                let subscription = self.sampler.start(self.source.as_ref(), interval, move |epoch| {
                    let _ = inbox.send(Command::Tick { epoch });
                });
                self.shared.subscriptions.lock().set_periodic(subscription);
            }
            None => self.sampler.stop(),
        }
    }

    fn on_tick(&mut self) {
        match self.sample_position() {
            Ok(sample) => self.emit(|d| d.on_time_update(&sample)),
            Err(e) => tracing::debug!("Skipping time update: {}", e),
        }
    }

    pub(crate) fn sample_position(&self) -> player_signal::Result<TimeSample> {
        sample_position(self.source.as_ref())
    }

    fn select_subtitle(&mut self, subtitle: Option<SubtitleTrack>) {
        if self.subtitle == subtitle {
            return;
        }
        let old = std::mem::replace(&mut self.subtitle, subtitle.clone());
        self.emit(|d| d.on_subtitle_selection_changed(subtitle.as_ref(), old.as_ref()));
    }

    fn set_audio_mixing_mode(&mut self, mode: AudioMixingMode) {
        if self.audio_mixing_mode == mode {
            return;
        }
        let old = std::mem::replace(&mut self.audio_mixing_mode, mode);
        self.emit(|d| d.on_audio_mixing_mode_changed(mode, old));
    }

    // ========================================================================
    // Publication
    // ========================================================================

    pub(crate) fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.canonical.clone(),
            rate: self.rate,
            volume: self.volume,
            muted: self.muted,
            time_control: self.inputs.time_control,
            likely_to_keep_up: self.inputs.likely_to_keep_up,
            audio_mixing_mode: self.audio_mixing_mode,
            subtitle: self.subtitle.clone(),
        }
    }

    fn publish(&self) {
        if self.shared.is_closed() {
            return;
        }
        let snapshot = self.snapshot();
        self.shared.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Deliver one change to every live delegate
    ///
    /// The snapshot is published first so a delegate reading the observer
    /// sees the state the callback describes. A change already being
    /// delivered when another thread closes the observer reaches every
    /// delegate; cleanup joins the worker before releasing them. Delivery
    /// stops at once when a callback tears the observer down itself.
    fn emit(&self, f: impl Fn(&dyn PlayerDelegate)) {
        self.publish();

        for delegate in self.shared.delegates.live() {
            if self.shared.is_torn_down() {
                return;
            }
            if catch_unwind(AssertUnwindSafe(|| f(delegate.as_ref()))).is_err() {
                tracing::error!("Delegate panicked while handling a player change");
            }
        }
    }
}

pub(crate) fn sample_position(source: &dyn SignalSource) -> player_signal::Result<TimeSample> {
    let position = source.playback_position()?;
    Ok(TimeSample::from_position(&position, Utc::now()))
}

/// Drain commands until shutdown
pub(crate) fn run_worker(mut core: CoreState, commands: mpsc::Receiver<Command>) {
    core.shared.bind_worker(thread::current().id());
    tracing::info!("Player worker started");

    for command in commands.iter() {
        if matches!(command, Command::Shutdown) {
            break;
        }
        if core.shared.is_closed() {
            tracing::trace!(command = command.name(), "Dropping command after cleanup");
            continue;
        }
        core.handle(command);
    }

    core.sampler.stop();
    tracing::info!("Player worker stopped");
}
