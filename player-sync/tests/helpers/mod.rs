//! Test helpers for observer integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use player_signal::testing::ScriptedSource;
use player_signal::{
    Attribute, AttributeValue, ItemHandle, ItemId, ItemStatus, NativeItem, SubtitleTrack,
    TrackHandle,
};
use player_sync::{
    AudioMixingMode, ErrorInfo, ObserverConfig, PlayerDelegate, PlayerLogger, PlayerObserver,
    PlayerSnapshot, PlayerStatus, TimeSample,
};

/// One delegate callback, reduced to comparable values
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Status(PlayerStatus, PlayerStatus, Option<ErrorInfo>),
    IsPlaying(bool, bool),
    Rate(f32, Option<f32>),
    Volume(f32, Option<f32>),
    Muted(bool, Option<bool>),
    PlayedToEnd,
    ItemChanged(Option<ItemId>, Option<ItemId>),
    ItemStatus(ItemStatus, ItemStatus),
    TimeUpdate(f64),
    AudioMixing(AudioMixingMode, AudioMixingMode),
    Subtitle(Option<String>, Option<String>),
    LoadedItem(Option<ItemId>),
    VideoTrack(Option<String>, Option<String>),
}

/// Delegate recording every callback in order
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, seen: Seen) {
        self.seen.lock().push(seen);
    }

    pub fn all(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    /// Everything recorded so far, clearing the log
    pub fn take(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.seen.lock())
    }

    /// New values of every status notification
    pub fn statuses(&self) -> Vec<PlayerStatus> {
        self.all()
            .into_iter()
            .filter_map(|seen| match seen {
                Seen::Status(new, _, _) => Some(new),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Seen) -> bool) -> usize {
        self.all().iter().filter(|seen| matches(seen)).count()
    }
}

fn ids(item: Option<&ItemHandle>) -> Option<ItemId> {
    item.map(|i| i.id.clone())
}

fn track_ids(track: Option<&TrackHandle>) -> Option<String> {
    track.map(|t| t.id.clone())
}

fn subtitle_ids(subtitle: Option<&SubtitleTrack>) -> Option<String> {
    subtitle.map(|s| s.id.clone())
}

impl PlayerDelegate for Recorder {
    fn on_status_changed(&self, new: PlayerStatus, old: PlayerStatus, error: Option<&ErrorInfo>) {
        self.push(Seen::Status(new, old, error.cloned()));
    }

    fn on_is_playing_changed(&self, new: bool, old: bool) {
        self.push(Seen::IsPlaying(new, old));
    }

    fn on_rate_changed(&self, new: f32, old: Option<f32>) {
        self.push(Seen::Rate(new, old));
    }

    fn on_volume_changed(&self, new: f32, old: Option<f32>) {
        self.push(Seen::Volume(new, old));
    }

    fn on_is_muted_changed(&self, new: bool, old: Option<bool>) {
        self.push(Seen::Muted(new, old));
    }

    fn on_played_to_end(&self) {
        self.push(Seen::PlayedToEnd);
    }

    fn on_item_changed(&self, new: Option<&ItemHandle>, old: Option<&ItemHandle>) {
        self.push(Seen::ItemChanged(ids(new), ids(old)));
    }

    fn on_item_status_changed(&self, new: ItemStatus, old: ItemStatus) {
        self.push(Seen::ItemStatus(new, old));
    }

    fn on_time_update(&self, sample: &TimeSample) {
        self.push(Seen::TimeUpdate(sample.current_time));
    }

    fn on_audio_mixing_mode_changed(&self, new: AudioMixingMode, old: AudioMixingMode) {
        self.push(Seen::AudioMixing(new, old));
    }

    fn on_subtitle_selection_changed(
        &self,
        new: Option<&SubtitleTrack>,
        old: Option<&SubtitleTrack>,
    ) {
        self.push(Seen::Subtitle(subtitle_ids(new), subtitle_ids(old)));
    }

    fn on_loaded_item(&self, item: Option<&ItemHandle>) {
        self.push(Seen::LoadedItem(ids(item)));
    }

    fn on_video_track_changed(&self, new: Option<&TrackHandle>, old: Option<&TrackHandle>) {
        self.push(Seen::VideoTrack(track_ids(new), track_ids(old)));
    }
}

/// Logger collaborator keeping what it was told
#[derive(Default)]
pub struct CapturingLogger {
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl PlayerLogger for CapturingLogger {
    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

pub struct Harness {
    pub source: ScriptedSource,
    pub observer: PlayerObserver,
    pub recorder: Arc<Recorder>,
    pub logger: Arc<CapturingLogger>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ObserverConfig::default())
    }

    /// Observer with a registered [`Recorder`]; startup notifications are
    /// applied before the recorder is registered
    pub fn with_config(config: ObserverConfig) -> Self {
        let source = ScriptedSource::new();
        let logger = Arc::new(CapturingLogger::default());
        let observer = PlayerObserver::builder(Arc::new(source.clone()))
            .config(config)
            .logger(logger.clone())
            .build()
            .expect("observer should start");
        observer.snapshot_now().expect("worker should answer");

        let recorder = Recorder::new();
        observer
            .register_delegate(recorder.clone())
            .expect("observer is open");

        Self {
            source,
            observer,
            recorder,
            logger,
        }
    }

    /// Wait until every queued notification has been applied
    pub fn sync(&self) -> PlayerSnapshot {
        self.observer.snapshot_now().expect("worker should answer")
    }

    /// Bind `item` and wait for its track load and initial item values
    ///
    /// Binding enqueues those from the worker, behind the first read.
    pub fn bind(&self, item: &ItemHandle) -> PlayerSnapshot {
        self.source
            .replace_item(Some(NativeItem::Playable(item.clone())));
        self.sync();
        self.sync()
    }

    pub fn set_item(&self, item: &ItemHandle, attribute: Attribute, value: AttributeValue) {
        self.source.set_item_attribute(&item.id, attribute, value);
    }

    /// Drive the bound item to `ReadyToPlay`
    pub fn make_ready(&self, item: &ItemHandle) -> PlayerSnapshot {
        self.set_item(
            item,
            Attribute::ItemStatus,
            AttributeValue::ItemStatus(ItemStatus::ReadyToPlay),
        );
        self.set_item(item, Attribute::PlaybackBufferEmpty, AttributeValue::Flag(false));
        self.sync()
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub fn movie() -> ItemHandle {
    ItemHandle::new("movie", "https://cdn.example.com/movie.mp4")
}

pub fn trailer() -> ItemHandle {
    ItemHandle::new("trailer", "https://cdn.example.com/trailer.mp4")
}

pub fn live_stream() -> ItemHandle {
    ItemHandle::new("live", "https://host/path/master.m3u8?token=abc")
}
