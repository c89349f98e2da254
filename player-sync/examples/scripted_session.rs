//! Scripted Playback Session Example
//!
//! Drives an in-memory engine through a short session (bind an adaptive
//! stream, buffer, play, fail) and prints every change the observer reports,
//! both through a delegate and through the reactive snapshot watch.
//!
//! Run with: `cargo run -p player-sync --example scripted_session`
//! Set `PLAYER_LOG_MODE=development` to also see the observer's own logs.

use std::sync::Arc;
use std::time::Duration;

use player_signal::testing::ScriptedSource;
use player_signal::{
    Attribute, AttributeValue, EngineStatus, ItemHandle, ItemStatus, NativeItem,
    PlaybackPosition, TimeControlStatus, TrackHandle,
};
use player_sync::{
    init_logging_from_env, ErrorInfo, ObserverConfig, PlayerDelegate, PlayerObserver,
    PlayerStatus, TimeSample,
};

struct Printer;

impl PlayerDelegate for Printer {
    fn on_status_changed(&self, new: PlayerStatus, old: PlayerStatus, error: Option<&ErrorInfo>) {
        match error {
            Some(error) => println!("📛 {:?} -> {:?}: {}", old, new, error.message),
            None => println!("📶 {:?} -> {:?}", old, new),
        }
    }

    fn on_is_playing_changed(&self, new: bool, _old: bool) {
        println!("{} playing={}", if new { "▶️" } else { "⏸️" }, new);
    }

    fn on_item_changed(&self, new: Option<&ItemHandle>, _old: Option<&ItemHandle>) {
        println!("🎞️  item: {:?}", new.map(|i| i.id.as_str()));
    }

    fn on_loaded_item(&self, item: Option<&ItemHandle>) {
        println!("✅ loaded: {:?}", item.map(|i| i.id.as_str()));
    }

    fn on_video_track_changed(&self, new: Option<&TrackHandle>, _old: Option<&TrackHandle>) {
        println!("📺 video track: {:?}", new.map(|t| t.id.as_str()));
    }

    fn on_time_update(&self, sample: &TimeSample) {
        println!(
            "⏱️  t={:.1}s buffered={:.1}s",
            sample.current_time, sample.buffered_position
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    println!("🎬 Scripted Playback Session");
    println!("============================\n");

    let engine = ScriptedSource::new();
    let observer = PlayerObserver::builder(Arc::new(engine.clone()))
        .config(ObserverConfig::from_env().with_time_update_interval(Duration::from_millis(500)))
        .build()?;
    observer.snapshot_now()?;

    let printer = Arc::new(Printer);
    observer.register_delegate(printer.clone())?;
    let snapshots = observer.watch();

    let item = ItemHandle::new("live", "https://streams.example.com/live/master.m3u8");
    engine.set_tracks(
        &item.id,
        vec![
            TrackHandle::video("v360.m3u8").with_size(640, 360),
            TrackHandle::video("v1080.m3u8").with_size(1920, 1080),
        ],
    );
    engine.push_access_log(&item.id, Some("https://streams.example.com/live/v1080.m3u8"));
    engine.replace_item(Some(NativeItem::Playable(item.clone())));

    engine.set_item_attribute(
        &item.id,
        Attribute::ItemStatus,
        AttributeValue::ItemStatus(ItemStatus::ReadyToPlay),
    );
    engine.set_item_attribute(&item.id, Attribute::PlaybackBufferEmpty, AttributeValue::Flag(false));
    engine.set_attribute(
        Attribute::TimeControlStatus,
        AttributeValue::TimeControl(TimeControlStatus::Playing),
    );

    engine.set_position(PlaybackPosition {
        current_time: 3.0,
        live_timestamp: None,
        buffered_position: 9.0,
    });
    engine.tick();

    engine.set_engine_error(Some("audio renderer lost"));
    engine.set_attribute(
        Attribute::EngineStatus,
        AttributeValue::EngineStatus(EngineStatus::Failed),
    );

    let snapshot = observer.snapshot_now()?;
    println!("\n📋 Final snapshot: {:#?}", snapshot.state);
    println!("🔔 Watch saw changes: {}", snapshots.has_changed().unwrap_or(false));

    observer.cleanup();
    println!("\n👋 Observer cleaned up");
    Ok(())
}
