//! Public handle onto a running observer

use std::fmt;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use player_signal::{ItemHandle, SignalSource, SubtitleTrack, TrackHandle};
use tokio::sync::watch;

use crate::config::ObserverConfig;
use crate::delegate::PlayerDelegate;
use crate::error::{ObserverError, Result};
use crate::logging::{default_logger, PlayerLogger};
use crate::observers::{observe_item_change, player_observers, SignalEvent};
use crate::status::{AudioMixingMode, ErrorInfo, PlayerSnapshot, PlayerStatus, TimeSample};
use crate::worker::{run_worker, sample_position, Command, CoreState, Inbox, Shared};

/// Builder for [`PlayerObserver`]
pub struct PlayerObserverBuilder {
    source: Arc<dyn SignalSource>,
    config: ObserverConfig,
    logger: Arc<dyn PlayerLogger>,
}

impl PlayerObserverBuilder {
    pub fn config(mut self, config: ObserverConfig) -> Self {
        self.config = config;
        self
    }

    /// Collaborator receiving host-facing warnings and errors
    pub fn logger(mut self, logger: Arc<dyn PlayerLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Spawn the worker and register every player-level observer
    pub fn build(self) -> Result<PlayerObserver> {
        let PlayerObserverBuilder {
            source,
            config,
            logger,
        } = self;

        let shared = Arc::new(Shared::new(logger));
        let (tx, rx) = mpsc::channel();
        let inbox = Inbox::new(tx, Arc::clone(&shared));

        let core = CoreState::new(
            Arc::clone(&source),
            Arc::clone(&shared),
            inbox.clone(),
            config.clone(),
        );
        let worker = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || run_worker(core, rx))
            .map_err(ObserverError::WorkerSpawn)?;
        shared.bind_worker(worker.thread().id());

        let observer = PlayerObserver {
            source,
            shared,
            inbox,
            read_timeout: config.read_timeout,
            worker: Mutex::new(Some(worker)),
        };
        observer.start_observing(&config)?;

        tracing::info!(
            thread = %config.worker_thread_name,
            "Player observer started"
        );
        Ok(observer)
    }
}

/// Observes one media engine and republishes a coherent status
///
/// All derived state lives on a dedicated worker thread. Accessors read the
/// latest published [`PlayerSnapshot`], which may trail events still queued
/// on the worker; [`PlayerObserver::snapshot_now`] waits for them.
///
/// # Example
///
/// ```rust,ignore
/// let observer = PlayerObserver::new(engine)?;
/// observer.register_delegate(my_delegate.clone())?;
/// observer.set_time_update_interval(Some(Duration::from_millis(500)))?;
///
/// let mut snapshots = observer.watch();
/// while snapshots.changed().await.is_ok() {
///     println!("{:?}", snapshots.borrow().state.status);
/// }
/// ```
pub struct PlayerObserver {
    source: Arc<dyn SignalSource>,
    shared: Arc<Shared>,
    inbox: Inbox,
    read_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerObserver {
    /// Observe `source` with the default configuration
    pub fn new(source: Arc<dyn SignalSource>) -> Result<Self> {
        Self::builder(source).build()
    }

    pub fn builder(source: Arc<dyn SignalSource>) -> PlayerObserverBuilder {
        PlayerObserverBuilder {
            source,
            config: ObserverConfig::default(),
            logger: default_logger(),
        }
    }

    fn start_observing(&self, config: &ObserverConfig) -> Result<()> {
        for observer in player_observers(config.initial_notify) {
            let inbox = self.inbox.clone();
            let subscription = observer.start(self.source.as_ref(), move |change| {
                let _ = inbox.send(Command::Attribute {
                    generation: None,
                    change,
                });
            });
            self.shared.subscriptions.lock().add_player(subscription);
        }

        let inbox = self.inbox.clone();
        let subscription =
            observe_item_change(self.source.as_ref(), config.initial_notify, move |_, new| {
                let _ = inbox.send(Command::ItemReplaced { new });
            });
        self.shared.subscriptions.lock().add_player(subscription);

        if let Some(interval) = config.time_update_interval {
            self.set_time_update_interval(Some(interval))?;
        }
        Ok(())
    }

    // ========================================================================
    // Delegates
    // ========================================================================

    /// Add a weakly held delegate; returns `false` if it was already registered
    pub fn register_delegate<D: PlayerDelegate + 'static>(&self, delegate: Arc<D>) -> Result<bool> {
        if self.shared.is_closed() {
            return Err(ObserverError::Closed);
        }
        let delegate: Arc<dyn PlayerDelegate> = delegate;
        Ok(self.shared.delegates.register(delegate))
    }

    /// Remove a delegate by identity; returns whether it was registered
    pub fn unregister_delegate<D: ?Sized + PlayerDelegate>(&self, delegate: &Arc<D>) -> bool {
        self.shared.delegates.unregister(delegate)
    }

    pub fn delegate_count(&self) -> usize {
        self.shared.delegates.len()
    }

    // ========================================================================
    // Published state
    // ========================================================================

    pub fn status(&self) -> PlayerStatus {
        self.shared.snapshot.borrow().state.status
    }

    pub fn is_playing(&self) -> bool {
        self.shared.snapshot.borrow().state.is_playing
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.shared.snapshot.borrow().state.error.clone()
    }

    pub fn current_item(&self) -> Option<ItemHandle> {
        self.shared.snapshot.borrow().state.current_item.clone()
    }

    pub fn current_video_track(&self) -> Option<TrackHandle> {
        self.shared.snapshot.borrow().state.current_video_track.clone()
    }

    pub fn loaded_current_item(&self) -> bool {
        self.shared.snapshot.borrow().state.loaded_current_item
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver notified after every applied change
    pub fn watch(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.snapshot.subscribe()
    }

    // ========================================================================
    // Synchronous reads
    // ========================================================================

    /// Snapshot after every command queued so far has been applied
    pub fn snapshot_now(&self) -> Result<PlayerSnapshot> {
        if self.shared.is_closed() {
            return Err(ObserverError::Closed);
        }
        if self.shared.is_worker_thread() {
            return Ok(self.snapshot());
        }
        self.read(|core| core.snapshot())
    }

    /// Current playhead as a time sample
    pub fn current_position(&self) -> Result<TimeSample> {
        if self.shared.is_closed() {
            return Err(ObserverError::Closed);
        }
        if self.shared.is_worker_thread() {
            return Ok(sample_position(self.source.as_ref())?);
        }
        Ok(self.read(|core| core.sample_position())??)
    }

    fn read<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CoreState) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.inbox.send(Command::Query(Box::new(move |core| {
            let _ = reply_tx.send(query(core));
        })))?;

        reply_rx
            .recv_timeout(self.read_timeout)
            .map_err(|e| match e {
                mpsc::RecvTimeoutError::Timeout => ObserverError::ReadTimeout(self.read_timeout),
                mpsc::RecvTimeoutError::Disconnected => ObserverError::ReplyDropped,
            })
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Push a typed event as if an attribute observer had reported it
    pub fn on_attribute_event(&self, event: SignalEvent) -> Result<()> {
        self.inbox.send(Command::Event(event))
    }

    /// Start, restart or (with `None` or zero) stop time updates
    pub fn set_time_update_interval(&self, interval: Option<Duration>) -> Result<()> {
        self.inbox.send(Command::SetTimeUpdateInterval(interval))
    }

    /// Record the subtitle selection made by the host
    pub fn select_subtitle(&self, subtitle: Option<SubtitleTrack>) -> Result<()> {
        self.inbox.send(Command::SelectSubtitle(subtitle))
    }

    pub fn set_audio_mixing_mode(&self, mode: AudioMixingMode) -> Result<()> {
        self.inbox.send(Command::SetAudioMixingMode(mode))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop observing
    ///
    /// Idempotent and callable from any thread, including a delegate
    /// callback. Queued commands are dropped, the command in flight is
    /// waited for (unless called from the worker itself), every native
    /// registration is cancelled and the delegate set is cleared. No
    /// delegate callback fires after this returns.
    pub fn cleanup(&self) {
        let first = self.shared.close();
        if first {
            tracing::info!("Cleaning up player observer");
            if self.inbox.force_send(Command::Shutdown).is_err() {
                tracing::debug!("Player worker already stopped");
            }
        }

        if self.shared.is_worker_thread() {
            self.shared.teardown();
            return;
        }

        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!("Player worker panicked");
            }
        }
        self.shared.teardown();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for PlayerObserver {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for PlayerObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerObserver")
            .field("status", &self.status())
            .field("delegates", &self.delegate_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
