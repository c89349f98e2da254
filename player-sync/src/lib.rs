//! Player Observation & Status Synchronization
//!
//! Watches a live media engine whose attributes change asynchronously on
//! threads it does not control, derives one coherent playback status from
//! them, and republishes it to any number of weakly held delegates.
//!
//! # Features
//!
//! - **Canonical status**: `Idle | Loading | ReadyToPlay | Error` derived from
//!   engine status, item status, time-control and buffering signals
//! - **Item rewiring**: item-level observers are cancelled and rebuilt on
//!   every item change; notifications for a replaced item never arrive
//! - **Weak fan-out**: delegates are never kept alive by the observer
//! - **Reactive snapshot**: watch the full state through `tokio::sync::watch`
//! - **Time updates**: periodic media-time samples at a configurable interval
//!
//! # Architecture
//!
//! ```text
//! SignalSource ──► AttributeObservers ──► worker thread ──► DelegateRegistry ──► delegates
//!  (engine)         (typed events)       (state machine,        (weak)
//!                                          track matcher,
//!                                          sampler)      ──► watch<PlayerSnapshot>
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use player_sync::prelude::*;
//!
//! struct Printer;
//!
//! impl PlayerDelegate for Printer {
//!     fn on_status_changed(&self, new: PlayerStatus, old: PlayerStatus, _: Option<&ErrorInfo>) {
//!         println!("{:?} -> {:?}", old, new);
//!     }
//! }
//!
//! let observer = PlayerObserver::new(engine)?;
//! let printer = Arc::new(Printer);
//! observer.register_delegate(printer.clone())?;
//! ```
//!
//! # Reactive Usage
//!
//! ```rust,ignore
//! let mut snapshots = observer.watch();
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow().clone();
//!     println!("{:?} playing={}", snapshot.state.status, snapshot.state.is_playing);
//! }
//! ```

// Core modules
pub mod delegate;
pub mod observers;
pub mod sampler;
pub mod state_machine;
pub mod status;
pub mod track_matcher;

// Confinement worker
mod worker;

// Public handle
pub mod observer;

// Configuration
pub mod config;

// Error types
pub mod error;

// Logging infrastructure
pub mod logging;

// ============================================================================
// Re-exports
// ============================================================================

pub use observer::{PlayerObserver, PlayerObserverBuilder};

pub use delegate::{DelegateHandle, DelegateRegistry, PlayerDelegate};

pub use status::{
    AudioMixingMode, CanonicalState, ErrorInfo, ErrorKind, PlayerSnapshot, PlayerStatus,
    TimeSample, GENERIC_ERROR_MESSAGE,
};

pub use observers::{AttributeChange, AttributeObserver, SignalEvent, SubscriptionSet};

pub use state_machine::{derive, SignalInputs, Transition};

pub use config::ObserverConfig;

// ============================================================================
// Re-exports - Error types
// ============================================================================

pub use error::{ObserverError, Result};

// ============================================================================
// Re-exports - Logging
// ============================================================================

pub use logging::{
    init_logging, init_logging_from_env, LoggingError, LoggingMode, PlayerLogger, TracingLogger,
};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::ObserverConfig;
    pub use crate::delegate::PlayerDelegate;
    pub use crate::observer::PlayerObserver;
    pub use crate::status::{AudioMixingMode, ErrorInfo, PlayerSnapshot, PlayerStatus, TimeSample};
    pub use player_signal::prelude::*;
    pub use player_signal::SubtitleTrack;
    pub use std::sync::Arc;
}
