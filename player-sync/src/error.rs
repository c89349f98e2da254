use std::time::Duration;

use player_signal::SignalError;
use thiserror::Error;

/// Errors returned by a [`PlayerObserver`](crate::PlayerObserver)
#[derive(Error, Debug)]
pub enum ObserverError {
    /// The observer was cleaned up
    #[error("Observer has been cleaned up")]
    Closed,

    /// The confinement worker exited while a command was being sent
    #[error("Observer worker is no longer running")]
    WorkerDisconnected,

    /// The confinement worker thread could not be started
    #[error("Failed to spawn observer worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The signal source reported an error
    #[error("Signal source error: {0}")]
    Signal(#[from] SignalError),

    /// The worker dropped a read request without answering
    #[error("Worker dropped the read request")]
    ReplyDropped,

    /// The worker did not answer a read request in time
    #[error("Worker did not answer within {0:?}")]
    ReadTimeout(Duration),
}

/// Result type for observer operations
pub type Result<T> = std::result::Result<T, ObserverError>;
