//! Observer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`PlayerObserver`](crate::PlayerObserver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Initial media-time sampling interval, `None` leaves sampling off
    pub time_update_interval: Option<Duration>,
    /// Name of the confinement worker thread
    pub worker_thread_name: String,
    /// Bound on synchronous reads that hand off to the worker
    pub read_timeout: Duration,
    /// Whether observers ask for the current value on registration
    pub initial_notify: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            time_update_interval: None,
            worker_thread_name: "player-sync".to_string(),
            read_timeout: Duration::from_secs(2),
            initial_notify: true,
        }
    }
}

impl ObserverConfig {
    pub fn with_time_update_interval(mut self, interval: Duration) -> Self {
        self.time_update_interval = Some(interval);
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_initial_notify(mut self, initial_notify: bool) -> Self {
        self.initial_notify = initial_notify;
        self
    }

    /// Defaults overridden from the environment
    ///
    /// - `PLAYER_TIME_UPDATE_MS`: sampling interval in milliseconds, `0` disables
    /// - `PLAYER_READ_TIMEOUT_MS`: synchronous read bound in milliseconds
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_millis("PLAYER_TIME_UPDATE_MS") {
            config.time_update_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = env_millis("PLAYER_READ_TIMEOUT_MS") {
            config.read_timeout = Duration::from_millis(ms);
        }

        config
    }
}

fn env_millis(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
