//! RAII cancellation handles for native registrations

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::source::TickCallback;

/// Handle to one native registration
///
/// Cancelling (explicitly or by dropping the handle) runs the cancel action
/// exactly once. After `cancel` returns the source must not invoke the
/// registered callback again.
pub struct Subscription {
    label: &'static str,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(label: &'static str, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel
    pub fn noop(label: &'static str) -> Self {
        Self {
            label,
            cancel: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            tracing::trace!(label = self.label, "Cancelling subscription");
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Periodic ticks driven by the wall clock
///
/// Fallback for engines that cannot schedule callbacks on their media clock.
/// The ticker thread exits promptly once the returned subscription is
/// cancelled.
pub fn wall_clock_ticker(interval: Duration, on_tick: TickCallback) -> Subscription {
    let stopped = Arc::new(AtomicBool::new(false));
    let thread_stopped = Arc::clone(&stopped);

    let spawned = thread::Builder::new()
        .name("player-signal-ticker".to_string())
        .spawn(move || {
            let mut next_tick = Instant::now() + interval;
            while !thread_stopped.load(Ordering::Acquire) {
                let now = Instant::now();
                if now < next_tick {
                    thread::park_timeout(next_tick - now);
                    continue;
                }
                on_tick();
                next_tick += interval;
            }
            tracing::trace!("Wall clock ticker stopped");
        });

    match spawned {
        Ok(handle) => {
            let ticker = handle.thread().clone();
            Subscription::new("periodic", move || {
                stopped.store(true, Ordering::Release);
                ticker.unpark();
            })
        }
        Err(e) => {
            tracing::error!("Failed to spawn wall clock ticker: {}", e);
            Subscription::noop("periodic")
        }
    }
}
