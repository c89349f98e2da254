//! Periodic media-time sampling
//!
//! The sampler itself only keeps the interval and an epoch. Each start
//! bumps the epoch and registers a periodic tick with the source; ticks are
//! enqueued tagged with the epoch they were registered under, and the worker
//! drops ticks whose epoch is no longer current. That keeps a tick already
//! in flight when the interval changed from reaching delegates.

use std::time::Duration;

use player_signal::{SignalSource, Subscription};

/// Interval and epoch of the media-time sampler
#[derive(Debug, Default)]
pub struct PeriodicSampler {
    interval: Option<Duration>,
    epoch: u64,
}

impl PeriodicSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a sampling run, invalidating every earlier run
    ///
    /// `on_tick` receives the epoch of this run. A zero interval stops
    /// sampling and returns `None`. The returned registration must replace
    /// the previous one in the subscription set.
    pub fn start<F>(
        &mut self,
        source: &dyn SignalSource,
        interval: Duration,
        on_tick: F,
    ) -> Option<Subscription>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        if interval.is_zero() {
            self.stop();
            return None;
        }

        self.epoch += 1;
        self.interval = Some(interval);
        let epoch = self.epoch;
        tracing::debug!(?interval, epoch, "Starting time updates");

        Some(source.subscribe_periodic(interval, Box::new(move || on_tick(epoch))))
    }

    /// Invalidate the current run
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            tracing::debug!(epoch = self.epoch, "Stopping time updates");
        }
        self.epoch += 1;
    }

    /// Whether a tick from `epoch` belongs to the running sampler
    pub fn accepts(&self, epoch: u64) -> bool {
        self.interval.is_some() && epoch == self.epoch
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_signal::testing::ScriptedSource;

    #[test]
    fn test_restart_invalidates_previous_epoch() {
        let source = ScriptedSource::new();
        let mut sampler = PeriodicSampler::new();

        let _first = sampler.start(&source, Duration::from_millis(100), |_| {});
        let first_epoch = sampler.epoch;
        assert!(sampler.accepts(first_epoch));

        let _second = sampler.start(&source, Duration::from_millis(200), |_| {});
        assert!(!sampler.accepts(first_epoch));
        assert!(sampler.accepts(sampler.epoch));
        assert_eq!(sampler.interval(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_zero_interval_stops() {
        let source = ScriptedSource::new();
        let mut sampler = PeriodicSampler::new();

        let _running = sampler.start(&source, Duration::from_millis(100), |_| {});
        let epoch = sampler.epoch;
        let subscription = sampler.start(&source, Duration::ZERO, |_| {});

        assert!(subscription.is_none());
        assert!(!sampler.is_running());
        assert!(!sampler.accepts(epoch));
    }

    #[test]
    fn test_ticks_carry_their_epoch() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let source = ScriptedSource::new();
        let mut sampler = PeriodicSampler::new();
        let seen = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&seen);

        let _subscription = sampler.start(&source, Duration::from_millis(50), move |epoch| {
            sink.store(epoch, Ordering::SeqCst);
        });
        source.tick();

        assert!(sampler.accepts(seen.load(Ordering::SeqCst)));
    }
}
