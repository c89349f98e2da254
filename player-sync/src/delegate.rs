//! Delegates and the weak registry that fans changes out to them
//!
//! The registry never keeps a delegate alive. Handles are keyed by the
//! address of the delegate's allocation, so registering the same `Arc`
//! twice is a no-op and `unregister` needs nothing but the `Arc` itself.
//! Expired handles are pruned whenever the live set is collected.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use player_signal::{ItemHandle, ItemStatus, SubtitleTrack, TrackHandle};

use crate::status::{AudioMixingMode, ErrorInfo, PlayerStatus, TimeSample};

/// Listener for player changes
///
/// Every method defaults to a no-op. Callbacks run on the observer's worker
/// thread, one delegate at a time; a delegate may call back into the
/// observer (including `cleanup`) from inside a callback.
#[allow(unused_variables)]
pub trait PlayerDelegate: Send + Sync {
    fn on_status_changed(&self, new: PlayerStatus, old: PlayerStatus, error: Option<&ErrorInfo>) {}

    fn on_is_playing_changed(&self, new: bool, old: bool) {}

    fn on_rate_changed(&self, new: f32, old: Option<f32>) {}

    fn on_volume_changed(&self, new: f32, old: Option<f32>) {}

    fn on_is_muted_changed(&self, new: bool, old: Option<bool>) {}

    fn on_played_to_end(&self) {}

    fn on_item_changed(&self, new: Option<&ItemHandle>, old: Option<&ItemHandle>) {}

    fn on_item_status_changed(&self, new: ItemStatus, old: ItemStatus) {}

    fn on_time_update(&self, sample: &TimeSample) {}

    fn on_audio_mixing_mode_changed(&self, new: AudioMixingMode, old: AudioMixingMode) {}

    fn on_subtitle_selection_changed(
        &self,
        new: Option<&SubtitleTrack>,
        old: Option<&SubtitleTrack>,
    ) {
    }

    /// The bound item reached `ReadyToPlay` or `Error` for the first time,
    /// or no playable item is bound
    fn on_loaded_item(&self, item: Option<&ItemHandle>) {}

    fn on_video_track_changed(&self, new: Option<&TrackHandle>, old: Option<&TrackHandle>) {}
}

fn identity<D: ?Sized>(delegate: &Arc<D>) -> usize {
    Arc::as_ptr(delegate) as *const () as usize
}

/// Weak, identity-comparable reference to a delegate
#[derive(Clone)]
pub struct DelegateHandle {
    key: usize,
    weak: Weak<dyn PlayerDelegate>,
}

impl DelegateHandle {
    pub fn new(delegate: &Arc<dyn PlayerDelegate>) -> Self {
        Self {
            key: identity(delegate),
            weak: Arc::downgrade(delegate),
        }
    }

    pub fn upgrade(&self) -> Option<Arc<dyn PlayerDelegate>> {
        self.weak.upgrade()
    }

    pub fn is_expired(&self) -> bool {
        self.weak.strong_count() == 0
    }
}

impl PartialEq for DelegateHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_expired(), other.is_expired()) {
            (false, false) => self.key == other.key,
            (true, true) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateHandle")
            .field("key", &format_args!("{:#x}", self.key))
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// Set of weakly held delegates
#[derive(Debug, Default)]
pub struct DelegateRegistry {
    handles: DashMap<usize, DelegateHandle>,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a weak handle; registering a live delegate again is a no-op
    ///
    /// Returns `true` when the delegate was not registered before.
    pub fn register(&self, delegate: Arc<dyn PlayerDelegate>) -> bool {
        let handle = DelegateHandle::new(&delegate);
        match self.handles.entry(handle.key) {
            Entry::Occupied(mut existing) => {
                // The address may have been reused by a new allocation
                if existing.get().is_expired() {
                    existing.insert(handle);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Remove the delegate with the same identity; returns whether it was found
    pub fn unregister<D: ?Sized + PlayerDelegate>(&self, delegate: &Arc<D>) -> bool {
        self.handles.remove(&identity(delegate)).is_some()
    }

    /// Strong references to every live delegate, pruning expired handles
    ///
    /// The returned delegates are kept alive only for the duration of the
    /// caller's use; no registry lock is held while they run.
    pub fn live(&self) -> Vec<Arc<dyn PlayerDelegate>> {
        let mut live = Vec::with_capacity(self.handles.len());
        let mut expired = Vec::new();

        for entry in self.handles.iter() {
            match entry.value().upgrade() {
                Some(delegate) => live.push(delegate),
                None => expired.push(*entry.key()),
            }
        }

        for key in expired {
            self.handles.remove_if(&key, |_, handle| handle.is_expired());
        }

        live
    }

    /// Invoke `f` once per live delegate
    pub fn for_each_live(&self, mut f: impl FnMut(&dyn PlayerDelegate)) {
        for delegate in self.live() {
            f(delegate.as_ref());
        }
    }

    /// Drop every handle without invoking anything
    pub fn clear(&self) {
        self.handles.clear();
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.handles.iter().filter(|entry| !entry.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        played_to_end: AtomicUsize,
    }

    impl PlayerDelegate for Counting {
        fn on_played_to_end(&self) {
            self.played_to_end.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fire(registry: &DelegateRegistry) {
        registry.for_each_live(|delegate| delegate.on_played_to_end());
    }

    #[test]
    fn test_register_twice_delivers_once() {
        let registry = DelegateRegistry::new();
        let delegate = Arc::new(Counting::default());

        assert!(registry.register(delegate.clone()));
        assert!(!registry.register(delegate.clone()));
        fire(&registry);

        assert_eq!(delegate.played_to_end.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_by_identity() {
        let registry = DelegateRegistry::new();
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        registry.register(first.clone());
        registry.register(second.clone());

        assert!(registry.unregister(&first));
        assert!(!registry.unregister(&first));
        fire(&registry);

        assert_eq!(first.played_to_end.load(Ordering::SeqCst), 0);
        assert_eq!(second.played_to_end.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_delegates_are_pruned() {
        let registry = DelegateRegistry::new();
        let delegate = Arc::new(Counting::default());
        registry.register(delegate.clone());
        drop(delegate);

        assert!(registry.live().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_does_not_invoke() {
        let registry = DelegateRegistry::new();
        let delegate = Arc::new(Counting::default());
        registry.register(delegate.clone());
        registry.clear();
        fire(&registry);

        assert_eq!(delegate.played_to_end.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handle_equality() {
        let first: Arc<dyn PlayerDelegate> = Arc::new(Counting::default());
        let second: Arc<dyn PlayerDelegate> = Arc::new(Counting::default());

        let a = DelegateHandle::new(&first);
        let b = DelegateHandle::new(&first);
        let c = DelegateHandle::new(&second);
        assert_eq!(a, b);
        assert_ne!(a, c);

        drop(first);
        drop(second);
        assert_eq!(a, c);
    }
}
