//! Property-based tests for status derivation
//!
//! The pure precedence rules are checked directly against `derive`; the
//! error and loaded-item invariants are checked end to end by replaying
//! random event sequences through a running observer.

mod helpers;

use std::sync::Arc;

use helpers::{movie, Recorder, Seen};
use player_signal::testing::ScriptedSource;
use player_signal::{EngineStatus, ItemStatus, NativeItem, TimeControlStatus};
use player_sync::{derive, PlayerObserver, PlayerStatus, SignalEvent, SignalInputs};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn engine_status_strategy() -> impl Strategy<Value = EngineStatus> {
    prop_oneof![
        Just(EngineStatus::Unknown),
        Just(EngineStatus::ReadyToPlay),
        Just(EngineStatus::Failed),
    ]
}

fn item_status_strategy() -> impl Strategy<Value = ItemStatus> {
    prop_oneof![
        Just(ItemStatus::Unknown),
        Just(ItemStatus::ReadyToPlay),
        Just(ItemStatus::Failed),
    ]
}

fn time_control_strategy() -> impl Strategy<Value = TimeControlStatus> {
    prop_oneof![
        Just(TimeControlStatus::Paused),
        Just(TimeControlStatus::WaitingToPlay),
        Just(TimeControlStatus::Playing),
    ]
}

fn inputs_strategy() -> impl Strategy<Value = SignalInputs> {
    (
        engine_status_strategy(),
        item_status_strategy(),
        time_control_strategy(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(engine_status, item_status, time_control, buffer_empty, likely_to_keep_up)| {
                SignalInputs {
                    engine_status,
                    item_status,
                    time_control,
                    buffer_empty,
                    likely_to_keep_up,
                }
            },
        )
}

/// Events that feed the status state machine
fn status_event_strategy() -> impl Strategy<Value = SignalEvent> {
    prop_oneof![
        engine_status_strategy().prop_map(SignalEvent::EngineStatus),
        item_status_strategy().prop_map(SignalEvent::ItemStatus),
        time_control_strategy().prop_map(SignalEvent::TimeControl),
        any::<bool>().prop_map(SignalEvent::BufferEmpty),
        any::<bool>().prop_map(SignalEvent::LikelyToKeepUp),
    ]
}

// ============================================================================
// Pure derivation
// ============================================================================

proptest! {
    /// An error is reported exactly when the status is `Error`, and an
    /// errored player never reports itself as playing
    #[test]
    fn prop_failure_iff_error_status(inputs in inputs_strategy(), item_bound in any::<bool>()) {
        let transition = derive(&inputs, item_bound);

        prop_assert_eq!(transition.failure.is_some(), transition.status == PlayerStatus::Error);
        if transition.status == PlayerStatus::Error {
            prop_assert!(!transition.is_playing);
        }
    }

    /// Without an item the player is idle unless the engine itself failed;
    /// an idle player still reports whether time control is playing
    #[test]
    fn prop_no_item_is_idle_or_engine_error(inputs in inputs_strategy()) {
        let transition = derive(&inputs, false);

        if inputs.engine_status == EngineStatus::Failed {
            prop_assert_eq!(transition.status, PlayerStatus::Error);
            prop_assert!(!transition.is_playing);
        } else {
            prop_assert_eq!(transition.status, PlayerStatus::Idle);
            prop_assert_eq!(
                transition.is_playing,
                inputs.time_control == TimeControlStatus::Playing
            );
        }
    }

    /// `likely_to_keep_up` never changes the derived status
    #[test]
    fn prop_likely_to_keep_up_is_tracked_only(inputs in inputs_strategy(), item_bound in any::<bool>()) {
        let flipped = SignalInputs {
            likely_to_keep_up: !inputs.likely_to_keep_up,
            ..inputs
        };
        prop_assert_eq!(derive(&inputs, item_bound), derive(&flipped, item_bound));
    }
}

// ============================================================================
// End-to-end invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// For any event sequence: every status notification carries an error
    /// exactly when it reports `Error`, the final snapshot obeys the same
    /// rule, and the item is reported loaded at most once, only after a
    /// status notification reached `ReadyToPlay` or `Error`.
    #[test]
    fn prop_error_and_loaded_invariants(
        events in prop::collection::vec(status_event_strategy(), 1..24)
    ) {
        let source = ScriptedSource::new();
        let observer = PlayerObserver::new(Arc::new(source.clone())).unwrap();
        observer.snapshot_now().unwrap();

        let recorder = Recorder::new();
        observer.register_delegate(recorder.clone()).unwrap();

        let item = movie();
        source.replace_item(Some(NativeItem::Playable(item.clone())));
        for event in events {
            observer.on_attribute_event(event).unwrap();
        }
        let snapshot = observer.snapshot_now().unwrap();

        prop_assert_eq!(
            snapshot.state.error.is_some(),
            snapshot.state.status == PlayerStatus::Error
        );

        let seen = recorder.all();
        let mut settled_before_loaded = false;
        let mut loaded = 0;
        for entry in &seen {
            match entry {
                Seen::Status(new, _, error) => {
                    prop_assert_eq!(error.is_some(), *new == PlayerStatus::Error);
                    if matches!(new, PlayerStatus::ReadyToPlay | PlayerStatus::Error) {
                        settled_before_loaded = true;
                    }
                }
                Seen::LoadedItem(Some(id)) => {
                    prop_assert_eq!(id, &item.id);
                    prop_assert!(settled_before_loaded);
                    loaded += 1;
                }
                _ => {}
            }
        }

        prop_assert!(loaded <= 1);
        prop_assert_eq!(loaded == 1, snapshot.state.loaded_current_item);
    }
}
