//! Status derivation from raw engine signals
//!
//! The precedence, evaluated on every input change:
//!
//! ```text
//! engine Failed | item Failed ──► Error    (is_playing forced false)
//! no item bound               ──► Idle     (is_playing follows time control)
//! item Unknown                ──► Loading
//! buffer empty                ──► Loading
//! WaitingToPlay               ──► Loading
//! otherwise                   ──► ReadyToPlay
//! ```

use player_signal::{EngineStatus, ItemStatus, TimeControlStatus};

use crate::status::{ErrorKind, PlayerStatus};

/// Latest raw values of the signals the status depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalInputs {
    pub engine_status: EngineStatus,
    pub item_status: ItemStatus,
    pub time_control: TimeControlStatus,
    pub buffer_empty: bool,
    /// Tracked for the snapshot only
    pub likely_to_keep_up: bool,
}

impl Default for SignalInputs {
    fn default() -> Self {
        Self {
            engine_status: EngineStatus::Unknown,
            item_status: ItemStatus::Unknown,
            time_control: TimeControlStatus::Paused,
            buffer_empty: true,
            likely_to_keep_up: false,
        }
    }
}

impl SignalInputs {
    /// Return the item-level inputs to their baseline
    pub fn reset_item(&mut self) {
        let baseline = Self::default();
        self.item_status = baseline.item_status;
        self.buffer_empty = baseline.buffer_empty;
        self.likely_to_keep_up = baseline.likely_to_keep_up;
    }
}

/// Result of evaluating the precedence rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: PlayerStatus,
    pub is_playing: bool,
    /// Which failure caused [`PlayerStatus::Error`], item first
    pub failure: Option<ErrorKind>,
}

/// Derive status and `is_playing` from the inputs
pub fn derive(inputs: &SignalInputs, item_bound: bool) -> Transition {
    let failure = if inputs.item_status == ItemStatus::Failed && item_bound {
        Some(ErrorKind::Item)
    } else if inputs.engine_status == EngineStatus::Failed {
        Some(ErrorKind::Engine)
    } else {
        None
    };

    if let Some(kind) = failure {
        return Transition {
            status: PlayerStatus::Error,
            is_playing: false,
            failure: Some(kind),
        };
    }

    let is_playing = inputs.time_control == TimeControlStatus::Playing;
    if !item_bound {
        return Transition {
            status: PlayerStatus::Idle,
            is_playing,
            failure: None,
        };
    }

    let status = match inputs.item_status {
        ItemStatus::Unknown => PlayerStatus::Loading,
        _ if inputs.buffer_empty => PlayerStatus::Loading,
        _ if inputs.time_control == TimeControlStatus::WaitingToPlay => PlayerStatus::Loading,
        _ => PlayerStatus::ReadyToPlay,
    };

    Transition {
        status,
        is_playing,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_inputs() -> SignalInputs {
        SignalInputs {
            engine_status: EngineStatus::ReadyToPlay,
            item_status: ItemStatus::ReadyToPlay,
            time_control: TimeControlStatus::Paused,
            buffer_empty: false,
            likely_to_keep_up: true,
        }
    }

    #[test]
    fn test_no_item_is_idle() {
        let transition = derive(&SignalInputs::default(), false);
        assert_eq!(transition.status, PlayerStatus::Idle);
        assert!(!transition.is_playing);
    }

    #[test]
    fn test_idle_still_reports_playing_time_control() {
        let inputs = SignalInputs {
            time_control: TimeControlStatus::Playing,
            ..SignalInputs::default()
        };
        let transition = derive(&inputs, false);
        assert_eq!(transition.status, PlayerStatus::Idle);
        assert!(transition.is_playing);
    }

    #[test]
    fn test_unknown_item_is_loading() {
        let transition = derive(&SignalInputs::default(), true);
        assert_eq!(transition.status, PlayerStatus::Loading);
    }

    #[test]
    fn test_buffer_empty_is_loading() {
        let mut inputs = ready_inputs();
        inputs.buffer_empty = true;
        assert_eq!(derive(&inputs, true).status, PlayerStatus::Loading);
    }

    #[test]
    fn test_waiting_to_play_is_loading() {
        let mut inputs = ready_inputs();
        inputs.time_control = TimeControlStatus::WaitingToPlay;
        assert_eq!(derive(&inputs, true).status, PlayerStatus::Loading);
    }

    #[test]
    fn test_ready_and_playing() {
        let mut inputs = ready_inputs();
        inputs.time_control = TimeControlStatus::Playing;
        let transition = derive(&inputs, true);
        assert_eq!(transition.status, PlayerStatus::ReadyToPlay);
        assert!(transition.is_playing);
    }

    #[test]
    fn test_engine_failure_overrides_playing() {
        let mut inputs = ready_inputs();
        inputs.time_control = TimeControlStatus::Playing;
        inputs.engine_status = EngineStatus::Failed;
        let transition = derive(&inputs, true);
        assert_eq!(transition.status, PlayerStatus::Error);
        assert!(!transition.is_playing);
        assert_eq!(transition.failure, Some(ErrorKind::Engine));
    }

    #[test]
    fn test_item_failure_preferred_over_engine_failure() {
        let mut inputs = ready_inputs();
        inputs.engine_status = EngineStatus::Failed;
        inputs.item_status = ItemStatus::Failed;
        assert_eq!(derive(&inputs, true).failure, Some(ErrorKind::Item));
    }

    #[test]
    fn test_likely_to_keep_up_does_not_affect_status() {
        let mut inputs = ready_inputs();
        inputs.likely_to_keep_up = false;
        assert_eq!(derive(&inputs, true).status, PlayerStatus::ReadyToPlay);
    }

    #[test]
    fn test_reset_item_keeps_player_inputs() {
        let mut inputs = ready_inputs();
        inputs.time_control = TimeControlStatus::Playing;
        inputs.reset_item();
        assert_eq!(inputs.engine_status, EngineStatus::ReadyToPlay);
        assert_eq!(inputs.time_control, TimeControlStatus::Playing);
        assert_eq!(inputs.item_status, ItemStatus::Unknown);
        assert!(inputs.buffer_empty);
        assert!(!inputs.likely_to_keep_up);
    }
}
