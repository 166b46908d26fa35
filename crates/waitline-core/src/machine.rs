//! # Entry State Machine
//!
//! Pure transition logic for a queue entry's lifecycle.
//!
//! ## Transition Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Entry Lifecycle                                  │
//! │                                                                         │
//! │                 leave / remove                                          │
//! │   ┌─────────┐ ─────────────────────────────────────► ┌─────────┐       │
//! │   │ WAITING │                                         │ REMOVED │       │
//! │   └────┬────┘                                         └─────────┘       │
//! │        │ call                                                           │
//! │        ▼                                                                │
//! │   ┌─────────┐   expire    ┌─────────┐                                   │
//! │   │ CALLED  │ ──────────► │ NO_SHOW │                                   │
//! │   └────┬─┬──┘             └─────────┘                                   │
//! │        │ │ attend                                                       │
//! │ confirm│ └──────────────────────────────┐                               │
//! │        ▼                                ▼                               │
//! │   ┌───────────┐      attend       ┌──────────┐                          │
//! │   │ CONFIRMED │ ────────────────► │ ATTENDED │                          │
//! │   └───────────┘                   └──────────┘                          │
//! │                                                                         │
//! │  NO_SHOW, ATTENDED, REMOVED accept nothing.                            │
//! │  CONFIRMED accepts only attend.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Side Effects
//! A transition does not perform effects; it lists them. The engine applies
//! them after the conditional write to the Entry Store succeeds.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::EntryState;

// =============================================================================
// Events
// =============================================================================

/// Something that happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryEvent {
    /// Staff calls the customer forward.
    Call,
    /// Customer confirms presence.
    Confirm,
    /// Tolerance elapsed (timer or sweep).
    Expire,
    /// Staff marks the customer as served.
    Attend,
    /// Customer cancels.
    Leave,
    /// Staff cancels.
    Remove,
}

impl EntryEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryEvent::Call => "call",
            EntryEvent::Confirm => "confirm",
            EntryEvent::Expire => "expire",
            EntryEvent::Attend => "attend",
            EntryEvent::Leave => "leave",
            EntryEvent::Remove => "remove",
        }
    }
}

impl std::fmt::Display for EntryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Side Effects
// =============================================================================

/// Timestamp column written together with the new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampField {
    CalledAt,
    ConfirmedAt,
    AttendedAt,
    LeftAt,
}

impl TimestampField {
    /// Column name in the Entry Store.
    pub const fn column(&self) -> &'static str {
        match self {
            TimestampField::CalledAt => "called_at",
            TimestampField::ConfirmedAt => "confirmed_at",
            TimestampField::AttendedAt => "attended_at",
            TimestampField::LeftAt => "left_at",
        }
    }
}

/// Work the engine must do once a transition has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    SetTimestamp(TimestampField),
    ArmTimer,
    CancelTimer,
    Notify,
    Publish,
}

// =============================================================================
// Transition
// =============================================================================

/// A validated edge of the lifecycle graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: EntryState,
    pub to: EntryState,
    pub event: EntryEvent,
    pub effects: Vec<SideEffect>,
}

impl Transition {
    /// The timestamp column this transition stamps, if any.
    pub fn timestamp(&self) -> Option<TimestampField> {
        self.effects.iter().find_map(|effect| match effect {
            SideEffect::SetTimestamp(field) => Some(*field),
            _ => None,
        })
    }

    /// Returns true if the transition lists `effect`.
    pub fn has(&self, effect: SideEffect) -> bool {
        self.effects.contains(&effect)
    }
}

/// Validates `event` against `current` and computes the resulting transition.
///
/// ## Returns
/// * `Ok(Transition)` - new state plus the side effects to apply
/// * `Err(CoreError::InvalidTransition)` - no such edge from `current`
///
/// ## Example
/// ```rust
/// use waitline_core::machine::{apply_transition, EntryEvent};
/// use waitline_core::EntryState;
///
/// let t = apply_transition(EntryState::Called, EntryEvent::Expire).unwrap();
/// assert_eq!(t.to, EntryState::NoShow);
///
/// // Terminal states accept nothing.
/// assert!(apply_transition(EntryState::NoShow, EntryEvent::Confirm).is_err());
/// ```
pub fn apply_transition(current: EntryState, event: EntryEvent) -> CoreResult<Transition> {
    use EntryEvent as E;
    use EntryState as S;
    use SideEffect::*;
    use TimestampField::*;

    let (to, effects) = match (current, event) {
        (S::Waiting, E::Call) => (
            S::Called,
            vec![SetTimestamp(CalledAt), ArmTimer, Notify, Publish],
        ),
        (S::Waiting, E::Leave | E::Remove) => (S::Removed, vec![SetTimestamp(LeftAt), Publish]),
        (S::Called, E::Confirm) => (
            S::Confirmed,
            vec![SetTimestamp(ConfirmedAt), CancelTimer, Publish],
        ),
        (S::Called, E::Expire) => (S::NoShow, vec![SetTimestamp(LeftAt), CancelTimer, Publish]),
        (S::Called, E::Attend) => (
            S::Attended,
            vec![SetTimestamp(AttendedAt), CancelTimer, Publish],
        ),
        (S::Confirmed, E::Attend) => (S::Attended, vec![SetTimestamp(AttendedAt), Publish]),
        (from, event) => return Err(CoreError::InvalidTransition { from, event }),
    };

    Ok(Transition {
        from: current,
        to,
        event,
        effects,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [EntryEvent; 6] = [
        EntryEvent::Call,
        EntryEvent::Confirm,
        EntryEvent::Expire,
        EntryEvent::Attend,
        EntryEvent::Leave,
        EntryEvent::Remove,
    ];

    #[test]
    fn test_call_arms_timer_and_notifies() {
        let t = apply_transition(EntryState::Waiting, EntryEvent::Call).unwrap();
        assert_eq!(t.to, EntryState::Called);
        assert_eq!(t.timestamp(), Some(TimestampField::CalledAt));
        assert!(t.has(SideEffect::ArmTimer));
        assert!(t.has(SideEffect::Notify));
        assert!(t.has(SideEffect::Publish));
    }

    #[test]
    fn test_every_exit_from_called_cancels_timer() {
        for event in [EntryEvent::Confirm, EntryEvent::Expire, EntryEvent::Attend] {
            let t = apply_transition(EntryState::Called, event).unwrap();
            assert!(t.has(SideEffect::CancelTimer), "{event} must cancel the timer");
        }
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        for state in EntryState::ALL.into_iter().filter(|s| s.is_terminal()) {
            for event in EVENTS {
                let err = apply_transition(state, event).unwrap_err();
                assert_eq!(err, CoreError::InvalidTransition { from: state, event });
            }
        }
    }

    #[test]
    fn test_confirmed_only_accepts_attend() {
        for event in EVENTS {
            let result = apply_transition(EntryState::Confirmed, event);
            assert_eq!(result.is_ok(), event == EntryEvent::Attend, "{event}");
        }
    }

    #[test]
    fn test_confirm_requires_called() {
        assert!(apply_transition(EntryState::Waiting, EntryEvent::Confirm).is_err());
        assert!(apply_transition(EntryState::Waiting, EntryEvent::Expire).is_err());
        assert!(apply_transition(EntryState::Called, EntryEvent::Leave).is_err());
        assert!(apply_transition(EntryState::Called, EntryEvent::Call).is_err());
    }

    #[test]
    fn test_leave_and_remove_reach_removed() {
        for event in [EntryEvent::Leave, EntryEvent::Remove] {
            let t = apply_transition(EntryState::Waiting, event).unwrap();
            assert_eq!(t.to, EntryState::Removed);
            assert_eq!(t.timestamp(), Some(TimestampField::LeftAt));
            assert!(!t.has(SideEffect::CancelTimer));
        }
    }

    #[test]
    fn test_every_transition_publishes_and_stamps_once() {
        for state in EntryState::ALL {
            for event in EVENTS {
                if let Ok(t) = apply_transition(state, event) {
                    assert!(t.has(SideEffect::Publish));
                    let stamps = t
                        .effects
                        .iter()
                        .filter(|e| matches!(e, SideEffect::SetTimestamp(_)))
                        .count();
                    assert_eq!(stamps, 1);
                }
            }
        }
    }
}
