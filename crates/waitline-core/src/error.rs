//! # Error Types
//!
//! Domain-specific error types for waitline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  waitline-core errors (this file)                                      │
//! │  ├── CoreError        - Join guards and lifecycle violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  waitline-db errors (separate crate)                                   │
//! │  └── DbError          - Entry Store failures                           │
//! │                                                                         │
//! │  waitline-engine errors                                                │
//! │  └── EngineError      - What callers of the service see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::machine::EntryEvent;
use crate::types::EntryState;

// =============================================================================
// Core Error
// =============================================================================

/// Core queue-logic errors.
///
/// Every variant is a business rule rejection. None of them is fatal: the
/// engine surfaces them synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The event is not an edge out of the entry's current state.
    ///
    /// ## When This Occurs
    /// - Confirming an entry that is still waiting
    /// - Calling an entry twice
    /// - Any event on a terminal entry (no_show, attended, removed)
    #[error("Cannot apply '{event}' to an entry in state '{from}'")]
    InvalidTransition { from: EntryState, event: EntryEvent },

    /// Queue is disabled by its owner.
    #[error("Queue {queue_id} is not accepting customers")]
    QueueInactive { queue_id: String },

    /// Join attempted outside the configured active date range.
    #[error("Queue {queue_id} is not open on {date}")]
    OutOfWindow { queue_id: String, date: NaiveDate },

    /// Customer already holds an open entry in this queue today.
    ///
    /// ## User Workflow
    /// ```text
    /// join(queue A, customer 42)   → entry #1 (waiting)
    /// join(queue A, customer 42)   → DuplicateToday
    /// leave(#1)                    → removed
    /// join(queue A, customer 42)   → entry #2 (waiting)
    /// ```
    #[error("Customer {customer_id} already has an open entry in queue {queue_id} for {date}")]
    DuplicateToday {
        customer_id: String,
        queue_id: String,
        date: NaiveDate,
    },

    /// Party size outside configured bounds.
    #[error("Party size {requested} must be between {min} and {max}")]
    PartySizeOutOfRange { requested: i64, min: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for state-guard and duplicate rejections (409-equivalent).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTransition { .. } | CoreError::DuplicateToday { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed e-mail or phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::PartySizeOutOfRange {
            requested: 12,
            min: 1,
            max: 8,
        };
        assert_eq!(err.to_string(), "Party size 12 must be between 1 and 8");

        let err = CoreError::InvalidTransition {
            from: EntryState::Waiting,
            event: EntryEvent::Confirm,
        };
        assert_eq!(
            err.to_string(),
            "Cannot apply 'confirm' to an entry in state 'waiting'"
        );
    }

    #[test]
    fn test_conflict_classification() {
        let err = CoreError::DuplicateToday {
            customer_id: "c-1".into(),
            queue_id: "q-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        };
        assert!(err.is_conflict());
        assert!(!CoreError::QueueInactive { queue_id: "q".into() }.is_conflict());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("display_name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(
            core_err.to_string(),
            "Validation error: display_name is required"
        );
    }
}
