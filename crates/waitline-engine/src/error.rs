//! # Engine Error Types
//!
//! Error types for queue service operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │   Not Found     │  │      Conflict           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Required       │  │  EntryNotFound  │  │  InvalidTransition      │ │
//! │  │  InvalidFormat  │  │  QueueNotFound  │  │  DuplicateToday         │ │
//! │  │  PartySize...   │  │                 │  │  QueueInactive          │ │
//! │  └─────────────────┘  └─────────────────┘  │  OutOfWindow            │ │
//! │                                            └─────────────────────────┘ │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   Internal: Database, Notify, Config, Channel, ShuttingDown     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A lost race is not an error: it is `TransitionOutcome::Superseded`.

use thiserror::Error;

use crate::notify::NotifyError;
use waitline_core::{CoreError, ValidationError};
use waitline_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Caller-facing classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// Unknown entry or queue.
    NotFound,
    /// Duplicate join or state-guard violation.
    Conflict,
    /// Store, channel or configuration failure.
    Internal,
}

/// Engine error type covering every failure a service call can surface.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Business Rule Errors
    // =========================================================================
    /// Rejected by the state machine or a join guard.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unknown entry ID.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// No configuration row for the queue.
    #[error("Queue not found: {company_id}/{queue_id}")]
    QueueNotFound { company_id: String, queue_id: String },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Entry Store failure.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Notification could not be built or sent.
    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Malformed endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Scheduler is already running or already stopped.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Classifies the error for transport wrappers.
    ///
    /// ```text
    /// Validation, PartySizeOutOfRange,
    /// rejected configuration rows            → Validation
    /// EntryNotFound, QueueNotFound           → NotFound
    /// InvalidTransition, DuplicateToday,
    /// QueueInactive, OutOfWindow             → Conflict
    /// everything else                        → Internal
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(CoreError::Validation(_))
            | EngineError::Core(CoreError::PartySizeOutOfRange { .. })
            | EngineError::Database(DbError::Validation(_)) => ErrorKind::Validation,
            EngineError::Core(_) => ErrorKind::Conflict,
            EngineError::EntryNotFound(_) | EngineError::QueueNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::Database(DbError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Database(DbError::UniqueViolation { .. }) => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use waitline_core::{EntryEvent, EntryState};

    #[test]
    fn test_error_kinds() {
        let invalid = EngineError::from(CoreError::InvalidTransition {
            from: EntryState::Waiting,
            event: EntryEvent::Confirm,
        });
        assert_eq!(invalid.kind(), ErrorKind::Conflict);

        let duplicate = EngineError::from(CoreError::DuplicateToday {
            customer_id: "c-1".into(),
            queue_id: "front-desk".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        });
        assert_eq!(duplicate.kind(), ErrorKind::Conflict);

        let party = EngineError::from(CoreError::PartySizeOutOfRange {
            requested: 9,
            min: 1,
            max: 4,
        });
        assert_eq!(party.kind(), ErrorKind::Validation);

        assert_eq!(
            EngineError::from(ValidationError::required("display_name")).kind(),
            ErrorKind::Validation
        );
        assert_eq!(EngineError::EntryNotFound("e-1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::Database(DbError::PoolExhausted).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            EngineError::Database(DbError::Validation(ValidationError::required("queue_id")))
                .kind(),
            ErrorKind::Validation
        );
        assert_eq!(EngineError::InvalidConfig("bad".into()).kind(), ErrorKind::Internal);
    }
}
