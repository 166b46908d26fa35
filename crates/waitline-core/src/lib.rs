//! # waitline-core: Pure Queue Logic for Waitline
//!
//! This crate is the **heart** of Waitline. It contains the queue-entry
//! lifecycle as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Waitline Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            waitline-server (HTTP + WebSocket)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            waitline-engine (timers, sweep, notify, bus)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ waitline-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  machine  │  │ position  │  │ validation│  │   │
//! │  │   │ QueueEntry│  │ Transition│  │ ahead-of  │  │ join rules│  │   │
//! │  │   │ EntryState│  │ SideEffect│  │ wait est. │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (QueueEntry, QueueConfiguration, QueueEvent)
//! - [`machine`] - Entry lifecycle state machine
//! - [`position`] - Queue position and wait estimates
//! - [`validation`] - Join guards and input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use waitline_core::machine::{apply_transition, EntryEvent, SideEffect};
//! use waitline_core::EntryState;
//!
//! let transition = apply_transition(EntryState::Waiting, EntryEvent::Call).unwrap();
//! assert_eq!(transition.to, EntryState::Called);
//! assert!(transition.effects.contains(&SideEffect::ArmTimer));
//!
//! // Confirming something that was never called is rejected.
//! assert!(apply_transition(EntryState::Waiting, EntryEvent::Confirm).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod machine;
pub mod position;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use machine::{apply_transition, EntryEvent, SideEffect, TimestampField, Transition};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest tolerance a queue may configure (one working day).
pub const MAX_TOLERANCE_MINUTES: i64 = 24 * 60;

/// Upper bound for a configured party size.
///
/// ## Business Reason
/// Prevents typos like 100 instead of 10 from reserving a whole venue.
pub const MAX_PARTY_SIZE: i64 = 50;
