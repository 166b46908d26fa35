//! # waitline-db: Entry Store for Waitline
//!
//! This crate provides durable storage for queue entries and queue
//! configurations. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Waitline Data Flow                               │
//! │                                                                         │
//! │  QueueService::confirm(entry_id)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    waitline-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐  ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories    │  │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                  │  │  (embedded)  │  │   │
//! │  │   │               │    │ EntryRepository  │  │              │  │   │
//! │  │   │ SqlitePool    │◄───│ QueueConfig-     │  │ 001_initial  │  │   │
//! │  │   │               │    │   Repository     │  │              │  │   │
//! │  │   └───────────────┘    └──────────────────┘  └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE queue_entries SET state = 'confirmed', ...                     │
//! │  WHERE id = ? AND state = 'called'   ← conditional update              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Entry and configuration repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waitline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./waitline.db")).await?;
//! let entry = db.entries().get_by_id(&entry_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::entry::{CalledEntry, EntryRepository, NewEntry, StateWrite};
pub use repository::queue::QueueConfigRepository;
