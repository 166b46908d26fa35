//! # Repository Module
//!
//! Database repository implementations for Waitline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  QueueService                                                          │
//! │       │                                                                 │
//! │       │  db.entries().conditional_update(id, Called, &write)           │
//! │       ▼                                                                 │
//! │  EntryRepository                                                       │
//! │  ├── insert(&self, new_entry)                                          │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── list_waiting(&self, company, queue, date)                         │
//! │  └── conditional_update(&self, id, expected, write)                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`EntryRepository`](entry::EntryRepository) - Queue entries and state writes
//! - [`QueueConfigRepository`](queue::QueueConfigRepository) - Queue settings

pub mod entry;
pub mod queue;
