//! # waitline-engine: Queue Engine for Waitline
//!
//! This crate runs the parts of Waitline that live over time: the queue
//! service, the per-entry timeout timers, the periodic sweep, outbound
//! notifications and the realtime event bus.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   QueueService (orchestrator)                    │  │
//! │  │                                                                  │  │
//! │  │  join / call / confirm / mark_attended / leave / remove          │  │
//! │  │  expire (timer + sweep) / status / queue_snapshot               │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │TimeoutScheduler│  │  Notification  │  │       EventBus         │    │
//! │  │                │  │   Dispatcher   │  │                        │    │
//! │  │ one timer per  │  │ SMS gateway    │  │ per-company broadcast  │    │
//! │  │ called entry   │  │ WhatsApp tmpl  │  │ topics, best-effort    │    │
//! │  │ + sweep tick   │  │ SMTP email     │  │                        │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          │ fired / tick                                                 │
//! │          ▼                                                              │
//! │   ExpiryHandler (implemented by QueueService)                          │
//! │                                                                         │
//! │  STORAGE: waitline-db Entry Store (conditional state updates)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `QueueService` and the transition pipeline
//! - [`scheduler`] - Per-entry timers and the periodic sweep task
//! - [`notify`] - Notification payloads, channels and dispatcher
//! - [`events`] - Realtime event bus
//! - [`config`] - Engine configuration (TOML file + environment)
//! - [`clock`] - Time source abstraction
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waitline_engine::{EngineConfig, EventBus, NotificationDispatcher, QueueService, TimeoutScheduler};
//!
//! let config = EngineConfig::load(None)?;
//! let dispatcher = NotificationDispatcher::from_settings(&config.notify)?;
//! let scheduler = TimeoutScheduler::new(config.scheduler.sweep_interval());
//! let events = EventBus::new(config.events.capacity);
//!
//! let service = Arc::new(QueueService::new(db, scheduler, dispatcher, events));
//! service.start(config.scheduler.recover_timers).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod scheduler;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DatabaseSettings, EmailSettings, EngineConfig, EventSettings, NotifySettings,
    SchedulerSettings, ServerSettings, SmsSettings, WhatsAppSettings,
};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::EventBus;
pub use notify::{Notification, NotificationChannel, NotificationDispatcher, NotifyError};
pub use scheduler::{ExpiryHandler, SweepReport, TimeoutScheduler};
pub use service::{QueueService, TransitionOutcome};
