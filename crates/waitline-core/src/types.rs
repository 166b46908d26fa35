//! # Domain Types
//!
//! Core domain types used throughout Waitline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────────┐                   │
//! │  │     QueueEntry       │   │  QueueConfiguration  │                   │
//! │  │  ──────────────────  │   │  ──────────────────  │                   │
//! │  │  id (UUID)           │   │  company_id          │                   │
//! │  │  company_id          │   │  queue_id            │                   │
//! │  │  queue_id            │   │  tolerance_minutes   │                   │
//! │  │  movement_date       │   │  party size bounds   │                   │
//! │  │  customer_id         │   │  active window/flag  │                   │
//! │  │  state               │   │  default_channel     │                   │
//! │  │  entered/called/...  │   └──────────────────────┘                   │
//! │  └──────────────────────┘                                              │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────────┐                   │
//! │  │     EntryState       │   │     ChannelKind      │                   │
//! │  │  ──────────────────  │   │  ──────────────────  │                   │
//! │  │  Waiting             │   │  Sms                 │                   │
//! │  │  Called              │   │  ChatTemplate        │                   │
//! │  │  Confirmed           │   │  Email               │                   │
//! │  │  Attended  (final)   │   └──────────────────────┘                   │
//! │  │  NoShow    (final)   │                                              │
//! │  │  Removed   (final)   │                                              │
//! │  └──────────────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entry has:
//! - `id`: UUID v4 - immutable, used by every operation (`entryId`)
//! - Business key: (company, queue, movement date, customer)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Entry State
// =============================================================================

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Customer is in line.
    Waiting,
    /// Staff called the customer; tolerance window is running.
    Called,
    /// Customer confirmed presence within the tolerance window.
    Confirmed,
    /// Customer was served.
    Attended,
    /// Tolerance elapsed without confirmation.
    NoShow,
    /// Customer left or staff removed the entry before it was called.
    Removed,
}

impl EntryState {
    /// All states, in lifecycle order.
    pub const ALL: [EntryState; 6] = [
        EntryState::Waiting,
        EntryState::Called,
        EntryState::Confirmed,
        EntryState::Attended,
        EntryState::NoShow,
        EntryState::Removed,
    ];

    /// Storage and wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryState::Waiting => "waiting",
            EntryState::Called => "called",
            EntryState::Confirmed => "confirmed",
            EntryState::Attended => "attended",
            EntryState::NoShow => "no_show",
            EntryState::Removed => "removed",
        }
    }

    /// No event is accepted once a terminal state is reached.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryState::Attended | EntryState::NoShow | EntryState::Removed
        )
    }

    /// Open entries count against the one-entry-per-day rule.
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl Default for EntryState {
    fn default() -> Self {
        EntryState::Waiting
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Channel Kind
// =============================================================================

/// Outbound channel used to tell a customer they were called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Short message to the customer's phone.
    Sms,
    /// Pre-approved chat template (WhatsApp Business).
    ChatTemplate,
    /// Electronic mail.
    Email,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Sms => write!(f, "sms"),
            ChannelKind::ChatTemplate => write!(f, "chat_template"),
            ChannelKind::Email => write!(f, "email"),
        }
    }
}

// =============================================================================
// Queue Entry
// =============================================================================

/// One customer's occupancy of a position in a queue for a given day.
///
/// Owned by the Entry Store. Never deleted, only terminalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QueueEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Insertion order; breaks ties between equal `entered_at` values.
    pub seq: i64,

    pub company_id: String,
    pub queue_id: String,

    /// Day this entry belongs to.
    #[ts(as = "String")]
    pub movement_date: NaiveDate,

    pub customer_id: String,

    /// Name shown on the status page and used in messages.
    pub display_name: String,

    pub phone: Option<String>,
    pub email: Option<String>,

    /// Overrides the queue's default channel when set.
    pub preferred_channel: Option<ChannelKind>,

    pub party_size: i64,

    pub state: EntryState,

    #[ts(as = "String")]
    pub entered_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub called_at: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub attended_at: Option<DateTime<Utc>>,

    /// Set when the entry leaves the line without being served.
    #[ts(as = "Option<String>")]
    pub left_at: Option<DateTime<Utc>>,

    /// Tolerance in force when the entry was called (snapshot).
    pub call_tolerance_minutes: Option<i64>,
}

impl QueueEntry {
    /// Returns true if the entry has been called and not yet settled.
    #[inline]
    pub fn is_called(&self) -> bool {
        self.state == EntryState::Called
    }

    /// Channel to notify this entry through.
    pub fn channel(&self, config: &QueueConfiguration) -> ChannelKind {
        self.preferred_channel.unwrap_or(config.default_channel)
    }

    /// Deadline computed from the call-time tolerance snapshot.
    ///
    /// `None` if the entry was never called or the deadline is not
    /// representable.
    pub fn snapshot_deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline_with(self.call_tolerance_minutes?)
    }

    /// Deadline computed with an arbitrary tolerance (the sweep's view).
    ///
    /// `None` if the entry was never called or the deadline overflows.
    pub fn deadline_with(&self, tolerance_minutes: i64) -> Option<DateTime<Utc>> {
        let tolerance = Duration::try_minutes(tolerance_minutes)?;
        self.called_at?.checked_add_signed(tolerance)
    }
}

// =============================================================================
// Queue Configuration
// =============================================================================

/// Read-only snapshot of a queue's settings.
///
/// Consulted at join time, at call time (tolerance snapshot) and by the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QueueConfiguration {
    pub company_id: String,
    pub queue_id: String,

    /// Display name used in notifications.
    pub name: String,

    /// Minutes a called customer has to confirm presence.
    pub tolerance_minutes: i64,

    pub min_party_size: i64,
    pub max_party_size: i64,

    /// First day the queue accepts joins (inclusive).
    #[ts(as = "Option<String>")]
    pub active_from: Option<NaiveDate>,

    /// Last day the queue accepts joins (inclusive).
    #[ts(as = "Option<String>")]
    pub active_until: Option<NaiveDate>,

    pub is_active: bool,

    pub default_channel: ChannelKind,

    /// Average minutes spent serving one entry, for wait estimates.
    pub average_service_minutes: i64,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl QueueConfiguration {
    /// Checks whether `date` falls inside the active window.
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        let after_start = self.active_from.map_or(true, |from| date >= from);
        let before_end = self.active_until.map_or(true, |until| date <= until);
        after_start && before_end
    }
}

// =============================================================================
// Join Request / Ticket
// =============================================================================

/// Customer data supplied at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_channel: Option<ChannelKind>,
}

/// Input for the join operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub company_id: String,
    pub queue_id: String,
    pub customer: CustomerProfile,
    pub party_size: i64,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct JoinTicket {
    pub entry_id: String,
    /// Number of waiting entries ahead of this one.
    pub position: u32,
}

// =============================================================================
// Status & Events
// =============================================================================

/// Pull-based view of one entry, used by status pages and polling fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatus {
    pub entry_id: String,
    pub state: EntryState,
    pub position: u32,
    pub estimated_wait_minutes: u32,
    pub is_called: bool,
}

/// Published on the company topic after every accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    pub company_id: String,
    pub queue_id: String,
    pub entry_id: String,
    pub customer_id: String,
    pub new_state: EntryState,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

impl QueueEvent {
    /// Builds the event for an entry that just reached `entry.state`.
    pub fn for_entry(entry: &QueueEntry, occurred_at: DateTime<Utc>) -> Self {
        QueueEvent {
            company_id: entry.company_id.clone(),
            queue_id: entry.queue_id.clone(),
            entry_id: entry.id.clone(),
            customer_id: entry.customer_id.clone(),
            new_state: entry.state,
            occurred_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
