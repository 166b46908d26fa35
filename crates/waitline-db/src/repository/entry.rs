//! # Entry Repository
//!
//! The Entry Store: durable record of every queue entry and its state.
//!
//! ## Conditional Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Compare-State-Then-Write                               │
//! │                                                                         │
//! │  Staff: confirm(E)                    Timer: expire(E)                 │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  UPDATE ... SET state='confirmed'     UPDATE ... SET state='no_show'   │
//! │  WHERE id=E AND state='called'        WHERE id=E AND state='called'    │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  1 row  → Ok(true)   (winner)         0 rows → Ok(false) (superseded)  │
//! │                                                                         │
//! │  SQLite serializes writers, so exactly one of the two matches.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are never deleted; terminal states are the end of the road.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use waitline_core::{ChannelKind, EntryState, QueueEntry, TimestampField};

const SELECT_ENTRY: &str = r#"
    SELECT
        seq,
        id,
        company_id,
        queue_id,
        movement_date,
        customer_id,
        display_name,
        phone,
        email,
        preferred_channel,
        party_size,
        state,
        entered_at,
        called_at,
        confirmed_at,
        attended_at,
        left_at,
        call_tolerance_minutes
    FROM queue_entries
"#;

// =============================================================================
// Inputs & Rows
// =============================================================================

/// Data for a brand-new waiting entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub company_id: String,
    pub queue_id: String,
    pub movement_date: NaiveDate,
    pub customer_id: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub preferred_channel: Option<ChannelKind>,
    pub party_size: i64,
    pub entered_at: DateTime<Utc>,
}

/// The write half of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    /// State to move to.
    pub to: EntryState,
    /// Timestamp column stamped with `at`, if any.
    pub stamp: Option<TimestampField>,
    pub at: DateTime<Utc>,
    /// Tolerance snapshot; only the call transition sets it.
    pub call_tolerance_minutes: Option<i64>,
}

/// A called entry joined with its queue's current tolerance.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CalledEntry {
    #[sqlx(flatten)]
    pub entry: QueueEntry,
    pub current_tolerance_minutes: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for queue entries.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: SqlitePool,
}

impl EntryRepository {
    /// Creates a new EntryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EntryRepository { pool }
    }

    /// Inserts a new entry in `waiting` state.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the customer already has an open entry
    ///   for this queue and day
    /// * `DbError::ForeignKeyViolation` - the queue has no configuration
    pub async fn insert(&self, new: &NewEntry) -> DbResult<QueueEntry> {
        let id = generate_entry_id();

        debug!(
            entry_id = %id,
            company_id = %new.company_id,
            queue_id = %new.queue_id,
            customer_id = %new.customer_id,
            "Inserting queue entry"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO queue_entries (
                id, company_id, queue_id, movement_date,
                customer_id, display_name, phone, email,
                preferred_channel, party_size, state, entered_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&id)
        .bind(&new.company_id)
        .bind(&new.queue_id)
        .bind(new.movement_date)
        .bind(&new.customer_id)
        .bind(&new.display_name)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(new.preferred_channel)
        .bind(new.party_size)
        .bind(EntryState::Waiting)
        .bind(new.entered_at)
        .execute(&self.pool)
        .await?;

        Ok(QueueEntry {
            id,
            seq: result.last_insert_rowid(),
            company_id: new.company_id.clone(),
            queue_id: new.queue_id.clone(),
            movement_date: new.movement_date,
            customer_id: new.customer_id.clone(),
            display_name: new.display_name.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            preferred_channel: new.preferred_channel,
            party_size: new.party_size,
            state: EntryState::Waiting,
            entered_at: new.entered_at,
            called_at: None,
            confirmed_at: None,
            attended_at: None,
            left_at: None,
            call_tolerance_minutes: None,
        })
    }

    /// Gets an entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<QueueEntry>> {
        let sql = format!("{SELECT_ENTRY} WHERE id = ?1");

        let entry = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Finds the customer's open (waiting/called/confirmed) entry for a day.
    pub async fn find_open_for_customer(
        &self,
        company_id: &str,
        queue_id: &str,
        movement_date: NaiveDate,
        customer_id: &str,
    ) -> DbResult<Option<QueueEntry>> {
        let sql = format!(
            "{SELECT_ENTRY}
            WHERE company_id = ?1 AND queue_id = ?2 AND movement_date = ?3
              AND customer_id = ?4
              AND state IN ('waiting', 'called', 'confirmed')"
        );

        let entry = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(company_id)
            .bind(queue_id)
            .bind(movement_date)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Lists the waiting entries of one queue instance in insertion order.
    pub async fn list_waiting(
        &self,
        company_id: &str,
        queue_id: &str,
        movement_date: NaiveDate,
    ) -> DbResult<Vec<QueueEntry>> {
        let sql = format!(
            "{SELECT_ENTRY}
            WHERE company_id = ?1 AND queue_id = ?2 AND movement_date = ?3
              AND state = 'waiting'
            ORDER BY seq"
        );

        let entries = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(company_id)
            .bind(queue_id)
            .bind(movement_date)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Lists every entry of one queue instance, any state, in insertion order.
    pub async fn list_for_queue_day(
        &self,
        company_id: &str,
        queue_id: &str,
        movement_date: NaiveDate,
    ) -> DbResult<Vec<QueueEntry>> {
        let sql = format!(
            "{SELECT_ENTRY}
            WHERE company_id = ?1 AND queue_id = ?2 AND movement_date = ?3
            ORDER BY seq"
        );

        let entries = sqlx::query_as::<_, QueueEntry>(&sql)
            .bind(company_id)
            .bind(queue_id)
            .bind(movement_date)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Lists every `called` entry across all queues (timer recovery).
    pub async fn list_called(&self) -> DbResult<Vec<QueueEntry>> {
        let sql = format!("{SELECT_ENTRY} WHERE state = 'called' ORDER BY seq");

        let entries = sqlx::query_as::<_, QueueEntry>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Lists every `called` entry with its queue's *current* tolerance.
    ///
    /// Deadline comparison happens in the caller; timestamps are stored as
    /// RFC 3339 text and are not compared in SQL.
    pub async fn list_called_with_tolerance(&self) -> DbResult<Vec<CalledEntry>> {
        let entries = sqlx::query_as::<_, CalledEntry>(
            r#"
            SELECT
                e.seq,
                e.id,
                e.company_id,
                e.queue_id,
                e.movement_date,
                e.customer_id,
                e.display_name,
                e.phone,
                e.email,
                e.preferred_channel,
                e.party_size,
                e.state,
                e.entered_at,
                e.called_at,
                e.confirmed_at,
                e.attended_at,
                e.left_at,
                e.call_tolerance_minutes,
                c.tolerance_minutes AS current_tolerance_minutes
            FROM queue_entries e
            JOIN queue_configurations c
              ON c.company_id = e.company_id AND c.queue_id = e.queue_id
            WHERE e.state = 'called'
            ORDER BY e.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Moves an entry from `expected` to `write.to` if, and only if, it is
    /// still in `expected`.
    ///
    /// ## Returns
    /// * `Ok(true)` - this write won
    /// * `Ok(false)` - the row was no longer in `expected` (or doesn't exist)
    pub async fn conditional_update(
        &self,
        id: &str,
        expected: EntryState,
        write: &StateWrite,
    ) -> DbResult<bool> {
        debug!(
            entry_id = %id,
            from = %expected,
            to = %write.to,
            "Conditional state update"
        );

        let result = sqlx::query(
            r#"
            UPDATE queue_entries SET
                state = ?1,
                called_at    = CASE WHEN ?2 = 'called_at'    THEN ?3 ELSE called_at    END,
                confirmed_at = CASE WHEN ?2 = 'confirmed_at' THEN ?3 ELSE confirmed_at END,
                attended_at  = CASE WHEN ?2 = 'attended_at'  THEN ?3 ELSE attended_at  END,
                left_at      = CASE WHEN ?2 = 'left_at'      THEN ?3 ELSE left_at      END,
                call_tolerance_minutes = COALESCE(?4, call_tolerance_minutes)
            WHERE id = ?5 AND state = ?6
            "#,
        )
        .bind(write.to)
        .bind(write.stamp.map(|field| field.column()))
        .bind(write.at)
        .bind(write.call_tolerance_minutes)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Generates a new entry ID.
pub fn generate_entry_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
