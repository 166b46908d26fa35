//! # Queue Service
//!
//! The operations staff, customers and background tasks invoke on entries.
//!
//! ## Transition Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Transition                                     │
//! │                                                                         │
//! │  confirm(E) / call(E) / expire(E) / ...                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. READ      entries().get_by_id(E)          → state S                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. DECIDE    apply_transition(S, event)      → Transition / Invalid   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. WRITE     conditional_update(E, S, write) → won? / superseded      │
//! │       │                                                                 │
//! │       ▼  (only if won)                                                  │
//! │  4. EFFECTS   ArmTimer | CancelTimer          → TimeoutScheduler       │
//! │               Notify   (spawned)              → NotificationDispatcher │
//! │               Publish                         → EventBus               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rejections vs No-ops
//! - User operations on an entry in the wrong state fail with
//!   `InvalidTransition` (a conflict).
//! - The expiry path (timer or sweep) treats the same situation as a no-op:
//!   somebody else already settled the entry.
//! - Losing the conditional update is `TransitionOutcome::Superseded` for
//!   every caller.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, EngineResult};
use crate::events::EventBus;
use crate::notify::{Notification, NotificationDispatcher};
use crate::scheduler::{ExpiryHandler, SweepReport, TimeoutScheduler};
use waitline_core::position::{estimated_wait_minutes, position_of};
use waitline_core::validation::{check_join, validate_contact_for, validate_customer, validate_identifier};
use waitline_core::{
    apply_transition, CoreError, EntryEvent, EntryStatus, JoinRequest, JoinTicket,
    QueueConfiguration, QueueEntry, QueueEvent, SideEffect, TimestampField, Transition,
};
use waitline_db::{Database, NewEntry, StateWrite};

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a transition attempt that was not rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// This call won; the entry as it is now stored.
    Applied(QueueEntry),
    /// Another path changed the entry first; nothing was written.
    Superseded { entry_id: String },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    /// The updated entry, if this call won.
    pub fn entry(&self) -> Option<&QueueEntry> {
        match self {
            TransitionOutcome::Applied(entry) => Some(entry),
            TransitionOutcome::Superseded { .. } => None,
        }
    }
}

/// Who asked for the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Staff or customer request: invalid transitions are rejected.
    Request,
    /// Timer or sweep: invalid transitions are ignored.
    Expiry,
}

// =============================================================================
// Queue Service
// =============================================================================

/// Queue-entry lifecycle engine.
///
/// ## Usage
/// ```rust,ignore
/// let service = Arc::new(QueueService::new(db, scheduler, dispatcher, events));
/// service.start().await?;               // recover timers, spawn worker
/// let ticket = service.join(request).await?;
/// service.call(&ticket.entry_id).await?;
/// ```
pub struct QueueService {
    db: Database,
    scheduler: TimeoutScheduler,
    dispatcher: Arc<NotificationDispatcher>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl QueueService {
    /// Creates a service on the system clock.
    pub fn new(
        db: Database,
        scheduler: TimeoutScheduler,
        dispatcher: NotificationDispatcher,
        events: EventBus,
    ) -> Self {
        Self::with_clock(db, scheduler, dispatcher, events, Arc::new(SystemClock))
    }

    /// Creates a service on an arbitrary clock.
    pub fn with_clock(
        db: Database,
        scheduler: TimeoutScheduler,
        dispatcher: NotificationDispatcher,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        QueueService {
            db,
            scheduler,
            dispatcher: Arc::new(dispatcher),
            events,
            clock,
        }
    }

    /// Returns the timeout scheduler.
    pub fn scheduler(&self) -> &TimeoutScheduler {
        &self.scheduler
    }

    /// Returns the database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Re-arms timers for called entries, then starts the scheduler worker.
    pub async fn start(self: &Arc<Self>, recover_timers: bool) -> EngineResult<()> {
        if recover_timers {
            let armed = self.recover_timers().await?;
            info!(armed, "Recovered per-entry timers");
        }

        self.scheduler.start(self.clone())?;
        Ok(())
    }

    /// Stops the scheduler and cancels all timers.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.scheduler.shutdown().await
    }

    /// Arms a timer for every `called` entry from its call-time snapshot.
    ///
    /// Entries already past their deadline are left to the first sweep.
    pub async fn recover_timers(&self) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut armed = 0;

        for entry in self.db.entries().list_called().await? {
            let Some(deadline) = entry.snapshot_deadline() else {
                warn!(
                    entry_id = %entry.id,
                    tolerance = ?entry.call_tolerance_minutes,
                    "Called entry has no usable tolerance snapshot; leaving it to the sweep"
                );
                continue;
            };

            if let Ok(remaining) = (deadline - now).to_std() {
                if !remaining.is_zero() {
                    self.scheduler.arm(&entry.id, remaining);
                    armed += 1;
                }
            }
        }

        Ok(armed)
    }

    // =========================================================================
    // Join
    // =========================================================================

    /// Adds a customer to today's line.
    ///
    /// ## Errors
    /// * `QueueNotFound` - no configuration for the queue
    /// * `QueueInactive`, `OutOfWindow`, `PartySizeOutOfRange` - join guards
    /// * `DuplicateToday` - the customer already has an open entry today
    /// * validation errors for the profile
    pub async fn join(&self, request: JoinRequest) -> EngineResult<JoinTicket> {
        validate_identifier("company_id", &request.company_id)?;
        validate_identifier("queue_id", &request.queue_id)?;
        validate_customer(&request.customer)?;

        let config = self.queue_config(&request.company_id, &request.queue_id).await?;

        let now = self.clock.now();
        let today = now.date_naive();
        check_join(&config, today, request.party_size)?;

        let channel = request
            .customer
            .preferred_channel
            .unwrap_or(config.default_channel);
        validate_contact_for(
            channel,
            request.customer.phone.as_deref(),
            request.customer.email.as_deref(),
        )?;

        let duplicate = || {
            EngineError::Core(CoreError::DuplicateToday {
                customer_id: request.customer.customer_id.clone(),
                queue_id: request.queue_id.clone(),
                date: today,
            })
        };

        let entries = self.db.entries();
        if entries
            .find_open_for_customer(
                &request.company_id,
                &request.queue_id,
                today,
                &request.customer.customer_id,
            )
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let new_entry = NewEntry {
            company_id: request.company_id.clone(),
            queue_id: request.queue_id.clone(),
            movement_date: today,
            customer_id: request.customer.customer_id.clone(),
            display_name: request.customer.display_name.clone(),
            phone: request.customer.phone.clone(),
            email: request.customer.email.clone(),
            preferred_channel: request.customer.preferred_channel,
            party_size: request.party_size,
            entered_at: now,
        };

        // The partial unique index settles two concurrent joins.
        let entry = match entries.insert(&new_entry).await {
            Ok(entry) => entry,
            Err(e) if e.is_unique_violation() => return Err(duplicate()),
            Err(e) => return Err(e.into()),
        };

        let waiting = entries
            .list_waiting(&entry.company_id, &entry.queue_id, today)
            .await?;
        let position = position_of(&entry, &waiting);

        info!(
            entry_id = %entry.id,
            company_id = %entry.company_id,
            queue_id = %entry.queue_id,
            position,
            "Customer joined queue"
        );

        self.events.publish(QueueEvent::for_entry(&entry, now));

        Ok(JoinTicket {
            entry_id: entry.id,
            position,
        })
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Staff calls a waiting customer: arms the timer and notifies.
    pub async fn call(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Call, Origin::Request).await
    }

    /// Customer confirms presence: cancels the timer.
    pub async fn confirm(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Confirm, Origin::Request).await
    }

    /// Staff marks a called or confirmed customer as served.
    pub async fn mark_attended(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Attend, Origin::Request).await
    }

    /// Customer leaves before being called.
    pub async fn leave(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Leave, Origin::Request).await
    }

    /// Staff removes a customer before calling them.
    pub async fn remove(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Remove, Origin::Request).await
    }

    /// Marks a called entry as no-show. Anything else is a no-op.
    pub async fn expire(&self, entry_id: &str) -> EngineResult<TransitionOutcome> {
        self.transition(entry_id, EntryEvent::Expire, Origin::Expiry).await
    }

    async fn transition(
        &self,
        entry_id: &str,
        event: EntryEvent,
        origin: Origin,
    ) -> EngineResult<TransitionOutcome> {
        let entry = self
            .db
            .entries()
            .get_by_id(entry_id)
            .await?
            .ok_or_else(|| EngineError::EntryNotFound(entry_id.to_string()))?;

        let transition = match apply_transition(entry.state, event) {
            Ok(transition) => transition,
            Err(e) if origin == Origin::Expiry => {
                debug!(entry_id = %entry_id, state = %entry.state, "Expiry ignored: {}", e);
                return Ok(TransitionOutcome::Superseded {
                    entry_id: entry_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // The call snapshots the tolerance in force right now.
        let config = if transition.has(SideEffect::ArmTimer) || transition.has(SideEffect::Notify) {
            Some(self.queue_config(&entry.company_id, &entry.queue_id).await?)
        } else {
            None
        };

        let now = self.clock.now();
        let write = StateWrite {
            to: transition.to,
            stamp: transition.timestamp(),
            at: now,
            call_tolerance_minutes: match (&config, event) {
                (Some(config), EntryEvent::Call) => Some(config.tolerance_minutes),
                _ => None,
            },
        };

        let won = self
            .db
            .entries()
            .conditional_update(entry_id, transition.from, &write)
            .await?;

        if !won {
            info!(
                entry_id = %entry_id,
                event = %event,
                expected = %transition.from,
                "Transition superseded by a concurrent change"
            );
            return Ok(TransitionOutcome::Superseded {
                entry_id: entry_id.to_string(),
            });
        }

        let updated = apply_write(entry, &write);
        info!(
            entry_id = %entry_id,
            from = %transition.from,
            to = %transition.to,
            "Entry transitioned"
        );

        self.run_effects(&transition, &updated, config, now);

        Ok(TransitionOutcome::Applied(updated))
    }

    fn run_effects(
        &self,
        transition: &Transition,
        entry: &QueueEntry,
        config: Option<QueueConfiguration>,
        now: DateTime<Utc>,
    ) {
        for effect in &transition.effects {
            match effect {
                SideEffect::SetTimestamp(_) => {}
                SideEffect::ArmTimer => {
                    // Effects of concurrent transitions can interleave, so a
                    // confirm's CancelTimer may land before this arm. The stray
                    // timer then only produces a Superseded expiry.
                    let minutes = entry.call_tolerance_minutes.unwrap_or_default();
                    let secs = u64::try_from(minutes).unwrap_or(0).saturating_mul(60);
                    self.scheduler.arm(&entry.id, std::time::Duration::from_secs(secs));
                }
                SideEffect::CancelTimer => {
                    self.scheduler.cancel(&entry.id);
                }
                SideEffect::Notify => {
                    if let Some(config) = config.clone() {
                        self.spawn_notification(entry.clone(), config);
                    }
                }
                SideEffect::Publish => {
                    self.events.publish(QueueEvent::for_entry(entry, now));
                }
            }
        }
    }

    /// Sends the call notification without holding up the transition.
    fn spawn_notification(&self, entry: QueueEntry, config: QueueConfiguration) {
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let notification = match Notification::for_call(&entry, &config) {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "Cannot build call notification");
                    return;
                }
            };

            let channel = notification.kind();
            match dispatcher.dispatch(&notification).await {
                Ok(()) => info!(entry_id = %entry.id, channel = %channel, "Call notification sent"),
                Err(e) => warn!(
                    entry_id = %entry.id,
                    channel = %channel,
                    error = %e,
                    "Call notification failed; entry stays called"
                ),
            }
        });
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    /// Expires every called entry whose deadline has passed.
    ///
    /// The deadline here uses the queue's *current* tolerance, while the
    /// per-entry timer uses the call-time snapshot. A divergence is logged.
    pub async fn sweep_overdue(&self) -> EngineResult<SweepReport> {
        let now = self.clock.now();
        let called = self.db.entries().list_called_with_tolerance().await?;

        let mut report = SweepReport {
            examined: called.len(),
            ..SweepReport::default()
        };

        for candidate in called {
            let entry = &candidate.entry;

            if let Some(snapshot) = entry.call_tolerance_minutes {
                if snapshot != candidate.current_tolerance_minutes {
                    warn!(
                        entry_id = %entry.id,
                        call_time_tolerance = snapshot,
                        current_tolerance = candidate.current_tolerance_minutes,
                        "Tolerance changed after call; sweep and timer deadlines disagree"
                    );
                }
            }

            let Some(deadline) = entry.deadline_with(candidate.current_tolerance_minutes) else {
                warn!(
                    entry_id = %entry.id,
                    tolerance = candidate.current_tolerance_minutes,
                    "Deadline not representable; skipping entry"
                );
                continue;
            };
            if deadline >= now {
                continue;
            }

            match self.expire(&entry.id).await {
                Ok(TransitionOutcome::Applied(_)) => report.expired += 1,
                Ok(TransitionOutcome::Superseded { .. }) => report.superseded += 1,
                Err(e) => warn!(entry_id = %entry.id, error = %e, "Sweep could not expire entry"),
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Pull-based status of one entry.
    pub async fn status(&self, entry_id: &str) -> EngineResult<EntryStatus> {
        let entry = self
            .db
            .entries()
            .get_by_id(entry_id)
            .await?
            .ok_or_else(|| EngineError::EntryNotFound(entry_id.to_string()))?;

        let config = self.queue_config(&entry.company_id, &entry.queue_id).await?;
        let waiting = self
            .db
            .entries()
            .list_waiting(&entry.company_id, &entry.queue_id, entry.movement_date)
            .await?;

        let position = position_of(&entry, &waiting);

        Ok(EntryStatus {
            entry_id: entry.id.clone(),
            state: entry.state,
            position,
            estimated_wait_minutes: estimated_wait_minutes(position, config.average_service_minutes),
            is_called: entry.is_called(),
        })
    }

    /// Every entry of one queue instance, for dashboard reconnects.
    pub async fn queue_snapshot(
        &self,
        company_id: &str,
        queue_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Vec<QueueEntry>> {
        self.queue_config(company_id, queue_id).await?;
        Ok(self
            .db
            .entries()
            .list_for_queue_day(company_id, queue_id, date)
            .await?)
    }

    /// Today's date as the service sees it.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Subscribes to push events for `company_id`.
    pub fn subscribe(&self, company_id: &str) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe(company_id)
    }

    async fn queue_config(&self, company_id: &str, queue_id: &str) -> EngineResult<QueueConfiguration> {
        self.db
            .queues()
            .get(company_id, queue_id)
            .await?
            .ok_or_else(|| EngineError::QueueNotFound {
                company_id: company_id.to_string(),
                queue_id: queue_id.to_string(),
            })
    }
}

/// Mirrors a successful conditional update onto the in-memory entry.
fn apply_write(mut entry: QueueEntry, write: &StateWrite) -> QueueEntry {
    entry.state = write.to;
    match write.stamp {
        Some(TimestampField::CalledAt) => entry.called_at = Some(write.at),
        Some(TimestampField::ConfirmedAt) => entry.confirmed_at = Some(write.at),
        Some(TimestampField::AttendedAt) => entry.attended_at = Some(write.at),
        Some(TimestampField::LeftAt) => entry.left_at = Some(write.at),
        None => {}
    }
    if write.call_tolerance_minutes.is_some() {
        entry.call_tolerance_minutes = write.call_tolerance_minutes;
    }
    entry
}

// =============================================================================
// Scheduler Callbacks
// =============================================================================

#[async_trait]
impl ExpiryHandler for QueueService {
    async fn expire_entry(&self, entry_id: &str) -> EngineResult<()> {
        match self.expire(entry_id).await? {
            TransitionOutcome::Applied(_) => info!(entry_id = %entry_id, "Timer expired entry"),
            TransitionOutcome::Superseded { .. } => {
                debug!(entry_id = %entry_id, "Timer fired on an already settled entry")
            }
        }
        Ok(())
    }

    async fn sweep_overdue(&self) -> EngineResult<SweepReport> {
        QueueService::sweep_overdue(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::{NotificationChannel, NotifyError};
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;
    use tokio::sync::mpsc;
    use waitline_core::{ChannelKind, CustomerProfile, EntryState};
    use waitline_db::DbConfig;

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Records every notification it is handed.
    struct RecordingChannel {
        kind: ChannelKind,
        sent: mpsc::UnboundedSender<Notification>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            let _ = self.sent.send(notification.clone());
            Ok(())
        }
    }

    /// Always fails, like a gateway that is down.
    struct FailingChannel;

    #[async_trait]
    impl NotificationChannel for FailingChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Sms
        }

        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected {
                channel: ChannelKind::Sms,
                status: 503,
                body: "gateway down".into(),
            })
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, hour, minute, second).unwrap()
    }

    fn queue(company_id: &str, tolerance_minutes: i64) -> QueueConfiguration {
        QueueConfiguration {
            company_id: company_id.into(),
            queue_id: "front-desk".into(),
            name: "Front desk".into(),
            tolerance_minutes,
            min_party_size: 1,
            max_party_size: 6,
            active_from: None,
            active_until: None,
            is_active: true,
            default_channel: ChannelKind::Sms,
            average_service_minutes: 5,
            updated_at: at(8, 0, 0),
        }
    }

    fn request(company_id: &str, customer_id: &str) -> JoinRequest {
        JoinRequest {
            company_id: company_id.into(),
            queue_id: "front-desk".into(),
            customer: CustomerProfile {
                customer_id: customer_id.into(),
                display_name: format!("Customer {customer_id}"),
                phone: Some("+5511999990000".into()),
                email: None,
                preferred_channel: None,
            },
            party_size: 2,
        }
    }

    struct Harness {
        service: Arc<QueueService>,
        clock: Arc<ManualClock>,
    }

    async fn harness_with(dispatcher: NotificationDispatcher, sweep_interval: StdDuration) -> Harness {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.queues().upsert(&queue("acme", 10)).await.unwrap();
        db.queues().upsert(&queue("blue", 10)).await.unwrap();

        let clock = Arc::new(ManualClock::new(at(10, 0, 0)));
        let service = Arc::new(QueueService::with_clock(
            db,
            TimeoutScheduler::new(sweep_interval),
            dispatcher,
            EventBus::new(16),
            clock.clone(),
        ));

        Harness { service, clock }
    }

    async fn harness() -> Harness {
        harness_with(NotificationDispatcher::new(), StdDuration::from_secs(60)).await
    }

    async fn state_of(service: &QueueService, entry_id: &str) -> EntryState {
        service.status(entry_id).await.unwrap().state
    }

    // =========================================================================
    // Join
    // =========================================================================

    #[tokio::test]
    async fn test_join_positions_follow_arrival() {
        let h = harness().await;

        let first = h.service.join(request("acme", "c-1")).await.unwrap();
        h.clock.advance(chrono::Duration::seconds(30));
        let second = h.service.join(request("acme", "c-2")).await.unwrap();

        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let status = h.service.status(&second.entry_id).await.unwrap();
        assert_eq!(status.position, 1);
        assert_eq!(status.estimated_wait_minutes, 5);
        assert!(!status.is_called);

        // The first customer is called: the second moves up.
        h.service.call(&first.entry_id).await.unwrap();
        assert_eq!(h.service.status(&second.entry_id).await.unwrap().position, 0);
    }

    #[tokio::test]
    async fn test_join_same_instant_uses_insertion_order() {
        let h = harness().await;

        let first = h.service.join(request("acme", "c-1")).await.unwrap();
        let second = h.service.join(request("acme", "c-2")).await.unwrap();

        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
    }

    #[tokio::test]
    async fn test_duplicate_join_same_day_is_rejected() {
        let h = harness().await;

        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        let err = h.service.join(request("acme", "c-1")).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::DuplicateToday { .. })));
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);

        // Once the first entry is terminal the customer may queue again.
        h.service.leave(&ticket.entry_id).await.unwrap();
        assert!(h.service.join(request("acme", "c-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_join_guards() {
        let h = harness().await;

        let mut unknown = request("acme", "c-1");
        unknown.queue_id = "terrace".into();
        assert!(matches!(
            h.service.join(unknown).await.unwrap_err(),
            EngineError::QueueNotFound { .. }
        ));

        let mut too_many = request("acme", "c-1");
        too_many.party_size = 7;
        assert!(matches!(
            h.service.join(too_many).await.unwrap_err(),
            EngineError::Core(CoreError::PartySizeOutOfRange { .. })
        ));

        let mut no_phone = request("acme", "c-1");
        no_phone.customer.phone = None;
        assert_eq!(
            h.service.join(no_phone).await.unwrap_err().kind(),
            crate::error::ErrorKind::Validation
        );

        let mut closed = queue("acme", 10);
        closed.is_active = false;
        h.service.database().queues().upsert(&closed).await.unwrap();
        assert!(matches!(
            h.service.join(request("acme", "c-1")).await.unwrap_err(),
            EngineError::Core(CoreError::QueueInactive { .. })
        ));
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    #[tokio::test]
    async fn test_call_then_confirm_manages_timer() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();

        let called = h.service.call(&ticket.entry_id).await.unwrap();
        let entry = called.entry().unwrap();
        assert_eq!(entry.state, EntryState::Called);
        assert_eq!(entry.called_at, Some(at(10, 0, 0)));
        assert_eq!(entry.call_tolerance_minutes, Some(10));
        assert!(h.service.scheduler().is_armed(&ticket.entry_id));

        h.clock.advance(chrono::Duration::minutes(2));
        let confirmed = h.service.confirm(&ticket.entry_id).await.unwrap();
        assert_eq!(confirmed.entry().unwrap().confirmed_at, Some(at(10, 2, 0)));
        assert!(!h.service.scheduler().is_armed(&ticket.entry_id));

        let attended = h.service.mark_attended(&ticket.entry_id).await.unwrap();
        assert_eq!(attended.entry().unwrap().state, EntryState::Attended);
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_conflicts() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();

        let err = h.service.confirm(&ticket.entry_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition {
                from: EntryState::Waiting,
                event: EntryEvent::Confirm
            })
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);

        h.service.call(&ticket.entry_id).await.unwrap();
        assert!(h.service.leave(&ticket.entry_id).await.is_err());
        assert!(h.service.remove(&ticket.entry_id).await.is_err());
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::Called);
    }

    #[tokio::test]
    async fn test_unknown_entry_is_not_found() {
        let h = harness().await;
        let err = h.service.call("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::EntryNotFound(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_terminal_states_absorb_everything() {
        let h = harness().await;

        let removed = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.remove(&removed.entry_id).await.unwrap();

        for attempt in [
            h.service.call(&removed.entry_id).await,
            h.service.confirm(&removed.entry_id).await,
            h.service.mark_attended(&removed.entry_id).await,
            h.service.leave(&removed.entry_id).await,
            h.service.remove(&removed.entry_id).await,
        ] {
            assert!(attempt.is_err());
        }

        // Expiry on a terminal entry is a silent no-op.
        let outcome = h.service.expire(&removed.entry_id).await.unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(state_of(&h.service, &removed.entry_id).await, EntryState::Removed);
    }

    // =========================================================================
    // Sweep & Expiry
    // =========================================================================

    #[tokio::test]
    async fn test_sweep_expires_only_past_deadline() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        h.clock.set(at(10, 9, 59));
        let report = h.service.sweep_overdue().await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::Called);

        h.clock.set(at(10, 10, 1));
        let report = h.service.sweep_overdue().await.unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::NoShow);

        // Already settled: the next sweep finds nothing.
        let report = h.service.sweep_overdue().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_uses_current_tolerance() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        h.service
            .database()
            .queues()
            .upsert(&queue("acme", 30))
            .await
            .unwrap();

        h.clock.set(at(10, 10, 1));
        assert_eq!(h.service.sweep_overdue().await.unwrap().expired, 0);

        h.clock.set(at(10, 30, 1));
        assert_eq!(h.service.sweep_overdue().await.unwrap().expired, 1);
    }

    #[tokio::test]
    async fn test_confirm_before_deadline_survives_sweep() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        h.clock.set(at(10, 5, 0));
        h.service.confirm(&ticket.entry_id).await.unwrap();

        h.clock.set(at(10, 20, 0));
        let report = h.service.sweep_overdue().await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::Confirmed);
    }

    #[tokio::test]
    async fn test_confirm_racing_expiry_has_one_winner() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        let (confirm, expire) = tokio::join!(
            h.service.confirm(&ticket.entry_id),
            h.service.expire(&ticket.entry_id)
        );

        let confirm_won = matches!(confirm, Ok(TransitionOutcome::Applied(_)));
        let expire_won = matches!(expire, Ok(TransitionOutcome::Applied(_)));
        assert!(confirm_won ^ expire_won);

        let expected = if confirm_won {
            EntryState::Confirmed
        } else {
            EntryState::NoShow
        };
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, expected);
    }

    #[tokio::test]
    async fn test_recover_timers_skips_overdue_entries() {
        let h = harness().await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();
        h.service.scheduler().cancel_all();

        h.clock.set(at(10, 5, 0));
        assert_eq!(h.service.recover_timers().await.unwrap(), 1);
        assert!(h.service.scheduler().is_armed(&ticket.entry_id));

        h.service.scheduler().cancel_all();
        h.clock.set(at(10, 11, 0));
        assert_eq!(h.service.recover_timers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_started_worker_sweeps_overdue_entries() {
        let h = harness_with(NotificationDispatcher::new(), StdDuration::from_millis(20)).await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        h.clock.set(at(10, 15, 0));
        h.service.start(false).await.unwrap();

        let mut state = EntryState::Called;
        for _ in 0..100 {
            state = state_of(&h.service, &ticket.entry_id).await;
            if state == EntryState::NoShow {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(state, EntryState::NoShow);

        h.service.shutdown().await.unwrap();
        assert!(!h.service.scheduler().is_running());
    }

    #[tokio::test]
    async fn test_fired_timer_expires_entry_before_sweep() {
        let h = harness_with(NotificationDispatcher::new(), StdDuration::from_secs(3600)).await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();
        assert!(h.service.scheduler().is_armed(&ticket.entry_id));

        // Re-arming replaces the ten-minute timer; the clock stays before the
        // deadline so only the timer can expire the entry.
        h.service
            .scheduler()
            .arm(&ticket.entry_id, StdDuration::from_millis(20));
        h.service.start(false).await.unwrap();

        let mut state = EntryState::Called;
        for _ in 0..100 {
            state = state_of(&h.service, &ticket.entry_id).await;
            if state == EntryState::NoShow {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(state, EntryState::NoShow);
        assert!(!h.service.scheduler().is_armed(&ticket.entry_id));

        h.clock.set(at(10, 20, 0));
        let report = h.service.sweep_overdue().await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(report.expired, 0);

        h.service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unrepresentable_tolerance_does_not_stop_the_engine() {
        let h = harness().await;
        let err = h
            .service
            .database()
            .queues()
            .upsert(&queue("acme", 1_000_000_000_000))
            .await
            .unwrap_err();
        assert_eq!(
            EngineError::from(err).kind(),
            crate::error::ErrorKind::Validation
        );

        // A row written behind the repository's back.
        sqlx::query("UPDATE queue_configurations SET tolerance_minutes = ?1 WHERE company_id = 'acme'")
            .bind(1_000_000_000_000_i64)
            .execute(h.service.database().pool())
            .await
            .unwrap();

        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        h.clock.set(at(23, 59, 0));
        let service = h.service.clone();
        let report = tokio::spawn(async move { service.sweep_overdue().await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::Called);

        h.service.scheduler().cancel_all();
        assert_eq!(h.service.recover_timers().await.unwrap(), 0);
    }

    // =========================================================================
    // Notifications & Events
    // =========================================================================

    #[tokio::test]
    async fn test_call_sends_notification_on_preferred_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(Arc::new(RecordingChannel {
            kind: ChannelKind::Sms,
            sent: tx,
        }));

        let h = harness_with(dispatcher, StdDuration::from_secs(60)).await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        let sent = tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match sent {
            Notification::Sms { to_phone, body } => {
                assert_eq!(to_phone, "+5511999990000");
                assert!(body.contains("Customer c-1"));
                assert!(body.contains("10 minutes"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_entry_called() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(Arc::new(FailingChannel));

        let h = harness_with(dispatcher, StdDuration::from_secs(60)).await;
        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();

        let outcome = h.service.call(&ticket.entry_id).await.unwrap();
        assert!(outcome.is_applied());

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(state_of(&h.service, &ticket.entry_id).await, EntryState::Called);
        assert!(h.service.scheduler().is_armed(&ticket.entry_id));
    }

    #[tokio::test]
    async fn test_events_reach_only_the_company_topic() {
        let h = harness().await;
        let mut acme = h.service.subscribe("acme");
        let mut blue = h.service.subscribe("blue");

        let ticket = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.call(&ticket.entry_id).await.unwrap();

        let joined = acme.recv().await.unwrap();
        assert_eq!(joined.entry_id, ticket.entry_id);
        assert_eq!(joined.new_state, EntryState::Waiting);
        assert_eq!(acme.recv().await.unwrap().new_state, EntryState::Called);

        assert!(blue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queue_snapshot_lists_the_day() {
        let h = harness().await;
        let first = h.service.join(request("acme", "c-1")).await.unwrap();
        h.service.join(request("acme", "c-2")).await.unwrap();
        h.service.remove(&first.entry_id).await.unwrap();

        let entries = h
            .service
            .queue_snapshot("acme", "front-desk", h.service.today())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].state, EntryState::Removed);

        assert!(h
            .service
            .queue_snapshot("acme", "terrace", h.service.today())
            .await
            .is_err());
    }

    #[test]
    fn test_apply_write_sets_stamp_and_snapshot() {
        let at = Utc::now();
        let entry = QueueEntry {
            id: "e-1".into(),
            seq: 1,
            company_id: "acme".into(),
            queue_id: "front-desk".into(),
            movement_date: at.date_naive(),
            customer_id: "c-1".into(),
            display_name: "Ada".into(),
            phone: None,
            email: None,
            preferred_channel: None,
            party_size: 1,
            state: EntryState::Waiting,
            entered_at: at,
            called_at: None,
            confirmed_at: None,
            attended_at: None,
            left_at: None,
            call_tolerance_minutes: None,
        };

        let updated = apply_write(
            entry,
            &StateWrite {
                to: EntryState::Called,
                stamp: Some(TimestampField::CalledAt),
                at,
                call_tolerance_minutes: Some(10),
            },
        );

        assert_eq!(updated.state, EntryState::Called);
        assert_eq!(updated.called_at, Some(at));
        assert_eq!(updated.call_tolerance_minutes, Some(10));
        assert!(updated.left_at.is_none());
    }
}
