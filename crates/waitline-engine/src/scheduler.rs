//! # Timeout Scheduler
//!
//! Enforces the confirmation tolerance of called entries.
//!
//! ## Dual Mechanism
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Timeout Scheduler                                  │
//! │                                                                         │
//! │  call(E) ──▶ arm(E, tolerance)                                         │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌──────────────────────────────┐                                      │
//! │  │ timers: DashMap<entry, Armed>│  confirm/attend ──▶ cancel(E)        │
//! │  └──────────────┬───────────────┘                                      │
//! │                 │ sleep(tolerance) elapsed                              │
//! │                 ▼                                                       │
//! │            fired_tx ──────────┐                                         │
//! │                               ▼                                         │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │                    Scheduler worker                           │     │
//! │  │  select! {                                                    │     │
//! │  │    fired_rx.recv()  → handler.expire_entry(E)                 │     │
//! │  │    interval.tick()  → handler.sweep_overdue()   (every 60 s)  │     │
//! │  │    shutdown_rx      → break                                   │     │
//! │  │  }                                                            │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │                                                                         │
//! │  Both paths end in the same conditional CALLED → NO_SHOW update, so    │
//! │  whichever runs first wins and the other is a no-op.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timers live in memory only. The sweep re-derives overdue entries from
//! persisted timestamps, so a restart between call and expiry still ends in
//! `no_show`, at most one sweep interval late.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};

/// Capacity of the fired-timer channel.
const FIRED_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Expiry Handler
// =============================================================================

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Called entries inspected.
    pub examined: usize,
    /// Entries this run moved to `no_show`.
    pub expired: usize,
    /// Overdue entries another path settled first.
    pub superseded: usize,
}

/// What the scheduler calls back into when time runs out.
#[async_trait]
pub trait ExpiryHandler: Send + Sync + 'static {
    /// A per-entry timer fired.
    async fn expire_entry(&self, entry_id: &str) -> EngineResult<()>;

    /// A sweep tick is due.
    async fn sweep_overdue(&self) -> EngineResult<SweepReport>;
}

// =============================================================================
// Timeout Scheduler
// =============================================================================

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    timers: DashMap<String, ArmedTimer>,
    next_generation: AtomicU64,
    fired_tx: mpsc::Sender<String>,
    fired_rx: Mutex<Option<mpsc::Receiver<String>>>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    sweep_interval: Duration,
}

/// Process-owned timer registry plus the sweep task.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct TimeoutScheduler {
    inner: Arc<SchedulerInner>,
}

impl TimeoutScheduler {
    /// Creates a stopped scheduler. Timers may be armed before [`start`]
    /// is called; their expiries queue up until the worker runs.
    ///
    /// [`start`]: TimeoutScheduler::start
    pub fn new(sweep_interval: Duration) -> Self {
        let (fired_tx, fired_rx) = mpsc::channel(FIRED_CHANNEL_CAPACITY);

        TimeoutScheduler {
            inner: Arc::new(SchedulerInner {
                timers: DashMap::new(),
                next_generation: AtomicU64::new(1),
                fired_tx,
                fired_rx: Mutex::new(Some(fired_rx)),
                shutdown_tx: Mutex::new(None),
                worker: Mutex::new(None),
                sweep_interval,
            }),
        }
    }

    /// Returns the configured sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        self.inner.sweep_interval
    }

    /// Arms (or re-arms) the timer for `entry_id`.
    ///
    /// An existing timer for the same entry is aborted and replaced.
    pub fn arm(&self, entry_id: &str, delay: Duration) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        // The shard lock is held while spawning so a zero-delay timer cannot
        // try to deregister itself before it is registered.
        match self.inner.timers.entry(entry_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let handle = self.spawn_timer(entry_id, generation, delay);
                let previous = occupied.insert(ArmedTimer { generation, handle });
                previous.handle.abort();
                debug!(entry_id = %entry_id, ?delay, "Timer re-armed");
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn_timer(entry_id, generation, delay);
                vacant.insert(ArmedTimer { generation, handle });
                debug!(entry_id = %entry_id, ?delay, "Timer armed");
            }
        }
    }

    fn spawn_timer(&self, entry_id: &str, generation: u64, delay: Duration) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let entry_id = entry_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A newer arm or a cancel owns the slot now.
            let removed = inner
                .timers
                .remove_if(&entry_id, |_, timer| timer.generation == generation);
            if removed.is_none() {
                return;
            }

            debug!(entry_id = %entry_id, "Timer fired");
            if inner.fired_tx.send(entry_id.clone()).await.is_err() {
                warn!(entry_id = %entry_id, "Scheduler worker gone, expiry dropped");
            }
        })
    }

    /// Cancels the timer for `entry_id`. Returns true if one was armed.
    pub fn cancel(&self, entry_id: &str) -> bool {
        match self.inner.timers.remove(entry_id) {
            Some((_, timer)) => {
                timer.handle.abort();
                debug!(entry_id = %entry_id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every armed timer. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<String> = self
            .inner
            .timers
            .iter()
            .map(|timer| timer.key().clone())
            .collect();

        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Number of timers currently armed.
    pub fn armed_count(&self) -> usize {
        self.inner.timers.len()
    }

    /// Returns true if a timer is armed for `entry_id`.
    pub fn is_armed(&self, entry_id: &str) -> bool {
        self.inner.timers.contains_key(entry_id)
    }

    /// Returns true while the worker is running.
    pub fn is_running(&self) -> bool {
        lock(&self.inner.shutdown_tx).is_some()
    }

    /// Spawns the worker that drains fired timers and runs the sweep.
    ///
    /// The first sweep runs immediately, which also settles entries whose
    /// deadline passed while the process was down.
    pub fn start(&self, handler: Arc<dyn ExpiryHandler>) -> EngineResult<()> {
        let mut fired_rx = lock(&self.inner.fired_rx)
            .take()
            .ok_or_else(|| EngineError::Scheduler("scheduler already started".into()))?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let sweep_interval = self.inner.sweep_interval;

        let worker = tokio::spawn(async move {
            info!(?sweep_interval, "Timeout scheduler starting");

            let mut interval = tokio::time::interval(sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    Some(entry_id) = fired_rx.recv() => {
                        if let Err(e) = handler.expire_entry(&entry_id).await {
                            error!(?e, entry_id = %entry_id, "Failed to expire entry");
                        }
                    }

                    _ = interval.tick() => {
                        match handler.sweep_overdue().await {
                            Ok(report) if report.expired > 0 || report.superseded > 0 => {
                                info!(
                                    examined = report.examined,
                                    expired = report.expired,
                                    superseded = report.superseded,
                                    "Sweep complete"
                                );
                            }
                            Ok(report) => debug!(examined = report.examined, "Sweep complete"),
                            Err(e) => error!(?e, "Sweep failed, retrying next tick"),
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        info!("Timeout scheduler shutting down");
                        break;
                    }
                }
            }

            info!("Timeout scheduler stopped");
        });

        *lock(&self.inner.shutdown_tx) = Some(shutdown_tx);
        *lock(&self.inner.worker) = Some(worker);

        Ok(())
    }

    /// Stops the worker and cancels every armed timer.
    ///
    /// Waits for an in-flight expiry or sweep to finish.
    pub async fn shutdown(&self) -> EngineResult<()> {
        let cancelled = self.cancel_all();
        info!(cancelled, "Cancelled armed timers");

        let shutdown_tx = lock(&self.inner.shutdown_tx).take();
        let worker = lock(&self.inner.worker).take();

        if let Some(tx) = shutdown_tx {
            tx.send(())
                .await
                .map_err(|_| EngineError::ChannelError("Scheduler shutdown channel closed".into()))?;
        }

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(?e, "Scheduler worker panicked");
            }
        }

        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Unit Tests
// =============================================================================
