//! License renewal scheduling for cached DRM content
//!
//! Each content item gets at most one live one-shot timer. The next renewal
//! time is persisted so a fresh process can either keep waiting for the
//! same deadline or catch up at once if the deadline passed while it was
//! not running.
//!
//! ```text
//!  schedule_or_resume(key)
//!    │
//!    ├─ no record / record <= now ──► renew, next = now + interval
//!    ├─ now < record < now + interval ──► next = record
//!    └─ record >= now + interval ──► next = now + interval
//!    │
//!    ├─ persist next
//!    └─ cancel old timer, arm timer(next) ──fire──► renew, persist, re-arm
//! ```

use crate::drm::{DrmConfig, LicenseRenewer};
use crate::store::RenewalStore;
use crate::types::RenewalConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances with the tokio clock from a fixed anchor
///
/// Under a paused tokio runtime this makes timestamps and timers move
/// together, which keeps simulations and tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall: DateTime<Utc>,
    instant: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn new(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            instant: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.instant.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

struct ArmedTimer {
    generation: u64,
    fire_at: DateTime<Utc>,
    interval: chrono::Duration,
    drm: DrmConfig,
    handle: JoinHandle<()>,
}

struct Inner {
    interval: chrono::Duration,
    store: Arc<dyn RenewalStore>,
    renewer: Arc<dyn LicenseRenewer>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    timers: Mutex<HashMap<String, ArmedTimer>>,
    generation: AtomicU64,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<String, ArmedTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, content_key: &str, at: DateTime<Utc>) {
        if let Err(e) = self.store.set(content_key, at) {
            warn!(content = content_key, error = %e, "Failed to persist renewal time");
        }
    }

    fn renew(&self, content_key: &str, drm: &DrmConfig) {
        debug!(content = content_key, provider = drm.provider(), "Renewing license");
        self.renewer.renew(content_key, drm);
    }

    fn schedule_or_resume(
        self: &Arc<Self>,
        content_key: &str,
        drm: &DrmConfig,
        interval: chrono::Duration,
    ) -> DateTime<Utc> {
        let now = self.clock.now();

        let next = match self.store.get(content_key) {
            None => {
                info!(content = content_key, "No renewal record, renewing now");
                self.renew(content_key, drm);
                next_after(now, interval)
            }
            Some(recorded) if recorded <= now => {
                info!(content = content_key, recorded = %recorded, "Renewal overdue, renewing now");
                self.renew(content_key, drm);
                next_after(now, interval)
            }
            Some(recorded) if recorded - now < interval => {
                debug!(content = content_key, recorded = %recorded, "Resuming recorded renewal time");
                recorded
            }
            Some(recorded) => {
                warn!(
                    content = content_key,
                    recorded = %recorded,
                    interval_secs = interval.num_seconds(),
                    "Recorded renewal is more than one interval ahead, rescheduling"
                );
                next_after(now, interval)
            }
        };

        self.persist(content_key, next);
        self.arm(content_key, drm, next, interval);

        info!(content = content_key, next_renewal_at = %next, "License renewal scheduled");
        next
    }

    fn arm(
        self: &Arc<Self>,
        content_key: &str,
        drm: &DrmConfig,
        fire_at: DateTime<Utc>,
        interval: chrono::Duration,
    ) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        let weak = Arc::downgrade(self);
        let key = content_key.to_string();

        // Hold the table while spawning so the task cannot look itself up
        // before it is registered.
        let mut timers = self.timers();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(&key, generation);
            }
        });

        let previous = timers.insert(
            content_key.to_string(),
            ArmedTimer {
                generation,
                fire_at,
                interval,
                drm: drm.clone(),
                handle,
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(content = content_key, replaced = previous.generation, "Cancelled previous timer");
        }
    }

    fn fire(self: &Arc<Self>, content_key: &str, generation: u64) {
        let (drm, interval) = match self.timers().get(content_key) {
            Some(timer) if timer.generation == generation => (timer.drm.clone(), timer.interval),
            _ => return,
        };

        info!(content = content_key, "Renewal timer fired");
        self.renew(content_key, &drm);

        // The renewer may have terminated this key; only a still-current
        // timer continues the cycle.
        {
            let mut timers = self.timers();
            let current = timers
                .get(content_key)
                .is_some_and(|timer| timer.generation == generation);
            if !current {
                debug!(content = content_key, "Renewal cycle stopped during renewal");
                return;
            }
            timers.remove(content_key);
        }

        let next = next_after(self.clock.now(), interval);
        self.persist(content_key, next);
        self.arm(content_key, &drm, next, interval);
        info!(content = content_key, next_renewal_at = %next, "License renewal rescheduled");
    }

    fn terminate(&self, content_key: &str) -> bool {
        match self.timers().remove(content_key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, timer) in self.timers().drain() {
            timer.handle.abort();
        }
    }
}

/// `now + interval`, saturating at the last representable instant
fn next_after(now: DateTime<Utc>, interval: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(interval).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Schedules periodic license renewal per content key
#[derive(Clone)]
pub struct RenewalScheduler {
    inner: Arc<Inner>,
}

impl RenewalScheduler {
    /// Create a scheduler on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(
        config: &RenewalConfig,
        store: Arc<dyn RenewalStore>,
        renewer: Arc<dyn LicenseRenewer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_runtime(config, store, renewer, clock, Handle::current())
    }

    /// Create a scheduler whose timers run on `runtime`
    pub fn with_runtime(
        config: &RenewalConfig,
        store: Arc<dyn RenewalStore>,
        renewer: Arc<dyn LicenseRenewer>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval: config.interval(),
                store,
                renewer,
                clock,
                runtime,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Renew now if needed, persist the next renewal time and arm its timer
    ///
    /// Returns the time the timer fires at.
    #[instrument(skip(self, drm), fields(provider = drm.provider()))]
    pub fn schedule_or_resume(&self, content_key: &str, drm: &DrmConfig) -> DateTime<Utc> {
        self.inner.schedule_or_resume(content_key, drm, self.inner.interval)
    }

    /// Like [`schedule_or_resume`](Self::schedule_or_resume) with an explicit
    /// interval, kept for every later cycle of this key
    #[instrument(skip(self, drm), fields(provider = drm.provider(), interval_secs = interval.num_seconds()))]
    pub fn schedule_or_resume_every(
        &self,
        content_key: &str,
        drm: &DrmConfig,
        interval: chrono::Duration,
    ) -> DateTime<Utc> {
        self.inner.schedule_or_resume(content_key, drm, interval)
    }

    /// Cancel the live timer for `content_key`, keeping its record
    ///
    /// Idempotent, and safe to call from inside [`LicenseRenewer::renew`].
    #[instrument(skip(self))]
    pub fn terminate(&self, content_key: &str) {
        if self.inner.terminate(content_key) {
            info!(content = content_key, "Renewal timer terminated");
        }
    }

    /// Cancel the timer and delete the persisted record
    #[instrument(skip(self))]
    pub fn forget(&self, content_key: &str) {
        self.inner.terminate(content_key);
        if let Err(e) = self.inner.store.remove(content_key) {
            warn!(content = content_key, error = %e, "Failed to remove renewal record");
        }
        info!(content = content_key, "Renewal record forgotten");
    }

    /// Cancel every live timer; records are kept
    pub fn terminate_all(&self) {
        let timers: Vec<_> = self.inner.timers().drain().collect();
        for (_, timer) in &timers {
            timer.handle.abort();
        }
        info!(count = timers.len(), "All renewal timers terminated");
    }

    pub fn is_armed(&self, content_key: &str) -> bool {
        self.inner.timers().contains_key(content_key)
    }

    /// Number of live timers
    pub fn armed_count(&self) -> usize {
        self.inner.timers().len()
    }

    /// When the live timer for `content_key` fires
    pub fn armed_deadline(&self, content_key: &str) -> Option<DateTime<Utc>> {
        self.inner.timers().get(content_key).map(|t| t.fire_at)
    }

    /// Persisted next renewal time
    pub fn next_renewal_at(&self, content_key: &str) -> Option<DateTime<Utc>> {
        self.inner.store.get(content_key)
    }

    pub fn interval(&self) -> chrono::Duration {
        self.inner.interval
    }

    /// Current time on the scheduler's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }
}

impl std::fmt::Debug for RenewalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalScheduler")
            .field("interval", &self.inner.interval)
            .field("armed", &self.armed_count())
            .finish()
    }
}
