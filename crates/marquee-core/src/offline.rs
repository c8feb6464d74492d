//! Offline library - cached streams and their license renewal
//!
//! Ties caching task snapshots reported by the platform cache to the
//! renewal scheduler. Every cached DRM stream keeps a renewal cycle while
//! the app is in the foreground.

use crate::catalog::Stream;
use crate::drm::DrmConfig;
use crate::error::{Error, Result};
use crate::renewal::RenewalScheduler;
use crate::types::{normalize_content_key, CachingStatus, CachingTaskSnapshot, OfflineConfig, SourceDescription};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// A stream available for offline playback
#[derive(Debug, Clone)]
pub struct OfflineItem {
    stream: Stream,
    source: SourceDescription,
    task: Option<CachingTaskSnapshot>,
}

impl OfflineItem {
    pub fn title(&self) -> &str {
        &self.stream.title
    }

    /// Normalized source URL; renewal records are stored under this key
    pub fn content_key(&self) -> &str {
        self.source.content_key()
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn source(&self) -> &SourceDescription {
        &self.source
    }

    pub fn drm(&self) -> Option<&DrmConfig> {
        self.source.drm.as_ref()
    }

    /// Latest caching task snapshot, if a task exists
    pub fn task(&self) -> Option<&CachingTaskSnapshot> {
        self.task.as_ref()
    }

    pub fn status(&self) -> CachingStatus {
        self.task.map_or(CachingStatus::Idle, |t| t.status)
    }

    pub fn progress(&self) -> f64 {
        self.task.map_or(0.0, |t| t.progress())
    }

    pub fn is_cached(&self) -> bool {
        self.task.is_some_and(|t| t.is_cached())
    }
}

/// Offline streams and the renewal cycles of their licenses
#[derive(Debug)]
pub struct OfflineLibrary {
    items: Vec<OfflineItem>,
    scheduler: RenewalScheduler,
    cache_expiry: chrono::Duration,
}

impl OfflineLibrary {
    /// Build the library; every stream must have a valid source
    pub fn new(streams: Vec<Stream>, scheduler: RenewalScheduler, config: &OfflineConfig) -> Result<Self> {
        let items = streams
            .into_iter()
            .map(|stream| {
                let source = stream.source()?;
                Ok(OfflineItem {
                    stream,
                    source,
                    task: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            items,
            scheduler,
            cache_expiry: config.cache_expiry(),
        })
    }

    pub fn items(&self) -> &[OfflineItem] {
        &self.items
    }

    /// Look up an item by its content key, in raw or normalized form
    pub fn item(&self, content_key: &str) -> Option<&OfflineItem> {
        let key = normalize_content_key(content_key);
        self.items.iter().find(|i| i.content_key() == key)
    }

    pub fn scheduler(&self) -> &RenewalScheduler {
        &self.scheduler
    }

    /// Expiration date for a caching task created now
    pub fn cache_expires_at(&self) -> DateTime<Utc> {
        self.scheduler
            .now()
            .checked_add_signed(self.cache_expiry)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Match caching tasks that survived a restart against the library
    ///
    /// Finished tasks are kept. Anything else was interrupted and cannot
    /// be resumed, so its key is returned for the caller to remove the
    /// task, and the renewal record of DRM content is deleted.
    pub fn reconcile<I>(&mut self, tasks: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, CachingTaskSnapshot)>,
    {
        let mut stale = Vec::new();

        for (key, snapshot) in tasks {
            let canonical = normalize_content_key(&key);
            let Some(item) = self.items.iter_mut().find(|i| i.content_key() == canonical) else {
                debug!(content = %key, "Caching task for unknown stream ignored");
                continue;
            };

            debug!(content = %key, status = %snapshot.status, "Found caching task");
            if snapshot.status == CachingStatus::Done {
                item.task = Some(snapshot);
            } else {
                item.task = None;
                if item.source.drm.is_some() {
                    self.scheduler.forget(item.source.content_key());
                }
                stale.push(key);
            }
        }

        if !stale.is_empty() {
            info!(count = stale.len(), "Interrupted caching tasks removed");
        }
        stale
    }

    /// A caching task was created for `content_key`
    ///
    /// Licenses of DRM content are persisted with the task, so the renewal
    /// cycle starts right away.
    pub fn on_cache_started(&mut self, content_key: &str) -> Result<DateTime<Utc>> {
        let expires_at = self.cache_expires_at();
        let item = self.item_mut(content_key)?;
        item.task = Some(CachingTaskSnapshot::new(CachingStatus::Idle, 0.0));
        let key = item.content_key().to_string();
        let drm = item.source.drm.clone();

        info!(content = %key, expires_at = %expires_at, "Caching started");
        if let Some(drm) = drm {
            self.scheduler.schedule_or_resume(&key, &drm);
        }
        Ok(expires_at)
    }

    /// Record a new snapshot of the caching task for `content_key`
    pub fn update(&mut self, content_key: &str, snapshot: CachingTaskSnapshot) -> Result<()> {
        let item = self.item_mut(content_key)?;
        let previous = item.task.replace(snapshot).map(|t| t.status);
        let key = item.content_key().to_string();
        let drm = item.source.drm.clone();

        if previous == Some(snapshot.status) {
            return Ok(());
        }
        debug!(content = %key, status = %snapshot.status, "Caching status changed");

        match (snapshot.status, drm) {
            (CachingStatus::Done, Some(drm)) => {
                self.scheduler.schedule_or_resume(&key, &drm);
            }
            (CachingStatus::Evicted, Some(_)) => {
                self.scheduler.forget(&key);
            }
            (CachingStatus::Error, _) => {
                warn!(content = %key, "Caching failed");
            }
            _ => {}
        }
        Ok(())
    }

    /// The cached copy of `content_key` was deleted
    pub fn remove(&mut self, content_key: &str) -> Result<()> {
        let item = self.item_mut(content_key)?;
        item.task = None;
        let key = item.content_key().to_string();
        self.scheduler.forget(&key);
        info!(content = %key, "Cached content removed");
        Ok(())
    }

    /// Arm renewal timers again when the app returns to the foreground
    ///
    /// Returns the number of cycles restored.
    pub fn restore_renewals(&self) -> usize {
        let mut restored = 0;
        for item in &self.items {
            let has_task = item.task.is_some_and(|t| !t.is_evicted());
            if let (true, Some(drm)) = (has_task, item.drm()) {
                self.scheduler.schedule_or_resume(item.content_key(), drm);
                restored += 1;
            }
        }
        info!(restored, "Renewal timers restored");
        restored
    }

    /// Stop all renewal timers when the app goes to the background
    pub fn suspend_renewals(&self) {
        self.scheduler.terminate_all();
    }

    /// Schedule renewal for one DRM item on demand
    pub fn renew_now(&self, content_key: &str) -> Result<DateTime<Utc>> {
        let item = self
            .item(content_key)
            .ok_or_else(|| Error::UnknownContent(content_key.to_string()))?;
        let drm = item.drm().ok_or_else(|| Error::NoDrmConfig {
            content_key: content_key.to_string(),
        })?;
        Ok(self.scheduler.schedule_or_resume(item.content_key(), drm))
    }

    fn item_mut(&mut self, content_key: &str) -> Result<&mut OfflineItem> {
        let key = normalize_content_key(content_key);
        self.items
            .iter_mut()
            .find(|i| i.content_key() == key)
            .ok_or_else(|| Error::UnknownContent(content_key.to_string()))
    }
}
