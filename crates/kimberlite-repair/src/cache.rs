//! Concurrent, self-refreshing, at-most-once-load cache of
//! [`RepairState`] keyed by `(table, config)`.
//!
//! At-most-once construction is `dashmap`'s `entry().or_insert_with`
//! holding the shard lock across the factory call, the same pattern
//! `knhk-workflow-engine`'s `ReflexCache` uses for its spec/case maps.
//! Entries are never evicted; a background [`PeriodicWorker`] refreshes
//! every entry on a fixed cadence, absorbing and logging per-entry
//! failures so one collaborator outage never stalls the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;

use crate::collaborators::TableRef;
use crate::config::RepairConfig;
use crate::error::CacheError;
use crate::state::{RepairState, RepairStateFactory, Snapshot};
use crate::worker::PeriodicWorker;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    table: TableRef,
    config: RepairConfig,
}

pub struct RepairStateCache {
    entries: Arc<DashMap<CacheKey, Arc<dyn RepairState>>>,
    factory: Arc<dyn RepairStateFactory>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<PeriodicWorker>>,
}

impl RepairStateCache {
    #[must_use]
    pub fn new(factory: Arc<dyn RepairStateFactory>) -> Self {
        Self::with_refresh_interval(factory, Duration::from_millis(5_000))
            .expect("5s default refresh interval is always valid")
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `refresh_interval` is
    /// zero -- the refresh worker would busy-spin instead of pacing
    /// ticks.
    pub fn with_refresh_interval(
        factory: Arc<dyn RepairStateFactory>,
        refresh_interval: Duration,
    ) -> Result<Self, CacheError> {
        if refresh_interval.is_zero() {
            return Err(CacheError::Configuration("refresh_interval must be non-zero".to_string()));
        }

        let entries: Arc<DashMap<CacheKey, Arc<dyn RepairState>>> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        let refresh_entries = Arc::clone(&entries);
        let refresh_closed = Arc::clone(&closed);
        let worker = PeriodicWorker::spawn("kmb-repair-cache-refresh", refresh_interval, move || {
            if refresh_closed.load(Ordering::Acquire) {
                return;
            }
            // Keys are snapshotted up front: a key inserted mid-tick may
            // or may not be picked up this round, which is fine since the
            // next tick will catch it.
            let keys: Vec<CacheKey> = refresh_entries.iter().map(|e| e.key().clone()).collect();
            for key in keys {
                let Some(state) = refresh_entries.get(&key) else { continue };
                if let Err(err) = state.update() {
                    tracing::warn!(table = %key.table, error = %err, "repair state refresh failed");
                }
            }
        });

        Ok(Self { entries, factory, closed, worker: Mutex::new(Some(worker)) })
    }

    /// Returns the current snapshot for `(table, config)`, constructing
    /// and caching the backing [`RepairState`] on first access.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Closed`] if the cache has already been
    /// closed.
    pub fn snapshot(&self, table: &TableRef, config: &RepairConfig) -> Result<Arc<Snapshot>, CacheError> {
        let state = self.state_for(table, config)?;
        Ok(state.snapshot())
    }

    /// Forces an out-of-cadence refresh of `(table, config)`'s entry.
    /// Update failures are logged, not propagated -- the cached snapshot
    /// stays whatever it was before the call.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Closed`] if the cache has already been
    /// closed.
    pub fn update(&self, table: &TableRef, config: &RepairConfig) -> Result<(), CacheError> {
        let state = self.state_for(table, config)?;
        if let Err(err) = state.update_now() {
            tracing::warn!(table = %table, error = %err, "forced repair state update failed");
        }
        Ok(())
    }

    fn state_for(&self, table: &TableRef, config: &RepairConfig) -> Result<Arc<dyn RepairState>, CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        let key = CacheKey { table: table.clone(), config: *config };
        let entry = self.entries.entry(key).or_insert_with(|| self.factory.create(table, config));
        Ok(Arc::clone(entry.value()))
    }

    /// Stops accepting new work, signals the refresh worker to exit, and
    /// joins it with a bounded wait. Idempotent; the cache is unusable
    /// after this returns.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(mut worker) = self.worker.lock().expect("cache worker lock poisoned").take() {
            worker.close();
        }
    }
}

impl Drop for RepairStateCache {
    fn drop(&mut self) {
        self.close();
    }
}
