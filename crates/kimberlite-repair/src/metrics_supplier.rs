//! Periodically pulls a fresh snapshot for every registered table and
//! pushes gauge values to an external metrics backend.
//!
//! This crate never talks to a metrics backend directly -- it only
//! computes the three gauge values from a [`Snapshot`] and hands them to
//! a [`MetricsSink`] the embedding application implements against its
//! own registry (e.g. `prometheus`, already a `kimberlite` workspace
//! dependency).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::now_ms;
use crate::collaborators::TableRef;
use crate::config::RepairConfig;
use crate::state::RepairState;
use crate::worker::PeriodicWorker;

/// One gauge push derived from a table's current repair-state snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairGauges {
    pub table: TableRef,
    pub last_repaired_at_ms: i64,
    pub repaired_ratio: f64,
    pub remaining_repair_time_ms: i64,
}

/// Sink for the gauges [`MetricsSupplier`] computes each tick.
pub trait MetricsSink: Send + Sync {
    fn push_gauges(&self, gauges: &RepairGauges);
}

struct Registration {
    config: RepairConfig,
    state: Arc<dyn RepairState>,
}

/// Holds the set of `(table, config, state)` registrations and drives the
/// periodic push. Register/unregister are independent of the refresh
/// cadence -- a table can be added or removed between ticks.
pub struct MetricsSupplier {
    registered: Arc<Mutex<HashMap<TableRef, Registration>>>,
    worker: Mutex<Option<PeriodicWorker>>,
}

impl MetricsSupplier {
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self::with_interval(sink, Duration::from_secs(5))
    }

    #[must_use]
    pub fn with_interval(sink: Arc<dyn MetricsSink>, interval: Duration) -> Self {
        let registered: Arc<Mutex<HashMap<TableRef, Registration>>> = Arc::new(Mutex::new(HashMap::new()));
        let tick_registered = Arc::clone(&registered);

        let worker = PeriodicWorker::spawn("kmb-repair-metrics-supplier", interval, move || {
            let targets: Vec<(TableRef, RepairConfig, Arc<dyn RepairState>)> = {
                let guard = tick_registered.lock().expect("metrics registry lock poisoned");
                guard.iter().map(|(t, r)| (t.clone(), r.config, Arc::clone(&r.state))).collect()
            };

            let now = now_ms();
            for (table, config, state) in targets {
                if let Err(err) = state.update_now() {
                    tracing::warn!(table = %table, error = %err, "metrics supplier update failed");
                    continue;
                }
                let snapshot = state.snapshot();
                let gauges = RepairGauges {
                    table: table.clone(),
                    last_repaired_at_ms: snapshot.last_completed_at_ms(),
                    repaired_ratio: snapshot.progress_ratio(now, config.interval_ms),
                    remaining_repair_time_ms: snapshot.estimated_repair_time_ms(),
                };
                sink.push_gauges(&gauges);
            }
        });

        Self { registered, worker: Mutex::new(Some(worker)) }
    }

    /// Registers `(table, config, state)`. Idempotent if the table is
    /// already registered with the same state; replaces the existing
    /// registration otherwise.
    pub fn register(&self, table: TableRef, config: RepairConfig, state: Arc<dyn RepairState>) {
        let mut guard = self.registered.lock().expect("metrics registry lock poisoned");
        guard.insert(table, Registration { config, state });
    }

    /// Removes `table`'s registration, if any. A no-op if it was never
    /// registered.
    pub fn unregister(&self, table: &TableRef) {
        let mut guard = self.registered.lock().expect("metrics registry lock poisoned");
        guard.remove(table);
    }

    /// Signals the push worker to exit and joins it with a bounded wait.
    /// Idempotent.
    pub fn close(&self) {
        if let Some(mut worker) = self.worker.lock().expect("metrics supplier worker lock poisoned").take() {
            worker.close();
        }
    }
}

impl Drop for MetricsSupplier {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FnRepairState, Snapshot};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;

    struct RecordingSink {
        pushed: StdMutex<Vec<RepairGauges>>,
    }

    impl MetricsSink for RecordingSink {
        fn push_gauges(&self, gauges: &RepairGauges) {
            self.pushed.lock().unwrap().push(gauges.clone());
        }
    }

    #[test]
    fn register_then_wait_produces_a_push() {
        let sink = Arc::new(RecordingSink { pushed: StdMutex::new(Vec::new()) });
        let supplier = MetricsSupplier::with_interval(sink.clone(), StdDuration::from_millis(10));

        let state: Arc<dyn RepairState> =
            Arc::new(FnRepairState::new(Snapshot::new(vec![], true, 500), || Ok(Snapshot::new(vec![], true, 500))));
        supplier.register(TableRef::new("ks", "t1"), RepairConfig::default(), state);

        std::thread::sleep(StdDuration::from_millis(50));
        supplier.close();

        let pushed = sink.pushed.lock().unwrap();
        assert!(!pushed.is_empty());
        assert_eq!(pushed[0].table, TableRef::new("ks", "t1"));
    }

    #[test]
    fn unregister_stops_future_pushes() {
        let sink = Arc::new(RecordingSink { pushed: StdMutex::new(Vec::new()) });
        let supplier = MetricsSupplier::with_interval(sink.clone(), StdDuration::from_millis(10));

        let state: Arc<dyn RepairState> =
            Arc::new(FnRepairState::new(Snapshot::new(vec![], true, 0), || Ok(Snapshot::new(vec![], true, 0))));
        let table = TableRef::new("ks", "t1");
        supplier.register(table.clone(), RepairConfig::default(), state);
        std::thread::sleep(StdDuration::from_millis(30));
        supplier.unregister(&table);

        let count_before = sink.pushed.lock().unwrap().len();
        std::thread::sleep(StdDuration::from_millis(30));
        let count_after = sink.pushed.lock().unwrap().len();
        supplier.close();

        assert_eq!(count_before, count_after);
    }
}
