//! Polls an external meter registry on a cadence and logs a warning
//! whenever the summed diff of failed repair sessions across tables
//! crosses a configured threshold.
//!
//! Diffs, not raw counts: the registry reports a cumulative total per
//! table, so each tick only the increase since the last observation is
//! summed and compared against the threshold.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collaborators::{MeterRegistry, TableRef};
use crate::worker::PeriodicWorker;

pub struct FailureLogger {
    worker: Mutex<Option<PeriodicWorker>>,
}

impl FailureLogger {
    #[must_use]
    pub fn new(registry: Arc<dyn MeterRegistry>, threshold: u64) -> Self {
        Self::with_interval(registry, threshold, Duration::from_secs(10 * 60))
    }

    #[must_use]
    pub fn with_interval(registry: Arc<dyn MeterRegistry>, threshold: u64, interval: Duration) -> Self {
        let last_counts: Arc<Mutex<HashMap<TableRef, u64>>> = Arc::new(Mutex::new(HashMap::new()));
        let interval_minutes = interval.as_secs() / 60;

        let worker = PeriodicWorker::spawn("kmb-repair-failure-logger", interval, move || {
            let samples = registry.failed_repair_session_meters();
            if samples.is_empty() {
                return;
            }

            let diffs = {
                let mut last_counts = last_counts.lock().expect("failure logger state lock poisoned");
                diffs_since_last_tick(&samples, &mut last_counts)
            };

            let total: u64 = diffs.iter().map(|(_, diff)| diff).sum();
            if total >= threshold {
                for (table, diff) in diffs {
                    tracing::warn!(
                        keyspace = %table.keyspace,
                        table = %table.table,
                        diff,
                        interval_minutes,
                        "table had failed repair sessions in the last interval",
                    );
                }
            }
        });

        Self { worker: Mutex::new(Some(worker)) }
    }

    /// Signals the poll worker to exit and joins it with a bounded wait.
    /// Idempotent.
    pub fn close(&self) {
        if let Some(mut worker) = self.worker.lock().expect("failure logger worker lock poisoned").take() {
            worker.close();
        }
    }
}

impl Drop for FailureLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Diffs each sample's cumulative count against the last observed count
/// for its table, updating `last_counts` in place and returning only the
/// tables whose count increased.
fn diffs_since_last_tick(
    samples: &[crate::collaborators::MeterSample],
    last_counts: &mut HashMap<TableRef, u64>,
) -> Vec<(TableRef, u64)> {
    let mut diffs = Vec::new();
    for sample in samples {
        let previous = last_counts.entry(sample.table.clone()).or_insert(0);
        if sample.count > *previous {
            diffs.push((sample.table.clone(), sample.count - *previous));
        }
        *previous = sample.count;
    }
    diffs
}
