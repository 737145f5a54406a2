//! Collaborator seams: everything this crate needs from the surrounding
//! system -- cluster topology, repair history persistence, JMX-style
//! transport, storage statistics, a base scheduler, and a meter registry
//! -- without depending on how any of them are implemented.
//!
//! None of these are implemented here. A deployment wires concrete
//! adapters (talking to its own topology service, history store, etc.)
//! in behind these traits; this crate only ever holds them as `Arc<dyn
//! ...>` and passes them through.

use std::sync::Arc;

/// A keyspace-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TableRef {
    pub keyspace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self { keyspace: keyspace.into(), table: table.into() }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Opaque handle to durable repair history, carried through to
/// [`crate::job::RepairTask`] but never inspected by this crate.
/// Persistence and querying live entirely with the collaborator that
/// implements it.
pub trait RepairHistory: Send + Sync {}

/// On-disk size for a table, used to derive `tokens_per_task` in
/// [`crate::job::TableRepairJob`]. `0` means unknown.
pub trait TableStorageStates: Send + Sync {
    fn data_size(&self, table: &TableRef) -> i64;
}

/// Opaque JMX-style transport factory for the subsystems that actually
/// execute a repair session. Passed through unexamined.
pub trait JmxProxyFactory: Send + Sync {}

/// Opaque distributed-lock collaborator guarding concurrent repair
/// sessions across nodes. Passed through unexamined.
pub trait RepairLockType: Send + Sync {}

/// Opaque per-table repair metrics sink distinct from
/// [`crate::metrics_supplier::MetricsSink`] -- this one is for
/// session-level counters the execution layer records, not the gauges
/// this crate computes from a [`crate::state::Snapshot`].
pub trait TableRepairMetrics: Send + Sync {}

/// Opaque per-table policy hook (e.g. ignored token ranges, repair
/// parallelism) consulted by the execution layer.
pub trait TableRepairPolicy: Send + Sync {}

/// The scheduling facet this crate's per-table jobs extend: priority
/// mapping from a timestamp and the runnable/blocked gate.
pub trait BaseScheduler: Send + Sync {
    /// Maps "time since last completed repair" (or an equivalent
    /// timestamp) to a scheduler priority. `-1` means "do not repair".
    fn priority_for(&self, reference_timestamp_ms: i64) -> i32;

    /// Whether this table is currently allowed to run (false while
    /// blocked on a cluster-wide condition such as an ongoing
    /// topology change).
    fn runnable(&self, table: &TableRef) -> bool;

    /// Notifies the scheduler that a repair task finished, successfully
    /// or not.
    fn post_execute(&self, success: bool, table: &TableRef);
}

/// One observation of a `REPAIR_SESSIONS` timer: which table it's tagged
/// with, whether it's the `successful=false` variant, and its current
/// cumulative count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterSample {
    pub table: TableRef,
    pub count: u64,
}

/// External meter registry polled by
/// [`crate::failure_logger::FailureLogger`].
pub trait MeterRegistry: Send + Sync {
    /// Every `REPAIR_SESSIONS` timer currently tagged `successful=false`,
    /// one sample per table, with `count` as the cumulative total the
    /// registry has observed so far (not a delta).
    fn failed_repair_session_meters(&self) -> Vec<MeterSample>;
}

/// Owns the full set of collaborators a [`crate::job::TableRepairJob`]
/// needs beyond the cache and storage stats, bundled so constructors
/// don't take eight separate `Arc` parameters.
#[derive(Clone)]
pub struct JobCollaborators {
    pub history: Arc<dyn RepairHistory>,
    pub jmx: Arc<dyn JmxProxyFactory>,
    pub lock_type: Arc<dyn RepairLockType>,
    pub metrics: Arc<dyn TableRepairMetrics>,
    pub policy: Arc<dyn TableRepairPolicy>,
}
