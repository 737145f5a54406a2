//! Repair-state snapshots: per-vnode repair timestamps grouped by replica
//! set, and the abstraction that produces them.
//!
//! Producing a [`Snapshot`] means querying repair history and cluster
//! topology collaborators that are out of scope for this crate (see
//! [`crate::collaborators`]); [`RepairState`] is the seam those
//! collaborators sit behind. Snapshots themselves are shared through an
//! [`arc_swap::ArcSwap`] rather than a `RwLock`, so reading the current
//! snapshot never blocks on a refresh in progress.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::RepairStateError;
use crate::token::TokenRange;

/// Opaque identifier grouping vnodes that share an identical replica set.
/// Carried alongside each [`VnodeRepairState`] so [`Snapshot`] can derive
/// [`ReplicaRepairGroup`]s without this crate modeling cluster topology
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaSetId(pub u64);

/// Repair bookkeeping for a single vnode (one [`TokenRange`] owned by one
/// replica set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnodeRepairState {
    pub range: TokenRange,
    pub last_repaired_at_ms: i64,
    pub estimated_repair_time_ms: i64,
    pub replica_set: ReplicaSetId,
}

impl VnodeRepairState {
    #[must_use]
    pub fn new(
        range: TokenRange,
        last_repaired_at_ms: i64,
        estimated_repair_time_ms: i64,
        replica_set: ReplicaSetId,
    ) -> Self {
        Self { range, last_repaired_at_ms, estimated_repair_time_ms, replica_set }
    }
}

/// All vnodes sharing one replica set, grouped as a schedulable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaRepairGroup {
    pub replica_set: ReplicaSetId,
    pub vnodes: Vec<VnodeRepairState>,
    /// Earliest `last_repaired_at_ms` across the group's vnodes -- the
    /// laggard that determines when this replica set is next due.
    pub last_completed_at_ms: i64,
}

impl ReplicaRepairGroup {
    fn from_vnodes(replica_set: ReplicaSetId, vnodes: Vec<VnodeRepairState>) -> Self {
        let last_completed_at_ms =
            vnodes.iter().map(|v| v.last_repaired_at_ms).min().unwrap_or(i64::MAX);
        Self { replica_set, vnodes, last_completed_at_ms }
    }
}

/// An immutable, point-in-time view of a table's repair state: every
/// vnode in ring order, derived per-replica-set groups, and the values a
/// [`crate::job::TableRepairJob`] needs to derive status and schedule
/// work without re-querying collaborators.
#[derive(Debug, Clone)]
pub struct Snapshot {
    vnodes: Arc<Vec<VnodeRepairState>>,
    groups: Arc<Vec<ReplicaRepairGroup>>,
    last_completed_at_ms: i64,
    can_repair: bool,
    estimated_repair_time_ms: i64,
}

impl Snapshot {
    #[must_use]
    pub fn new(vnodes: Vec<VnodeRepairState>, can_repair: bool, estimated_repair_time_ms: i64) -> Self {
        let last_completed_at_ms = vnodes.iter().map(|v| v.last_repaired_at_ms).min().unwrap_or(i64::MAX);
        let groups = Self::derive_groups(&vnodes);
        Self {
            vnodes: Arc::new(vnodes),
            groups: Arc::new(groups),
            last_completed_at_ms,
            can_repair,
            estimated_repair_time_ms,
        }
    }

    /// Groups vnodes by [`ReplicaSetId`], preserving ring order via each
    /// group's first appearance.
    fn derive_groups(vnodes: &[VnodeRepairState]) -> Vec<ReplicaRepairGroup> {
        let mut order: Vec<ReplicaSetId> = Vec::new();
        let mut buckets: HashMap<ReplicaSetId, Vec<VnodeRepairState>> = HashMap::new();

        for v in vnodes {
            if !buckets.contains_key(&v.replica_set) {
                order.push(v.replica_set);
            }
            buckets.entry(v.replica_set).or_default().push(v.clone());
        }

        order
            .into_iter()
            .map(|replica_set| {
                let vs = buckets.remove(&replica_set).expect("every ordered key has a bucket");
                ReplicaRepairGroup::from_vnodes(replica_set, vs)
            })
            .collect()
    }

    #[must_use]
    pub fn vnodes(&self) -> &[VnodeRepairState] {
        &self.vnodes
    }

    #[must_use]
    pub fn groups(&self) -> &[ReplicaRepairGroup] {
        &self.groups
    }

    #[must_use]
    pub fn last_completed_at_ms(&self) -> i64 {
        self.last_completed_at_ms
    }

    #[must_use]
    pub fn can_repair(&self) -> bool {
        self.can_repair
    }

    #[must_use]
    pub fn estimated_repair_time_ms(&self) -> i64 {
        self.estimated_repair_time_ms
    }

    /// Fraction of vnodes repaired within `interval_ms` of `now_ms`.
    /// Shared by [`crate::job::TableRepairJob::progress`] and
    /// [`crate::metrics_supplier::MetricsSupplier`] so both report the
    /// same definition of "how caught up is this table".
    #[must_use]
    pub fn progress_ratio(&self, now_ms: i64, interval_ms: i64) -> f64 {
        if self.vnodes.is_empty() {
            return 0.0;
        }
        let fresh = self.vnodes.iter().filter(|v| now_ms - v.last_repaired_at_ms <= interval_ms).count();
        fresh as f64 / self.vnodes.len() as f64
    }
}

/// Produces and holds the current [`Snapshot`] for one `(table, config)`
/// pair. Implementations back this with real history/topology
/// collaborators; [`crate::cache::RepairStateCache`] holds one instance
/// per key, refreshing it on a cadence via [`RepairState::update`].
pub trait RepairState: Send + Sync {
    /// Re-queries collaborators and atomically replaces the current
    /// snapshot. On failure the previous snapshot remains in place.
    ///
    /// # Errors
    ///
    /// Returns [`RepairStateError`] if the underlying collaborator query
    /// fails; callers (the cache's refresh worker, or
    /// [`crate::metrics_supplier::MetricsSupplier`]) log and continue
    /// rather than propagate.
    fn update(&self) -> Result<(), RepairStateError>;

    /// The current snapshot, without blocking on any refresh in flight.
    fn snapshot(&self) -> Arc<Snapshot>;

    /// Forces an update outside the normal refresh cadence. Defaults to
    /// [`RepairState::update`]; a real implementation may use this to
    /// skip a rate limiter that the periodic refresh otherwise respects.
    fn update_now(&self) -> Result<(), RepairStateError> {
        self.update()
    }
}

/// Builds a [`RepairState`] for a given table and config. The one seam
/// [`crate::cache::RepairStateCache`] calls through; real deployments
/// implement this against repair history and cluster topology.
pub trait RepairStateFactory: Send + Sync {
    fn create(&self, table: &crate::collaborators::TableRef, config: &crate::config::RepairConfig) -> Arc<dyn RepairState>;
}

/// A [`RepairState`] backed by a plain producer closure, using
/// [`ArcSwap`] for the lock-free read path. Used directly by tests and
/// by any deployment that doesn't need more than "call this closure,
/// store the result."
pub struct FnRepairState<F>
where
    F: Fn() -> Result<Snapshot, RepairStateError> + Send + Sync,
{
    producer: F,
    current: ArcSwap<Snapshot>,
}

impl<F> FnRepairState<F>
where
    F: Fn() -> Result<Snapshot, RepairStateError> + Send + Sync,
{
    pub fn new(initial: Snapshot, producer: F) -> Self {
        Self { producer, current: ArcSwap::new(Arc::new(initial)) }
    }
}

impl<F> RepairState for FnRepairState<F>
where
    F: Fn() -> Result<Snapshot, RepairStateError> + Send + Sync,
{
    fn update(&self) -> Result<(), RepairStateError> {
        let snapshot = (self.producer)()?;
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}
