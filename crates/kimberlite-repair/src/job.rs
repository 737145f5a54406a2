//! Per-table repair job: status derivation and the task iterator that
//! turns a [`Snapshot`] into schedulable [`RepairTask`]s.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::cache::RepairStateCache;
use crate::collaborators::{BaseScheduler, JobCollaborators, TableRef, TableStorageStates};
use crate::config::RepairConfig;
use crate::error::RepairError;
use crate::partition::RangePartitioner;
use crate::state::{ReplicaRepairGroup, Snapshot};
use crate::token::{TokenRange, TokenRing};

/// Derived repair status for a table, in the fixed evaluation order
/// `Completed -> OnTime -> Late -> Overdue -> Blocked` (`Blocked` is
/// actually checked first, and short-circuits the rest -- see
/// [`TableRepairJob::status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    OnTime,
    Late,
    Overdue,
    Blocked,
}

/// One unit of schedulable work: a replica group, its precomputed
/// sub-range breakdown, and the collaborator handles an execution layer
/// needs to actually run a repair session.
pub struct RepairTask {
    pub job_id: u64,
    pub table: TableRef,
    pub config: RepairConfig,
    pub group: ReplicaRepairGroup,
    pub tokens_per_task: BigUint,
    /// The group's ranges, partitioned to `tokens_per_task` via
    /// [`RangePartitioner::partition`]. One inner `Vec` per task an
    /// execution layer would actually run against this replica set.
    pub sub_ranges: Vec<Vec<TokenRange>>,
    pub priority: i32,
    pub collaborators: JobCollaborators,
}

/// Schedules repair work for a single `(table, config)` pair: derives
/// [`JobStatus`] from the cache's current snapshot, computes progress,
/// and builds the task list for an execution layer to run.
pub struct TableRepairJob {
    job_id: u64,
    table: TableRef,
    config: RepairConfig,
    cache: Arc<RepairStateCache>,
    storage_stats: Arc<dyn TableStorageStates>,
    scheduler: Arc<dyn BaseScheduler>,
    collaborators: JobCollaborators,
}

impl TableRepairJob {
    #[must_use]
    pub fn new(
        job_id: u64,
        table: TableRef,
        config: RepairConfig,
        cache: Arc<RepairStateCache>,
        storage_stats: Arc<dyn TableStorageStates>,
        scheduler: Arc<dyn BaseScheduler>,
        collaborators: JobCollaborators,
    ) -> Self {
        Self { job_id, table, config, cache, storage_stats, scheduler, collaborators }
    }

    #[must_use]
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    #[must_use]
    pub fn config(&self) -> RepairConfig {
        self.config
    }

    /// The job's current snapshot, as held by the shared
    /// [`RepairStateCache`].
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn view(&self) -> Result<Arc<Snapshot>, RepairError> {
        Ok(self.cache.snapshot(&self.table, &self.config)?)
    }

    /// Derives this job's current [`JobStatus`].
    ///
    /// Evaluation order: `Blocked` first (the scheduler gate, which
    /// applies regardless of how overdue the table is), then
    /// `Overdue -> Late -> OnTime -> Completed` by comparing time since
    /// last completion against `error_ms`, `warning_ms`, and the
    /// interval minus the estimated repair time, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn status(&self, now_ms: i64) -> Result<JobStatus, RepairError> {
        let snapshot = self.view()?;
        let priority = self.priority_from(&snapshot);

        if priority != -1 && !self.scheduler.runnable(&self.table) {
            return Ok(JobStatus::Blocked);
        }

        let elapsed = now_ms - snapshot.last_completed_at_ms();
        if elapsed >= self.config.error_ms {
            return Ok(JobStatus::Overdue);
        }
        if elapsed >= self.config.warning_ms {
            return Ok(JobStatus::Late);
        }
        if elapsed >= self.config.interval_ms - snapshot.estimated_repair_time_ms() {
            return Ok(JobStatus::OnTime);
        }
        Ok(JobStatus::Completed)
    }

    /// Fraction of vnodes repaired within `interval_ms` of `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn progress(&self, now_ms: i64) -> Result<f64, RepairError> {
        let snapshot = self.view()?;
        Ok(snapshot.progress_ratio(now_ms, self.config.interval_ms))
    }

    /// When this job should next start, assuming it starts exactly on
    /// cadence: `last_completed_at + interval - estimated_repair_time`.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn next_run_ms(&self) -> Result<i64, RepairError> {
        let snapshot = self.view()?;
        Ok(snapshot.last_completed_at_ms() + self.config.interval_ms - snapshot.estimated_repair_time_ms())
    }

    /// The scheduler priority for this job's current snapshot, or `-1`
    /// if the snapshot reports it cannot currently be repaired.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn priority(&self) -> Result<i32, RepairError> {
        let snapshot = self.view()?;
        Ok(self.priority_from(&snapshot))
    }

    /// Whether the base scheduler currently allows this table to run,
    /// independent of time-based status. The same gate [`Self::status`]
    /// consults before falling back to `Overdue -> Late -> OnTime ->
    /// Completed`.
    #[must_use]
    pub fn runnable(&self) -> bool {
        self.scheduler.runnable(&self.table)
    }

    /// Forces an out-of-cadence refresh of this table's cached
    /// [`RepairState`](crate::state::RepairState), the same refresh
    /// [`Self::post_execute`] performs after a task finishes.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn refresh_state(&self) -> Result<(), RepairError> {
        Ok(self.cache.update(&self.table, &self.config)?)
    }

    /// `s` from §4.G: the timestamp of this table's last completed
    /// repair, the earliest `last_completed_at_ms` across its replica
    /// groups.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn last_successful_run(&self) -> Result<i64, RepairError> {
        let snapshot = self.view()?;
        Ok(snapshot.last_completed_at_ms())
    }

    /// `off` from §4.G: the snapshot's estimated repair time, subtracted
    /// from `interval_ms` when deriving `OnTime` and [`Self::next_run_ms`].
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed.
    pub fn run_offset(&self) -> Result<i64, RepairError> {
        let snapshot = self.view()?;
        Ok(snapshot.estimated_repair_time_ms())
    }

    fn priority_from(&self, snapshot: &Snapshot) -> i32 {
        if !snapshot.can_repair() {
            return -1;
        }
        self.scheduler.priority_for(snapshot.last_completed_at_ms())
    }

    /// `tokens_per_task` for the job's current snapshot: whole-ring for
    /// full repair or unknown table size, otherwise the ring's total
    /// token count divided by `table_bytes / target_repair_size_bytes`
    /// (clamped to at least one task's worth).
    fn tokens_per_task(&self, snapshot: &Snapshot) -> BigUint {
        if self.config.is_full_repair() || self.config.target_repair_size_bytes <= 0 {
            return TokenRing::full_range_size();
        }

        let table_bytes = self.storage_stats.data_size(&self.table);
        if table_bytes <= 0 {
            return TokenRing::full_range_size();
        }

        let target_repairs = table_bytes / self.config.target_repair_size_bytes;
        if target_repairs <= 0 {
            return TokenRing::full_range_size();
        }

        let sum_tokens: BigUint = snapshot.vnodes().iter().map(|v| v.range.size()).sum();
        sum_tokens / BigUint::from(target_repairs as u64)
    }

    /// Builds the ready-to-execute task list for the job's current
    /// snapshot: one [`RepairTask`] per [`ReplicaRepairGroup`] in
    /// snapshot (ring) order, each carrying that group's ranges already
    /// partitioned via [`RangePartitioner::partition`] against the
    /// job's computed `tokens_per_task`.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Cache`] if the cache has been closed, or
    /// [`RepairError::Partition`] if partitioning a group's ranges
    /// fails its size-preservation invariant.
    pub fn iterator(&self) -> Result<Vec<RepairTask>, RepairError> {
        let snapshot = self.view()?;
        let tokens_per_task = self.tokens_per_task(&snapshot);

        let mut tasks = Vec::with_capacity(snapshot.groups().len());
        for group in snapshot.groups() {
            let group_ranges: Vec<TokenRange> = group.vnodes.iter().map(|v| v.range).collect();
            let sub_ranges = if tokens_per_task.is_zero() {
                vec![group_ranges]
            } else {
                RangePartitioner::partition(&group_ranges, &tokens_per_task)?
            };

            let priority = self.scheduler.priority_for(group.last_completed_at_ms);
            tasks.push(RepairTask {
                job_id: self.job_id,
                table: self.table.clone(),
                config: self.config,
                group: group.clone(),
                tokens_per_task: tokens_per_task.clone(),
                sub_ranges,
                priority,
                collaborators: self.collaborators.clone(),
            });
        }
        Ok(tasks)
    }

    /// Refreshes the cached snapshot and notifies the base scheduler
    /// that a task finished.
    pub fn post_execute(&self, success: bool, task: &RepairTask, elapsed_ms: u64) {
        if let Err(err) = self.cache.update(&self.table, &self.config) {
            tracing::warn!(table = %self.table, error = %err, "post-execute cache refresh failed");
        }
        tracing::info!(
            table = %self.table,
            job_id = task.job_id,
            success,
            elapsed_ms,
            "repair task post-execute",
        );
        self.scheduler.post_execute(success, &self.table);
    }
}
