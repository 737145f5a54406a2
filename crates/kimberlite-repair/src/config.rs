//! Configuration shapes for per-table repair scheduling and the
//! orchestrator's background workers.
//!
//! This crate defines the shapes and their defaults only; loading them
//! from a file or environment is the embedding application's job, using
//! `kimberlite-config`'s [`ConfigLoader`](../../kimberlite-config/src/loader.rs)
//! the same way every other `kimberlite-*` subsystem does. Per-table
//! [`RepairConfig`] is supplied by the caller per table rather than
//! loaded globally, since warning/error thresholds are usually tuned
//! per workload.

use serde::{Deserialize, Serialize};

/// Sentinel for [`RepairConfig::target_repair_size_bytes`] meaning
/// "repair the whole table as a single unit" rather than partitioning by
/// byte size.
pub const FULL_REPAIR: i64 = -1;

/// Per-table repair scheduling thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Target time between the start of consecutive full repairs of this
    /// table.
    pub interval_ms: i64,
    /// Time since last completed repair past which the job is `Late`.
    pub warning_ms: i64,
    /// Time since last completed repair past which the job is
    /// `Overdue`.
    pub error_ms: i64,
    /// Target number of bytes per repair task, or [`FULL_REPAIR`].
    pub target_repair_size_bytes: i64,
}

impl RepairConfig {
    #[must_use]
    pub fn new(interval_ms: i64, warning_ms: i64, error_ms: i64, target_repair_size_bytes: i64) -> Self {
        Self { interval_ms, warning_ms, error_ms, target_repair_size_bytes }
    }

    #[must_use]
    pub fn is_full_repair(&self) -> bool {
        self.target_repair_size_bytes == FULL_REPAIR
    }
}

impl Default for RepairConfig {
    /// One day between repairs, matching the interval with no early
    /// warning or overdue margin (both default to the interval itself),
    /// and whole-table repair.
    fn default() -> Self {
        let one_day_ms = 24 * 60 * 60 * 1_000;
        Self {
            interval_ms: one_day_ms,
            warning_ms: one_day_ms,
            error_ms: one_day_ms,
            target_repair_size_bytes: FULL_REPAIR,
        }
    }
}

/// Cadences for the orchestrator's background workers
/// ([`crate::cache::RepairStateCache`]'s refresh loop,
/// [`crate::metrics_supplier::MetricsSupplier`], and
/// [`crate::failure_logger::FailureLogger`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairOrchestratorConfig {
    pub refresh_interval_ms: u64,
    pub metrics_interval_ms: u64,
    pub failure_logger_interval_minutes: u64,
    /// Minimum summed diff of failed repair sessions across tables in one
    /// failure-logger interval before a warning is logged.
    pub failed_repair_sessions_threshold: u64,
}

impl Default for RepairOrchestratorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5_000,
            metrics_interval_ms: 5_000,
            failure_logger_interval_minutes: 10,
            failed_repair_sessions_threshold: 1,
        }
    }
}
