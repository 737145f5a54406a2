//! Autonomous per-table repair scheduling for a wide-column, token-ring
//! distributed store.
//!
//! Seven pieces compose into one orchestrator:
//!
//! - [`token`] / [`partition`] -- ring arithmetic and the splitter that
//!   turns a table's token ranges into task-sized chunks.
//! - [`state`] -- the repair-state snapshot abstraction, backed by
//!   whatever history/topology collaborators a deployment wires in.
//! - [`cache`] -- the concurrent, self-refreshing cache of snapshots
//!   that every other piece reads through.
//! - [`metrics_supplier`] / [`failure_logger`] -- the two other
//!   background workers, pushing gauges and watching for failed-session
//!   spikes respectively.
//! - [`job`] -- per-table status derivation and the task iterator an
//!   execution layer drives.
//!
//! None of this crate talks to a cluster, a metrics backend, or a
//! persistence layer directly -- see [`collaborators`] for the seams a
//! deployment implements.

pub mod cache;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod failure_logger;
pub mod job;
pub mod metrics_supplier;
pub mod partition;
pub mod state;
pub mod token;
mod worker;

pub use cache::RepairStateCache;
pub use collaborators::{JobCollaborators, TableRef};
pub use config::{RepairConfig, RepairOrchestratorConfig, FULL_REPAIR};
pub use error::RepairError;
pub use failure_logger::FailureLogger;
pub use job::{JobStatus, RepairTask, TableRepairJob};
pub use metrics_supplier::{MetricsSink, MetricsSupplier, RepairGauges};
pub use partition::RangePartitioner;
pub use state::{FnRepairState, RepairState, RepairStateFactory, ReplicaRepairGroup, ReplicaSetId, Snapshot, VnodeRepairState};
pub use token::{TokenRange, TokenRangeSize, TokenRing};
