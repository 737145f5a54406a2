//! End-to-end scenarios exercising the partitioner, the cache, and job
//! status derivation together, rather than one module at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kimberlite_repair::collaborators::{
    BaseScheduler, JmxProxyFactory, JobCollaborators, RepairHistory, RepairLockType, TableRef,
    TableRepairMetrics, TableRepairPolicy, TableStorageStates,
};
use kimberlite_repair::state::{RepairState, RepairStateFactory, ReplicaSetId, Snapshot, VnodeRepairState};
use kimberlite_repair::{JobStatus, RangePartitioner, RepairConfig, RepairStateCache, TableRepairJob, TokenRange};

struct NoopHistory;
impl RepairHistory for NoopHistory {}
struct NoopJmx;
impl JmxProxyFactory for NoopJmx {}
struct NoopLock;
impl RepairLockType for NoopLock {}
struct NoopMetrics;
impl TableRepairMetrics for NoopMetrics {}
struct NoopPolicy;
impl TableRepairPolicy for NoopPolicy {}

fn collaborators() -> JobCollaborators {
    JobCollaborators {
        history: Arc::new(NoopHistory),
        jmx: Arc::new(NoopJmx),
        lock_type: Arc::new(NoopLock),
        metrics: Arc::new(NoopMetrics),
        policy: Arc::new(NoopPolicy),
    }
}

struct ZeroStorage;
impl TableStorageStates for ZeroStorage {
    fn data_size(&self, _table: &TableRef) -> i64 {
        0
    }
}

struct AlwaysRunnable;
impl BaseScheduler for AlwaysRunnable {
    fn priority_for(&self, _reference_timestamp_ms: i64) -> i32 {
        1
    }
    fn runnable(&self, _table: &TableRef) -> bool {
        true
    }
    fn post_execute(&self, _success: bool, _table: &TableRef) {}
}

struct StaticFactory(Snapshot);
impl RepairStateFactory for StaticFactory {
    fn create(&self, _table: &TableRef, _config: &RepairConfig) -> Arc<dyn RepairState> {
        let snapshot = self.0.clone();
        Arc::new(kimberlite_repair::FnRepairState::new(snapshot.clone(), move || Ok(snapshot.clone())))
    }
}

fn vnode(start: i64, end: i64, last_repaired_at_ms: i64, replica_set: u64) -> VnodeRepairState {
    VnodeRepairState::new(TokenRange::new(start, end), last_repaired_at_ms, 1_000, ReplicaSetId(replica_set))
}

#[test]
fn combine_mode_matches_literal_scenarios() {
    let ranges = vec![
        TokenRange::new(1, 4),
        TokenRange::new(4, 7),
        TokenRange::new(7, 10),
        TokenRange::new(10, 13),
        TokenRange::new(13, 16),
    ];

    let nine = RangePartitioner::partition(&ranges, &num_bigint::BigUint::from(9u8)).unwrap();
    assert_eq!(nine.len(), 2);

    let six = RangePartitioner::partition(&ranges, &num_bigint::BigUint::from(6u8)).unwrap();
    assert_eq!(six.len(), 3);
}

#[test]
fn full_repair_job_goes_from_completed_to_overdue_over_time() {
    let snapshot = Snapshot::new(vec![vnode(0, 10, 0, 1)], true, 5_000);
    let config = RepairConfig::new(100_000, 200_000, 300_000, -1);
    let cache = Arc::new(
        RepairStateCache::with_refresh_interval(Arc::new(StaticFactory(snapshot)), Duration::from_secs(3_600))
            .unwrap(),
    );

    let job = TableRepairJob::new(
        1,
        TableRef::new("ks", "wide_table"),
        config,
        Arc::clone(&cache),
        Arc::new(ZeroStorage),
        Arc::new(AlwaysRunnable),
        collaborators(),
    );

    assert_eq!(job.status(0).unwrap(), JobStatus::Completed);
    assert_eq!(job.status(300_001).unwrap(), JobStatus::Overdue);
    assert_eq!(job.status(200_001).unwrap(), JobStatus::Late);

    let tasks = job.iterator().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].group.replica_set, ReplicaSetId(1));
}

#[test]
fn blocked_status_overrides_time_based_derivation() {
    struct Gate(AtomicBool);
    impl BaseScheduler for Gate {
        fn priority_for(&self, _reference_timestamp_ms: i64) -> i32 {
            5
        }
        fn runnable(&self, _table: &TableRef) -> bool {
            self.0.load(Ordering::SeqCst)
        }
        fn post_execute(&self, _success: bool, _table: &TableRef) {}
    }

    let snapshot = Snapshot::new(vec![vnode(0, 10, 0, 1)], true, 5_000);
    let config = RepairConfig::new(100_000, 200_000, 300_000, -1);
    let cache = Arc::new(
        RepairStateCache::with_refresh_interval(Arc::new(StaticFactory(snapshot)), Duration::from_secs(3_600))
            .unwrap(),
    );

    let job = TableRepairJob::new(
        1,
        TableRef::new("ks", "wide_table"),
        config,
        cache,
        Arc::new(ZeroStorage),
        Arc::new(Gate(AtomicBool::new(false))),
        collaborators(),
    );

    // Far past every time-based threshold, but still Blocked because the
    // table can repair (priority != -1) and the scheduler gate reports
    // not-runnable.
    assert_eq!(job.status(1_000_000).unwrap(), JobStatus::Blocked);
}
