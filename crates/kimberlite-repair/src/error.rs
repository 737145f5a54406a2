//! Error types for the repair orchestrator core.
//!
//! Each module owns a narrow error enum (mirroring `kimberlite-cluster`'s
//! `Error` and `kimberlite-storage`'s per-module errors) rather than a
//! single monolithic type. [`RepairError`] aggregates the ones that can
//! cross module boundaries via `#[from]`.

use num_bigint::{BigInt, BigUint};
use thiserror::Error;

/// Errors from [`crate::token::TokenRing`] arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenRingError {
    /// `wrap_to_i64` was given a value lying more than one full ring
    /// rotation outside `[i64::MIN, i64::MAX]`. Should never happen given
    /// the invariants on `TokenRange`; surfaced as an error rather than a
    /// panic so callers can assert on it in tests.
    #[error("value {0} lies more than one full ring rotation outside the i64 range")]
    OutOfRing(BigInt),
}

/// Errors from [`crate::partition::RangePartitioner`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// The sum of emitted sub-range sizes did not equal the sum of input
    /// range sizes. Fatal to the partition call; never silently swallowed.
    #[error("partition post-condition violated: expected total size {expected}, got {actual}")]
    PartitionInvariant {
        /// Sum of input range sizes.
        expected: BigUint,
        /// Sum of emitted sub-range sizes.
        actual: BigUint,
    },

    /// A sub-range endpoint could not be reduced back onto the ring.
    #[error(transparent)]
    Ring(#[from] TokenRingError),
}

/// Errors from a [`crate::state::RepairState`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepairStateError {
    /// The collaborator backing this state (history query, topology
    /// lookup, JMX call) failed. Always absorbed and logged at the
    /// cache/worker boundary; the previous snapshot remains authoritative.
    #[error("repair state update failed: {0}")]
    UpdateFailed(String),
}

/// Errors from [`crate::cache::RepairStateCache`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache has been closed; no further entries can be loaded.
    #[error("repair state cache is closed")]
    Closed,

    /// The cache was constructed with an invalid configuration (for
    /// example, a zero refresh interval, which would spin the refresh
    /// worker). Surfaced at construction time; fatal, unlike `Closed`
    /// there is no valid cache left to recover into.
    #[error("repair state cache configuration is invalid: {0}")]
    Configuration(String),
}

/// Crate-level error aggregating every error that can surface from a
/// [`crate::job::TableRepairJob`] call, which spans the cache, the
/// partitioner, and state collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// See [`PartitionError`].
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// See [`TokenRingError`].
    #[error(transparent)]
    Ring(#[from] TokenRingError),

    /// See [`CacheError`].
    #[error(transparent)]
    Cache(#[from] CacheError),
}
