// # Statistics
//
// `Counters` lives inside `PoolState` (see `coordinator.rs`) and is mutated under the same
// monitor as everything else, so a snapshot taken under that monitor is a pure function of
// consistent state - no separate atomics to keep in sync.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Mutable counters folded into the pool's monitor-guarded state.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) total_leases: u64,
    pub(crate) completed_leases: u64,
    pub(crate) expired: u64,
    pub(crate) retired: u64,
    pub(crate) cum_acquire: Duration,
    pub(crate) cum_lease: Duration,
    pub(crate) acquire_samples: u64,
    pub(crate) lease_samples: u64,
    pub(crate) peak_leased: usize,
    pub(crate) peak_pool_size: usize,
    pub(crate) cum_leased_count: u64,
    pub(crate) greatest_acquire: Duration,
    pub(crate) greatest_lease: Duration,
    pub(crate) last_acquire: Option<Instant>,
}

/// Immutable, point-in-time projection of a pool's state and counters.
///
/// Optional fields are `None` exactly when the corresponding feature is disabled or has not
/// yet happened - never conflated with a numeric zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured minimum pool size, in sessions.
    pub minimum_size: usize,
    /// Configured maximum pool size, in sessions.
    pub maximum_size: usize,
    /// Sessions currently managed by the pool (idle + leased), in sessions.
    pub current_pool_size: usize,
    /// Sessions currently idle, in sessions.
    pub available_connections: usize,
    /// Sessions currently leased, in leases.
    pub outstanding_leases: usize,
    /// Highest `current_pool_size` ever observed, in sessions.
    pub greatest_pool_size: usize,
    /// Highest `outstanding_leases` ever observed, in connections.
    pub greatest_leased_count: usize,
    /// Mean `outstanding_leases` sampled at each acquire, in connections.
    pub average_leased_count: f64,
    /// Cumulative sessions closed for exceeding `expire_after`, `None` if expiry is disabled.
    pub expired_connections: Option<u64>,
    /// Cumulative sessions closed for exceeding `retire_after`, `None` if retirement is
    /// disabled.
    pub retired_connections: Option<u64>,
    /// Configured age limit, in milliseconds; `None` if expiry is disabled.
    pub expire_time_ms: Option<u64>,
    /// Configured lease-count limit, in leases; `None` if retirement is disabled.
    pub retire_limit: Option<u64>,
    /// Cumulative leases granted over the pool's lifetime, in leases.
    pub lifetime_lease_count: u64,
    /// Longest acquisition wait observed, in milliseconds; `None` if no acquires yet.
    pub greatest_acquire_time_ms: Option<u64>,
    /// Mean acquisition wait, in milliseconds; `None` if no acquires yet.
    pub average_acquire_time_ms: Option<f64>,
    /// Longest completed lease duration observed, in milliseconds; `None` if none completed.
    pub greatest_lease_time_ms: Option<u64>,
    /// Mean completed lease duration, in milliseconds; `None` if none completed.
    pub average_lease_time_ms: Option<f64>,
    /// Longest in-flight (currently outstanding) lease duration, in milliseconds; `None` if
    /// nothing is outstanding.
    pub greatest_outstanding_lease_time_ms: Option<u64>,
    /// Mean in-flight lease duration, in milliseconds; `None` if nothing is outstanding.
    pub average_outstanding_lease_time_ms: Option<f64>,
    /// Time since the last acquire completed, in milliseconds; `None` if the pool has never
    /// granted a lease.
    pub idle_time_ms: Option<u64>,
}
