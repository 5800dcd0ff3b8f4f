// # Pool coordinator
//
// The coordinator: owns every session the pool manages, the available queue, the leased set,
// every counter, and the shutdown flag - all behind one `tokio::sync::Mutex`. A
// `tokio::sync::Mutex` guard may be held across an `.await`, which is what lets growth
// (opening a session) and retirement/expiry (closing a session) happen under that single
// monitor without a second lock or an actor rewrite.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::pool::connector::Connector;
use crate::pool::error::PoolError;
use crate::pool::config::PoolConfig;
use crate::pool::isolation::IsolationPolicy;
use crate::pool::lease::LeaseHandle;
use crate::pool::session::Slot;
use crate::pool::stats::{Counters, PoolStats};
use crate::pool::sweeper;

/// How long `acquire` is willing to wait for a session.
///
/// An explicit enum rather than a signed duration, since `std::time::Duration` cannot
/// represent "wait indefinitely" or "don't wait" as sentinel values the way a signed number
/// could.
#[derive(Debug, Clone, Copy)]
pub enum MaxWait {
    /// Wait until a session is available or the pool shuts down.
    Indefinite,
    /// Do not wait; fail fast if no session is immediately available.
    None,
    /// Wait at most this long.
    Bounded(Duration),
}

/// How long a blocked acquirer or the sweeper sleeps between state rechecks, even absent a
/// notification. Bounds how late a timed-out `acquire` can return and how promptly a shut-down
/// pool wakes its sweeper.
pub(crate) const WAIT_CHUNK: Duration = Duration::from_millis(250);

/// `WAIT_CHUNK`, jittered by up to +/-20%. `Pool::shutdown` and a release both call
/// `Notify::notify_waiters()`, which wakes every blocked acquirer at once; without jitter they
/// all re-poll the monitor on the same cadence afterward. Same randomness idiom the teacher
/// codebase uses for its own load-balancing (`rand::thread_rng().gen_range`).
fn jittered_wait_chunk() -> Duration {
    use rand::Rng;
    let millis = WAIT_CHUNK.as_millis() as i64;
    let spread = millis / 5;
    let delta = rand::thread_rng().gen_range(-spread..=spread);
    Duration::from_millis((millis + delta).max(1) as u64)
}

pub(crate) struct PoolState<S> {
    pub(crate) idle: VecDeque<Slot<S>>,
    pub(crate) all_ids: HashSet<u64>,
    pub(crate) leased: HashMap<u64, Instant>,
    pub(crate) shutdown: bool,
    pub(crate) next_session_id: u64,
    pub(crate) next_lease_id: u64,
    pub(crate) counters: Counters,
}

impl<S> PoolState<S> {
    fn alloc_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    fn alloc_lease_id(&mut self) -> u64 {
        let id = self.next_lease_id;
        self.next_lease_id += 1;
        id
    }
}

pub(crate) struct PoolInner<C: Connector> {
    pub(crate) connector: C,
    pub(crate) isolation: Option<Box<dyn IsolationPolicy<C::Session>>>,
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState<C::Session>>,
    pub(crate) notify: Notify,
    pub(crate) shutdown_notify: Notify,
    pub(crate) shutdown_flag: AtomicBool,
    pub(crate) sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// A bounded, thread-safe cache of long-lived database sessions.
///
/// Cloning a `Pool` is cheap (it clones an `Arc`) and all clones refer to the same underlying
/// coordinator.
pub struct Pool<C: Connector> {
    pub(crate) inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Pool<C> {
    /// Construct a pool, eagerly opening `config.min_size` sessions.
    ///
    /// If a minimum can't be reached because the connector fails, construction fails with
    /// the connector's error rather than returning a pool that silently starts below its
    /// configured floor.
    pub async fn new(
        config: PoolConfig,
        connector: C,
        isolation: Option<Box<dyn IsolationPolicy<C::Session>>>,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let mut idle = VecDeque::with_capacity(config.min_size);
        let mut all_ids = HashSet::with_capacity(config.min_size);
        let mut next_session_id = 0u64;
        for _ in 0..config.min_size {
            let session = connector
                .open()
                .await
                .map_err(|e| PoolError::ConnectorFailure(e.to_string()))?;
            let id = next_session_id;
            next_session_id += 1;
            all_ids.insert(id);
            idle.push_back(Slot::new(id, session));
        }

        let state = PoolState {
            idle,
            all_ids,
            leased: HashMap::new(),
            shutdown: false,
            next_session_id,
            next_lease_id: 0,
            counters: Counters::default(),
        };

        let inner = Arc::new(PoolInner {
            connector,
            isolation,
            config,
            state: Mutex::new(state),
            notify: Notify::new(),
            shutdown_notify: Notify::new(),
            shutdown_flag: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        });

        if let Some(expire_after) = inner.config.expire_after {
            let handle = tokio::spawn(sweeper::run(Arc::clone(&inner), expire_after));
            *inner.sweeper.lock().await = Some(handle);
        }

        tracing::info!(
            min_size = inner.config.min_size,
            max_size = inner.config.max_size,
            "pool constructed"
        );

        Ok(Self { inner })
    }

    /// Acquire a session, waiting indefinitely if none is immediately available.
    pub async fn acquire(&self) -> Result<LeaseHandle<C>, PoolError> {
        match self.acquire_timeout(MaxWait::Indefinite).await? {
            Some(handle) => Ok(handle),
            None => unreachable!("MaxWait::Indefinite never returns None"),
        }
    }

    /// Acquire a session, bounding how long to wait. Returns `Ok(None)` on timeout rather than
    /// a distinct error, so callers compose naturally with `if let Some(handle) = ...`.
    pub async fn acquire_timeout(
        &self,
        max_wait: MaxWait,
    ) -> Result<Option<LeaseHandle<C>>, PoolError> {
        let start = Instant::now();
        let deadline = match max_wait {
            MaxWait::Bounded(d) => Some(start + d),
            _ => None,
        };

        loop {
            {
                let mut state = self.inner.state.lock().await;
                if state.shutdown {
                    return Err(PoolError::PoolShutdown);
                }

                if let Some(expire_after) = self.inner.config.expire_after {
                    expire_and_refill(&self.inner, &mut state, expire_after).await?;
                }

                if let Some(slot) = state.idle.pop_front() {
                    let handle = self.grant(&mut state, slot, start);
                    drop(state);
                    return self.finalize_acquire(handle).await.map(Some);
                }

                if state.all_ids.len() < self.inner.config.max_size {
                    match self.inner.connector.open().await {
                        Ok(session) => {
                            let id = state.alloc_session_id();
                            state.all_ids.insert(id);
                            let slot = Slot::new(id, session);
                            let handle = self.grant(&mut state, slot, start);
                            drop(state);
                            return self.finalize_acquire(handle).await.map(Some);
                        }
                        Err(e) => return Err(PoolError::ConnectorFailure(e.to_string())),
                    }
                }

                if matches!(max_wait, MaxWait::None) {
                    return Ok(None);
                }
            }

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                let chunk = (deadline - now).min(jittered_wait_chunk());
                let _ = tokio::time::timeout(chunk, self.inner.notify.notified()).await;
            } else {
                let _ = tokio::time::timeout(jittered_wait_chunk(), self.inner.notify.notified()).await;
            }
        }
    }

    /// Grant `slot` to a fresh lease, updating counters. Called with `state` already locked.
    fn grant(
        &self,
        state: &mut PoolState<C::Session>,
        mut slot: Slot<C::Session>,
        start: Instant,
    ) -> LeaseHandle<C> {
        slot.lease_count += 1;
        let lease_id = state.alloc_lease_id();
        let now = Instant::now();

        state.leased.insert(lease_id, now);
        state.counters.total_leases += 1;
        state.counters.acquire_samples += 1;
        state.counters.cum_leased_count += state.leased.len() as u64;
        let acquire_time = start.elapsed();
        state.counters.cum_acquire += acquire_time;
        if acquire_time > state.counters.greatest_acquire {
            state.counters.greatest_acquire = acquire_time;
        }
        state.counters.last_acquire = Some(now);
        if state.leased.len() > state.counters.peak_leased {
            state.counters.peak_leased = state.leased.len();
        }
        if state.all_ids.len() > state.counters.peak_pool_size {
            state.counters.peak_pool_size = state.all_ids.len();
        }

        LeaseHandle::new(Arc::clone(&self.inner), lease_id, slot, now)
    }

    /// Outside the monitor: assert auto-commit off and apply the isolation policy. On
    /// failure the session is discarded rather than handed to the caller in an unknown state.
    async fn finalize_acquire(&self, handle: LeaseHandle<C>) -> Result<LeaseHandle<C>, PoolError> {
        let result = async {
            let mut guard = handle.slot_for_finalize().await;
            let slot = guard.as_mut().expect("freshly granted handle always holds its slot");
            match slot.session.is_autocommit().await {
                Ok(true) => slot
                    .session
                    .set_autocommit(false)
                    .await
                    .map_err(|e| PoolError::ConnectorFailure(e.to_string())),
                Ok(false) => Ok(()),
                Err(e) => Err(PoolError::ConnectorFailure(e.to_string())),
            }?;
            if let Some(policy) = &self.inner.isolation {
                policy
                    .apply(&slot.session)
                    .await
                    .map_err(|e| PoolError::ConnectorFailure(e.to_string()))?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => Ok(handle),
            Err(e) => {
                self.discard_failed_handout(handle).await;
                Err(e)
            }
        }
    }

    /// A session failed its post-handout checks; close it and drop it from `all_ids` instead
    /// of returning it to the caller or the idle queue.
    async fn discard_failed_handout(&self, handle: LeaseHandle<C>) {
        let (lease_id, slot) = handle.abandon().await;
        let mut state = self.inner.state.lock().await;
        state.leased.remove(&lease_id);
        state.all_ids.remove(&slot.id);
        drop(state);
        if let Err(e) = slot.session.close().await {
            tracing::warn!(error = %e, "failed to close session that failed post-handout checks");
        }
        self.inner.notify.notify_waiters();
    }

    /// Release a handle back to the pool. `None` is a no-op, matching scoped-cleanup call
    /// sites that always call `release` regardless of whether they actually acquired one.
    pub async fn release(&self, handle: Option<LeaseHandle<C>>) -> Result<(), PoolError> {
        let Some(handle) = handle else {
            return Ok(());
        };
        if !Arc::ptr_eq(handle.pool(), &self.inner) {
            return Err(PoolError::ForeignHandle);
        }
        handle.close().await;
        Ok(())
    }

    /// Point-in-time, internally-consistent snapshot of the pool's counters and collections.
    pub async fn statistics(&self) -> PoolStats {
        let state = self.inner.state.lock().await;
        let c = &state.counters;
        let now = Instant::now();

        let in_flight: Vec<Duration> = state.leased.values().map(|t| now.duration_since(*t)).collect();

        PoolStats {
            minimum_size: self.inner.config.min_size,
            maximum_size: self.inner.config.max_size,
            current_pool_size: state.all_ids.len(),
            available_connections: state.idle.len(),
            outstanding_leases: state.leased.len(),
            greatest_pool_size: c.peak_pool_size,
            greatest_leased_count: c.peak_leased,
            average_leased_count: if c.acquire_samples > 0 {
                c.cum_leased_count as f64 / c.acquire_samples as f64
            } else {
                0.0
            },
            expired_connections: self.inner.config.expire_after.map(|_| c.expired),
            retired_connections: self.inner.config.retire_after.map(|_| c.retired),
            expire_time_ms: self.inner.config.expire_after.map(|d| d.as_millis() as u64),
            retire_limit: self.inner.config.retire_after,
            lifetime_lease_count: c.total_leases,
            greatest_acquire_time_ms: if c.acquire_samples > 0 {
                Some(c.greatest_acquire.as_millis() as u64)
            } else {
                None
            },
            average_acquire_time_ms: if c.acquire_samples > 0 {
                Some(c.cum_acquire.as_secs_f64() * 1000.0 / c.acquire_samples as f64)
            } else {
                None
            },
            greatest_lease_time_ms: if c.lease_samples > 0 {
                Some(c.greatest_lease.as_millis() as u64)
            } else {
                None
            },
            average_lease_time_ms: if c.lease_samples > 0 {
                Some(c.cum_lease.as_secs_f64() * 1000.0 / c.lease_samples as f64)
            } else {
                None
            },
            greatest_outstanding_lease_time_ms: in_flight.iter().max().map(|d| d.as_millis() as u64),
            average_outstanding_lease_time_ms: if in_flight.is_empty() {
                None
            } else {
                Some(in_flight.iter().sum::<Duration>().as_secs_f64() * 1000.0 / in_flight.len() as f64)
            },
            idle_time_ms: c.last_acquire.map(|t| now.duration_since(t).as_millis() as u64),
        }
    }

    /// Fast, non-blocking check of the shutdown flag.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown_flag.load(Ordering::Acquire)
    }

    /// Begin a one-way shutdown: fail new acquires immediately, wait for outstanding leases
    /// to return, close every idle session, and join the sweeper.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.inner.shutdown_flag.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
        self.inner.shutdown_notify.notify_waiters();

        tracing::info!("pool shutdown requested, waiting for outstanding leases");

        loop {
            let state = self.inner.state.lock().await;
            if state.leased.is_empty() {
                break;
            }
            drop(state);
            let _ = tokio::time::timeout(jittered_wait_chunk(), self.inner.notify.notified()).await;
        }

        let mut state = self.inner.state.lock().await;
        while let Some(slot) = state.idle.pop_front() {
            if let Err(e) = slot.session.close().await {
                tracing::warn!(error = %e, "failed to close session during shutdown");
            }
        }
        state.all_ids.clear();
        drop(state);

        if let Some(handle) = self.inner.sweeper.lock().await.take() {
            let _ = handle.await;
        }

        tracing::info!("pool shutdown complete");
    }
}

/// Shared by the inline expiration pass (during `acquire`) and the background sweeper: walk
/// `idle`, close and drop anything too old, then refill up to `min_size`.
pub(crate) async fn expire_and_refill<C: Connector>(
    inner: &Arc<PoolInner<C>>,
    state: &mut PoolState<C::Session>,
    expire_after: Duration,
) -> Result<(), PoolError> {
    let mut i = 0;
    while i < state.idle.len() {
        if state.idle[i].age() > expire_after {
            let slot = state.idle.remove(i).expect("index in bounds");
            state.all_ids.remove(&slot.id);
            state.counters.expired += 1;
            if let Err(e) = slot.session.close().await {
                tracing::warn!(error = %e, "failed to close expired session");
            }
        } else {
            i += 1;
        }
    }

    while state.all_ids.len() < inner.config.min_size {
        match inner.connector.open().await {
            Ok(session) => {
                let id = state.alloc_session_id();
                state.all_ids.insert(id);
                state.idle.push_back(Slot::new(id, session));
            }
            Err(e) => return Err(PoolError::ConnectorFailure(e.to_string())),
        }
    }

    Ok(())
}

/// Release path shared between `LeaseHandle::close` and discarding a failed handout: decide
/// return-to-idle vs. retire-and-refill, update rolling lease-time statistics, and wake
/// waiters.
pub(crate) async fn release_slot<C: Connector>(
    inner: &Arc<PoolInner<C>>,
    lease_id: u64,
    slot: Slot<C::Session>,
    lease_started: Instant,
) {
    let mut state = inner.state.lock().await;
    state.leased.remove(&lease_id);

    // `retire_after` is the lease-count cap a session may *reach* before it is retired on
    // release, not a count it must exceed: retire_after=2 retires on the 2nd release, not the
    // 3rd (see DESIGN.md's resolution of the conflict between this and the boundary law's
    // "(N+1)-th release" phrasing).
    let retire = inner
        .config
        .retire_after
        .is_some_and(|limit| slot.lease_count >= limit);

    if retire {
        state.all_ids.remove(&slot.id);
        state.counters.retired += 1;
        if let Err(e) = slot.session.close().await {
            tracing::warn!(error = %e, "failed to close retired session");
        }
        if state.all_ids.len() < inner.config.min_size {
            match inner.connector.open().await {
                Ok(replacement) => {
                    let id = state.alloc_session_id();
                    state.all_ids.insert(id);
                    state.idle.push_back(Slot::new(id, replacement));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "refill after retirement failed; pool may run below min_size"
                    );
                }
            }
        }
    } else {
        state.idle.push_back(slot);
    }

    let lease_time = lease_started.elapsed();
    state.counters.completed_leases += 1;
    state.counters.cum_lease += lease_time;
    state.counters.lease_samples += 1;
    if lease_time > state.counters.greatest_lease {
        state.counters.greatest_lease = lease_time;
    }

    drop(state);
    inner.notify.notify_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::shared_connector;
    use crate::pool::PoolConfig;

    /// `|idle| + |leased| = |all_ids|` must hold after every acquire/release, not just at rest.
    async fn assert_invariant<C: Connector>(pool: &Pool<C>) {
        let state = pool.inner.state.lock().await;
        assert_eq!(
            state.idle.len() + state.leased.len(),
            state.all_ids.len(),
            "idle + leased must equal all_ids"
        );
    }

    #[tokio::test]
    async fn invariant_holds_across_acquire_and_release() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(1).max_size(3).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();
        assert_invariant(&pool).await;

        let a = pool.acquire().await.unwrap();
        assert_invariant(&pool).await;
        let b = pool.acquire().await.unwrap();
        assert_invariant(&pool).await;

        pool.release(Some(a)).await.unwrap();
        assert_invariant(&pool).await;
        pool.release(Some(b)).await.unwrap();
        assert_invariant(&pool).await;
    }

    #[tokio::test]
    async fn release_none_is_a_no_op() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();
        assert!(pool.release(None).await.is_ok());
    }

    #[tokio::test]
    async fn release_is_idempotent_after_first_close() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();

        let lease = pool.acquire().await.unwrap();
        lease.close().await;
        assert!(lease.is_closed());
        // A second release through the coordinator's own entry point must also be a no-op,
        // not an error or a double free of the slot.
        pool.release(Some(lease)).await.unwrap();
        assert_invariant(&pool).await;
    }

    #[tokio::test]
    async fn max_wait_none_returns_immediately_without_suspending() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();

        let _held = pool.acquire().await.unwrap();

        let start = Instant::now();
        let result = pool.acquire_timeout(MaxWait::None).await.unwrap();
        assert!(result.is_none(), "no slot is available and the pool is already at max_size");
        assert!(
            start.elapsed() < WAIT_CHUNK,
            "MaxWait::None must not suspend on the monitor at all"
        );
    }

    #[tokio::test]
    async fn foreign_handle_is_rejected() {
        let connector_a = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool_a = Pool::new(config.clone(), connector_a, None).await.unwrap();

        let connector_b = shared_connector();
        let pool_b = Pool::new(config, connector_b, None).await.unwrap();

        let lease = pool_a.acquire().await.unwrap();
        let result = pool_b.release(Some(lease)).await;
        assert!(matches!(result, Err(PoolError::ForeignHandle)));
    }
}
