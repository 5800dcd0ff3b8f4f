// # Lease handles
//
// `LeaseHandle` is what `acquire` hands back: a capability to use one session, not the
// session itself. Its slot lives behind a `tokio::sync::Mutex` rather than a sync one because
// the session may need to be reached while the guard is held across an `.await` (see `get`).
// `SubHandle` lets a caller derive a narrower capability (a statement, a cursor) from a lease
// without ever exposing the underlying session; it shares the parent's open/closed state by
// holding the same `Arc<LeaseInner<C>>` rather than tracking its own.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard};

use crate::pool::connector::Connector;
use crate::pool::coordinator::{self, PoolInner};
use crate::pool::error::PoolError;
use crate::pool::session::{Session, Slot};

pub(crate) struct LeaseInner<C: Connector> {
    pool: Arc<PoolInner<C>>,
    lease_id: u64,
    slot: Mutex<Option<Slot<C::Session>>>,
    closed: AtomicBool,
    started: Instant,
    /// Captured once at acquisition, purely for the double-release diagnostic in `close`; the
    /// source spec calls for "the thread identity and captured stack at acquisition" to be
    /// available when a second release needs explaining. `Backtrace::capture()` is a no-op
    /// (`Backtrace::disabled()`) unless `RUST_BACKTRACE` is set, same as anywhere else.
    acquired_by: ThreadId,
    acquired_at_stack: std::backtrace::Backtrace,
}

/// Thread identity captured at acquisition, named to match the field it lives in rather than
/// `std::thread::ThreadId` directly (that type has no `Display`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ThreadId(std::thread::ThreadId);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl<C: Connector> Drop for LeaseInner<C> {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            tracing::warn!(
                lease_id = self.lease_id,
                "lease dropped without being released; its session will not return to the pool"
            );
        }
    }
}

/// A capability to use one leased session.
///
/// Obtained from [`crate::pool::Pool::acquire`] and [`crate::pool::Pool::acquire_timeout`],
/// consumed by [`crate::pool::Pool::release`]. Never exposes the backing session by value or
/// reference outside [`LeaseHandle::get`]'s guard, and that guard cannot outlive the lease.
pub struct LeaseHandle<C: Connector> {
    inner: Arc<LeaseInner<C>>,
}

impl<C: Connector> LeaseHandle<C> {
    pub(crate) fn new(
        pool: Arc<PoolInner<C>>,
        lease_id: u64,
        slot: Slot<C::Session>,
        started: Instant,
    ) -> Self {
        Self {
            inner: Arc::new(LeaseInner {
                pool,
                lease_id,
                slot: Mutex::new(Some(slot)),
                closed: AtomicBool::new(false),
                started,
                acquired_by: ThreadId(std::thread::current().id()),
                acquired_at_stack: std::backtrace::Backtrace::capture(),
            }),
        }
    }

    pub(crate) fn pool(&self) -> &Arc<PoolInner<C>> {
        &self.inner.pool
    }

    /// Lock the slot for the coordinator's post-handout checks (`finalize_acquire`), before
    /// the handle has been returned to the caller and so before it could possibly be closed.
    pub(crate) async fn slot_for_finalize(&self) -> MutexGuard<'_, Option<Slot<C::Session>>> {
        self.inner.slot.lock().await
    }

    /// Tear a handle down that failed its post-handout checks, returning its slot to the
    /// coordinator for cleanup instead of the idle queue.
    pub(crate) async fn abandon(self) -> (u64, Slot<C::Session>) {
        self.inner.closed.store(true, Ordering::Release);
        let slot = self
            .inner
            .slot
            .lock()
            .await
            .take()
            .expect("a handle not yet closed always still holds its slot");
        (self.inner.lease_id, slot)
    }

    /// True once this lease has been released (or discarded after a failed handout).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// How long this lease has been outstanding.
    pub fn lease_duration(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Borrow the backing session. Fails with [`PoolError::HandleClosed`] once the lease has
    /// been released.
    pub async fn get(&self) -> Result<SessionGuard<'_, C::Session>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::HandleClosed);
        }
        let guard = self.inner.slot.lock().await;
        if guard.is_none() {
            return Err(PoolError::HandleClosed);
        }
        Ok(SessionGuard { guard })
    }

    /// Derive a narrower capability over `value` that shares this lease's lifecycle: closing
    /// the parent lease closes every `SubHandle` derived from it, and a `SubHandle` cannot be
    /// released on its own.
    pub fn wrap<T: Send + Sync + 'static>(&self, value: T) -> SubHandle<C, T> {
        SubHandle {
            parent: Arc::clone(&self.inner),
            value,
        }
    }

    /// Release this lease: reassert auto-commit off, roll back any open transaction, and
    /// return the session to the pool (or retire it, per [`crate::pool::PoolConfig`]).
    ///
    /// A second call is a logic error in the caller, so it is logged with a captured
    /// backtrace rather than silently ignored or panicking.
    pub(crate) async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                lease_id = self.inner.lease_id,
                acquired_by = %self.inner.acquired_by,
                acquired_at_stack = %self.inner.acquired_at_stack,
                "lease released more than once"
            );
            return;
        }

        let slot = self.inner.slot.lock().await.take();
        let Some(slot) = slot else {
            return;
        };

        if let Err(e) = reassert_clean(&slot.session).await {
            tracing::warn!(
                lease_id = self.inner.lease_id,
                error = %e,
                "failed to reset session state on release; returning it to the pool anyway"
            );
        }

        coordinator::release_slot(&self.inner.pool, self.inner.lease_id, slot, self.inner.started).await;
    }
}

/// Roll back any open transaction, then reassert auto-commit is off - the state a `Connector`
/// promises to hand out, and the state every lease is expected to return in.
async fn reassert_clean<S: Session>(session: &S) -> crate::error::Result<()> {
    if !session.is_autocommit().await? {
        session.rollback().await?;
    }
    session.set_autocommit(false).await?;
    Ok(())
}

/// Guard returned by [`LeaseHandle::get`]; dereferences to the backing session for the
/// duration of the borrow.
pub struct SessionGuard<'a, S> {
    guard: MutexGuard<'a, Option<Slot<S>>>,
}

impl<'a, S> Deref for SessionGuard<'a, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self
            .guard
            .as_ref()
            .expect("SessionGuard only exists while the lease holds its slot")
            .session
    }
}

/// A capability derived from a [`LeaseHandle`] over some caller-defined value `T` (a prepared
/// statement, a cursor). Shares its parent lease's open/closed state and cannot be released
/// independently of it.
pub struct SubHandle<C: Connector, T> {
    parent: Arc<LeaseInner<C>>,
    value: T,
}

impl<C: Connector, T> SubHandle<C, T> {
    /// The owning `LeaseHandle`, so a caller asking a sub-handle for its backing session gets
    /// routed back to the parent rather than reaching the raw session directly.
    pub fn parent(&self) -> LeaseHandle<C> {
        LeaseHandle {
            inner: Arc::clone(&self.parent),
        }
    }

    /// True once the parent lease has been released.
    pub fn is_closed(&self) -> bool {
        self.parent.closed.load(Ordering::Acquire)
    }

    /// Borrow the wrapped value. Fails with [`PoolError::HandleClosed`] once the parent lease
    /// has been released, same as the parent's own [`LeaseHandle::get`].
    pub fn get(&self) -> Result<&T, PoolError> {
        if self.is_closed() {
            Err(PoolError::HandleClosed)
        } else {
            Ok(&self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::mock::shared_connector;
    use crate::pool::{Pool, PoolConfig};

    #[tokio::test]
    async fn sub_handle_shares_parent_lifecycle() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();

        let lease = pool.acquire().await.unwrap();
        let sub = lease.wrap(42u32);
        assert!(!sub.is_closed());
        assert_eq!(*sub.get().unwrap(), 42);

        let parent = sub.parent();
        assert!(!parent.is_closed());
        assert_eq!(parent.get().await.unwrap().id(), lease.get().await.unwrap().id());

        pool.release(Some(lease)).await.unwrap();

        assert!(sub.is_closed(), "sub-handle must observe the parent's close");
        assert!(sub.get().is_err(), "sub-handle must reject access once the parent is closed");
        assert!(parent.is_closed(), "parent() must return a handle sharing the same lifecycle");
    }

    #[tokio::test]
    async fn double_release_is_idempotent() {
        let connector = shared_connector();
        let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
        let pool = Pool::new(config, connector, None).await.unwrap();

        let lease = pool.acquire().await.unwrap();
        lease.close().await;
        assert!(lease.is_closed());
        lease.close().await;
        assert!(lease.is_closed(), "a second close must remain a no-op, not panic");
    }
}
