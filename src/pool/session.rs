// # Session
//
// The minimal control surface the pool needs from a backing database session: the
// transactional-hygiene operations it relies on to hand out and reclaim connections safely.
// Everything else about the session (query execution, statements, cursors) is opaque to the
// pool and reached through `LeaseHandle::get()`.

use std::time::Instant;

use async_trait::async_trait;

use crate::error::Result;

/// Transaction-isolation level a session can be placed at.
///
/// Mirrors the levels the SQL standard defines; a driver's `IsolationPolicy` maps these onto
/// whatever vendor-specific statement or API call sets the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// The control surface a backing session must expose so the pool can manage it generically.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// True if the session is currently in auto-commit mode.
    async fn is_autocommit(&self) -> Result<bool>;

    /// Enable or disable auto-commit.
    async fn set_autocommit(&self, enabled: bool) -> Result<()>;

    /// Roll back any open transaction. A no-op if there is none.
    async fn rollback(&self) -> Result<()>;

    /// Read the session's current transaction-isolation level.
    async fn isolation_level(&self) -> Result<IsolationLevel>;

    /// Set the session's transaction-isolation level.
    async fn set_isolation_level(&self, level: IsolationLevel) -> Result<()>;

    /// Close the underlying connection. Called by the pool only while its monitor is held,
    /// during expiry, retirement, or shutdown.
    async fn close(self) -> Result<()>;
}

/// A session tracked by the pool, tagged with an identity and lifecycle bookkeeping.
///
/// Rust collections have no stable reference-identity key, so each slot is assigned a
/// monotonically increasing integer id at creation instead. The session value itself lives
/// here, moved between the pool's idle queue and an outstanding `LeaseHandle` - never aliased
/// between them.
pub(crate) struct Slot<S> {
    pub(crate) id: u64,
    pub(crate) session: S,
    pub(crate) created_at: Instant,
    pub(crate) lease_count: u64,
}

impl<S> Slot<S> {
    pub(crate) fn new(id: u64, session: S) -> Self {
        Self {
            id,
            session,
            created_at: Instant::now(),
            lease_count: 0,
        }
    }

    pub(crate) fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}
