// # Mock connector and session
//
// An in-memory `Connector`/`Session` pair for exercising the pool without a real driver.
// Shared between this crate's own tests and `tests/pool_integration.rs`; exposed to
// downstream crates under the `test-support` feature for the same reason.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DbError, Result};
use crate::pool::connector::Connector;
use crate::pool::session::{IsolationLevel, Session};

/// Opens [`MockSession`]s, optionally configured to fail on demand.
pub struct MockConnector {
    next_id: AtomicU64,
    opened: AtomicU64,
    fail_open: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            fail_open: AtomicBool::new(false),
        }
    }

    /// Total sessions successfully opened over this connector's lifetime.
    pub fn opened_count(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Make every subsequent `open` call fail until turned off again.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(DbError::Connector("mock connector configured to fail".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(MockSession::new(id))
    }
}

struct MockSessionState {
    autocommit: bool,
    isolation: IsolationLevel,
    closed: bool,
    rollback_count: u64,
}

/// A session with no backing connection at all; every operation just mutates an in-memory
/// state struct, so tests can assert on exactly what the pool did to it.
pub struct MockSession {
    id: u64,
    state: Mutex<MockSessionState>,
}

impl MockSession {
    fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(MockSessionState {
                autocommit: false,
                isolation: IsolationLevel::ReadCommitted,
                closed: false,
                rollback_count: 0,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// How many times `rollback` has been called on this session.
    pub fn rollback_count(&self) -> u64 {
        self.state.lock().rollback_count
    }

    /// True once `close` has consumed this session.
    pub fn was_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Session for MockSession {
    async fn is_autocommit(&self) -> Result<bool> {
        Ok(self.state.lock().autocommit)
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.state.lock().autocommit = enabled;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.state.lock().rollback_count += 1;
        Ok(())
    }

    async fn isolation_level(&self) -> Result<IsolationLevel> {
        Ok(self.state.lock().isolation)
    }

    async fn set_isolation_level(&self, level: IsolationLevel) -> Result<()> {
        self.state.lock().isolation = level;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

/// Convenience: a `MockConnector` already wrapped for sharing with a test's assertions, since
/// `Pool::new` takes the connector by value.
pub fn shared_connector() -> Arc<MockConnector> {
    Arc::new(MockConnector::new())
}

#[async_trait]
impl Connector for Arc<MockConnector> {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession> {
        MockConnector::open(self).await
    }
}
