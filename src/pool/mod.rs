// # Connection pool
//
// A bounded, thread-safe cache of long-lived database sessions.
//
// - `connector`  - the abstract factory a backing driver implements to produce sessions
// - `session`    - the minimal control surface the pool needs from a session, plus internal
//                  slot bookkeeping
// - `isolation`  - optional transaction-isolation enforcement applied on handout
// - `config`     - pool sizing, expiry, and retirement configuration
// - `error`      - the pool's own error taxonomy (coordination failures, not driver failures)
// - `stats`      - the public statistics snapshot and the internal counters behind it
// - `lease`      - the handle a caller acquires, and the narrower handles derived from it
// - `coordinator`- the pool itself: the single monitor guarding acquisition, release,
//                  retirement, and shutdown
// - `sweeper`    - the background task that expires idle sessions on a timer
//
// `mock` is test-only scaffolding: an in-memory `Connector`/`Session` pair used by this
// crate's own tests and available to downstream crates under the `test-support` feature for
// theirs.

mod config;
mod connector;
mod coordinator;
mod error;
mod isolation;
mod lease;
mod session;
mod stats;
mod sweeper;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use connector::Connector;
pub use coordinator::{MaxWait, Pool};
pub use error::PoolError;
pub use isolation::{FixedIsolationPolicy, IsolationPolicy};
pub use lease::{LeaseHandle, SessionGuard, SubHandle};
pub use session::{IsolationLevel, Session};
pub use stats::PoolStats;
