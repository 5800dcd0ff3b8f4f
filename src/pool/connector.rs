// # Connector
//
// The abstract factory the pool uses to produce new backing sessions. This is the only
// seam where a concrete database driver enters the picture; everything else in `pool`
// is driver-agnostic.

use async_trait::async_trait;

use crate::error::Result;
use crate::pool::session::Session;

/// Opens fresh backing sessions on demand.
///
/// A session returned by `open` must be ready for work: no transaction active, auto-commit
/// disabled. Failures propagate unchanged to the caller of `acquire`, `release`, or the
/// expiry sweep.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The backing session type this connector produces.
    type Session: Session;

    /// Open a new session.
    async fn open(&self) -> Result<Self::Session>;
}
