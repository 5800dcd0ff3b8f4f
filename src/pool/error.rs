use thiserror::Error;

/// Errors surfaced by the pool's coordination logic (acquisition, release, shutdown,
/// construction). Driver-level failures are folded in as `ConnectorFailure`, carrying the
/// underlying error's message rather than the error itself, so `PoolError` stays `Clone` and
/// does not need a type parameter tied to the connector's associated error type.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    /// `acquire` was called after `shutdown` began.
    #[error("pool is shut down")]
    PoolShutdown,

    /// `Connector::open` (or a `Session` operation invoked during growth/retirement/expiry)
    /// failed. Propagated from `acquire`; logged and swallowed when encountered while
    /// refilling during release or the expiry sweep.
    #[error("connector failed: {0}")]
    ConnectorFailure(String),

    /// `release` was called with a handle this pool did not produce.
    #[error("handle does not belong to this pool")]
    ForeignHandle,

    /// An operation was attempted on a lease after it was closed.
    #[error("handle is closed")]
    HandleClosed,

    /// An invalid construction parameter.
    #[error("invalid argument {field}: {reason}")]
    IllegalArgument { field: &'static str, reason: String },

    /// Retained for taxonomy completeness; unreachable in practice because `Pool::new` takes
    /// its connector by value (`C: Connector`), which Rust's type system will not let be
    /// absent the way a nullable reference could be.
    #[error("connector must not be null")]
    NullArgument,
}
