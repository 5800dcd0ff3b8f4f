use thiserror::Error;

/// Crate-wide error for driver-level failures: anything a [`crate::pool::Connector`] or
/// [`crate::pool::Session`] implementation can fail with.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session error: {0}")]
    Session(String),

    #[error("connector error: {0}")]
    Connector(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
