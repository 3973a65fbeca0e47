//! Error types shared by drivers and the tracing decorators.

use thiserror::Error;

/// Result alias used throughout the driver contract.
pub type Result<T, E = DriverError> = std::result::Result<T, E>;

/// Errors a driver may return from any tier.
///
/// The named variants are sentinels with a fixed meaning to the calling
/// framework. They are matched by variant, never by message text.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The fast path is not supported; the framework should fall back to
    /// its slower generic path.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("sql: no rows in result set")]
    NoRows,

    #[error("sql: transaction has already been committed or rolled back")]
    TxDone,

    #[error("sql: connection is already closed")]
    ConnDone,

    /// Expected end of a row iteration.
    #[error("EOF")]
    EndOfRows,

    #[error("driver: bad connection")]
    BadConn,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl DriverError {
    /// Wrap an arbitrary driver-specific error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }

    /// Build an error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// Errors raised while registering a traced driver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("sql: unknown driver {0:?} (forgotten import?)")]
    UnknownDriver(String),

    #[error("sql: register called twice for driver {0}")]
    AlreadyRegistered(String),

    #[error("unable to register driver {base}, all {attempts} slots have been taken")]
    SlotsExhausted { base: String, attempts: usize },
}
