//! Configuration for tracing behavior.

use std::time::Duration;

/// Switches controlling which driver operations are traced.
///
/// Every flag defaults to `false`; [`TraceOptions::all`] turns everything on.
///
/// # Example
///
/// ```rust
/// use sql_driver_tracing::TraceOptions;
///
/// let options = TraceOptions::default()
///     .with_allow_root(true)
///     .with_query(true)
///     .with_transaction(true);
/// assert!(options.query);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOptions {
    /// Allow spans without a parent span in the inbound context.
    /// Without a context on most calls this produces many single-span traces.
    pub allow_root: bool,

    /// Open a long-lived span covering each transaction until commit or rollback.
    pub transaction: bool,

    /// Trace `Ping` calls.
    pub ping: bool,

    /// Trace every `Rows::next` call.
    pub rows_next: bool,

    /// Trace `Rows::close` calls.
    pub rows_close: bool,

    /// Trace `ExecResult::rows_affected` calls.
    pub rows_affected: bool,

    /// Trace `ExecResult::last_insert_id` calls.
    pub last_insert_id: bool,

    /// Include the SQL text in spans.
    ///
    /// **Security Warning**: queries may embed credentials or PII.
    pub query: bool,

    /// Include query parameters in spans. Ignored unless `query` is set.
    ///
    /// **Security Warning**: parameters usually carry user input.
    pub query_params: bool,

    /// Operations taking at least this long are flagged `slow_query` and logged at WARN.
    pub slow_query_threshold: Option<Duration>,
}

impl TraceOptions {
    /// Create options with every category disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every category enabled, including root spans and parameter capture.
    ///
    /// **Warning**: do not use in production as it records all SQL and parameters.
    pub fn all() -> Self {
        Self {
            allow_root: true,
            transaction: true,
            ping: true,
            rows_next: true,
            rows_close: true,
            rows_affected: true,
            last_insert_id: true,
            query: true,
            query_params: true,
            slow_query_threshold: None,
        }
    }

    pub fn with_allow_root(mut self, enabled: bool) -> Self {
        self.allow_root = enabled;
        self
    }

    pub fn with_transaction(mut self, enabled: bool) -> Self {
        self.transaction = enabled;
        self
    }

    pub fn with_ping(mut self, enabled: bool) -> Self {
        self.ping = enabled;
        self
    }

    pub fn with_rows_next(mut self, enabled: bool) -> Self {
        self.rows_next = enabled;
        self
    }

    pub fn with_rows_close(mut self, enabled: bool) -> Self {
        self.rows_close = enabled;
        self
    }

    pub fn with_rows_affected(mut self, enabled: bool) -> Self {
        self.rows_affected = enabled;
        self
    }

    pub fn with_last_insert_id(mut self, enabled: bool) -> Self {
        self.last_insert_id = enabled;
        self
    }

    /// Enable or disable SQL text capture.
    pub fn with_query(mut self, enabled: bool) -> Self {
        self.query = enabled;
        self
    }

    /// Enable or disable parameter capture.
    pub fn with_query_params(mut self, enabled: bool) -> Self {
        self.query_params = enabled;
        self
    }

    /// Set the threshold for slow query warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// The effective options: parameter capture is dropped when query
    /// capture is off, since parameters without their query mean nothing.
    pub fn normalized(mut self) -> Self {
        if self.query_params && !self.query {
            self.query_params = false;
        }
        self
    }
}
