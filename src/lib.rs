//! # sql-driver-tracing
//!
//! Tracing instrumentation for pluggable SQL drivers.
//!
//! This crate wraps any implementation of the [`driver`] contract and emits a
//! `tracing` span around every driver operation, without changing what the
//! driver does or which optional capabilities it exposes.
//!
//! ## Features
//!
//! - **Capability Preserving**: A wrapped connection, statement or cursor
//!   answers every `as_*` capability probe exactly as the wrapped object
//!   does, so frameworks keep choosing the same code paths
//! - **Proper Span Nesting**: Spans are children of the span carried by the
//!   inbound [`Context`]; root spans are opt-in via `allow_root`
//! - **SQL Visibility**: Optionally include the SQL text and its parameters
//! - **Status Mapping**: Driver errors map onto a fixed status taxonomy
//!   (`NOT_FOUND`, `CANCELLED`, `FAILED_PRECONDITION`, ...)
//! - **Transaction Spans**: An optional span covering each transaction from
//!   begin to commit or rollback
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sql_driver_tracing::{Context, TraceOptions, TracingExt};
//!
//! let driver = MyDriver::new().with_tracing_config(TraceOptions::all());
//! let conn = driver.open("postgres://localhost/mydb").await?;
//!
//! if let Some(q) = conn.as_queryer_context() {
//!     let rows = q.query_context(&Context::current(), "SELECT 1", &[]).await?;
//! }
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `sql.query` | SQL text (when `query` is enabled) |
//! | `db.operation` | SQL operation (SELECT, INSERT, ...) |
//! | `db.sql.table` | Target table name (when detectable) |
//! | `sql.status` | Status code from the taxonomy |
//! | `otel.status_code` | "OK" or "ERROR" |
//! | `otel.status_description` | Error details (on failure) |
//! | `sqltrace.warning` | Missing upstream context or deprecated driver |
//!
//! Query parameters are emitted as `sql.arg` DEBUG events on the span, one
//! per parameter, with `key` and `value` fields.

mod attributes;
mod compose;
mod config;
mod connection;
mod context;
pub mod driver;
mod error;
mod metrics;
mod parser;
mod registry;
mod result;
mod rows;
mod span;
mod statement;
mod status;
mod transaction;

pub use attributes::{named_args, positional_args, Attribute, AttributeValue, MAX_ARG_LEN};
pub use config::TraceOptions;
pub use connection::{wrap, TracedDriver, TracingExt};
pub use context::Context;
pub use error::{DriverError, RegistryError, Result};
pub use metrics::{LoggingMetrics, MetricsSink, NoopMetrics};
pub use parser::{QuerySummary, SqlOperation};
pub use registry::{Registry, MAX_SLOTS};
pub use status::{Status, StatusCode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::driver::{
        Conn, ConnBeginTx, ConnPrepareContext, Driver, ExecResult, Execer, ExecerContext,
        NamedValue, Pinger, Queryer, QueryerContext, Rows, Stmt, StmtExecContext,
        StmtQueryContext, Tx, TxOptions, Value,
    };
    pub use crate::{Context, Registry, TraceOptions, TracedDriver, TracingExt};
}
