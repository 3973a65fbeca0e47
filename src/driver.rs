//! The pluggable driver contract.
//!
//! Each tier has a small required trait plus optional capability traits. A
//! driver advertises a capability by overriding the matching `as_*` probe;
//! the calling framework probes at runtime and falls back to the required
//! methods when a probe answers `None`.

use std::fmt;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;

/// A single parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    Bool(bool),
    /// Raw bytes, not necessarily UTF-8.
    Bytes(Vec<u8>),
    Text(String),
}

impl Value {
    /// The [`ValueKind`] of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Text(_) => ValueKind::Text,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// The Rust-side type a column scans into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// No static type information.
    Any,
    Null,
    Int,
    Float,
    Bool,
    Bytes,
    Text,
}

/// A parameter passed to a context-aware call.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Parameter name, when the query uses named placeholders.
    pub name: Option<String>,
    /// 1-based position of the parameter.
    pub ordinal: usize,
    /// The bound value.
    pub value: Value,
}

impl NamedValue {
    /// An unnamed parameter at `ordinal`.
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    /// A parameter bound by `name`.
    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }
}

/// Convert primitive positional arguments into named values with 1-based
/// ordinals.
pub fn named_values(args: &[Value]) -> Vec<NamedValue> {
    args.iter()
        .enumerate()
        .map(|(i, v)| NamedValue::positional(i + 1, v.clone()))
        .collect()
}

/// Transaction isolation level requested in [`TxOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Whatever the driver uses by default.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

/// Options for starting a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    /// Ask for a read-only transaction.
    pub read_only: bool,
}

/// Entry point of a driver: opens connections by data source name.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection to the data source `name`.
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>>;
}

/// A connection to the database.
#[async_trait]
pub trait Conn: Send + Sync {
    /// Prepare `query` without a context.
    async fn prepare(&self, query: &str) -> Result<Box<dyn Stmt>>;

    /// Release the connection.
    async fn close(&self) -> Result<()>;

    /// Start a transaction with default options.
    ///
    /// Superseded by [`ConnBeginTx`].
    async fn begin(&self) -> Result<Box<dyn Tx>>;

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        None
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        None
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        None
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        None
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        None
    }
}

/// Connection liveness check.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, ctx: &Context) -> Result<()>;
}

/// Direct execution without a prepared statement.
///
/// Superseded by [`ExecerContext`].
#[async_trait]
pub trait Execer: Send + Sync {
    async fn exec(&self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>>;
}

/// Direct execution with a context.
#[async_trait]
pub trait ExecerContext: Send + Sync {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>>;
}

/// Direct query without a prepared statement.
///
/// Superseded by [`QueryerContext`].
#[async_trait]
pub trait Queryer: Send + Sync {
    async fn query(&self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>>;
}

/// Direct query with a context.
#[async_trait]
pub trait QueryerContext: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>>;
}

/// Statement preparation with a context.
#[async_trait]
pub trait ConnPrepareContext: Send + Sync {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>>;
}

/// Transaction start with a context and [`TxOptions`].
#[async_trait]
pub trait ConnBeginTx: Send + Sync {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>>;
}

/// A prepared statement bound to a connection.
#[async_trait]
pub trait Stmt: Send + Sync {
    async fn close(&self) -> Result<()>;

    /// Number of placeholders, or `None` when the driver cannot tell.
    fn num_input(&self) -> Option<usize>;

    async fn exec(&self, args: &[Value]) -> Result<Box<dyn ExecResult>>;

    async fn query(&self, args: &[Value]) -> Result<Box<dyn Rows>>;

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        None
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        None
    }
}

/// Statement execution with a context.
#[async_trait]
pub trait StmtExecContext: Send + Sync {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue])
        -> Result<Box<dyn ExecResult>>;
}

/// Statement query with a context.
#[async_trait]
pub trait StmtQueryContext: Send + Sync {
    async fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>>;
}

/// Outcome of an exec call.
pub trait ExecResult: Send + Sync {
    fn last_insert_id(&self) -> Result<i64>;

    fn rows_affected(&self) -> Result<i64>;
}

/// A forward-only cursor over a query's rows.
#[async_trait]
pub trait Rows: Send {
    /// Column names, in order.
    fn columns(&self) -> Vec<String>;

    /// Fill `dest` with the next row, or return
    /// [`DriverError::EndOfRows`](crate::DriverError::EndOfRows).
    async fn next(&mut self, dest: &mut [Value]) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    fn as_column_type_scan_type(&self) -> Option<&dyn RowsColumnTypeScanType> {
        None
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn RowsColumnTypeDatabaseTypeName> {
        None
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        None
    }
}

/// Per-column scan type.
pub trait RowsColumnTypeScanType: Send {
    fn column_type_scan_type(&self, index: usize) -> ValueKind;
}

/// Per-column database type name, such as `VARCHAR`.
pub trait RowsColumnTypeDatabaseTypeName: Send {
    fn column_type_database_type_name(&self, index: usize) -> String;
}

/// Cursors spanning several result sets.
#[async_trait]
pub trait RowsNextResultSet: Send {
    fn has_next_result_set(&mut self) -> bool;

    /// Advance to the next result set, or return
    /// [`DriverError::EndOfRows`](crate::DriverError::EndOfRows).
    async fn next_result_set(&mut self) -> Result<()>;
}

/// An open transaction. Finishing it consumes the handle.
#[async_trait]
pub trait Tx: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
