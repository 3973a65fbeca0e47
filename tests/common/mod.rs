//! Shared fixtures: a configurable stub driver and a span-capturing layer.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sql_driver_tracing::driver::*;
use sql_driver_tracing::{Context, DriverError, MetricsSink, Result};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{self, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

// ---------------------------------------------------------------------------
// Span capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub name: &'static str,
    /// Index of the parent span in the capture, if any.
    pub parent: Option<usize>,
    pub fields: BTreeMap<String, String>,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Index of the enclosing span in the capture, if any.
    pub span: Option<usize>,
    pub fields: BTreeMap<String, String>,
}

#[derive(Default)]
struct Captured {
    spans: Vec<(u64, SpanRecord)>,
    events: Vec<EventRecord>,
}

impl Captured {
    fn open_index(&self, id: &Id) -> Option<usize> {
        self.spans
            .iter()
            .rposition(|(raw, span)| *raw == id.into_u64() && !span.closed)
    }
}

/// A `Layer` recording every span and event it sees.
#[derive(Clone, Default)]
pub struct Capture {
    inner: Arc<Mutex<Captured>>,
}

impl Capture {
    /// Install a fresh capture as the thread's default subscriber.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    /// Like [`Capture::install`], behind an `EnvFilter` built from `directives`.
    pub fn install_filtered(directives: &str) -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(directives))
            .with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.inner.lock().spans.iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.inner.lock().events.clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.spans().iter().map(|s| s.name).collect()
    }

    /// The single span called `name`; panics unless exactly one exists.
    pub fn only(&self, name: &str) -> (usize, SpanRecord) {
        let matches: Vec<_> = self
            .spans()
            .into_iter()
            .enumerate()
            .filter(|(_, s)| s.name == name)
            .collect();
        assert_eq!(matches.len(), 1, "expected one {name} span in {:?}", self.names());
        matches.into_iter().next().unwrap()
    }

    pub fn parent_name(&self, span: &SpanRecord) -> Option<&'static str> {
        span.parent.map(|i| self.spans()[i].name)
    }

    /// Events emitted inside span `index`.
    pub fn events_in(&self, index: usize) -> Vec<EventRecord> {
        self.events()
            .into_iter()
            .filter(|e| e.span == Some(index))
            .collect()
    }
}

#[derive(Default)]
struct FieldMap(BTreeMap<String, String>);

impl Visit for FieldMap {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: layer::Context<'_, S>) {
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        let parent_id = ctx.span(id).and_then(|s| s.parent()).map(|p| p.id());

        let mut inner = self.inner.lock();
        let parent = parent_id.and_then(|p| inner.open_index(&p));
        inner.spans.push((
            id.into_u64(),
            SpanRecord {
                name: attrs.metadata().name(),
                parent,
                fields: fields.0,
                closed: false,
            },
        ));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: layer::Context<'_, S>) {
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut inner = self.inner.lock();
        if let Some(i) = inner.open_index(id) {
            inner.spans[i].1.fields.extend(fields.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: layer::Context<'_, S>) {
        let mut fields = FieldMap::default();
        event.record(&mut fields);
        let span_id = ctx.event_span(event).map(|s| s.id());
        let mut inner = self.inner.lock();
        let span = span_id.and_then(|id| inner.open_index(&id));
        inner.events.push(EventRecord {
            span,
            fields: fields.0,
        });
    }

    fn on_close(&self, id: Id, _ctx: layer::Context<'_, S>) {
        let mut inner = self.inner.lock();
        if let Some(i) = inner.open_index(&id) {
            inner.spans[i].1.closed = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingMetrics {
    pub calls: Arc<Mutex<Vec<(&'static str, bool)>>>,
}

impl MetricsSink for RecordingMetrics {
    fn record(&self, method: &'static str, _latency: Duration, error: Option<&DriverError>) {
        self.calls.lock().push((method, error.is_some()));
    }
}

// ---------------------------------------------------------------------------
// Stub driver
// ---------------------------------------------------------------------------

/// Optional capabilities the stub objects advertise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caps {
    pub ping: bool,
    pub exec: bool,
    pub exec_context: bool,
    pub query: bool,
    pub query_context: bool,
    pub prepare_context: bool,
    pub begin_tx: bool,
    pub stmt_exec_context: bool,
    pub stmt_query_context: bool,
    pub scan_type: bool,
    pub database_type_name: bool,
    pub next_result_set: bool,
}

impl Caps {
    pub fn all() -> Self {
        Self {
            ping: true,
            exec: true,
            exec_context: true,
            query: true,
            query_context: true,
            prepare_context: true,
            begin_tx: true,
            stmt_exec_context: true,
            stmt_query_context: true,
            scan_type: true,
            database_type_name: true,
            next_result_set: true,
        }
    }

    /// Connection capabilities from the low seven bits of `mask`.
    pub fn conn_from_mask(mask: u8) -> Self {
        let bit = |n: u8| mask & (1 << n) != 0;
        Self {
            ping: bit(0),
            exec: bit(1),
            exec_context: bit(2),
            query: bit(3),
            query_context: bit(4),
            prepare_context: bit(5),
            begin_tx: bit(6),
            ..Self::default()
        }
    }

    pub fn of_conn(conn: &dyn Conn) -> Self {
        Self {
            ping: conn.as_pinger().is_some(),
            exec: conn.as_execer().is_some(),
            exec_context: conn.as_execer_context().is_some(),
            query: conn.as_queryer().is_some(),
            query_context: conn.as_queryer_context().is_some(),
            prepare_context: conn.as_prepare_context().is_some(),
            begin_tx: conn.as_begin_tx().is_some(),
            ..Self::default()
        }
    }
}

/// Context span names the stub saw, in call order.
pub type Seen = Arc<Mutex<Vec<Option<&'static str>>>>;

fn remember(seen: &Seen, ctx: &Context) {
    seen.lock()
        .push(ctx.span().and_then(|s| s.metadata()).map(|m| m.name()));
}

/// Queries containing these words fail with the matching sentinel.
fn outcome(query: &str) -> Result<()> {
    if query.contains("missing") {
        Err(DriverError::NoRows)
    } else if query.contains("cancel") {
        Err(DriverError::Cancelled)
    } else if query.contains("boom") {
        Err(DriverError::message("boom"))
    } else {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct StubDriver {
    pub caps: Caps,
    pub rows: usize,
    pub fail_commit: bool,
    pub seen: Seen,
}

impl StubDriver {
    pub fn new(caps: Caps) -> Self {
        Self {
            caps,
            rows: 2,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn open(&self, _name: &str) -> Result<Box<dyn Conn>> {
        Ok(Box::new(StubConn {
            driver: self.clone(),
        }))
    }
}

pub struct StubConn {
    driver: StubDriver,
}

impl StubConn {
    fn stmt(&self, query: &str) -> Box<dyn Stmt> {
        Box::new(StubStmt {
            driver: self.driver.clone(),
            query: query.to_string(),
        })
    }

    fn rows(&self) -> Box<dyn Rows> {
        Box::new(StubRows {
            caps: self.driver.caps,
            remaining: self.driver.rows,
        })
    }

    fn tx(&self) -> Box<dyn Tx> {
        Box::new(StubTx {
            fail_commit: self.driver.fail_commit,
        })
    }
}

#[async_trait]
impl Conn for StubConn {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Stmt>> {
        outcome(query)?;
        Ok(self.stmt(query))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn Tx>> {
        Ok(self.tx())
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        self.driver.caps.ping.then_some(self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        self.driver.caps.exec.then_some(self as &dyn Execer)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        self.driver.caps.exec_context.then_some(self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        self.driver.caps.query.then_some(self as &dyn Queryer)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        self.driver.caps.query_context.then_some(self as &dyn QueryerContext)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        self.driver.caps.prepare_context.then_some(self as &dyn ConnPrepareContext)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        self.driver.caps.begin_tx.then_some(self as &dyn ConnBeginTx)
    }
}

#[async_trait]
impl Pinger for StubConn {
    async fn ping(&self, ctx: &Context) -> Result<()> {
        remember(&self.driver.seen, ctx);
        Ok(())
    }
}

#[async_trait]
impl Execer for StubConn {
    async fn exec(&self, query: &str, _args: &[Value]) -> Result<Box<dyn ExecResult>> {
        outcome(query)?;
        Ok(Box::new(StubResult))
    }
}

#[async_trait]
impl ExecerContext for StubConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        remember(&self.driver.seen, ctx);
        outcome(query)?;
        Ok(Box::new(StubResult))
    }
}

#[async_trait]
impl Queryer for StubConn {
    async fn query(&self, query: &str, _args: &[Value]) -> Result<Box<dyn Rows>> {
        outcome(query)?;
        Ok(self.rows())
    }
}

#[async_trait]
impl QueryerContext for StubConn {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        remember(&self.driver.seen, ctx);
        outcome(query)?;
        Ok(self.rows())
    }
}

#[async_trait]
impl ConnPrepareContext for StubConn {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        remember(&self.driver.seen, ctx);
        outcome(query)?;
        Ok(self.stmt(query))
    }
}

#[async_trait]
impl ConnBeginTx for StubConn {
    async fn begin_tx(&self, ctx: &Context, _opts: TxOptions) -> Result<Box<dyn Tx>> {
        remember(&self.driver.seen, ctx);
        Ok(self.tx())
    }
}

pub struct StubStmt {
    driver: StubDriver,
    query: String,
}

#[async_trait]
impl Stmt for StubStmt {
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn num_input(&self) -> Option<usize> {
        Some(self.query.matches('?').count())
    }

    async fn exec(&self, _args: &[Value]) -> Result<Box<dyn ExecResult>> {
        outcome(&self.query)?;
        Ok(Box::new(StubResult))
    }

    async fn query(&self, _args: &[Value]) -> Result<Box<dyn Rows>> {
        outcome(&self.query)?;
        Ok(Box::new(StubRows {
            caps: self.driver.caps,
            remaining: self.driver.rows,
        }))
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        self.driver
            .caps
            .stmt_exec_context
            .then_some(self as &dyn StmtExecContext)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        self.driver
            .caps
            .stmt_query_context
            .then_some(self as &dyn StmtQueryContext)
    }
}

#[async_trait]
impl StmtExecContext for StubStmt {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn ExecResult>> {
        remember(&self.driver.seen, ctx);
        let values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
        self.exec(&values).await
    }
}

#[async_trait]
impl StmtQueryContext for StubStmt {
    async fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        remember(&self.driver.seen, ctx);
        let values: Vec<Value> = args.iter().map(|a| a.value.clone()).collect();
        self.query(&values).await
    }
}

pub struct StubRows {
    caps: Caps,
    remaining: usize,
}

#[async_trait]
impl Rows for StubRows {
    fn columns(&self) -> Vec<String> {
        vec!["id".to_string()]
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<()> {
        if self.remaining == 0 {
            return Err(DriverError::EndOfRows);
        }
        dest[0] = Value::Int(self.remaining as i64);
        self.remaining -= 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn RowsColumnTypeScanType> {
        self.caps.scan_type.then_some(self as &dyn RowsColumnTypeScanType)
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn RowsColumnTypeDatabaseTypeName> {
        self.caps
            .database_type_name
            .then_some(self as &dyn RowsColumnTypeDatabaseTypeName)
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.caps.next_result_set {
            Some(self as &mut dyn RowsNextResultSet)
        } else {
            None
        }
    }
}

impl RowsColumnTypeScanType for StubRows {
    fn column_type_scan_type(&self, _index: usize) -> ValueKind {
        ValueKind::Int
    }
}

impl RowsColumnTypeDatabaseTypeName for StubRows {
    fn column_type_database_type_name(&self, _index: usize) -> String {
        "BIGINT".to_string()
    }
}

#[async_trait]
impl RowsNextResultSet for StubRows {
    fn has_next_result_set(&mut self) -> bool {
        false
    }

    async fn next_result_set(&mut self) -> Result<()> {
        Err(DriverError::EndOfRows)
    }
}

pub struct StubResult;

impl ExecResult for StubResult {
    fn last_insert_id(&self) -> Result<i64> {
        Ok(42)
    }

    fn rows_affected(&self) -> Result<i64> {
        Ok(3)
    }
}

pub struct StubTx {
    fail_commit: bool,
}

#[async_trait]
impl Tx for StubTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            Err(DriverError::TxDone)
        } else {
            Ok(())
        }
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
