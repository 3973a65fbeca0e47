//! Traced driver and connection wrappers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::{named_args, positional_args};
use crate::compose::{self, compose};
use crate::config::TraceOptions;
use crate::context::Context;
use crate::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, Driver, ExecResult, Execer, ExecerContext, NamedValue,
    Pinger, Queryer, QueryerContext, Rows, Stmt, Tx, TxOptions, Value,
};
use crate::error::{DriverError, Result};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::result::TracedResult;
use crate::rows::wrap_rows;
use crate::span::{mark_deprecated, mark_missing_context, scoped, start_span, Telemetry};
use crate::statement::wrap_stmt;
use crate::transaction::begin_traced;

/// A traced wrapper around any [`Driver`].
///
/// Connections opened through it are decorated so that every driver call is
/// wrapped in a `sql:*` span. The decorated objects expose exactly the
/// optional capabilities of the objects they wrap, so the calling framework
/// picks the same code paths it would pick for the bare driver.
///
/// # Span Nesting
///
/// Context-aware calls start their span as a child of the span carried by the
/// inbound [`Context`]. Calls without one only produce a root span when
/// [`TraceOptions::allow_root`] is set.
///
/// # Example
///
/// ```rust,ignore
/// use sql_driver_tracing::{TraceOptions, TracedDriver};
///
/// let traced = TracedDriver::new(Arc::new(my_driver), TraceOptions::all());
/// let conn = traced.open("postgres://localhost/mydb").await?;
/// ```
#[derive(Clone)]
pub struct TracedDriver {
    parent: Arc<dyn Driver>,
    telemetry: Arc<Telemetry>,
}

impl TracedDriver {
    /// Wrap `parent` with the given options.
    pub fn new(parent: Arc<dyn Driver>, options: TraceOptions) -> Self {
        Self {
            parent,
            telemetry: Arc::new(Telemetry::new(options, Arc::new(NoopMetrics))),
        }
    }

    /// Report per-call latency to `metrics`.
    pub fn with_metrics(self, metrics: Arc<dyn MetricsSink>) -> Self {
        let options = self.telemetry.options.clone();
        Self {
            parent: self.parent,
            telemetry: Arc::new(Telemetry::new(options, metrics)),
        }
    }

    /// The effective options, after normalization.
    pub fn options(&self) -> &TraceOptions {
        &self.telemetry.options
    }

    /// Get a reference to the wrapped driver.
    pub fn inner(&self) -> &Arc<dyn Driver> {
        &self.parent
    }
}

impl fmt::Debug for TracedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedDriver")
            .field("options", &self.telemetry.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for TracedDriver {
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        let conn = self.parent.open(name).await?;
        Ok(wrap_conn(conn, self.telemetry.clone()))
    }
}

/// Wrap a driver with tracing instrumentation.
pub fn wrap<D: Driver + 'static>(driver: D, options: TraceOptions) -> TracedDriver {
    TracedDriver::new(Arc::new(driver), options)
}

/// Extension trait for easy wrapping of drivers.
pub trait TracingExt {
    /// Wrap this driver with default options (context-bound spans only).
    fn with_tracing(self) -> TracedDriver;

    /// Wrap this driver with custom options.
    fn with_tracing_config(self, options: TraceOptions) -> TracedDriver;
}

impl<D: Driver + 'static> TracingExt for D {
    fn with_tracing(self) -> TracedDriver {
        wrap(self, TraceOptions::default())
    }

    fn with_tracing_config(self, options: TraceOptions) -> TracedDriver {
        wrap(self, options)
    }
}

pub(crate) mod caps {
    pub const PING: u8 = 1;
    pub const EXEC: u8 = 1 << 1;
    pub const EXEC_CONTEXT: u8 = 1 << 2;
    pub const QUERY: u8 = 1 << 3;
    pub const QUERY_CONTEXT: u8 = 1 << 4;
    pub const PREPARE_CONTEXT: u8 = 1 << 5;
    pub const BEGIN_TX: u8 = 1 << 6;
}

/// Optional capabilities of a connection, as a bit mask.
pub(crate) fn conn_caps(conn: &dyn Conn) -> u8 {
    compose::mask(&[
        (conn.as_pinger().is_some(), caps::PING),
        (conn.as_execer().is_some(), caps::EXEC),
        (conn.as_execer_context().is_some(), caps::EXEC_CONTEXT),
        (conn.as_queryer().is_some(), caps::QUERY),
        (conn.as_queryer_context().is_some(), caps::QUERY_CONTEXT),
        (conn.as_prepare_context().is_some(), caps::PREPARE_CONTEXT),
        (conn.as_begin_tx().is_some(), caps::BEGIN_TX),
    ])
}

/// Decorate `conn`, preserving its capability set.
pub(crate) fn wrap_conn(conn: Box<dyn Conn>, telemetry: Arc<Telemetry>) -> Box<dyn Conn> {
    let mask = conn_caps(conn.as_ref());
    let core = ConnCore {
        parent: conn,
        telemetry,
    };
    macro_rules! make {
        ($caps:tt, $core:ident) => {
            Box::new(TracedConn::<$caps> { core: $core }) as Box<dyn Conn>
        };
    }
    compose!(
        mask, core, make;
        caps::PING,
        caps::EXEC,
        caps::EXEC_CONTEXT,
        caps::QUERY,
        caps::QUERY_CONTEXT,
        caps::PREPARE_CONTEXT,
        caps::BEGIN_TX,
    )
}

struct ConnCore {
    parent: Box<dyn Conn>,
    telemetry: Arc<Telemetry>,
}

impl ConnCore {
    async fn ping(&self, ctx: &Context) -> Result<()> {
        let span = start_span!(
            "sql:ping",
            self.telemetry.plan(self.telemetry.options.ping, ctx)
        );
        let ctx = scoped(ctx, span.as_ref());
        match self.parent.as_pinger() {
            Some(pinger) => {
                self.telemetry
                    .run("ping", span.as_ref(), pinger.ping(&ctx))
                    .await
            }
            None => self.telemetry.run("ping", span.as_ref(), async { Ok(()) }).await,
        }
    }

    async fn exec(&self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let Some(execer) = self.parent.as_execer() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:exec", self.telemetry.primitive_plan());
        mark_deprecated(span.as_ref(), "driver does not support ExecerContext");
        self.telemetry
            .record_query(span.as_ref(), query, || positional_args(args));

        let res = self
            .telemetry
            .run("exec", span.as_ref(), execer.exec(query, args))
            .await?;
        Ok(TracedResult::boxed(
            res,
            Context::background(),
            self.telemetry.clone(),
        ))
    }

    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        let Some(execer) = self.parent.as_execer_context() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:exec", self.telemetry.plan(true, ctx));
        self.telemetry
            .record_query(span.as_ref(), query, || named_args(args));

        let call_ctx = scoped(ctx, span.as_ref());
        let res = self
            .telemetry
            .run(
                "exec",
                span.as_ref(),
                execer.exec_context(&call_ctx, query, args),
            )
            .await?;
        Ok(TracedResult::boxed(res, ctx.clone(), self.telemetry.clone()))
    }

    async fn query(&self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        let Some(queryer) = self.parent.as_queryer() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:query", self.telemetry.primitive_plan());
        mark_deprecated(span.as_ref(), "driver does not support QueryerContext");
        self.telemetry
            .record_query(span.as_ref(), query, || positional_args(args));

        let rows = self
            .telemetry
            .run("query", span.as_ref(), queryer.query(query, args))
            .await?;
        Ok(wrap_rows(rows, Context::background(), self.telemetry.clone()))
    }

    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        let Some(queryer) = self.parent.as_queryer_context() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:query", self.telemetry.plan(true, ctx));
        self.telemetry
            .record_query(span.as_ref(), query, || named_args(args));

        let call_ctx = scoped(ctx, span.as_ref());
        let rows = self
            .telemetry
            .run(
                "query",
                span.as_ref(),
                queryer.query_context(&call_ctx, query, args),
            )
            .await?;
        Ok(wrap_rows(rows, ctx.clone(), self.telemetry.clone()))
    }

    async fn prepare(&self, query: &str) -> Result<Box<dyn Stmt>> {
        let span = start_span!("sql:prepare", self.telemetry.primitive_plan());
        mark_deprecated(span.as_ref(), "driver does not support ConnPrepareContext");
        self.telemetry.record_query(span.as_ref(), query, Vec::new);

        let stmt = self
            .telemetry
            .run("prepare", span.as_ref(), self.parent.prepare(query))
            .await?;
        Ok(wrap_stmt(stmt, query, self.telemetry.clone()))
    }

    async fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        let span = start_span!("sql:prepare", self.telemetry.plan(true, ctx));
        self.telemetry.record_query(span.as_ref(), query, Vec::new);

        let ctx = scoped(ctx, span.as_ref());
        let stmt = match self.parent.as_prepare_context() {
            Some(preparer) => {
                self.telemetry
                    .run("prepare", span.as_ref(), preparer.prepare_context(&ctx, query))
                    .await?
            }
            None => {
                mark_missing_context(span.as_ref());
                self.telemetry
                    .run("prepare", span.as_ref(), self.parent.prepare(query))
                    .await?
            }
        };
        Ok(wrap_stmt(stmt, query, self.telemetry.clone()))
    }

    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>> {
        begin_traced(self.parent.as_ref(), ctx, opts, &self.telemetry).await
    }
}

/// A connection decorator exposing exactly the capabilities in `CAPS`.
struct TracedConn<const CAPS: u8> {
    core: ConnCore,
}

#[async_trait]
impl<const CAPS: u8> Conn for TracedConn<CAPS> {
    async fn prepare(&self, query: &str) -> Result<Box<dyn Stmt>> {
        self.core.prepare(query).await
    }

    async fn close(&self) -> Result<()> {
        self.core.parent.close().await
    }

    async fn begin(&self) -> Result<Box<dyn Tx>> {
        self.core
            .begin_tx(&Context::background(), TxOptions::default())
            .await
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        (CAPS & caps::PING != 0).then_some(self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        (CAPS & caps::EXEC != 0).then_some(self as &dyn Execer)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        (CAPS & caps::EXEC_CONTEXT != 0).then_some(self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        (CAPS & caps::QUERY != 0).then_some(self as &dyn Queryer)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        (CAPS & caps::QUERY_CONTEXT != 0).then_some(self as &dyn QueryerContext)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        (CAPS & caps::PREPARE_CONTEXT != 0).then_some(self as &dyn ConnPrepareContext)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        (CAPS & caps::BEGIN_TX != 0).then_some(self as &dyn ConnBeginTx)
    }
}

#[async_trait]
impl<const CAPS: u8> Pinger for TracedConn<CAPS> {
    async fn ping(&self, ctx: &Context) -> Result<()> {
        self.core.ping(ctx).await
    }
}

#[async_trait]
impl<const CAPS: u8> Execer for TracedConn<CAPS> {
    async fn exec(&self, query: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        self.core.exec(query, args).await
    }
}

#[async_trait]
impl<const CAPS: u8> ExecerContext for TracedConn<CAPS> {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        self.core.exec_context(ctx, query, args).await
    }
}

#[async_trait]
impl<const CAPS: u8> Queryer for TracedConn<CAPS> {
    async fn query(&self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.core.query(query, args).await
    }
}

#[async_trait]
impl<const CAPS: u8> QueryerContext for TracedConn<CAPS> {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        self.core.query_context(ctx, query, args).await
    }
}

#[async_trait]
impl<const CAPS: u8> ConnPrepareContext for TracedConn<CAPS> {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        self.core.prepare_context(ctx, query).await
    }
}

#[async_trait]
impl<const CAPS: u8> ConnBeginTx for TracedConn<CAPS> {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>> {
        self.core.begin_tx(ctx, opts).await
    }
}
