//! Traced prepared statements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::{named_args, positional_args};
use crate::compose::{self, compose};
use crate::context::Context;
use crate::driver::{ExecResult, NamedValue, Rows, Stmt, StmtExecContext, StmtQueryContext, Value};
use crate::error::{DriverError, Result};
use crate::result::TracedResult;
use crate::rows::wrap_rows;
use crate::span::{mark_deprecated, scoped, start_span, Telemetry};

pub(crate) mod caps {
    pub const EXEC_CONTEXT: u8 = 1;
    pub const QUERY_CONTEXT: u8 = 1 << 1;
}

pub(crate) fn stmt_caps(stmt: &dyn Stmt) -> u8 {
    compose::mask(&[
        (stmt.as_exec_context().is_some(), caps::EXEC_CONTEXT),
        (stmt.as_query_context().is_some(), caps::QUERY_CONTEXT),
    ])
}

/// Decorate `stmt` prepared from `query`, preserving its capability set.
pub(crate) fn wrap_stmt(
    stmt: Box<dyn Stmt>,
    query: &str,
    telemetry: Arc<Telemetry>,
) -> Box<dyn Stmt> {
    let mask = stmt_caps(stmt.as_ref());
    let core = StmtCore {
        parent: stmt,
        query: query.to_string(),
        telemetry,
    };
    macro_rules! make {
        ($caps:tt, $core:ident) => {
            Box::new(TracedStmt::<$caps> { core: $core }) as Box<dyn Stmt>
        };
    }
    compose!(mask, core, make; caps::EXEC_CONTEXT, caps::QUERY_CONTEXT)
}

struct StmtCore {
    parent: Box<dyn Stmt>,
    query: String,
    telemetry: Arc<Telemetry>,
}

impl StmtCore {
    async fn exec(&self, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let span = start_span!("sql:exec", self.telemetry.primitive_plan());
        mark_deprecated(span.as_ref(), "driver does not support StmtExecContext");
        self.telemetry
            .record_query(span.as_ref(), &self.query, || positional_args(args));

        let res = self
            .telemetry
            .run("exec", span.as_ref(), self.parent.exec(args))
            .await?;
        Ok(TracedResult::boxed(
            res,
            Context::background(),
            self.telemetry.clone(),
        ))
    }

    async fn query(&self, args: &[Value]) -> Result<Box<dyn Rows>> {
        let span = start_span!("sql:query", self.telemetry.primitive_plan());
        mark_deprecated(span.as_ref(), "driver does not support StmtQueryContext");
        self.telemetry
            .record_query(span.as_ref(), &self.query, || positional_args(args));

        let rows = self
            .telemetry
            .run("query", span.as_ref(), self.parent.query(args))
            .await?;
        Ok(wrap_rows(rows, Context::background(), self.telemetry.clone()))
    }

    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn ExecResult>> {
        let Some(execer) = self.parent.as_exec_context() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:exec", self.telemetry.plan(true, ctx));
        self.telemetry
            .record_query(span.as_ref(), &self.query, || named_args(args));

        let call_ctx = scoped(ctx, span.as_ref());
        let res = self
            .telemetry
            .run("exec", span.as_ref(), execer.exec_context(&call_ctx, args))
            .await?;
        Ok(TracedResult::boxed(res, ctx.clone(), self.telemetry.clone()))
    }

    async fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        let Some(queryer) = self.parent.as_query_context() else {
            return Err(DriverError::Skip);
        };
        let span = start_span!("sql:query", self.telemetry.plan(true, ctx));
        self.telemetry
            .record_query(span.as_ref(), &self.query, || named_args(args));

        let call_ctx = scoped(ctx, span.as_ref());
        let rows = self
            .telemetry
            .run("query", span.as_ref(), queryer.query_context(&call_ctx, args))
            .await?;
        Ok(wrap_rows(rows, ctx.clone(), self.telemetry.clone()))
    }
}

struct TracedStmt<const CAPS: u8> {
    core: StmtCore,
}

#[async_trait]
impl<const CAPS: u8> Stmt for TracedStmt<CAPS> {
    async fn close(&self) -> Result<()> {
        self.core.parent.close().await
    }

    fn num_input(&self) -> Option<usize> {
        self.core.parent.num_input()
    }

    async fn exec(&self, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        self.core.exec(args).await
    }

    async fn query(&self, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.core.query(args).await
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        (CAPS & caps::EXEC_CONTEXT != 0).then_some(self as &dyn StmtExecContext)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        (CAPS & caps::QUERY_CONTEXT != 0).then_some(self as &dyn StmtQueryContext)
    }
}

#[async_trait]
impl<const CAPS: u8> StmtExecContext for TracedStmt<CAPS> {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn ExecResult>> {
        self.core.exec_context(ctx, args).await
    }
}

#[async_trait]
impl<const CAPS: u8> StmtQueryContext for TracedStmt<CAPS> {
    async fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        self.core.query_context(ctx, args).await
    }
}
