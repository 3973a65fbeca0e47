//! Traced transactions.
//!
//! With [`TraceOptions::transaction`](crate::TraceOptions::transaction) set, a
//! `sql:transaction` span is opened before `sql:begin_transaction` and kept
//! open until the transaction finishes. Commit and rollback each get their
//! own short span under it; rollback closes the transaction span as
//! `ABORTED` since rolling back is a normal outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Span;

use crate::context::Context;
use crate::driver::{Conn, Tx, TxOptions};
use crate::error::Result;
use crate::span::{mark_deprecated, record_status, scoped, start_span, Telemetry};
use crate::status::{Status, StatusCode};

/// Begin a transaction on `parent` under the transaction span policy.
pub(crate) async fn begin_traced(
    parent: &dyn Conn,
    ctx: &Context,
    opts: TxOptions,
    telemetry: &Arc<Telemetry>,
) -> Result<Box<dyn Tx>> {
    let tx_span = start_span!(
        "sql:transaction",
        telemetry.plan(telemetry.options.transaction, ctx)
    );
    let tx_ctx = scoped(ctx, tx_span.as_ref());

    let span = start_span!("sql:begin_transaction", telemetry.plan(true, &tx_ctx));
    let call_ctx = scoped(&tx_ctx, span.as_ref());
    let result = match parent.as_begin_tx() {
        Some(beginner) => {
            telemetry
                .run("begin", span.as_ref(), beginner.begin_tx(&call_ctx, opts))
                .await
        }
        None => {
            mark_deprecated(span.as_ref(), "driver does not support ConnBeginTx");
            telemetry.run("begin", span.as_ref(), parent.begin()).await
        }
    };

    match result {
        Ok(tx) => Ok(Box::new(TracedTx {
            parent: tx,
            ctx: tx_ctx,
            span: tx_span,
            telemetry: telemetry.clone(),
        })),
        Err(err) => {
            if let Some(tx_span) = &tx_span {
                record_status(tx_span, &Status::from_error(Some(&err)));
            }
            Err(err)
        }
    }
}

/// A transaction decorator. `span` is the long-lived transaction span, if
/// one was opened; `ctx` carries it (or the inbound span otherwise).
struct TracedTx {
    parent: Box<dyn Tx>,
    ctx: Context,
    span: Option<Span>,
    telemetry: Arc<Telemetry>,
}

#[async_trait]
impl Tx for TracedTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        let TracedTx {
            parent,
            ctx,
            span: tx_span,
            telemetry,
        } = *self;

        let span = start_span!("sql:commit", telemetry.plan(true, &ctx));
        let result = telemetry.run("commit", span.as_ref(), parent.commit()).await;

        if let Some(tx_span) = tx_span {
            record_status(&tx_span, &Status::from_result(&result));
        }
        result
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let TracedTx {
            parent,
            ctx,
            span: tx_span,
            telemetry,
        } = *self;

        let span = start_span!("sql:rollback", telemetry.plan(true, &ctx));
        let result = telemetry
            .run("rollback", span.as_ref(), parent.rollback())
            .await;

        if let Some(tx_span) = tx_span {
            let status = Status {
                code: StatusCode::Aborted,
                message: result.as_ref().err().map(ToString::to_string),
            };
            record_status(&tx_span, &status);
        }
        result
    }
}
