//! Traced exec results.

use std::sync::Arc;

use crate::context::Context;
use crate::driver::ExecResult;
use crate::error::Result;
use crate::span::{start_span, Telemetry};

/// Wraps the outcome of an exec call. `ctx` is the exec call's inbound
/// context; the exec span itself has already closed.
pub(crate) struct TracedResult {
    parent: Box<dyn ExecResult>,
    ctx: Context,
    telemetry: Arc<Telemetry>,
}

impl TracedResult {
    pub(crate) fn boxed(
        parent: Box<dyn ExecResult>,
        ctx: Context,
        telemetry: Arc<Telemetry>,
    ) -> Box<dyn ExecResult> {
        Box::new(Self {
            parent,
            ctx,
            telemetry,
        })
    }
}

impl ExecResult for TracedResult {
    fn last_insert_id(&self) -> Result<i64> {
        let span = start_span!(
            "sql:last_insert_id",
            self.telemetry
                .plan(self.telemetry.options.last_insert_id, &self.ctx)
        );
        self.telemetry
            .run_sync("last_insert_id", span.as_ref(), || self.parent.last_insert_id())
    }

    fn rows_affected(&self) -> Result<i64> {
        let span = start_span!(
            "sql:rows_affected",
            self.telemetry
                .plan(self.telemetry.options.rows_affected, &self.ctx)
        );
        self.telemetry
            .run_sync("rows_affected", span.as_ref(), || self.parent.rows_affected())
    }
}
