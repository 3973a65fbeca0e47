//! Span policy and span recording shared by every tier decorator.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::span::Id;
use tracing::{Instrument, Span};

use crate::attributes::{Attribute, AttributeValue};
use crate::config::TraceOptions;
use crate::context::Context;
use crate::error::DriverError;
use crate::metrics::MetricsSink;
use crate::parser::QuerySummary;
use crate::status::{Status, StatusCode};

pub(crate) const MISSING_CONTEXT: &str = "missing upstream context";
pub(crate) const DEPRECATED: &str = "database driver uses deprecated features";

/// Outcome of the span policy for one call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Plan<'a> {
    /// Forward the call without a span.
    Skip,
    /// Start a span under the inbound context's span.
    Child(&'a Span),
    /// Start a root span; the call had no upstream context.
    Root,
}

impl<'a> Plan<'a> {
    /// Decide whether and where to start a span.
    pub(crate) fn decide(enabled: bool, allow_root: bool, ctx: &'a Context) -> Self {
        match (enabled, ctx.span()) {
            (false, _) => Plan::Skip,
            (true, Some(parent)) => Plan::Child(parent),
            (true, None) if allow_root => Plan::Root,
            (true, None) => Plan::Skip,
        }
    }

    /// `None` to skip; otherwise the explicit parent (`None` for a root).
    pub(crate) fn parent(&self) -> Option<Option<Id>> {
        match self {
            Plan::Skip => None,
            Plan::Child(span) => Some(span.id()),
            Plan::Root => Some(None),
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        matches!(self, Plan::Root)
    }
}

/// Start a `sql:*` span according to a [`Plan`], yielding `Option<Span>`.
///
/// Root spans are tagged as missing upstream context.
macro_rules! start_span {
    ($name:literal, $plan:expr) => {{
        let plan: $crate::span::Plan<'_> = $plan;
        match plan.parent() {
            None => None,
            Some(parent) => {
                let span = tracing::info_span!(
                    parent: parent,
                    $name,
                    otel.kind = "client",
                    otel.status_code = tracing::field::Empty,
                    otel.status_description = tracing::field::Empty,
                    sql.status = tracing::field::Empty,
                    sql.query = tracing::field::Empty,
                    db.operation = tracing::field::Empty,
                    db.sql.table = tracing::field::Empty,
                    sqltrace.warning = tracing::field::Empty,
                    sqltrace.deprecated = tracing::field::Empty,
                    db.duration_ms = tracing::field::Empty,
                    slow_query = tracing::field::Empty,
                );
                if plan.is_root() {
                    span.record("sqltrace.warning", $crate::span::MISSING_CONTEXT);
                }
                Some(span)
            }
        }
    }};
}

pub(crate) use start_span;

/// State shared by every decorator spawned from one wrapped driver.
#[derive(Debug)]
pub(crate) struct Telemetry {
    pub(crate) options: TraceOptions,
    metrics: Arc<dyn MetricsSink>,
}

impl Telemetry {
    pub(crate) fn new(options: TraceOptions, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            options: options.normalized(),
            metrics,
        }
    }

    pub(crate) fn plan<'a>(&self, enabled: bool, ctx: &'a Context) -> Plan<'a> {
        Plan::decide(enabled, self.options.allow_root, ctx)
    }

    /// Plan for a call that cannot carry a context at all.
    pub(crate) fn primitive_plan(&self) -> Plan<'static> {
        if self.options.allow_root {
            Plan::Root
        } else {
            Plan::Skip
        }
    }

    /// Record the statement summary, the SQL text if enabled and the
    /// parameters if enabled. `args` is only evaluated when parameters are
    /// captured.
    pub(crate) fn record_query<F>(&self, span: Option<&Span>, query: &str, args: F)
    where
        F: FnOnce() -> Vec<Attribute>,
    {
        let Some(span) = span else {
            return;
        };
        let summary = QuerySummary::parse(query);
        span.record("db.operation", summary.operation.as_str());
        if let Some(table) = &summary.table {
            span.record("db.sql.table", table.as_str());
        }
        if !self.options.query {
            return;
        }
        span.record("sql.query", query);
        if self.options.query_params {
            for attr in args() {
                record_arg(span, &attr);
            }
        }
    }

    /// Await `call` inside `span` and record its outcome.
    pub(crate) async fn run<T, F>(
        &self,
        method: &'static str,
        span: Option<&Span>,
        call: F,
    ) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let start = Instant::now();
        let result = call.instrument(current(span)).await;
        self.finish(
            method,
            span,
            start,
            &Status::from_result(&result),
            result.as_ref().err(),
        );
        result
    }

    /// Like [`Telemetry::run`] for row iteration, where running out of rows
    /// is not a failure.
    pub(crate) async fn run_rows<T, F>(
        &self,
        method: &'static str,
        span: Option<&Span>,
        call: F,
    ) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let start = Instant::now();
        let result = call.instrument(current(span)).await;
        let error = result
            .as_ref()
            .err()
            .filter(|err| !matches!(err, DriverError::EndOfRows));
        self.finish(
            method,
            span,
            start,
            &Status::from_rows_result(&result),
            error,
        );
        result
    }

    /// Run a synchronous accessor inside `span` and record its outcome.
    pub(crate) fn run_sync<T>(
        &self,
        method: &'static str,
        span: Option<&Span>,
        call: impl FnOnce() -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let start = Instant::now();
        let result = {
            let _entered = span.map(Span::enter);
            call()
        };
        self.finish(
            method,
            span,
            start,
            &Status::from_result(&result),
            result.as_ref().err(),
        );
        result
    }

    /// Record latency, status and metrics for a finished call.
    pub(crate) fn finish(
        &self,
        method: &'static str,
        span: Option<&Span>,
        start: Instant,
        status: &Status,
        error: Option<&DriverError>,
    ) {
        let elapsed = start.elapsed();
        self.metrics.record(method, elapsed, error);

        let Some(span) = span else {
            return;
        };
        let duration_ms = elapsed.as_millis() as i64;
        span.record("db.duration_ms", duration_ms);

        if let Some(threshold) = self.options.slow_query_threshold {
            if elapsed >= threshold {
                span.record("slow_query", true);
                tracing::warn!(
                    parent: span,
                    duration_ms = duration_ms,
                    threshold_ms = threshold.as_millis() as i64,
                    "Slow query detected"
                );
            }
        }

        record_status(span, status);
    }
}

/// `span` itself, or a disabled span.
pub(crate) fn current(span: Option<&Span>) -> Span {
    span.cloned().unwrap_or_else(Span::none)
}

/// The context handed to the parent: `ctx` re-parented under `span`.
///
/// A span the subscriber filtered out leaves `ctx` as it is.
pub(crate) fn scoped(ctx: &Context, span: Option<&Span>) -> Context {
    match span {
        Some(span) if span.id().is_some() => ctx.with_span(span.clone()),
        _ => ctx.clone(),
    }
}

/// Tag a span opened from a primitive entry point.
pub(crate) fn mark_deprecated(span: Option<&Span>, missing: &'static str) {
    if let Some(span) = span {
        span.record("sqltrace.warning", DEPRECATED);
        span.record("sqltrace.deprecated", missing);
    }
}

pub(crate) fn mark_missing_context(span: Option<&Span>) {
    if let Some(span) = span {
        span.record("sqltrace.warning", MISSING_CONTEXT);
    }
}

/// Set the status fields on `span`.
pub(crate) fn record_status(span: &Span, status: &Status) {
    span.record("otel.status_code", status.code.otel_code());
    span.record("sql.status", status.code.as_str());
    if let Some(message) = &status.message {
        span.record("otel.status_description", message.as_str());
    }
    match status.code {
        StatusCode::Ok => {}
        StatusCode::Unknown => tracing::error!(
            parent: span,
            error = status.message.as_deref().unwrap_or_default(),
            "Database call failed"
        ),
        code => tracing::debug!(
            parent: span,
            status = code.as_str(),
            "Database call finished"
        ),
    }
}

// Span fields are static, so parameters travel as events on the span.
fn record_arg(span: &Span, attr: &Attribute) {
    let key = attr.key.as_str();
    match &attr.value {
        AttributeValue::Str(value) => {
            tracing::debug!(parent: span, key, value = value.as_str(), "sql.arg")
        }
        AttributeValue::Int(value) => tracing::debug!(parent: span, key, value = *value, "sql.arg"),
        AttributeValue::Bool(value) => {
            tracing::debug!(parent: span, key, value = *value, "sql.arg")
        }
    }
}
