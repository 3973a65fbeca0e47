//! Execution context handed through every context-aware driver call.

use std::time::{Duration, Instant};

use tracing::Span;

/// Carries the caller's active span and an optional deadline.
///
/// Cancellation and timeouts are the driver's business: the decorators only
/// pass the context along and record whatever error comes back.
#[derive(Debug, Clone, Default)]
pub struct Context {
    span: Option<Span>,
    deadline: Option<Instant>,
}

impl Context {
    /// An empty context with no parent span and no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Capture the caller's current `tracing` span as the parent.
    pub fn current() -> Self {
        Self::background().with_span(Span::current())
    }

    /// Derive a context whose parent span is `span`.
    ///
    /// Disabled spans are treated as absent: the current parent, if any, is
    /// kept.
    pub fn with_span(&self, span: Span) -> Self {
        let span = match span.id() {
            Some(_) => Some(span),
            None => self.span.clone(),
        };
        Self {
            span,
            deadline: self.deadline,
        }
    }

    /// Derive a context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            span: self.span.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The active span, if any.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
