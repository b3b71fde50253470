//! Tracer capability interface.
//!
//! Span lifecycle, sampling, and export live entirely behind this trait; the
//! propagation machinery only needs the capability to exist so it can be
//! resolved from a host registry and merged into carriers.

use crate::context::TraceContext;

/// Mints trace contexts for new units of work.
pub trait Tracer: Send + Sync {
    /// Create the context for a new unit of work.
    ///
    /// With a parent, the new context continues the parent's trace; without
    /// one, it starts a fresh trace.
    fn next_context(&self, parent: Option<&TraceContext>) -> TraceContext;
}

/// Tracer assigning random UUID span ids.
///
/// Children inherit the parent's trace id, sampling decision, and baggage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTracer;

impl UuidTracer {
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for UuidTracer {
    fn next_context(&self, parent: Option<&TraceContext>) -> TraceContext {
        match parent {
            Some(parent) => {
                let mut next = TraceContext::new(
                    parent.trace_id.clone(),
                    uuid::Uuid::new_v4().to_string(),
                )
                .with_sampled(parent.sampled);
                next.baggage = parent.baggage.clone();
                next
            }
            None => TraceContext::new_root(),
        }
    }
}
