//! Trace context value type.
//!
//! A [`TraceContext`] identifies one unit of work within a distributed trace.
//! It is immutable once built and compares by value: two contexts are equal
//! iff every identifying field matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifying data for one span of work within a distributed trace.
///
/// Construction fixes the value for good; "modification" happens through the
/// builder-style `with_*` methods, which consume the context and return a new
/// one. Safe to share across threads without synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceContext {
    /// Identifier shared by every span in the trace.
    pub trace_id: String,

    /// Identifier of this span within the trace.
    pub span_id: String,

    /// Sampling decision made at the root of the trace.
    pub sampled: bool,

    /// Extra key/value baggage carried alongside the ids.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub baggage: BTreeMap<String, String>,
}

impl TraceContext {
    /// Create a context with the given trace and span ids, sampled by default.
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled: true,
            baggage: BTreeMap::new(),
        }
    }

    /// Create a root context with random UUID ids.
    pub fn new_root() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            uuid::Uuid::new_v4().to_string(),
        )
    }

    /// Set the sampling decision.
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.sampled = sampled;
        self
    }

    /// Attach a baggage entry.
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trace_id, self.span_id)
    }
}
