//! Reactive-stream seam the decorator plugs into.
//!
//! These traits mirror the reactive-streams protocol: a [`Publisher`] accepts
//! a [`Subscriber`], hands it a [`Subscription`], and thereafter delivers
//! `on_next*` / `on_error` / `on_complete` in protocol order. The hosting
//! engine owns scheduling; nothing here blocks or buffers.
//!
//! Two extension surfaces beyond the base protocol:
//!
//! - [`Subscriber::carrier`] exposes the subscriber's ambient [`Carrier`] to
//!   upstream operators (the `currentContext` surface)
//! - [`Subscriber::scan`] answers structural introspection queries for
//!   pipeline-debugging tools, with no effect on data flow

use std::error::Error;
use std::sync::Arc;

use spor_api::TraceContext;

use crate::carrier::Carrier;

/// Error signal flowing down a pipeline. Shared, since a terminal signal may
/// be observed by several stages.
pub type StreamError = Arc<dyn Error + Send + Sync>;

/// Upstream handle for backpressure and cancellation.
pub trait Subscription: Send + Sync {
    /// Request `n` more items from upstream.
    fn request(&self, n: u64);

    /// Cancel the subscription.
    fn cancel(&self);
}

/// One stage's downstream end of an asynchronous data flow.
pub trait Subscriber<T>: Send + Sync {
    /// Called once, before any other signal, with the upstream subscription.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Called for every data item.
    fn on_next(&self, item: T);

    /// Terminal failure signal.
    fn on_error(&self, error: StreamError);

    /// Terminal completion signal.
    fn on_complete(&self);

    /// The carrier visible to upstream and sibling stages.
    fn carrier(&self) -> Carrier {
        Carrier::empty()
    }

    /// The parent context this subscriber re-establishes on every callback,
    /// when it is a scope-passing wrapper. Lets the attachment policy suppress
    /// redundant re-wrapping without downcasting.
    fn propagated_parent(&self) -> Option<TraceContext> {
        None
    }

    /// Structural introspection for diagnostics. No tracing effect.
    fn scan(&self, attr: Attr) -> Option<ScanValue<T>> {
        let _ = attr;
        None
    }
}

/// Upstream end of an asynchronous data flow.
pub trait Publisher<T>: Send + Sync {
    /// Attach `subscriber` to this publisher.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Introspection query keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    /// The structural parent (upstream subscription).
    Parent,
    /// How the stage executes relative to its caller.
    RunStyle,
    /// The actual delegate subscriber, for decorators.
    Actual,
}

/// Execution-style marker reported through [`Attr::RunStyle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStyle {
    /// Delegation on the caller's thread, no buffering or hand-off.
    Sync,
    /// Delegation through a queue or scheduler.
    Async,
}

/// Introspection query answers.
#[derive(Clone)]
pub enum ScanValue<T> {
    Parent(Arc<dyn Subscription>),
    RunStyle(RunStyle),
    Actual(Arc<dyn Subscriber<T>>),
}

impl<T> std::fmt::Debug for ScanValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanValue::Parent(_) => f.write_str("Parent(..)"),
            ScanValue::RunStyle(style) => write!(f, "RunStyle({style:?})"),
            ScanValue::Actual(_) => f.write_str("Actual(..)"),
        }
    }
}
