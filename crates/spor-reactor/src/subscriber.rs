//! Scope-passing subscriber decorator.
//!
//! [`ScopePassingSubscriber`] wraps a downstream subscriber together with a
//! trace context captured at wrap time. Every callback and every subscription
//! method re-establishes that context as ambient before delegating, and the
//! RAII scope guard restores the prior ambient state afterwards on every exit
//! path, unwinding included. The hosting engine may therefore deliver each
//! callback on whichever thread it likes.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use tracing::trace;

use spor_api::{CurrentTraceContext, TraceContext};

use crate::carrier::Carrier;
use crate::stream::{Attr, RunStyle, ScanValue, StreamError, Subscriber, Subscription};

/// Subscriber decorator that re-establishes a captured trace context around
/// every delegated signal.
///
/// The captured parent is fixed for the wrapper's lifetime; later changes to
/// the ambient thread context do not affect it.
pub struct ScopePassingSubscriber<T> {
    subscriber: Arc<dyn Subscriber<T>>,
    carrier: Carrier,
    current: Arc<dyn CurrentTraceContext>,
    parent: TraceContext,
    // Written once, at on_subscribe; reactive-streams ordering guarantees
    // on_subscribe happens-before request/cancel.
    subscription: OnceLock<Arc<dyn Subscription>>,
    self_ref: Weak<ScopePassingSubscriber<T>>,
}

impl<T: 'static> ScopePassingSubscriber<T> {
    /// Wrap `subscriber`, scoping every delegated signal to `parent`.
    ///
    /// The exposed carrier is `carrier` with the `TraceContext` entry
    /// overridden to `parent` when the two differ, so downstream inspection
    /// always observes the context actually propagated.
    pub fn new(
        subscriber: Arc<dyn Subscriber<T>>,
        carrier: Carrier,
        current: Arc<dyn CurrentTraceContext>,
        parent: TraceContext,
    ) -> Arc<Self> {
        let carrier = if carrier.get::<TraceContext>().as_ref() != Some(&parent) {
            carrier.put(parent.clone())
        } else {
            carrier
        };
        trace!(parent = %parent, carrier = ?carrier, "created scope passing subscriber");

        Arc::new_cyclic(|self_ref| Self {
            subscriber,
            carrier,
            current,
            parent,
            subscription: OnceLock::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// The trace context captured at wrap time.
    pub fn parent(&self) -> &TraceContext {
        &self.parent
    }
}

impl<T: 'static> Subscriber<T> for ScopePassingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let _ = self.subscription.set(subscription);
        let _scope = self.current.maybe_scope(Some(&self.parent));
        if let Some(proxy) = self.self_ref.upgrade() {
            self.subscriber.on_subscribe(proxy);
        }
    }

    fn on_next(&self, item: T) {
        let _scope = self.current.maybe_scope(Some(&self.parent));
        self.subscriber.on_next(item);
    }

    fn on_error(&self, error: StreamError) {
        let _scope = self.current.maybe_scope(Some(&self.parent));
        self.subscriber.on_error(error);
    }

    fn on_complete(&self) {
        let _scope = self.current.maybe_scope(Some(&self.parent));
        self.subscriber.on_complete();
    }

    fn carrier(&self) -> Carrier {
        self.carrier.clone()
    }

    fn propagated_parent(&self) -> Option<TraceContext> {
        Some(self.parent.clone())
    }

    fn scan(&self, attr: Attr) -> Option<ScanValue<T>> {
        match attr {
            Attr::Parent => self.subscription.get().cloned().map(ScanValue::Parent),
            Attr::RunStyle => Some(ScanValue::RunStyle(RunStyle::Sync)),
            Attr::Actual => Some(ScanValue::Actual(self.subscriber.clone())),
        }
    }
}

impl<T: 'static> Subscription for ScopePassingSubscriber<T> {
    fn request(&self, n: u64) {
        let _scope = self.current.maybe_scope(Some(&self.parent));
        if let Some(subscription) = self.subscription.get() {
            subscription.request(n);
        }
    }

    fn cancel(&self) {
        let _scope = self.current.maybe_scope(Some(&self.parent));
        if let Some(subscription) = self.subscription.get() {
            subscription.cancel();
        }
    }
}

impl<T> fmt::Debug for ScopePassingSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopePassingSubscriber")
            .field("parent", &self.parent)
            .field("carrier", &self.carrier)
            .field("subscribed", &self.subscription.get().is_some())
            .finish_non_exhaustive()
    }
}
