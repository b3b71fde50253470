//! Stage attachment policy.
//!
//! [`LiftPolicy`] is consulted once per subscribe event and decides whether a
//! candidate subscriber gets wrapped in a
//! [`ScopePassingSubscriber`](crate::subscriber::ScopePassingSubscriber) or
//! passes through untouched. The decision is fail-open throughout: a host
//! that is not ready, a missing accessor, or a subscriber with no parent
//! context to propagate all leave the pipeline exactly as it was.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::{debug, trace};

use spor_api::{CurrentTraceContext, TraceContext, Tracer};

use crate::carrier::Carrier;
use crate::registry::{CapabilityRegistry, LazyCapability, resolve_capability};
use crate::stream::{Publisher, Subscriber};
use crate::subscriber::ScopePassingSubscriber;

/// Host-supplied function run over the merged carrier right before a wrapper
/// is constructed. Lets integrations inject ambient values the core does not
/// know about.
pub type CarrierHook = Arc<dyn Fn(Carrier) -> Carrier + Send + Sync>;

/// Per-subscribe decision logic for trace-context propagation.
///
/// Built once per host registry and registered with the pipeline engine via
/// [`hook_fn`](Self::hook_fn). The carrier hook defaults to identity and is
/// injected at construction rather than through process-global state.
pub struct LiftPolicy {
    registry: Arc<dyn CapabilityRegistry>,
    current: LazyCapability<dyn CurrentTraceContext>,
    tracer: LazyCapability<dyn Tracer>,
    hook: CarrierHook,
}

impl LiftPolicy {
    /// Create a policy resolving its capabilities lazily from `registry`.
    pub fn new(registry: Arc<dyn CapabilityRegistry>) -> Self {
        let current = {
            let registry = registry.clone();
            LazyCapability::new(move || {
                resolve_capability::<Arc<dyn CurrentTraceContext>>(registry.as_ref())
            })
        };
        let tracer = {
            let registry = registry.clone();
            LazyCapability::new(move || resolve_capability::<Arc<dyn Tracer>>(registry.as_ref()))
        };
        Self {
            registry,
            current,
            tracer,
            hook: Arc::new(|carrier| carrier),
        }
    }

    /// Replace the carrier hook.
    pub fn with_carrier_hook(
        mut self,
        hook: impl Fn(Carrier) -> Carrier + Send + Sync + 'static,
    ) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Decide how to attach `subscriber` to `publisher`.
    ///
    /// Returns the original subscriber untouched (same `Arc`) whenever there
    /// is nothing to propagate, or a scope-passing wrapper around it.
    pub fn lift<T: 'static>(
        &self,
        _publisher: &dyn Publisher<T>,
        subscriber: Arc<dyn Subscriber<T>>,
    ) -> Arc<dyn Subscriber<T>> {
        if !self.registry.is_active() || !self.registry.is_running() {
            trace!("host registry is not ready; leaving subscriber unwrapped");
            return subscriber;
        }

        let carrier = carrier_of(subscriber.as_ref());

        let Some(current) = self.current.get() else {
            trace!("no current-context accessor available; leaving subscriber unwrapped");
            return subscriber;
        };

        let Some(parent) = parent_context(&carrier, current.as_ref()) else {
            // No parent to scope; pass-through is the expected outcome.
            return subscriber;
        };

        // Re-subscription through defer/retry style operators hands us our
        // own wrapper back; an unchanged parent means nothing to re-wrap.
        if let Some(existing) = subscriber.propagated_parent() {
            if existing == parent {
                trace!(parent = %parent, "subscriber already propagates this parent; skipping wrap");
                return subscriber;
            }
        }

        let carrier = self.carrier_with_capabilities(carrier, current.clone());
        let carrier = (self.hook)(carrier);
        trace!(parent = %parent, carrier = ?carrier, "wrapping subscriber for scope passing");

        ScopePassingSubscriber::new(subscriber, carrier, current, parent)
    }

    /// The attachment hook shape a hosting pipeline engine registers
    /// globally: `(publisher, subscriber) -> subscriber`.
    pub fn hook_fn<T: 'static>(
        self: &Arc<Self>,
    ) -> impl Fn(&dyn Publisher<T>, Arc<dyn Subscriber<T>>) -> Arc<dyn Subscriber<T>> + Send + Sync + 'static
    {
        let policy = self.clone();
        move |publisher: &dyn Publisher<T>, subscriber: Arc<dyn Subscriber<T>>| {
            policy.lift(publisher, subscriber)
        }
    }

    /// Fill in the tracer and accessor capabilities, leaving explicit carrier
    /// values untouched: an inner segment that stored its own wins.
    fn carrier_with_capabilities(
        &self,
        carrier: Carrier,
        current: Arc<dyn CurrentTraceContext>,
    ) -> Carrier {
        let mut carrier = carrier;
        if !carrier.has_key::<Arc<dyn Tracer>>() {
            match self.tracer.get_or_error() {
                Ok(tracer) => carrier = carrier.put(tracer),
                Err(err) => debug!(%err, "carrier left without a tracer capability"),
            }
        }
        if !carrier.has_key::<Arc<dyn CurrentTraceContext>>() {
            carrier = carrier.put(current);
        }
        carrier
    }
}

impl std::fmt::Debug for LiftPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiftPolicy")
            .field("current", &self.current)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

/// Read the subscriber's carrier, treating a panicking implementation as an
/// empty carrier. Diagnostic lookups must never break the pipeline.
fn carrier_of<T>(subscriber: &dyn Subscriber<T>) -> Carrier {
    match std::panic::catch_unwind(AssertUnwindSafe(|| subscriber.carrier())) {
        Ok(carrier) => carrier,
        Err(_) => {
            debug!("carrier retrieval panicked; treating as empty");
            Carrier::empty()
        }
    }
}

/// The effective parent: the carrier's explicit `TraceContext` when present,
/// the ambient context otherwise.
fn parent_context(
    carrier: &Carrier,
    fallback: &dyn CurrentTraceContext,
) -> Option<TraceContext> {
    if let Some(explicit) = carrier.get::<TraceContext>() {
        return Some(explicit);
    }
    fallback.context()
}
