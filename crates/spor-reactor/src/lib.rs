//! Trace-context propagation for reactive-stream pipelines.
//!
//! Reactive pipelines run callbacks on arbitrary threads at arbitrary times,
//! so "whatever trace context is on this thread" is the wrong question. This
//! crate answers it structurally instead:
//!
//! - **Carrier**: an immutable, persistent key/value bag ([`Carrier`]) that
//!   flows alongside data, independent of thread identity
//! - **Stream**: the [`Publisher`]/[`Subscriber`]/[`Subscription`] seam the
//!   hosting engine exposes
//! - **Subscriber**: [`ScopePassingSubscriber`], the decorator that
//!   re-establishes a captured context around every delegated signal
//! - **Lift**: [`LiftPolicy`], the once-per-subscribe decision that wraps a
//!   subscriber or passes it through, fail-open on every missing dependency
//! - **Registry**: the host [`CapabilityRegistry`] seam with
//!   [`LazyCapability`] resolution for dependencies that are not ready yet
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use spor_api::{CurrentTraceContext, ThreadCurrentTraceContext, Tracer, UuidTracer};
//! use spor_reactor::{LiftPolicy, StaticRegistry};
//!
//! let current: Arc<dyn CurrentTraceContext> = Arc::new(ThreadCurrentTraceContext::new());
//! let tracer: Arc<dyn Tracer> = Arc::new(UuidTracer::new());
//! let registry = StaticRegistry::new()
//!     .with_capability(current.clone())
//!     .with_capability(tracer)
//!     .refreshed();
//!
//! let policy = Arc::new(LiftPolicy::new(Arc::new(registry)));
//! // Register policy.hook_fn::<Item>() with the pipeline engine; every
//! // subscribe event then flows through the lift decision.
//! ```

pub mod carrier;
pub mod lift;
pub mod registry;
pub mod stream;
pub mod subscriber;

// Re-export main types
pub use carrier::Carrier;
pub use lift::{CarrierHook, LiftPolicy};
pub use registry::{
    CapabilityRegistry, LazyCapability, RegistryLifecycle, ResolveError, StaticRegistry,
    resolve_capability,
};
pub use stream::{Attr, Publisher, RunStyle, ScanValue, StreamError, Subscriber, Subscription};
pub use subscriber::ScopePassingSubscriber;
