//! Host capability registry and lazy resolution.
//!
//! The propagation machinery depends on capabilities (the current-context
//! accessor, the tracer) that the hosting environment may not have ready at
//! the time a pipeline is assembled. [`LazyCapability`] defers resolution to
//! first use, retries until it first succeeds, and caches forever after.
//! [`CapabilityRegistry`] is the seam the host implements; lifecycle state
//! lives on the registry instance itself via [`RegistryLifecycle`].

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Error type for strict capability resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("capability `{capability}` could not be resolved from the host registry")]
    Unresolved { capability: &'static str },
}

/// Registry of host-provided capabilities.
///
/// `resolve` is keyed by the [`TypeId`] of the stored value type, matching
/// the [`Carrier`](crate::carrier::Carrier) convention; trait capabilities
/// are stored as their `Arc<dyn Trait>` handle.
pub trait CapabilityRegistry: Send + Sync {
    /// Whether the host environment has finished starting and is not closed.
    fn is_active(&self) -> bool;

    /// Whether the host environment is currently serving work.
    fn is_running(&self) -> bool;

    /// Look up a capability by the [`TypeId`] of its stored type.
    fn resolve(&self, capability: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Resolve a capability from `registry` as a typed value.
pub fn resolve_capability<T: Clone + Send + Sync + 'static>(
    registry: &dyn CapabilityRegistry,
) -> Option<T> {
    registry
        .resolve(TypeId::of::<T>())
        .and_then(|value| value.downcast_ref::<T>().cloned())
}

/// Startup/shutdown state owned by one registry instance.
///
/// Both flags latch: once refreshed stays refreshed, once closed stays
/// closed. A registry is active when it has refreshed and not closed.
#[derive(Debug, Default)]
pub struct RegistryLifecycle {
    refreshed: AtomicBool,
    closed: AtomicBool,
}

impl RegistryLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the host environment finished starting.
    pub fn mark_refreshed(&self) {
        self.refreshed.store(true, Ordering::SeqCst);
    }

    /// Record that the host environment began shutting down.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_refreshed(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.is_refreshed() && !self.is_closed()
    }
}

/// Map-backed [`CapabilityRegistry`] for hosts and tests.
pub struct StaticRegistry {
    lifecycle: RegistryLifecycle,
    capabilities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl StaticRegistry {
    /// An empty, not-yet-refreshed registry.
    pub fn new() -> Self {
        Self {
            lifecycle: RegistryLifecycle::new(),
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability under the [`TypeId`] of `T`.
    pub fn with_capability<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.capabilities.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// The lifecycle state owned by this registry.
    pub fn lifecycle(&self) -> &RegistryLifecycle {
        &self.lifecycle
    }

    /// Mark refreshed and return self, for one-line test setup.
    pub fn refreshed(self) -> Self {
        self.lifecycle.mark_refreshed();
        self
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry for StaticRegistry {
    fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_active()
    }

    fn resolve(&self, capability: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.capabilities.get(&capability).cloned()
    }
}

impl fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("lifecycle", &self.lifecycle)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

/// Deferred handle to a capability that may not exist yet.
///
/// The supplier runs on every [`get`](Self::get) until it first returns a
/// value; that value is then cached for the life of the handle and the
/// supplier is never consulted again. Concurrent first resolutions may run
/// the supplier redundantly; the first cached value wins and every caller
/// observes it from then on.
pub struct LazyCapability<T: ?Sized> {
    supplier: Box<dyn Fn() -> Option<Arc<T>> + Send + Sync>,
    cache: OnceLock<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> LazyCapability<T> {
    /// Create a handle resolving through `supplier`.
    pub fn new(supplier: impl Fn() -> Option<Arc<T>> + Send + Sync + 'static) -> Self {
        Self {
            supplier: Box::new(supplier),
            cache: OnceLock::new(),
        }
    }

    /// The capability, or `None` when it cannot be resolved yet. Never fails;
    /// intended for hot paths where tracing degrades gracefully.
    pub fn get(&self) -> Option<Arc<T>> {
        if let Some(resolved) = self.cache.get() {
            return Some(resolved.clone());
        }
        let resolved = (self.supplier)()?;
        // A concurrent resolver may have beaten us; serve whichever won.
        let _ = self.cache.set(resolved.clone());
        Some(self.cache.get().cloned().unwrap_or(resolved))
    }

    /// The capability, or [`ResolveError`] when unavailable. For callers that
    /// have already established activation preconditions.
    pub fn get_or_error(&self) -> Result<Arc<T>, ResolveError> {
        self.get().ok_or(ResolveError::Unresolved {
            capability: type_name::<T>(),
        })
    }
}

impl<T: ?Sized> fmt::Debug for LazyCapability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCapability")
            .field("capability", &type_name::<T>())
            .field("resolved", &self.cache.get().is_some())
            .finish()
    }
}
