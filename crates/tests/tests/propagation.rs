//! Cross-crate integration tests
//!
//! These tests drive full pipelines through the lift decision and the
//! scope-passing wrapper, including callback delivery from worker threads,
//! and verify that the ambient trace context is correct inside every
//! downstream callback and untouched outside of them.

use std::sync::{Arc, Mutex};

use spor_api::{CurrentTraceContext, ThreadCurrentTraceContext, TraceContext, Tracer, UuidTracer};
use spor_reactor::{
    CapabilityRegistry, Carrier, LiftPolicy, Publisher, StaticRegistry, StreamError, Subscriber,
    Subscription,
};

fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Policy backed by a refreshed registry with accessor and tracer wired in.
fn ready_policy() -> LiftPolicy {
    let current: Arc<dyn CurrentTraceContext> = Arc::new(ThreadCurrentTraceContext::new());
    let tracer: Arc<dyn Tracer> = Arc::new(UuidTracer::new());
    let registry: Arc<dyn CapabilityRegistry> = Arc::new(
        StaticRegistry::new()
            .with_capability(current)
            .with_capability(tracer)
            .refreshed(),
    );
    LiftPolicy::new(registry)
}

/// Downstream subscriber recording what it saw and under which ambient
/// context each signal arrived.
#[derive(Default)]
struct Recorder {
    items: Mutex<Vec<u32>>,
    contexts: Mutex<Vec<Option<TraceContext>>>,
    completed: Mutex<bool>,
    errors: Mutex<Vec<String>>,
    carrier: Carrier,
}

impl Recorder {
    fn new() -> Self {
        Self::default()
    }

    fn with_carrier(carrier: Carrier) -> Self {
        Self {
            carrier,
            ..Self::default()
        }
    }

    fn ambient() -> Option<TraceContext> {
        ThreadCurrentTraceContext::new().context()
    }
}

impl Subscriber<u32> for Recorder {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.contexts.lock().unwrap().push(Self::ambient());
        subscription.request(u64::MAX);
    }

    fn on_next(&self, item: u32) {
        self.items.lock().unwrap().push(item);
        self.contexts.lock().unwrap().push(Self::ambient());
    }

    fn on_error(&self, error: StreamError) {
        self.errors.lock().unwrap().push(error.to_string());
        self.contexts.lock().unwrap().push(Self::ambient());
    }

    fn on_complete(&self) {
        *self.completed.lock().unwrap() = true;
        self.contexts.lock().unwrap().push(Self::ambient());
    }

    fn carrier(&self) -> Carrier {
        self.carrier.clone()
    }
}

struct NoopSubscription;

impl Subscription for NoopSubscription {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {}
}

/// Publisher that runs every subscribe through a lift policy and then
/// synchronously emits a fixed set of items.
struct EmittingPublisher {
    items: Vec<u32>,
    policy: Arc<LiftPolicy>,
}

impl Publisher<u32> for EmittingPublisher {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<u32>>) {
        let subscriber = self.policy.lift(self, subscriber);
        subscriber.on_subscribe(Arc::new(NoopSubscription));
        for item in &self.items {
            subscriber.on_next(*item);
        }
        subscriber.on_complete();
    }
}

#[test]
fn test_scenario_empty_carrier_ambient_context() {
    init_diagnostics();
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");
    let publisher = EmittingPublisher {
        items: vec![1, 2, 3],
        policy: Arc::new(ready_policy()),
    };

    let recorder = Arc::new(Recorder::new());
    {
        let _scope = current.maybe_scope(Some(&ambient));
        publisher.subscribe(recorder.clone());
    }

    assert_eq!(*recorder.items.lock().unwrap(), vec![1, 2, 3]);
    assert!(*recorder.completed.lock().unwrap());

    // on_subscribe + three on_next + on_complete, all under {T1,S1}.
    let contexts = recorder.contexts.lock().unwrap();
    assert_eq!(contexts.len(), 5);
    for ctx in contexts.iter() {
        assert_eq!(ctx.as_ref(), Some(&ambient));
    }
    assert_eq!(current.context(), None);
}

#[test]
fn test_scenario_explicit_carrier_wins() {
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");
    let explicit = TraceContext::new("T2", "S2");
    let policy = ready_policy();

    let recorder = Arc::new(Recorder::with_carrier(
        Carrier::empty().put(explicit.clone()),
    ));
    let publisher = EmittingPublisher {
        items: vec![7],
        policy: Arc::new(policy),
    };

    {
        let _scope = current.maybe_scope(Some(&ambient));
        publisher.subscribe(recorder.clone());
    }

    let contexts = recorder.contexts.lock().unwrap();
    assert!(!contexts.is_empty());
    for ctx in contexts.iter() {
        assert_eq!(ctx.as_ref(), Some(&explicit));
    }
}

#[test]
fn test_scenario_resubscription_is_identity_stable() {
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");
    let policy = Arc::new(ready_policy());
    let publisher = EmittingPublisher {
        items: Vec::new(),
        policy: policy.clone(),
    };

    let _scope = current.maybe_scope(Some(&ambient));
    let wrapped = policy.lift(&publisher, Arc::new(Recorder::new()));
    let again = policy.lift(&publisher, wrapped.clone());

    assert!(Arc::ptr_eq(&wrapped, &again));
    assert_eq!(wrapped.propagated_parent(), Some(ambient));
}

#[test]
fn test_equal_value_distinct_identity_parents() {
    // Two structurally equal contexts built independently must suppress
    // re-wrapping: equality is value-based, so scoping to either is
    // observationally the same.
    let current = ThreadCurrentTraceContext::new();
    let first = TraceContext::new("T1", "S1").with_baggage("tenant", "acme");
    let second = TraceContext::new("T1", "S1").with_baggage("tenant", "acme");
    assert_eq!(first, second);

    let policy = Arc::new(ready_policy());
    let publisher = EmittingPublisher {
        items: Vec::new(),
        policy: policy.clone(),
    };

    let wrapped = {
        let _scope = current.maybe_scope(Some(&first));
        policy.lift(&publisher, Arc::new(Recorder::new()))
    };
    let again = {
        let _scope = current.maybe_scope(Some(&second));
        policy.lift(&publisher, wrapped.clone())
    };

    assert!(Arc::ptr_eq(&wrapped, &again));
}

#[test]
fn test_fail_open_before_refresh_and_after_close() {
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");

    let accessor: Arc<dyn CurrentTraceContext> = Arc::new(ThreadCurrentTraceContext::new());
    let registry = Arc::new(StaticRegistry::new().with_capability(accessor));
    let policy = LiftPolicy::new(registry.clone() as Arc<dyn CapabilityRegistry>);
    let publisher = EmittingPublisher {
        items: Vec::new(),
        policy: Arc::new(ready_policy()),
    };

    let _scope = current.maybe_scope(Some(&ambient));

    // Not yet refreshed: pass-through.
    let sink: Arc<dyn Subscriber<u32>> = Arc::new(Recorder::new());
    let out = policy.lift(&publisher, sink.clone());
    assert!(Arc::ptr_eq(&sink, &out));

    // Refreshed: wraps.
    registry.lifecycle().mark_refreshed();
    let out = policy.lift(&publisher, sink.clone());
    assert!(!Arc::ptr_eq(&sink, &out));

    // Closed: pass-through again.
    registry.lifecycle().mark_closed();
    let out = policy.lift(&publisher, sink.clone());
    assert!(Arc::ptr_eq(&sink, &out));
}

#[test]
fn test_no_parent_means_no_wrapper() {
    let policy = ready_policy();
    let publisher = EmittingPublisher {
        items: vec![1],
        policy: Arc::new(ready_policy()),
    };

    // No ambient context, empty carrier.
    let sink: Arc<dyn Subscriber<u32>> = Arc::new(Recorder::new());
    let out = policy.lift(&publisher, sink.clone());
    assert!(Arc::ptr_eq(&sink, &out));

    // Data still flows, just without trace continuity.
    let recorder = Arc::new(Recorder::new());
    publisher.subscribe(recorder.clone());
    assert_eq!(*recorder.items.lock().unwrap(), vec![1]);
    for ctx in recorder.contexts.lock().unwrap().iter() {
        assert_eq!(ctx.as_ref(), None);
    }
}

#[test]
fn test_baggage_survives_propagation_and_serialization() {
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1").with_baggage("tenant", "acme");
    let publisher = EmittingPublisher {
        items: vec![5],
        policy: Arc::new(ready_policy()),
    };

    let recorder = Arc::new(Recorder::new());
    {
        let _scope = current.maybe_scope(Some(&ambient));
        publisher.subscribe(recorder.clone());
    }

    let contexts = recorder.contexts.lock().unwrap();
    let observed = contexts[1].clone().unwrap();
    assert_eq!(observed.baggage.get("tenant").map(String::as_str), Some("acme"));

    // Hosts ship contexts across process boundaries as JSON.
    let json = serde_json::to_string(&observed).unwrap();
    let back: TraceContext = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ambient);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callbacks_from_worker_threads_see_parent() {
    init_diagnostics();
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");
    let policy = Arc::new(ready_policy());
    let publisher = EmittingPublisher {
        items: Vec::new(),
        policy: policy.clone(),
    };

    let recorder = Arc::new(Recorder::new());
    let wrapped = {
        let _scope = current.maybe_scope(Some(&ambient));
        policy.lift(&publisher, recorder.clone() as Arc<dyn Subscriber<u32>>)
    };
    wrapped.on_subscribe(Arc::new(NoopSubscription));

    // Deliver items from whatever worker thread tokio picks; none of those
    // threads has the ambient context set.
    let mut handles = Vec::new();
    for item in 0..16u32 {
        let wrapped = wrapped.clone();
        handles.push(tokio::spawn(async move {
            assert_eq!(ThreadCurrentTraceContext::new().context(), None);
            wrapped.on_next(item);
            // The scope closed behind the callback; the worker thread keeps
            // no residue.
            assert_eq!(ThreadCurrentTraceContext::new().context(), None);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    wrapped.on_complete();

    let contexts = recorder.contexts.lock().unwrap();
    // on_subscribe + 16 on_next + on_complete.
    assert_eq!(contexts.len(), 18);
    for ctx in contexts.iter() {
        assert_eq!(ctx.as_ref(), Some(&ambient));
    }
    assert_eq!(recorder.items.lock().unwrap().len(), 16);
}

#[test]
fn test_error_signal_scoped_and_propagated() {
    let current = ThreadCurrentTraceContext::new();
    let ambient = TraceContext::new("T1", "S1");
    let policy = Arc::new(ready_policy());
    let publisher = EmittingPublisher {
        items: Vec::new(),
        policy: policy.clone(),
    };

    let recorder = Arc::new(Recorder::new());
    let wrapped = {
        let _scope = current.maybe_scope(Some(&ambient));
        policy.lift(&publisher, recorder.clone() as Arc<dyn Subscriber<u32>>)
    };

    wrapped.on_error(Arc::new(std::io::Error::other("upstream failed")));

    assert_eq!(*recorder.errors.lock().unwrap(), ["upstream failed"]);
    let contexts = recorder.contexts.lock().unwrap();
    assert_eq!(contexts[0].as_ref(), Some(&ambient));
    assert_eq!(current.context(), None);
}
