//! Ambient trace-context access and scoping.
//!
//! [`CurrentTraceContext`] answers "which trace context is active on the
//! calling thread right now" and hands out [`Scope`] guards that make a
//! context current for the duration of an operation. Release happens in
//! [`Drop`], so the prior ambient state is restored on every exit path,
//! including unwinding.
//!
//! The default implementation keeps an explicit [`ContextStack`] per thread
//! rather than a bare thread-local slot, so the push/pop discipline can be
//! tested without spawning threads.

use std::cell::RefCell;

use crate::context::TraceContext;

/// Accessor for the trace context ambient on the calling thread.
pub trait CurrentTraceContext: Send + Sync {
    /// The context currently active on the calling thread, if any.
    fn context(&self) -> Option<TraceContext>;

    /// Make `context` current until the returned scope is dropped.
    ///
    /// Passing `None` scopes to "no context"; restoration on drop is
    /// symmetric either way. Requesting the context that is already current
    /// is a no-op scope.
    fn maybe_scope(&self, context: Option<&TraceContext>) -> Scope;
}

/// Guard restoring the prior ambient context when dropped.
///
/// Not `Send`: a scope must be released on the thread that opened it.
pub struct Scope {
    release: Option<Box<dyn FnOnce()>>,
}

impl Scope {
    /// A scope whose drop runs the given release action exactly once.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A scope with nothing to restore.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("noop", &self.release.is_none())
            .finish()
    }
}

/// A trace context paired with the scope that keeps it current.
///
/// Convenience for hosts that open a context and need to carry both values
/// together until the work completes.
#[derive(Debug)]
pub struct ContextAndScope {
    context: TraceContext,
    _scope: Scope,
}

impl ContextAndScope {
    /// Pair a context with its open scope. Dropping the pair closes the scope.
    pub fn new(context: TraceContext, scope: Scope) -> Self {
        Self {
            context,
            _scope: scope,
        }
    }

    /// The context held open by this pair.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }
}

/// Explicit stack of ambient context frames.
///
/// Each frame is `Option<TraceContext>` so that "scoped to no context" is a
/// real frame and pop stays symmetric with push.
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<Option<TraceContext>>,
}

impl ContextStack {
    /// Create an empty stack.
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// The context on top of the stack, if the top frame holds one.
    pub fn current(&self) -> Option<&TraceContext> {
        self.frames.last().and_then(|frame| frame.as_ref())
    }

    /// Push a frame, making `context` (or no context) current.
    pub fn push(&mut self, context: Option<TraceContext>) {
        self.frames.push(context);
    }

    /// Pop the top frame, restoring whatever was current before it.
    pub fn pop(&mut self) -> Option<Option<TraceContext>> {
        self.frames.pop()
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame is on the stack.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

thread_local! {
    static AMBIENT: RefCell<ContextStack> = const { RefCell::new(ContextStack::new()) };
}

/// Default [`CurrentTraceContext`] backed by a per-thread [`ContextStack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCurrentTraceContext;

impl ThreadCurrentTraceContext {
    pub fn new() -> Self {
        Self
    }
}

impl CurrentTraceContext for ThreadCurrentTraceContext {
    fn context(&self) -> Option<TraceContext> {
        AMBIENT.with(|stack| stack.borrow().current().cloned())
    }

    fn maybe_scope(&self, context: Option<&TraceContext>) -> Scope {
        let already_current = AMBIENT.with(|stack| stack.borrow().current() == context);
        if already_current {
            return Scope::noop();
        }

        AMBIENT.with(|stack| stack.borrow_mut().push(context.cloned()));
        Scope::new(|| {
            AMBIENT.with(|stack| stack.borrow_mut().pop());
        })
    }
}
