//! Tracing API surface for spor.
//!
//! This crate defines the small set of contracts the propagation machinery in
//! `spor-reactor` is built against:
//!
//! - **Context**: the immutable [`TraceContext`] value identifying one unit of
//!   work within a distributed trace
//! - **Current**: the [`CurrentTraceContext`] accessor for the ambient context
//!   of the calling thread, with RAII [`Scope`] guards over an explicit
//!   [`ContextStack`]
//! - **Tracer**: the opaque [`Tracer`] capability that mints new contexts
//!
//! Span creation, sampling, and export are deliberately not part of this
//! crate; they belong to whatever tracer implementation the host wires in.
//!
//! # Usage
//!
//! ```rust
//! use spor_api::{CurrentTraceContext, ThreadCurrentTraceContext, TraceContext};
//!
//! let current = ThreadCurrentTraceContext::default();
//! let ctx = TraceContext::new_root();
//!
//! assert_eq!(current.context(), None);
//! {
//!     let _scope = current.maybe_scope(Some(&ctx));
//!     assert_eq!(current.context(), Some(ctx.clone()));
//! }
//! assert_eq!(current.context(), None);
//! ```

pub mod context;
pub mod current;
pub mod tracer;

// Re-export main types
pub use context::TraceContext;
pub use current::{
    ContextAndScope, ContextStack, CurrentTraceContext, Scope, ThreadCurrentTraceContext,
};
pub use tracer::{Tracer, UuidTracer};
