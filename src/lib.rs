//! Request-scoped correlation context for RPC servers.
//!
//! Every inbound call gets a `request_id` (propagated from `x-request-id` or
//! generated), plus `session_id`/`user_id` when the caller sends them. The
//! identifiers are bound to the call, not to the worker thread running it, and
//! are unbound on the call's terminal event: completion or cancellation.
//!
//! Two integration points are provided:
//! - [`middleware::RequestContextLayer`], a tower layer for HTTP and gRPC
//!   servers built on `http::Request`/`http::Response`.
//! - [`interceptor::RequestContextInterceptor`], for transports that deliver
//!   call lifecycle notifications through a listener.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod logging;
pub mod middleware;
pub mod routes;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{CallContext, CallIdentifiers, CallScope, TerminalEvent};
pub use error::CorrelationError;
pub use events::BusinessEventLogger;
pub use interceptor::{
    CallHandler, CallListener, ContextClearingListener, RequestContextInterceptor,
};
pub use middleware::{PropagateContextLayer, RequestContextLayer};
