//! Callback-style server interceptor.
//!
//! Transports that drive calls through listener callbacks (rather than a
//! single future) wrap their handlers with [`RequestContextInterceptor`].

pub mod listener;

use axum::http::HeaderMap;

use crate::context::{CallIdentifiers, CallScope};

pub use listener::{CallListener, ContextClearingListener};

/// Next step in the call-handling chain
pub trait CallHandler<C> {
    type Listener: CallListener;

    fn start_call(&mut self, call: C, headers: &HeaderMap) -> Self::Listener;
}

impl<C, L, F> CallHandler<C> for F
where
    F: FnMut(C, &HeaderMap) -> L,
    L: CallListener,
{
    type Listener = L;

    fn start_call(&mut self, call: C, headers: &HeaderMap) -> L {
        self(call, headers)
    }
}

/// Binds `request_id`, `session_id` and `user_id` to every call it wraps and
/// unbinds them on the call's terminal event.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContextInterceptor;

impl RequestContextInterceptor {
    pub fn new() -> Self {
        Self
    }

    /// Bind the call's identifiers, start the call on `next` and return the
    /// listener that tears the binding down again.
    pub fn intercept<C, H>(
        &self,
        call: C,
        headers: &HeaderMap,
        next: &mut H,
    ) -> ContextClearingListener<H::Listener>
    where
        H: CallHandler<C>,
    {
        let ids = CallIdentifiers::from_headers(headers);
        let scope = CallScope::bind(&ids);

        let delegate = scope.in_scope(|| {
            tracing::debug!("call started");
            next.start_call(call, headers)
        });

        ContextClearingListener::new(delegate, scope)
    }
}
