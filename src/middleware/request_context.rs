//! Tower middleware binding call identifiers for HTTP and gRPC servers.

use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request, Response};
use futures::future::BoxFuture;
use http_body::Body;
use tower::{Layer, Service};
use tracing::{Instrument, Span};

use super::body::ContextBody;
use crate::context::{ambient, CallIdentifiers, CallScope, TerminalEvent, X_REQUEST_ID};

// ---------------------------------------------------------------------------
// RequestContextLayer
// ---------------------------------------------------------------------------

/// Binds `request_id`, `session_id` and `user_id` for every inbound call.
///
/// The identifiers are also inserted into the request extensions as
/// [`CallIdentifiers`], so handlers can extract them directly.
#[derive(Debug, Clone)]
pub struct RequestContextLayer {
    echo_request_id: bool,
}

impl RequestContextLayer {
    pub fn new() -> Self {
        Self {
            echo_request_id: true,
        }
    }

    /// Copy the correlation id into the `x-request-id` response header
    /// unless the handler already set one. On by default.
    pub fn echo_request_id(mut self, enabled: bool) -> Self {
        self.echo_request_id = enabled;
        self
    }
}

impl Default for RequestContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService {
            inner,
            echo_request_id: self.echo_request_id,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestContextService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RequestContextService<S> {
    inner: S,
    echo_request_id: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestContextService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Body + Send + 'static,
{
    type Response = Response<ContextBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ids = CallIdentifiers::from_headers(req.headers());
        let scope = CallScope::bind(&ids);

        let echo = if self.echo_request_id {
            HeaderValue::from_str(ids.request_id()).ok()
        } else {
            None
        };
        req.extensions_mut().insert(ids);

        let ctx = scope.context().clone();
        let span = scope.span().cloned().unwrap_or_else(Span::none);
        let inner = &mut self.inner;
        let fut = scope.in_scope(|| inner.call(req));

        // `scope` moves into the future: dropping the future before it
        // resolves is the cancellation path.
        Box::pin(async move {
            let mut scope = scope;
            match ambient::scope(ctx, fut.instrument(span)).await {
                Ok(mut response) => {
                    if let Some(value) = echo {
                        if !response.headers().contains_key(X_REQUEST_ID) {
                            response.headers_mut().insert(X_REQUEST_ID, value);
                        }
                    }
                    Ok(response.map(|body| ContextBody::new(body, scope)))
                }
                Err(err) => {
                    scope.finish(TerminalEvent::Completed);
                    Err(err)
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
