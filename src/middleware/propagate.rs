//! Outbound propagation of the current call's identifiers.
//!
//! Calls made to downstream services while handling a call carry the same
//! `x-request-id`, `x-session-id` and `x-user-id`.

use std::task::{Context, Poll};

use axum::http::{HeaderMap, HeaderValue, Request};
use tower::{Layer, Service};

use crate::context::current_identifiers;
use crate::error::{CorrelationError, CorrelationResult};

/// Write the current call's identifiers into `headers`.
///
/// Headers the caller already set are left alone. Returns `false` when no
/// call is bound.
pub fn inject_headers(headers: &mut HeaderMap) -> CorrelationResult<bool> {
    let Some(ids) = current_identifiers() else {
        return Ok(false);
    };

    for (header, value) in ids.headers() {
        if headers.contains_key(header) {
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|source| CorrelationError::InvalidHeaderValue { header, source })?;
        headers.insert(header, value);
    }

    Ok(true)
}

// ---------------------------------------------------------------------------
// PropagateContextLayer
// ---------------------------------------------------------------------------

/// Client-side layer (e.g. around a gRPC channel) that forwards the current
/// call's identifiers on every outbound request.
#[derive(Debug, Clone, Default)]
pub struct PropagateContextLayer;

impl<S> Layer<S> for PropagateContextLayer {
    type Service = PropagateContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagateContextService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct PropagateContextService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for PropagateContextService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if let Err(e) = inject_headers(req.headers_mut()) {
            tracing::warn!(error = %e, uri = %req.uri(), "Skipping call context propagation");
        }
        self.inner.call(req)
    }
}

// ---------------------------------------------------------------------------
// reqwest
// ---------------------------------------------------------------------------

/// Extension trait for forwarding the current call's identifiers with
/// `reqwest`.
pub trait RequestBuilderExt {
    fn with_call_context(self) -> Self;
}

impl RequestBuilderExt for reqwest::RequestBuilder {
    fn with_call_context(self) -> Self {
        let mut headers = HeaderMap::new();
        match inject_headers(&mut headers) {
            Ok(_) => self.headers(headers),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping call context propagation");
                self
            }
        }
    }
}
