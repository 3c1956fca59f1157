//! Response body that keeps the call bound until its last frame.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use http_body::{Body, Frame, SizeHint};

use crate::context::{CallScope, TerminalEvent};

/// Wraps a response body so streaming responses (server streaming, trailers)
/// are still logged with the call's identifiers, and the call only finishes
/// once the body has been fully written.
///
/// End of stream or a body error completes the call. Dropping the body before
/// that cancels it.
pub struct ContextBody<B: Body> {
    inner: Pin<Box<B>>,
    scope: CallScope,
}

impl<B: Body> ContextBody<B> {
    pub(crate) fn new(inner: B, scope: CallScope) -> Self {
        Self {
            inner: Box::pin(inner),
            scope,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.scope.is_bound()
    }
}

impl<B> Body for ContextBody<B>
where
    B: Body,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let inner = &mut this.inner;
        let poll = this.scope.in_scope(|| inner.as_mut().poll_frame(cx));

        let finished = match &poll {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => true,
            Poll::Ready(Some(Ok(_))) => this.inner.is_end_stream(),
            Poll::Pending => false,
        };
        if finished {
            this.scope.finish(TerminalEvent::Completed);
        }

        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: Body> fmt::Debug for ContextBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBody")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<B: Body> Drop for ContextBody<B> {
    fn drop(&mut self) {
        // Empty bodies are often dropped without ever being polled.
        let event = if self.inner.is_end_stream() {
            TerminalEvent::Completed
        } else {
            TerminalEvent::Cancelled
        };
        self.scope.finish(event);
    }
}
