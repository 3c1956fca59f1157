//! Per-call binding lifecycle: `UNBOUND -> BOUND -> UNBOUND`.

use std::sync::Arc;

use tracing::Span;

use super::ambient::{self, CallContext};
use super::identifiers::CallIdentifiers;
use crate::logging::call_span;

/// The two ways a call can end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    Completed,
    Cancelled,
}

impl TerminalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Bound,
    Unbound(TerminalEvent),
}

/// Owns one call's context and log span from the moment its headers are
/// processed until its terminal event.
///
/// [`finish`](Self::finish) clears the context at most once. Dropping a scope
/// that is still bound counts as cancellation.
#[derive(Debug)]
pub struct CallScope {
    context: Arc<CallContext>,
    span: Option<Span>,
    state: ScopeState,
}

impl CallScope {
    /// Install `ids` into a fresh call context.
    pub fn bind(ids: &CallIdentifiers) -> Self {
        Self {
            context: CallContext::for_call(ids),
            span: Some(call_span()),
            state: ScopeState::Bound,
        }
    }

    pub fn context(&self) -> &Arc<CallContext> {
        &self.context
    }

    /// The call's log span, until the call finishes
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.state == ScopeState::Bound
    }

    pub fn terminal_event(&self) -> Option<TerminalEvent> {
        match self.state {
            ScopeState::Bound => None,
            ScopeState::Unbound(event) => Some(event),
        }
    }

    /// Run `f` with this call's context bound to the current thread and its
    /// span entered. Once the call has finished, `f` runs with neither.
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match (&self.span, self.state) {
            (Some(span), ScopeState::Bound) => {
                let _guard = ambient::enter(self.context.clone());
                span.in_scope(f)
            }
            _ => f(),
        }
    }

    /// Tear the binding down. Returns `false` if the call had already
    /// finished, in which case nothing is touched.
    pub fn finish(&mut self, event: TerminalEvent) -> bool {
        if let ScopeState::Unbound(previous) = self.state {
            tracing::trace!(
                previous = previous.as_str(),
                event = event.as_str(),
                "ignoring repeated terminal event"
            );
            return false;
        }

        self.in_scope(|| tracing::debug!(outcome = event.as_str(), "call finished"));
        self.span = None;
        self.context.clear();
        self.state = ScopeState::Unbound(event);
        true
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        self.finish(TerminalEvent::Cancelled);
    }
}
