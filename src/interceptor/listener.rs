//! Lifecycle notifications of a single call.

use std::sync::Arc;

use crate::context::{CallContext, CallScope, TerminalEvent};

/// Receives the lifecycle notifications of one call.
///
/// Exactly one of [`on_complete`](Self::on_complete) and
/// [`on_cancel`](Self::on_cancel) is expected per call.
pub trait CallListener {
    type Message;

    fn on_message(&mut self, _message: Self::Message) {}

    fn on_half_close(&mut self) {}

    fn on_ready(&mut self) {}

    fn on_complete(&mut self) {}

    fn on_cancel(&mut self) {}
}

impl<L> CallListener for Box<L>
where
    L: CallListener + ?Sized,
{
    type Message = L::Message;

    fn on_message(&mut self, message: L::Message) {
        (**self).on_message(message);
    }

    fn on_half_close(&mut self) {
        (**self).on_half_close();
    }

    fn on_ready(&mut self) {
        (**self).on_ready();
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }

    fn on_cancel(&mut self) {
        (**self).on_cancel();
    }
}

/// Listener returned by the interceptor.
///
/// Non-terminal notifications are forwarded with the call's context bound,
/// whichever thread delivers them. Terminal notifications clear the context
/// first and are then forwarded, so the delegate's teardown runs unbound even
/// if it panics.
#[derive(Debug)]
pub struct ContextClearingListener<L> {
    delegate: L,
    scope: CallScope,
}

impl<L> ContextClearingListener<L> {
    pub(crate) fn new(delegate: L, scope: CallScope) -> Self {
        Self { delegate, scope }
    }

    /// The call's context store
    pub fn context(&self) -> &Arc<CallContext> {
        self.scope.context()
    }

    pub fn is_bound(&self) -> bool {
        self.scope.is_bound()
    }

    pub fn terminal_event(&self) -> Option<TerminalEvent> {
        self.scope.terminal_event()
    }

    pub fn delegate(&self) -> &L {
        &self.delegate
    }
}

impl<L> CallListener for ContextClearingListener<L>
where
    L: CallListener,
{
    type Message = L::Message;

    fn on_message(&mut self, message: L::Message) {
        self.scope.in_scope(|| self.delegate.on_message(message));
    }

    fn on_half_close(&mut self) {
        self.scope.in_scope(|| self.delegate.on_half_close());
    }

    fn on_ready(&mut self) {
        self.scope.in_scope(|| self.delegate.on_ready());
    }

    fn on_complete(&mut self) {
        self.scope.finish(TerminalEvent::Completed);
        self.delegate.on_complete();
    }

    fn on_cancel(&mut self) {
        self.scope.finish(TerminalEvent::Cancelled);
        self.delegate.on_cancel();
    }
}
