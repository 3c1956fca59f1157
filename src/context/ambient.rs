//! Call-scoped ambient log context.
//!
//! Every call gets its own [`CallContext`]. The context is never stored in a
//! map keyed by thread: async code reaches it through a tokio task-local that
//! is scoped around the call's future, and synchronous callbacks reach it
//! through a thread binding that only lives for the duration of one callback
//! ([`enter`]). A worker thread that interleaves many calls therefore always
//! sees the context of the call it is currently polling, or none at all.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Instrument;

use super::identifiers::{
    CallIdentifiers, CONTEXT_KEYS, REQUEST_ID_KEY, SESSION_ID_KEY, USER_ID_KEY,
};

tokio::task_local! {
    static TASK_CONTEXT: Arc<CallContext>;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<Arc<CallContext>>> = const { RefCell::new(None) };
}

/// Key/value log context owned by a single call.
#[derive(Debug, Default)]
pub struct CallContext {
    entries: RwLock<BTreeMap<&'static str, String>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with the call's identifiers already installed
    pub fn for_call(ids: &CallIdentifiers) -> Arc<Self> {
        let ctx = Arc::new(Self::new());
        ctx.install(ids);
        ctx
    }

    /// Install the identifiers that are present. Absent optional ids are not
    /// written, not even as empty placeholders.
    pub fn install(&self, ids: &CallIdentifiers) {
        let mut entries = self.entries.write();
        for (key, value) in ids.fields() {
            entries.insert(key, value.to_string());
        }
    }

    pub fn insert(&self, key: &'static str, value: impl Into<String>) {
        self.entries.write().insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    /// Remove the three identifier keys. Safe to call any number of times.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        for key in CONTEXT_KEYS {
            entries.remove(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, String> {
        self.entries.read().clone()
    }

    /// Rebuild the identifiers, if a request id is still bound.
    pub fn identifiers(&self) -> Option<CallIdentifiers> {
        let entries = self.entries.read();
        let request_id = entries.get(REQUEST_ID_KEY)?;

        let mut ids = CallIdentifiers::new(request_id.clone());
        if let Some(session_id) = entries.get(SESSION_ID_KEY) {
            ids = ids.with_session_id(session_id.clone());
        }
        if let Some(user_id) = entries.get(USER_ID_KEY) {
            ids = ids.with_user_id(user_id.clone());
        }
        Some(ids)
    }
}

/// Run `fut` with `ctx` as the current call context.
pub async fn scope<F>(ctx: Arc<CallContext>, fut: F) -> F::Output
where
    F: Future,
{
    TASK_CONTEXT.scope(ctx, fut).await
}

/// Binding of a call context to the current thread. Dropping it restores
/// whatever was bound before, also while unwinding.
///
/// The guard is `!Send`, so it cannot be held across an `.await` in a future
/// that is spawned onto the worker pool.
#[must_use = "the context is unbound as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Arc<CallContext>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_CONTEXT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Bind `ctx` to the current thread for synchronous callback delivery.
pub fn enter(ctx: Arc<CallContext>) -> ContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(ctx));
    ContextGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Context of the call currently executing, if any.
///
/// A thread binding is only ever held for the length of one synchronous
/// callback, so it is the innermost scope and wins over the task-local.
pub fn current() -> Option<Arc<CallContext>> {
    THREAD_CONTEXT
        .with(|slot| slot.borrow().clone())
        .or_else(|| TASK_CONTEXT.try_with(Arc::clone).ok())
}

/// Identifiers bound to the call currently executing
pub fn current_identifiers() -> Option<CallIdentifiers> {
    current()?.identifiers()
}

pub fn current_request_id() -> Option<String> {
    current()?.get(REQUEST_ID_KEY)
}

/// Carry the current call context (and span) into a future that will be
/// spawned as its own task.
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current();
    let span = tracing::Span::current();

    async move {
        match ctx {
            Some(ctx) => scope(ctx, fut).await,
            None => fut.await,
        }
    }
    .instrument(span)
}

/// Carry the current call context (and span) into a closure for
/// `tokio::task::spawn_blocking`.
pub fn propagate_blocking<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let ctx = current();
    let span = tracing::Span::current();

    move || {
        let _span = span.enter();
        match ctx {
            Some(ctx) => {
                let _guard = enter(ctx);
                f()
            }
            None => f(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(request_id: &str) -> CallIdentifiers {
        CallIdentifiers::new(request_id)
    }

    #[test]
    fn install_skips_absent_optional_ids() {
        let ctx = CallContext::for_call(&ids("abc-123").with_session_id("s1"));

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(REQUEST_ID_KEY).map(String::as_str), Some("abc-123"));
        assert_eq!(snapshot.get(SESSION_ID_KEY).map(String::as_str), Some("s1"));
        assert!(snapshot.get(USER_ID_KEY).is_none());
    }

    #[test]
    fn clear_and_remove_are_idempotent() {
        let ctx = CallContext::for_call(&ids("abc-123").with_user_id("u1"));

        ctx.clear();
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.remove(USER_ID_KEY), None);
        assert!(ctx.identifiers().is_none());
    }

    #[test]
    fn no_context_outside_a_call() {
        assert!(current().is_none());
        assert!(current_request_id().is_none());
    }

    #[test]
    fn guard_restores_previous_binding() {
        let outer = CallContext::for_call(&ids("outer"));
        let inner = CallContext::for_call(&ids("inner"));

        let _outer = enter(outer);
        {
            let _inner = enter(inner);
            assert_eq!(current_request_id().as_deref(), Some("inner"));
        }
        assert_eq!(current_request_id().as_deref(), Some("outer"));
    }

    #[test]
    fn guard_unbinds_on_panic() {
        let ctx = CallContext::for_call(&ids("boom"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = enter(ctx);
            panic!("handler failed");
        }));

        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn scope_survives_await_points() {
        let ctx = CallContext::for_call(&ids("async-call"));

        let observed = scope(ctx, async {
            tokio::task::yield_now().await;
            current_request_id()
        })
        .await;

        assert_eq!(observed.as_deref(), Some("async-call"));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn thread_binding_wins_over_task_scope() {
        let task_ctx = CallContext::for_call(&ids("task"));
        let callback_ctx = CallContext::for_call(&ids("callback"));

        let (inside, after) = scope(task_ctx, async move {
            let inside = {
                let _guard = enter(callback_ctx);
                current_request_id()
            };
            (inside, current_request_id())
        })
        .await;

        assert_eq!(inside.as_deref(), Some("callback"));
        assert_eq!(after.as_deref(), Some("task"));
    }

    #[tokio::test]
    async fn propagate_carries_context_into_spawned_task() {
        let ctx = CallContext::for_call(&ids("parent").with_user_id("u7"));

        let handle = scope(ctx, async {
            tokio::spawn(propagate(async { current_identifiers() }))
        })
        .await;

        let observed = handle.await.unwrap().unwrap();
        assert_eq!(observed.request_id(), "parent");
        assert_eq!(observed.user_id(), Some("u7"));
    }

    #[tokio::test]
    async fn propagate_blocking_carries_context() {
        let ctx = CallContext::for_call(&ids("blocking"));

        let task = scope(ctx, async {
            tokio::task::spawn_blocking(propagate_blocking(current_request_id))
        })
        .await;

        assert_eq!(task.await.unwrap().as_deref(), Some("blocking"));
    }

    #[tokio::test]
    async fn spawned_task_without_propagation_sees_nothing() {
        let ctx = CallContext::for_call(&ids("not-inherited"));

        let handle = scope(ctx, async { tokio::spawn(async { current_request_id() }) }).await;

        assert_eq!(handle.await.unwrap(), None);
    }
}
