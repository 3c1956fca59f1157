pub mod ambient;
pub mod identifiers;
pub mod scope;

pub use ambient::{
    current, current_identifiers, current_request_id, enter, propagate, propagate_blocking,
    scope, CallContext, ContextGuard,
};
pub use identifiers::{
    generate_request_id, CallIdentifiers, RequestIdExt, CONTEXT_KEYS, REQUEST_ID_KEY,
    SESSION_ID_KEY, USER_ID_KEY, X_REQUEST_ID, X_SESSION_ID, X_USER_ID,
};
pub use scope::{CallScope, TerminalEvent};
