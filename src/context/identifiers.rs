//! Correlation identifiers carried by every inbound call

use axum::http::HeaderMap;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the caller's correlation id
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the caller's session id
pub const X_SESSION_ID: &str = "x-session-id";

/// Header carrying the caller's user id
pub const X_USER_ID: &str = "x-user-id";

/// Log field carrying the correlation id
pub const REQUEST_ID_KEY: &str = "request_id";

/// Log field carrying the session id
pub const SESSION_ID_KEY: &str = "session_id";

/// Log field carrying the user id
pub const USER_ID_KEY: &str = "user_id";

/// All context keys, in the order they are installed and cleared
pub const CONTEXT_KEYS: [&str; 3] = [REQUEST_ID_KEY, SESSION_ID_KEY, USER_ID_KEY];

/// Identifiers computed for one call.
///
/// `request_id` is always set: either taken from `x-request-id` or generated.
/// The optional ids are only present when the caller sent a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallIdentifiers {
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl CallIdentifiers {
    /// Identifiers with only a correlation id. An empty id is replaced by a
    /// generated one.
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let request_id = if request_id.is_empty() {
            generate_request_id()
        } else {
            request_id
        };

        Self {
            request_id,
            session_id: None,
            user_id: None,
        }
    }

    /// Derive identifiers from inbound call metadata.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = header_value(headers, X_REQUEST_ID)
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        Self {
            request_id,
            session_id: header_value(headers, X_SESSION_ID).map(str::to_string),
            user_id: header_value(headers, X_USER_ID).map(str::to_string),
        }
    }

    /// Set the session id. An empty value leaves it absent.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = non_empty(session_id.into());
        self
    }

    /// Set the user id. An empty value leaves it absent.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = non_empty(user_id.into());
        self
    }

    /// The correlation id, never empty
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The caller's session id, if it sent a non-empty one
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The caller's user id, if it sent a non-empty one
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The `(log key, value)` pairs that are present, in [`CONTEXT_KEYS`] order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (REQUEST_ID_KEY, Some(self.request_id.as_str())),
            (SESSION_ID_KEY, self.session_id.as_deref()),
            (USER_ID_KEY, self.user_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }

    /// The `(header name, value)` pairs to forward to downstream services.
    pub fn headers(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields().map(|(key, value)| {
            let header = match key {
                SESSION_ID_KEY => X_SESSION_ID,
                USER_ID_KEY => X_USER_ID,
                _ => X_REQUEST_ID,
            };
            (header, value)
        })
    }
}

/// Generate a random 128-bit correlation id in canonical UUID form.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Non-empty, visible-ASCII header value. Anything else counts as absent.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .filter(|v| !v.is_empty())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Extension trait for extracting request ID from headers
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID)?.to_str().ok()
    }
}
