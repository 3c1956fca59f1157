use axum::Router;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Settings;
use crate::events::BusinessEventLogger;
use crate::middleware::RequestContextLayer;
use crate::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub events: BusinessEventLogger,
}

impl AppState {
    pub fn new(settings: Settings) -> Arc<Self> {
        let events = BusinessEventLogger::new(
            settings.service_name.as_str(),
            settings.service_component.as_str(),
        );
        Arc::new(Self { settings, events })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let request_context =
        RequestContextLayer::new().echo_request_id(state.settings.echo_request_id);

    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up): the call context wraps the
        // trace layer so its request/response lines carry the identifiers
        .layer(trace_layer)
        .layer(request_context)
        .with_state(state)
}
