use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::context::{self, CallIdentifiers};

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    /// Identifiers the middleware computed for this call
    pub identifiers: CallIdentifiers,
    /// Ambient log context as seen by the handler
    pub ambient: BTreeMap<String, String>,
    /// Request id seen by a task spawned from the handler
    pub background_request_id: Option<String>,
}

/// Reports the call's correlation identifiers back to the caller
pub async fn echo(
    State(state): State<Arc<AppState>>,
    Extension(identifiers): Extension<CallIdentifiers>,
) -> Json<EchoResponse> {
    tracing::info!("Echoing call identifiers");

    let ambient = context::current()
        .map(|ctx| {
            ctx.snapshot()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        })
        .unwrap_or_default();

    let events = state.events.clone();
    let background = tokio::spawn(context::propagate(async move {
        events
            .event("identifiers_echoed", "echo", "call")
            .outcome("success")
            .emit();
        context::current_request_id()
    }));

    let background_request_id = match background.await {
        Ok(request_id) => request_id,
        Err(e) => {
            tracing::warn!(error = %e, "Background task failed");
            None
        }
    };

    Json(EchoResponse {
        identifiers,
        ambient,
        background_request_id,
    })
}
