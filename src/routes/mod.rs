pub mod echo;
pub mod health;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Build the router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/echo", get(echo::echo).post(echo::echo))
}
