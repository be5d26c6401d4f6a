//! Route handlers

pub mod charges;
pub mod status;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/payments", post(charges::create_charge))
        .route("/api/payments/status", get(status::check_status))
        .route("/api/webhooks/asaas", post(webhooks::receive_webhook))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
