//! Asaas webhook endpoint
//!
//! Response codes drive the provider's retry machinery: 200 stops retries
//! (including for events this system intentionally ignores), 500 asks the
//! provider to redeliver. Only persistence failures answer 500.

use axum::extract::State;
use axum::Json;
use pixgate_billing::{BillingError, ReconcileOutcome, WebhookEvent};

use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /api/webhooks/asaas`
pub async fn receive_webhook(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<&'static str> {
    let event: WebhookEvent = serde_json::from_value(body)
        .map_err(|e| BillingError::InvalidInput(format!("Malformed webhook payload: {}", e)))?;

    let outcome = state.billing.reconciler.handle_event(&event).await?;

    match outcome {
        ReconcileOutcome::Ignored(reason) => {
            tracing::debug!(reason = ?reason, "Webhook acknowledged without effect");
        }
        outcome => {
            tracing::debug!(outcome = ?outcome, "Webhook reconciled");
        }
    }

    Ok("OK")
}
