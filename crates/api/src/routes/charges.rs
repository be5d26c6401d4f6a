//! Charge creation endpoint

use axum::extract::State;
use axum::Json;
use pixgate_billing::{BillingError, ChargeCreated, ChargeRequest};

use crate::error::ApiResult;
use crate::state::AppState;

/// `POST /api/payments`
///
/// Body is taken as raw JSON and parsed explicitly so a malformed payload
/// answers 400 under the storefront's existing contract (axum's built-in
/// rejection would answer 422).
pub async fn create_charge(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<ChargeCreated>> {
    let request: ChargeRequest = serde_json::from_value(body)
        .map_err(|e| BillingError::InvalidInput(format!("Malformed charge request: {}", e)))?;

    let created = state.billing.charges.create_pix_charge(&request).await?;
    Ok(Json(created))
}
