//! Charge status endpoint

use axum::extract::{Query, State};
use axum::Json;
use pixgate_billing::{BillingError, StatusReport};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: Option<String>,
}

/// `GET /api/payments/status?id=<chargeId>`
pub async fn check_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusReport>> {
    let charge_id = require_charge_id(&query)?;
    let report = state.billing.status.check(charge_id).await?;
    Ok(Json(report))
}

/// A present-but-empty `id` counts as missing.
fn require_charge_id(query: &StatusQuery) -> Result<&str, BillingError> {
    query
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BillingError::InvalidInput("query parameter 'id' is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_id_is_invalid_input() {
        let query = StatusQuery { id: None };
        assert!(matches!(
            require_charge_id(&query),
            Err(BillingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_id_is_invalid_input() {
        let query = StatusQuery {
            id: Some(String::new()),
        };
        assert!(require_charge_id(&query).is_err());
    }

    #[test]
    fn test_present_id_is_accepted() {
        let query = StatusQuery {
            id: Some("pay_123".to_string()),
        };
        assert_eq!(require_charge_id(&query).unwrap(), "pay_123");
    }
}
