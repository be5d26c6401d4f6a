//! HTTP error response conversion
//!
//! Maps `BillingError` kinds onto the response contract: one status code
//! per kind, a JSON body with a single `error` field.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pixgate_billing::BillingError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper so `IntoResponse` can be implemented for the billing crate's
/// error type (orphan rules).
#[derive(Debug)]
pub struct ApiError(pub BillingError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            BillingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::ConfigError(_)
            | BillingError::UpstreamError(_)
            | BillingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self.0 {
            BillingError::InvalidInput(_) | BillingError::NotFound(_) => {
                tracing::warn!(error = %self.0, "Request rejected");
            }
            _ => {
                tracing::error!(error = %self.0, "Request failed");
            }
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });

        (status, body).into_response()
    }
}
