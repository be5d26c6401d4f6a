//! Billing error types

use thiserror::Error;

/// Errors produced by the billing crate.
///
/// Each variant maps to exactly one HTTP status at the handler boundary;
/// the mapping itself lives in the api crate.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed or missing request fields (400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Required credential or setting is absent (500)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Asaas reports the charge does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other Asaas failure, including ambiguous customer resolution (500)
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Database operation failed (500)
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl BillingError {
    /// Classify a reqwest transport failure.
    ///
    /// Timeouts and connection errors are upstream failures by contract;
    /// there is no retry policy at this layer.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BillingError::UpstreamError("Asaas request timed out".to_string())
        } else {
            BillingError::UpstreamError(format!("Asaas request failed: {}", err))
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
