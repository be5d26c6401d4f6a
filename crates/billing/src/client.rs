//! Asaas REST API client
//!
//! Thin typed wrapper over the Asaas v3 API. One configured client is built
//! at startup and shared by every service; all calls carry a bounded timeout
//! so a stalled upstream surfaces as `UpstreamError` instead of hanging the
//! request.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

const DEFAULT_BASE_URL: &str = "https://api.asaas.com/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Asaas connection settings
#[derive(Debug, Clone)]
pub struct AsaasConfig {
    pub base_url: String,
    pub access_token: String,
}

impl AsaasConfig {
    /// Load settings from environment variables.
    ///
    /// A missing token is tolerated here so the process can still boot;
    /// every API call re-checks the credential and fails with `ConfigError`
    /// before touching the network.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ASAAS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let access_token = std::env::var("ASAAS_ACCESS_TOKEN").unwrap_or_default();

        if access_token.is_empty() {
            tracing::warn!("ASAAS_ACCESS_TOKEN not set - upstream calls will fail");
        }

        Self {
            base_url,
            access_token,
        }
    }
}

/// Customer creation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomer {
    pub name: String,
    pub cpf_cnpj: String,
    pub email: String,
    pub notification_disabled: bool,
}

/// Customer record as returned by Asaas
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cpf_cnpj: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Outcome of a customer creation attempt.
///
/// Asaas reports an already-registered tax ID as a 400 with error code
/// `invalid_cpfCnpj`; callers treat that as "customer exists" and fall back
/// to a lookup.
#[derive(Debug)]
pub enum CustomerCreateOutcome {
    Created(Customer),
    DuplicateTaxId,
}

/// PIX charge creation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharge {
    pub billing_type: String,
    pub customer: String,
    pub value: f64,
    pub due_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub anticipation_disabled: bool,
}

/// Charge record as returned by Asaas
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

/// QR code representation of a PIX charge
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixQrCode {
    pub encoded_image: String,
    pub payload: String,
    #[serde(default)]
    pub expiration_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorBody {
    #[serde(default)]
    errors: Vec<AsaasApiError>,
}

#[derive(Debug, Deserialize)]
struct AsaasApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    #[serde(default)]
    data: Vec<Customer>,
}

/// Typed Asaas API client
#[derive(Debug, Clone)]
pub struct AsaasClient {
    http: reqwest::Client,
    config: AsaasConfig,
}

impl AsaasClient {
    pub fn new(config: AsaasConfig) -> BillingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BillingError::ConfigError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> BillingResult<Self> {
        Self::new(AsaasConfig::from_env())
    }

    pub fn config(&self) -> &AsaasConfig {
        &self.config
    }

    /// Fail with `ConfigError` before any network call when the credential
    /// is unset.
    fn ensure_credential(&self) -> BillingResult<()> {
        if self.config.access_token.is_empty() {
            return Err(BillingError::ConfigError(
                "ASAAS_ACCESS_TOKEN is not configured".to_string(),
            ));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Create a customer, detecting the duplicate-tax-ID rejection.
    pub async fn create_customer(
        &self,
        request: &CreateCustomer,
    ) -> BillingResult<CustomerCreateOutcome> {
        self.ensure_credential()?;

        let response = self
            .http
            .post(self.url("/customers"))
            .header("access_token", &self.config.access_token)
            .json(request)
            .send()
            .await
            .map_err(BillingError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            let customer: Customer = response
                .json()
                .await
                .map_err(BillingError::from_transport)?;
            return Ok(CustomerCreateOutcome::Created(customer));
        }

        let body: AsaasErrorBody = response.json().await.unwrap_or(AsaasErrorBody {
            errors: Vec::new(),
        });

        if status == StatusCode::BAD_REQUEST
            && body.errors.iter().any(|e| e.code == "invalid_cpfCnpj")
        {
            return Ok(CustomerCreateOutcome::DuplicateTaxId);
        }

        Err(upstream_error("customer creation", status, &body))
    }

    /// Look up customers by tax ID.
    pub async fn find_customers_by_tax_id(&self, cpf_cnpj: &str) -> BillingResult<Vec<Customer>> {
        self.ensure_credential()?;

        let response = self
            .http
            .get(self.url("/customers"))
            .query(&[("cpfCnpj", cpf_cnpj)])
            .header("access_token", &self.config.access_token)
            .send()
            .await
            .map_err(BillingError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json().await.unwrap_or(AsaasErrorBody {
                errors: Vec::new(),
            });
            return Err(upstream_error("customer lookup", status, &body));
        }

        let list: CustomerList = response
            .json()
            .await
            .map_err(BillingError::from_transport)?;
        Ok(list.data)
    }

    /// Create a charge.
    pub async fn create_charge(&self, request: &CreateCharge) -> BillingResult<Charge> {
        self.ensure_credential()?;

        let response = self
            .http
            .post(self.url("/payments"))
            .header("access_token", &self.config.access_token)
            .json(request)
            .send()
            .await
            .map_err(BillingError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json().await.unwrap_or(AsaasErrorBody {
                errors: Vec::new(),
            });
            return Err(upstream_error("charge creation", status, &body));
        }

        response.json().await.map_err(BillingError::from_transport)
    }

    /// Retrieve a charge by ID. A 404 maps to `NotFound`.
    pub async fn get_charge(&self, charge_id: &str) -> BillingResult<Charge> {
        self.ensure_credential()?;

        let response = self
            .http
            .get(self.url(&format!("/payments/{}", charge_id)))
            .header("access_token", &self.config.access_token)
            .send()
            .await
            .map_err(BillingError::from_transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BillingError::NotFound(format!(
                "Charge {} not found at Asaas",
                charge_id
            )));
        }
        if !status.is_success() {
            let body = response.json().await.unwrap_or(AsaasErrorBody {
                errors: Vec::new(),
            });
            return Err(upstream_error("charge retrieval", status, &body));
        }

        response.json().await.map_err(BillingError::from_transport)
    }

    /// Retrieve the PIX QR code for a charge.
    pub async fn get_pix_qr_code(&self, charge_id: &str) -> BillingResult<PixQrCode> {
        self.ensure_credential()?;

        let response = self
            .http
            .get(self.url(&format!("/payments/{}/pixQrCode", charge_id)))
            .header("access_token", &self.config.access_token)
            .send()
            .await
            .map_err(BillingError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json().await.unwrap_or(AsaasErrorBody {
                errors: Vec::new(),
            });
            return Err(upstream_error("QR code retrieval", status, &body));
        }

        response.json().await.map_err(BillingError::from_transport)
    }
}

fn upstream_error(operation: &str, status: StatusCode, body: &AsaasErrorBody) -> BillingError {
    let detail = body
        .errors
        .first()
        .map(|e| e.description.clone())
        .unwrap_or_else(|| "no error detail".to_string());

    tracing::error!(
        operation = operation,
        status = %status,
        detail = %detail,
        "Asaas request rejected"
    );

    BillingError::UpstreamError(format!("Asaas {} failed ({}): {}", operation, status, detail))
}
