//! PIX charge creation
//!
//! Resolves the Asaas customer (create, falling back to lookup when the tax
//! ID is already registered), issues a PIX charge due 3 calendar days out,
//! and fetches its QR code representation.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::client::{AsaasClient, CreateCharge, CreateCustomer, CustomerCreateOutcome};
use crate::error::{BillingError, BillingResult};

const DUE_DATE_OFFSET_DAYS: i64 = 3;
const DEFAULT_DESCRIPTION: &str = "Compra de créditos";

/// Charge creation request as sent by the storefront.
///
/// Field names follow the storefront's existing wire contract. `user_id`
/// and `minutes` are passthrough fields the storefront attaches for its own
/// bookkeeping; this service ignores them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargeRequest {
    #[serde(rename = "nomeCliente")]
    pub customer_name: Option<String>,
    #[serde(rename = "cpfCnpj")]
    pub cpf_cnpj: Option<String>,
    #[serde(rename = "emailCliente")]
    pub customer_email: Option<String>,
    #[serde(rename = "valorCreditos")]
    pub amount: Option<f64>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "customer_id_asaas")]
    pub customer_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub minutes: Option<f64>,
}

impl ChargeRequest {
    /// Validate the request before any upstream call is made.
    pub fn validate(&self) -> BillingResult<()> {
        match self.amount {
            Some(v) if v.is_finite() && v > 0.0 => {}
            _ => {
                return Err(BillingError::InvalidInput(
                    "valorCreditos must be a positive number".to_string(),
                ))
            }
        }

        // An existing customer reference skips the identity requirements
        if self.customer_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return Ok(());
        }

        let has = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has(&self.customer_name) || !has(&self.cpf_cnpj) || !has(&self.customer_email) {
            return Err(BillingError::InvalidInput(
                "nomeCliente, cpfCnpj and emailCliente are required without customer_id_asaas"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Successful charge creation result
#[derive(Debug, Clone, Serialize)]
pub struct ChargeCreated {
    pub status: &'static str,
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    pub customer_id_asaas: String,
    #[serde(rename = "qrCode")]
    pub qr_code: String,
    pub payload: String,
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<String>,
}

/// Service for issuing PIX charges
#[derive(Debug, Clone)]
pub struct ChargeService {
    asaas: AsaasClient,
}

impl ChargeService {
    pub fn new(asaas: AsaasClient) -> Self {
        Self { asaas }
    }

    /// Create a PIX charge for the request, resolving the customer first.
    pub async fn create_pix_charge(&self, request: &ChargeRequest) -> BillingResult<ChargeCreated> {
        request.validate()?;

        let customer_id = match request.customer_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.resolve_customer(request).await?,
        };

        let due_date = due_date_from(OffsetDateTime::now_utc().date());
        let charge = self
            .asaas
            .create_charge(&CreateCharge {
                billing_type: "PIX".to_string(),
                customer: customer_id.clone(),
                // validate() guarantees the amount is present
                value: request.amount.unwrap_or_default(),
                due_date,
                description: Some(
                    request
                        .description
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                ),
                anticipation_disabled: true,
            })
            .await?;

        tracing::info!(
            charge_id = %charge.id,
            customer_id = %customer_id,
            "PIX charge created"
        );

        let qr = self.asaas.get_pix_qr_code(&charge.id).await?;

        Ok(ChargeCreated {
            status: "success",
            payment_id: charge.id,
            customer_id_asaas: customer_id,
            qr_code: qr.encoded_image,
            payload: qr.payload,
            expiration_date: qr.expiration_date,
        })
    }

    /// Create-or-lookup customer resolution.
    ///
    /// A duplicate-tax-ID rejection means the customer already exists, so
    /// the lookup takes the first match. Zero matches after that rejection
    /// is an upstream inconsistency, not a caller error.
    async fn resolve_customer(&self, request: &ChargeRequest) -> BillingResult<String> {
        // validate() guarantees these fields are present on this path
        let name = request.customer_name.clone().unwrap_or_default();
        let cpf_cnpj = request.cpf_cnpj.clone().unwrap_or_default();
        let email = request.customer_email.clone().unwrap_or_default();

        let outcome = self
            .asaas
            .create_customer(&CreateCustomer {
                name,
                cpf_cnpj: cpf_cnpj.clone(),
                email,
                notification_disabled: true,
            })
            .await?;

        match outcome {
            CustomerCreateOutcome::Created(customer) => {
                tracing::info!(customer_id = %customer.id, "Asaas customer created");
                Ok(customer.id)
            }
            CustomerCreateOutcome::DuplicateTaxId => {
                let matches = self.asaas.find_customers_by_tax_id(&cpf_cnpj).await?;
                let customer = matches.into_iter().next().ok_or_else(|| {
                    BillingError::UpstreamError(
                        "Tax ID reported as registered but lookup returned no customer"
                            .to_string(),
                    )
                })?;
                tracing::info!(customer_id = %customer.id, "Existing Asaas customer reused");
                Ok(customer.id)
            }
        }
    }
}

/// Due date 3 calendar days out, formatted as Asaas expects (YYYY-MM-DD).
fn due_date_from(today: Date) -> String {
    let due = today + Duration::days(DUE_DATE_OFFSET_DAYS);
    format!(
        "{:04}-{:02}-{:02}",
        due.year(),
        u8::from(due.month()),
        due.day()
    )
}
