//! Charge status checking
//!
//! Read-only path: queries Asaas for a charge and reports whether funds are
//! confirmed. Crediting is the webhook reconciler's job, never this one's.

use serde::Serialize;

use crate::client::AsaasClient;
use crate::error::{BillingError, BillingResult};

const CONFIRMED_MESSAGE: &str = "Pagamento identificado com sucesso! Créditos liberados.";
const PENDING_MESSAGE: &str = "Pagamento ainda não identificado.";

/// Status report for a single charge
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(rename = "statusAsaas")]
    pub status_asaas: String,
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    pub valor: Option<f64>,
    pub sucesso: bool,
    pub mensagem: String,
}

/// Service for polling charge status
#[derive(Debug, Clone)]
pub struct StatusService {
    asaas: AsaasClient,
}

impl StatusService {
    pub fn new(asaas: AsaasClient) -> Self {
        Self { asaas }
    }

    /// Query Asaas for the charge and map its status to a success flag.
    pub async fn check(&self, charge_id: &str) -> BillingResult<StatusReport> {
        if charge_id.is_empty() {
            return Err(BillingError::InvalidInput(
                "charge id is required".to_string(),
            ));
        }

        let charge = self.asaas.get_charge(charge_id).await?;
        let confirmed = is_confirmed(&charge.status);

        tracing::debug!(
            charge_id = %charge_id,
            status = %charge.status,
            confirmed = confirmed,
            "Charge status checked"
        );

        Ok(StatusReport {
            status_asaas: charge.status,
            payment_id: charge_id.to_string(),
            valor: charge.value,
            sucesso: confirmed,
            mensagem: if confirmed {
                CONFIRMED_MESSAGE.to_string()
            } else {
                PENDING_MESSAGE.to_string()
            },
        })
    }
}

/// RECEIVED and CONFIRMED both mean funds were identified.
fn is_confirmed(status: &str) -> bool {
    matches!(status, "RECEIVED" | "CONFIRMED")
}
