// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pixgate Billing Module
//!
//! Handles the Asaas PIX integration: charge creation, status polling, and
//! webhook reconciliation of payment and subscription state.
//!
//! ## Features
//!
//! - **Charge Creation**: Customer create-or-lookup plus PIX charge + QR code
//! - **Status Checking**: Read-only polling of charge confirmation
//! - **Webhook Reconciliation**: Event-to-status transitions, idempotent
//!   cycle renewal and crediting, suspension and cancellation handling

pub mod charges;
pub mod client;
pub mod error;
pub mod payments;
pub mod profiles;
pub mod status;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Charges
pub use charges::{ChargeCreated, ChargeRequest, ChargeService};

// Client
pub use client::{AsaasClient, AsaasConfig};

// Error
pub use error::{BillingError, BillingResult};

// Payments
pub use payments::{PaymentRecord, PaymentRepository, PaymentStatus, PaymentStore, PaymentType};

// Profiles
pub use profiles::{ProfileRepository, ProfileStore, SubscriptionStatus};

// Status
pub use status::{StatusReport, StatusService};

// Webhooks
pub use webhooks::{
    EventKind, IgnoreReason, ReconcileOutcome, WebhookEvent, WebhookPayment, WebhookReconciler,
    WebhookSubscription,
};

use sqlx::PgPool;

/// Monthly credit allotment granted on each cycle renewal.
///
/// Deployment-specific; override with `MONTHLY_CREDIT_ALLOTMENT`.
pub const DEFAULT_CREDIT_ALLOTMENT: i32 = 1000;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub charges: ChargeService,
    pub status: StatusService,
    pub reconciler: WebhookReconciler,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let asaas = AsaasClient::from_env()?;
        let credit_allotment = std::env::var("MONTHLY_CREDIT_ALLOTMENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CREDIT_ALLOTMENT);

        Ok(Self::new(asaas, pool, credit_allotment))
    }

    /// Create a new billing service with explicit dependencies
    pub fn new(asaas: AsaasClient, pool: PgPool, credit_allotment: i32) -> Self {
        Self {
            charges: ChargeService::new(asaas.clone()),
            status: StatusService::new(asaas),
            reconciler: WebhookReconciler::new(pool, credit_allotment),
        }
    }
}
