//! Payment row persistence
//!
//! The payments table mirrors Asaas charges and is keyed by the external
//! charge ID. Rows are inserted by the storefront checkout flow; this crate
//! only ever updates them, and every update is a conditional single
//! statement so concurrent webhook deliveries serialize at the database.

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::BillingResult;

/// Canonical internal payment statuses set by the reconciler.
///
/// Rows start in whatever pending state the checkout flow inserted; this
/// enum only covers the values this system transitions to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Received,
    Suspended,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Received => "RECEIVED",
            PaymentStatus::Suspended => "SUSPENDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Payment classification, persisted once on first webhook sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentType {
    Subscription,
    OneTime,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Subscription => "SUBSCRIPTION",
            PaymentType::OneTime => "ONE_TIME",
        }
    }
}

/// Persisted mirror of an Asaas charge
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRecord {
    pub asaas_id: String,
    pub status: String,
    pub payment_type: Option<String>,
    pub subscription_id: Option<String>,
    pub paid_at: Option<OffsetDateTime>,
}

/// Conditional-update access to payment rows.
///
/// Every mutation is expressed as a guarded update so the backing store is
/// the serialization point for concurrent webhook deliveries.
#[allow(async_fn_in_trait)]
pub trait PaymentRepository {
    /// Look up the mirror row for a charge. `None` means the charge is
    /// outside this system's tracking.
    async fn find_by_asaas_id(&self, asaas_id: &str) -> BillingResult<Option<PaymentRecord>>;

    /// Persist the payment classification, only if not already set.
    async fn classify_once(&self, asaas_id: &str, payment_type: PaymentType)
        -> BillingResult<()>;

    /// Update the status only when it actually differs from the stored
    /// value. Returns whether a row changed.
    async fn set_status_if_changed(
        &self,
        asaas_id: &str,
        status: PaymentStatus,
    ) -> BillingResult<bool>;

    /// Stamp the payment as received and paid, exactly once. Returns
    /// whether this call won the stamp.
    async fn mark_paid_once(&self, asaas_id: &str) -> BillingResult<bool>;
}

/// Postgres-backed store for payment rows
#[derive(Debug, Clone)]
pub struct PaymentStore {
    pool: PgPool,
}

impl PaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PaymentRepository for PaymentStore {
    async fn find_by_asaas_id(&self, asaas_id: &str) -> BillingResult<Option<PaymentRecord>> {
        let record = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT asaas_id, status, payment_type, subscription_id, paid_at
            FROM payments
            WHERE asaas_id = $1
            "#,
        )
        .bind(asaas_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn classify_once(
        &self,
        asaas_id: &str,
        payment_type: PaymentType,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET payment_type = $2, updated_at = NOW()
            WHERE asaas_id = $1 AND payment_type IS NULL
            "#,
        )
        .bind(asaas_id)
        .bind(payment_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status_if_changed(
        &self,
        asaas_id: &str,
        status: PaymentStatus,
    ) -> BillingResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE asaas_id = $1 AND status <> $2
            "#,
        )
        .bind(asaas_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The `paid_at IS NULL` guard is the load-bearing idempotency check:
    /// it is re-evaluated at write time, so of two concurrent deliveries of
    /// the same `PAYMENT_RECEIVED` event only one wins the stamp (and with
    /// it the right to renew the subscription cycle).
    async fn mark_paid_once(&self, asaas_id: &str) -> BillingResult<bool> {
        let claimed: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = $2, paid_at = NOW(), updated_at = NOW()
            WHERE asaas_id = $1 AND paid_at IS NULL
            RETURNING id
            "#,
        )
        .bind(asaas_id)
        .bind(PaymentStatus::Received.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }
}
