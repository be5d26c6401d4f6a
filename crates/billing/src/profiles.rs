//! Subscription profile persistence
//!
//! One row per Asaas subscription: lifecycle status, the credit balance for
//! the current cycle, and the cycle window itself.

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::BillingResult;

/// Subscription lifecycle states.
///
/// SUSPENDED can return to ACTIVE on a renewed payment; CANCELLED is
/// terminal and forces the credit balance to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Suspended => "SUSPENDED",
            SubscriptionStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Mutations on subscription profile rows.
#[allow(async_fn_in_trait)]
pub trait ProfileRepository {
    /// Start a fresh billing cycle: reactivate the profile, reset both
    /// credit counters to the monthly allotment, and set the cycle window.
    async fn renew_cycle(
        &self,
        subscription_id: &str,
        credit_allotment: i32,
        period_end: Option<OffsetDateTime>,
    ) -> BillingResult<()>;

    /// Mark the profile as suspended. Credits are left untouched so a late
    /// payment can resume the cycle where it stopped.
    async fn suspend(&self, subscription_id: &str) -> BillingResult<()>;

    /// Terminal cancellation: status CANCELLED and both credit counters
    /// forced to zero.
    async fn cancel(&self, subscription_id: &str) -> BillingResult<()>;
}

/// Postgres-backed store for subscription profile rows
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pool: PgPool,
}

impl ProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProfileRepository for ProfileStore {
    async fn renew_cycle(
        &self,
        subscription_id: &str,
        credit_allotment: i32,
        period_end: Option<OffsetDateTime>,
    ) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_profiles
            SET subscription_status = $2,
                credits_total = $3,
                credits_remaining = $3,
                current_period_start = NOW(),
                current_period_end = $4,
                updated_at = NOW()
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .bind(SubscriptionStatus::Active.as_str())
        .bind(credit_allotment)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                subscription_id = %subscription_id,
                "Cycle renewal matched no profile row"
            );
        } else {
            tracing::info!(
                subscription_id = %subscription_id,
                credits = credit_allotment,
                "Subscription cycle renewed"
            );
        }

        Ok(())
    }

    async fn suspend(&self, subscription_id: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE subscription_profiles
            SET subscription_status = $2, updated_at = NOW()
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .bind(SubscriptionStatus::Suspended.as_str())
        .execute(&self.pool)
        .await?;

        tracing::info!(subscription_id = %subscription_id, "Subscription suspended");
        Ok(())
    }

    async fn cancel(&self, subscription_id: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE subscription_profiles
            SET subscription_status = $2,
                credits_total = 0,
                credits_remaining = 0,
                updated_at = NOW()
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .bind(SubscriptionStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await?;

        tracing::info!(subscription_id = %subscription_id, "Subscription cancelled");
        Ok(())
    }
}
