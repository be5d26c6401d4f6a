// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Webhook Reconciler
//!
//! Tests boundary conditions in:
//! - Event payload parsing (structurally odd but valid provider payloads)
//! - The event-to-status transition table
//! - Subscription reference resolution and priority
//! - Cycle window computation from provider due dates
//! - The full reconciliation flow against in-memory stores (idempotency,
//!   event priority, unknown charges, suspension/cancellation side effects)

#[cfg(test)]
mod payload_edge_cases {
    use crate::webhooks::*;

    // =========================================================================
    // Inactivation without any subscription reference anywhere
    // =========================================================================
    #[test]
    fn test_inactivation_without_references_has_no_subscription_ref() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"SUBSCRIPTION_INACTIVATED"}"#).unwrap();
        assert_eq!(event.event, EventKind::SubscriptionInactivated);
        assert_eq!(event.subscription_ref(), None);
    }

    // =========================================================================
    // Payment-status event with no payment object at all
    // =========================================================================
    #[test]
    fn test_payment_event_without_payment_object() {
        let event: WebhookEvent = serde_json::from_str(r#"{"event":"PAYMENT_RECEIVED"}"#).unwrap();
        assert_eq!(event.event, EventKind::PaymentReceived);
        assert!(event.payment.is_none());
    }

    // =========================================================================
    // Payment object carrying extra provider fields this system ignores
    // =========================================================================
    #[test]
    fn test_payment_with_unknown_fields_still_parses() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event":"PAYMENT_OVERDUE","payment":{"id":"pay_9","billingType":"PIX","value":49.9,"netValue":48.2}}"#,
        )
        .unwrap();
        let payment = event.payment.unwrap();
        assert_eq!(payment.id, "pay_9");
        assert!(payment.subscription.is_none());
        assert!(payment.due_date.is_none());
    }

    // =========================================================================
    // Inactivation resolving the reference from the embedded payment only
    // =========================================================================
    #[test]
    fn test_inactivation_resolves_from_payment_subscription() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event":"SUBSCRIPTION_INACTIVATED","payment":{"id":"pay_1","subscription":"sub_7"}}"#,
        )
        .unwrap();
        assert_eq!(event.subscription_ref(), Some("sub_7"));
    }

    // =========================================================================
    // Event name casing matters: provider names are exact-match
    // =========================================================================
    #[test]
    fn test_lowercase_event_name_is_unknown() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"payment_received","payment":{"id":"pay_1"}}"#)
                .unwrap();
        assert_eq!(event.event, EventKind::Unknown);
    }

    // =========================================================================
    // PAYMENT_DELETED is an event the provider sends but this system does
    // not map; it must parse (and later no-op) rather than fail
    // =========================================================================
    #[test]
    fn test_unmapped_provider_event_parses() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"PAYMENT_DELETED","payment":{"id":"pay_1"}}"#)
                .unwrap();
        assert_eq!(event.event, EventKind::Unknown);
    }
}

#[cfg(test)]
mod reconciler_flow {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use time::macros::datetime;
    use time::OffsetDateTime;

    use crate::error::BillingResult;
    use crate::payments::{PaymentRecord, PaymentRepository, PaymentStatus, PaymentType};
    use crate::profiles::{ProfileRepository, SubscriptionStatus};
    use crate::webhooks::*;

    const ALLOTMENT: i32 = 1000;

    /// In-memory payment rows, mutated under the same conditional rules the
    /// Postgres store enforces in SQL.
    #[derive(Debug, Clone, Default)]
    struct MemoryPayments {
        rows: Arc<Mutex<HashMap<String, PaymentRecord>>>,
    }

    impl MemoryPayments {
        fn insert(&self, record: PaymentRecord) {
            self.rows
                .lock()
                .unwrap()
                .insert(record.asaas_id.clone(), record);
        }

        fn get(&self, asaas_id: &str) -> Option<PaymentRecord> {
            self.rows.lock().unwrap().get(asaas_id).cloned()
        }
    }

    impl PaymentRepository for MemoryPayments {
        async fn find_by_asaas_id(&self, asaas_id: &str) -> BillingResult<Option<PaymentRecord>> {
            Ok(self.get(asaas_id))
        }

        async fn classify_once(
            &self,
            asaas_id: &str,
            payment_type: PaymentType,
        ) -> BillingResult<()> {
            if let Some(row) = self.rows.lock().unwrap().get_mut(asaas_id) {
                if row.payment_type.is_none() {
                    row.payment_type = Some(payment_type.as_str().to_string());
                }
            }
            Ok(())
        }

        async fn set_status_if_changed(
            &self,
            asaas_id: &str,
            status: PaymentStatus,
        ) -> BillingResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(asaas_id) {
                Some(row) if row.status != status.as_str() => {
                    row.status = status.as_str().to_string();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn mark_paid_once(&self, asaas_id: &str) -> BillingResult<bool> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(asaas_id) {
                Some(row) if row.paid_at.is_none() => {
                    row.status = PaymentStatus::Received.as_str().to_string();
                    row.paid_at = Some(OffsetDateTime::now_utc());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct ProfileState {
        status: SubscriptionStatus,
        credits_total: i32,
        credits_remaining: i32,
        period_end: Option<OffsetDateTime>,
        renewals: u32,
    }

    impl ProfileState {
        fn active() -> Self {
            Self {
                status: SubscriptionStatus::Active,
                credits_total: ALLOTMENT,
                credits_remaining: 250,
                period_end: None,
                renewals: 0,
            }
        }
    }

    /// In-memory subscription profiles. Like the Postgres store, mutations
    /// only touch rows that already exist.
    #[derive(Debug, Clone, Default)]
    struct MemoryProfiles {
        rows: Arc<Mutex<HashMap<String, ProfileState>>>,
    }

    impl MemoryProfiles {
        fn insert(&self, subscription_id: &str, state: ProfileState) {
            self.rows
                .lock()
                .unwrap()
                .insert(subscription_id.to_string(), state);
        }

        fn get(&self, subscription_id: &str) -> Option<ProfileState> {
            self.rows.lock().unwrap().get(subscription_id).cloned()
        }
    }

    impl ProfileRepository for MemoryProfiles {
        async fn renew_cycle(
            &self,
            subscription_id: &str,
            credit_allotment: i32,
            period_end: Option<OffsetDateTime>,
        ) -> BillingResult<()> {
            if let Some(row) = self.rows.lock().unwrap().get_mut(subscription_id) {
                row.status = SubscriptionStatus::Active;
                row.credits_total = credit_allotment;
                row.credits_remaining = credit_allotment;
                row.period_end = period_end;
                row.renewals += 1;
            }
            Ok(())
        }

        async fn suspend(&self, subscription_id: &str) -> BillingResult<()> {
            if let Some(row) = self.rows.lock().unwrap().get_mut(subscription_id) {
                row.status = SubscriptionStatus::Suspended;
            }
            Ok(())
        }

        async fn cancel(&self, subscription_id: &str) -> BillingResult<()> {
            if let Some(row) = self.rows.lock().unwrap().get_mut(subscription_id) {
                row.status = SubscriptionStatus::Cancelled;
                row.credits_total = 0;
                row.credits_remaining = 0;
            }
            Ok(())
        }
    }

    fn pending_payment(asaas_id: &str, subscription_id: Option<&str>) -> PaymentRecord {
        PaymentRecord {
            asaas_id: asaas_id.to_string(),
            status: "PENDING".to_string(),
            payment_type: None,
            subscription_id: subscription_id.map(str::to_string),
            paid_at: None,
        }
    }

    fn event(json: &str) -> WebhookEvent {
        serde_json::from_str(json).unwrap()
    }

    fn reconciler(
        payments: &MemoryPayments,
        profiles: &MemoryProfiles,
    ) -> WebhookReconciler<MemoryPayments, MemoryProfiles> {
        WebhookReconciler::with_stores(payments.clone(), profiles.clone(), ALLOTMENT)
    }

    // =========================================================================
    // A duplicate PAYMENT_RECEIVED delivery must not credit the cycle twice
    // =========================================================================
    #[tokio::test]
    async fn test_duplicate_payment_received_credits_cycle_once() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        payments.insert(pending_payment("pay_1", Some("sub_1")));
        profiles.insert("sub_1", ProfileState::active());

        let reconciler = reconciler(&payments, &profiles);
        let received = event(
            r#"{"event":"PAYMENT_RECEIVED","payment":{"id":"pay_1","subscription":"sub_1","dueDate":"2025-06-30"}}"#,
        );

        let first = reconciler.handle_event(&received).await.unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::StatusUpdated {
                status: PaymentStatus::Received,
                cycle_renewed: true,
            }
        );

        let profile = profiles.get("sub_1").unwrap();
        assert_eq!(profile.status, SubscriptionStatus::Active);
        assert_eq!(profile.credits_remaining, ALLOTMENT);
        assert_eq!(profile.period_end, Some(datetime!(2025-06-30 23:59:59 UTC)));
        assert_eq!(profile.renewals, 1);

        let replay = reconciler.handle_event(&received).await.unwrap();
        assert_eq!(replay, ReconcileOutcome::StatusUnchanged);
        assert_eq!(profiles.get("sub_1").unwrap().renewals, 1);
    }

    // =========================================================================
    // SUBSCRIPTION_INACTIVATED takes priority over the embedded payment and
    // must not touch the payment row
    // =========================================================================
    #[tokio::test]
    async fn test_inactivation_cancels_profile_without_touching_payment() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        payments.insert(pending_payment("pay_1", Some("sub_1")));
        profiles.insert("sub_1", ProfileState::active());

        let reconciler = reconciler(&payments, &profiles);
        let inactivated = event(
            r#"{"event":"SUBSCRIPTION_INACTIVATED","payment":{"id":"pay_1","subscription":"sub_1"},"subscription":{"id":"sub_1"}}"#,
        );

        let outcome = reconciler.handle_event(&inactivated).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::ProfileCancelled);

        let profile = profiles.get("sub_1").unwrap();
        assert_eq!(profile.status, SubscriptionStatus::Cancelled);
        assert_eq!(profile.credits_total, 0);
        assert_eq!(profile.credits_remaining, 0);

        let payment = payments.get("pay_1").unwrap();
        assert_eq!(payment.status, "PENDING");
        assert!(payment.paid_at.is_none());
        assert!(payment.payment_type.is_none());
    }

    // =========================================================================
    // Events for charges with no mirror row are acknowledged without mutating
    // anything
    // =========================================================================
    #[tokio::test]
    async fn test_unknown_charge_is_ignored_without_mutations() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        profiles.insert("sub_1", ProfileState::active());

        let reconciler = reconciler(&payments, &profiles);
        let received = event(
            r#"{"event":"PAYMENT_RECEIVED","payment":{"id":"pay_untracked","subscription":"sub_1"}}"#,
        );

        let outcome = reconciler.handle_event(&received).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored(IgnoreReason::UnknownCharge)
        );
        assert_eq!(profiles.get("sub_1").unwrap(), ProfileState::active());
    }

    // =========================================================================
    // PAYMENT_OVERDUE suspends both the payment row and the linked profile,
    // leaving the remaining credits intact for a late renewal
    // =========================================================================
    #[tokio::test]
    async fn test_overdue_suspends_payment_and_profile_keeping_credits() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        payments.insert(pending_payment("pay_1", Some("sub_1")));
        profiles.insert("sub_1", ProfileState::active());

        let reconciler = reconciler(&payments, &profiles);
        let overdue = event(
            r#"{"event":"PAYMENT_OVERDUE","payment":{"id":"pay_1","subscription":"sub_1"}}"#,
        );

        let outcome = reconciler.handle_event(&overdue).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::StatusUpdated {
                status: PaymentStatus::Suspended,
                cycle_renewed: false,
            }
        );
        assert_eq!(payments.get("pay_1").unwrap().status, "SUSPENDED");

        let profile = profiles.get("sub_1").unwrap();
        assert_eq!(profile.status, SubscriptionStatus::Suspended);
        assert_eq!(profile.credits_remaining, 250);
    }

    // =========================================================================
    // A stale PAYMENT_RECEIVED replay must not roll back a newer status
    // (paid, then refunded, then the receipt is redelivered)
    // =========================================================================
    #[tokio::test]
    async fn test_replayed_receipt_does_not_roll_back_refund() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        payments.insert(PaymentRecord {
            asaas_id: "pay_1".to_string(),
            status: PaymentStatus::Cancelled.as_str().to_string(),
            payment_type: Some(PaymentType::Subscription.as_str().to_string()),
            subscription_id: Some("sub_1".to_string()),
            paid_at: Some(datetime!(2025-06-01 12:00:00 UTC)),
        });
        profiles.insert("sub_1", ProfileState::active());

        let reconciler = reconciler(&payments, &profiles);
        let replay = event(
            r#"{"event":"PAYMENT_RECEIVED","payment":{"id":"pay_1","subscription":"sub_1"}}"#,
        );

        let outcome = reconciler.handle_event(&replay).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::StatusUnchanged);

        let payment = payments.get("pay_1").unwrap();
        assert_eq!(payment.status, "CANCELLED");
        assert_eq!(profiles.get("sub_1").unwrap().renewals, 0);
    }

    // =========================================================================
    // Classification happens on first sight and is never overwritten
    // =========================================================================
    #[tokio::test]
    async fn test_classification_is_written_once() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();
        payments.insert(pending_payment("pay_1", None));

        let reconciler = reconciler(&payments, &profiles);

        let confirmed =
            event(r#"{"event":"PAYMENT_CONFIRMED","payment":{"id":"pay_1"}}"#);
        reconciler.handle_event(&confirmed).await.unwrap();
        assert_eq!(
            payments.get("pay_1").unwrap().payment_type.as_deref(),
            Some("ONE_TIME")
        );

        // Later event claiming a subscription link must not re-classify.
        let overdue = event(
            r#"{"event":"PAYMENT_OVERDUE","payment":{"id":"pay_1","subscription":"sub_1"}}"#,
        );
        reconciler.handle_event(&overdue).await.unwrap();
        assert_eq!(
            payments.get("pay_1").unwrap().payment_type.as_deref(),
            Some("ONE_TIME")
        );
    }

    // =========================================================================
    // A payment-status event without a payment object is acknowledged as a
    // no-op instead of failing the delivery
    // =========================================================================
    #[tokio::test]
    async fn test_payment_event_without_payment_is_ignored() {
        let payments = MemoryPayments::default();
        let profiles = MemoryProfiles::default();

        let reconciler = reconciler(&payments, &profiles);
        let outcome = reconciler
            .handle_event(&event(r#"{"event":"PAYMENT_REFUNDED"}"#))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored(IgnoreReason::NoPaymentReference)
        );
    }
}
