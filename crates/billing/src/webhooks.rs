//! Asaas webhook reconciliation
//!
//! Applies provider event notifications to the persisted payment and
//! subscription profile rows. Delivery is at-least-once and concurrent
//! deliveries for the same charge are possible, so every mutation here is a
//! conditional UPDATE and the first-paid transition is claimed exactly once
//! at write time.
//!
//! Intentional no-ops (unknown charge, missing references, unrecognized
//! events) are reported as such so the handler can acknowledge with 200 and
//! stop provider retries; only genuine persistence failures bubble up.

use serde::Deserialize;
use sqlx::PgPool;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::BillingResult;
use crate::payments::{PaymentRepository, PaymentStatus, PaymentStore, PaymentType};
use crate::profiles::{ProfileRepository, ProfileStore};

/// Provider event names this system reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    #[serde(rename = "PAYMENT_CONFIRMED")]
    PaymentConfirmed,
    #[serde(rename = "PAYMENT_RECEIVED")]
    PaymentReceived,
    #[serde(rename = "PAYMENT_OVERDUE")]
    PaymentOverdue,
    #[serde(rename = "PAYMENT_REFUNDED")]
    PaymentRefunded,
    #[serde(rename = "SUBSCRIPTION_INACTIVATED")]
    SubscriptionInactivated,
    #[serde(other)]
    Unknown,
}

/// Webhook notification payload
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: EventKind,
    #[serde(default)]
    pub payment: Option<WebhookPayment>,
    #[serde(default)]
    pub subscription: Option<WebhookSubscription>,
}

/// Payment object embedded in a webhook notification
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default, rename = "dueDate")]
    pub due_date: Option<String>,
}

/// Subscription object embedded in a webhook notification
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
}

impl WebhookEvent {
    /// Subscription reference from the event's subscription object, falling
    /// back to the embedded payment's subscription field.
    pub fn subscription_ref(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .map(|s| s.id.as_str())
            .or_else(|| {
                self.payment
                    .as_ref()
                    .and_then(|p| p.subscription.as_deref())
            })
    }
}

/// What the reconciler did with an event. Every variant is acknowledged
/// with 200; the distinction exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Subscription profile cancelled with credits zeroed
    ProfileCancelled,
    /// Intentional no-op
    Ignored(IgnoreReason),
    /// Event mapped to a status the row already had (or was already paid)
    StatusUnchanged,
    /// Payment row mutated
    StatusUpdated {
        status: PaymentStatus,
        cycle_renewed: bool,
    },
}

/// Why an event was intentionally ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Inactivation event with no resolvable subscription reference
    NoSubscriptionReference,
    /// Event carries no payment object
    NoPaymentReference,
    /// No mirror row for the charge; delivery may race persistence or the
    /// charge belongs to a flow outside this system's tracking
    UnknownCharge,
    /// Unrecognized event name
    UnknownEvent,
}

/// Maps a payment event to the status it transitions the row to.
fn next_status(kind: EventKind) -> Option<PaymentStatus> {
    match kind {
        EventKind::PaymentConfirmed | EventKind::PaymentReceived => Some(PaymentStatus::Received),
        EventKind::PaymentOverdue => Some(PaymentStatus::Suspended),
        EventKind::PaymentRefunded => Some(PaymentStatus::Cancelled),
        EventKind::SubscriptionInactivated | EventKind::Unknown => None,
    }
}

/// Parse a provider due date (YYYY-MM-DD) into the cycle end instant,
/// end of that day in UTC.
fn period_end_from_due_date(due_date: &str) -> Option<OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day]");
    let date = Date::parse(due_date, &format).ok()?;
    let time = date.with_hms(23, 59, 59).ok()?;
    Some(time.assume_utc())
}

/// Webhook reconciler: the only writer of payment and profile rows.
///
/// Generic over the repositories so the reconciliation flow can be
/// exercised against in-memory stores; production wiring uses the
/// Postgres-backed defaults.
#[derive(Debug, Clone)]
pub struct WebhookReconciler<P = PaymentStore, S = ProfileStore> {
    payments: P,
    profiles: S,
    credit_allotment: i32,
}

impl WebhookReconciler {
    pub fn new(pool: PgPool, credit_allotment: i32) -> Self {
        Self {
            payments: PaymentStore::new(pool.clone()),
            profiles: ProfileStore::new(pool),
            credit_allotment,
        }
    }
}

impl<P: PaymentRepository, S: ProfileRepository> WebhookReconciler<P, S> {
    pub fn with_stores(payments: P, profiles: S, credit_allotment: i32) -> Self {
        Self {
            payments,
            profiles,
            credit_allotment,
        }
    }

    /// Apply one provider event, in the fixed priority order:
    /// inactivation, payment presence, row lookup, classification,
    /// status transition, cycle renewal / suspension.
    ///
    /// A replayed `PAYMENT_RECEIVED` on an already-paid row is a pure
    /// no-op, including the status column: the stored status may be newer
    /// information (a refund processed between deliveries) and a stale
    /// receipt must not roll it back.
    pub async fn handle_event(&self, event: &WebhookEvent) -> BillingResult<ReconcileOutcome> {
        // Inactivation wins over any pending payment-status event and is
        // independent of payment state.
        if event.event == EventKind::SubscriptionInactivated {
            let Some(subscription_id) = event.subscription_ref() else {
                tracing::info!("Inactivation event without subscription reference, ignoring");
                return Ok(ReconcileOutcome::Ignored(
                    IgnoreReason::NoSubscriptionReference,
                ));
            };
            self.profiles.cancel(subscription_id).await?;
            return Ok(ReconcileOutcome::ProfileCancelled);
        }

        let Some(payment) = &event.payment else {
            tracing::info!(event = ?event.event, "Event without payment reference, ignoring");
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::NoPaymentReference));
        };

        let Some(record) = self.payments.find_by_asaas_id(&payment.id).await? else {
            tracing::info!(
                charge_id = %payment.id,
                "No payment row for charge, ignoring"
            );
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::UnknownCharge));
        };

        // Classify on first sight, never overwrite.
        if record.payment_type.is_none() {
            let payment_type = if payment.subscription.is_some() {
                PaymentType::Subscription
            } else {
                PaymentType::OneTime
            };
            self.payments
                .classify_once(&payment.id, payment_type)
                .await?;
        }

        let Some(status) = next_status(event.event) else {
            tracing::info!(
                charge_id = %payment.id,
                "Unrecognized event name, leaving status unchanged"
            );
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::UnknownEvent));
        };

        let subscription_id = payment
            .subscription
            .as_deref()
            .or(record.subscription_id.as_deref());

        if event.event == EventKind::PaymentReceived {
            // Claim the first-paid transition; losing the claim means a
            // prior delivery already stamped and credited this charge, and
            // the row (status included) is left exactly as found.
            let first_paid = self.payments.mark_paid_once(&payment.id).await?;
            if !first_paid {
                tracing::info!(
                    charge_id = %payment.id,
                    "Charge already marked paid, skipping re-credit"
                );
                return Ok(ReconcileOutcome::StatusUnchanged);
            }

            let mut cycle_renewed = false;
            if let Some(subscription_id) = subscription_id {
                let period_end = payment
                    .due_date
                    .as_deref()
                    .and_then(period_end_from_due_date);
                self.profiles
                    .renew_cycle(subscription_id, self.credit_allotment, period_end)
                    .await?;
                cycle_renewed = true;
            }

            tracing::info!(
                charge_id = %payment.id,
                cycle_renewed = cycle_renewed,
                "Payment marked received"
            );
            return Ok(ReconcileOutcome::StatusUpdated {
                status: PaymentStatus::Received,
                cycle_renewed,
            });
        }

        let changed = self
            .payments
            .set_status_if_changed(&payment.id, status)
            .await?;

        if event.event == EventKind::PaymentOverdue {
            if let Some(subscription_id) = subscription_id {
                self.profiles.suspend(subscription_id).await?;
            }
        }

        if changed {
            tracing::info!(
                charge_id = %payment.id,
                status = status.as_str(),
                "Payment status updated"
            );
            Ok(ReconcileOutcome::StatusUpdated {
                status,
                cycle_renewed: false,
            })
        } else {
            Ok(ReconcileOutcome::StatusUnchanged)
        }
    }
}
