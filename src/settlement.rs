//! Settlement state machine.
//!
//! Maps both providers' status vocabularies onto one internal lifecycle:
//!
//! ```text
//! Created -> Pending -> {Paid, Failed, Canceled, Expired} -> Refunded
//! ```
//!
//! Transitions only ever move forward; an event reporting a state the
//! intent has already passed is accepted as a no-op. Reaching `Paid` for
//! the first time is the single transition with a ledger effect: one
//! completed credit, appended in the same database transaction that
//! advances the intent.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    CreateWalletTransaction, PaymentMethod, TransactionKind, TransactionStatus,
};
use crate::payments::{format_amount, PaymentProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Canceled,
    Expired,
    Refunded,
}

impl IntentStatus {
    /// Position in the forward lattice. Statuses of equal rank are mutually
    /// exclusive outcomes; a transition is applied only when the observed
    /// rank is strictly higher than the current one.
    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Pending => 1,
            Self::Paid | Self::Failed | Self::Canceled | Self::Expired => 2,
            Self::Refunded => 3,
        }
    }

    pub fn is_forward_from(self, current: IntentStatus) -> bool {
        self.rank() > current.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for IntentStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a Mollie payment status (as fetched from the API, never from the
/// webhook body) onto the internal lifecycle.
pub fn from_mollie_status(status: &str) -> Option<IntentStatus> {
    match status {
        "paid" | "authorized" => Some(IntentStatus::Paid),
        "failed" => Some(IntentStatus::Failed),
        "expired" => Some(IntentStatus::Expired),
        "canceled" => Some(IntentStatus::Canceled),
        "pending" | "open" => Some(IntentStatus::Pending),
        _ => None,
    }
}

/// Map a PayPal order status (create/capture/get responses) onto the
/// internal lifecycle.
pub fn from_paypal_order_status(status: &str) -> Option<IntentStatus> {
    match status {
        "COMPLETED" => Some(IntentStatus::Paid),
        "APPROVED" => Some(IntentStatus::Pending),
        "CREATED" | "SAVED" | "PAYER_ACTION_REQUIRED" => Some(IntentStatus::Created),
        "VOIDED" => Some(IntentStatus::Canceled),
        _ => None,
    }
}

/// Map a PayPal webhook event type onto the internal lifecycle. Returns
/// None for event types we deliberately ignore.
pub fn from_paypal_event_type(event_type: &str) -> Option<IntentStatus> {
    match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => Some(IntentStatus::Paid),
        "PAYMENT.CAPTURE.DENIED" => Some(IntentStatus::Failed),
        "PAYMENT.CAPTURE.REFUNDED" => Some(IntentStatus::Refunded),
        "CHECKOUT.ORDER.APPROVED" => Some(IntentStatus::Pending),
        _ => None,
    }
}

/// Outcome of feeding one observed provider state through the machine.
#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    /// The webhook event ID was already recorded; nothing happened.
    DuplicateEvent,
    /// The observed state does not move the intent forward; nothing
    /// happened (the event row, if any, was still recorded).
    NoOp { current: IntentStatus },
    /// The intent advanced. `credited` is set on the first arrival into
    /// Paid, when the settlement credit was appended.
    Transitioned {
        from: IntentStatus,
        to: IntentStatus,
        credited: bool,
    },
}

/// Apply one observed provider state to an intent.
///
/// Everything happens in a single database transaction: webhook-event
/// dedupe (when the provider supplies an event ID), the forward-only
/// compare-and-swap on the intent row, and the settlement credit. A crash
/// at any point rolls the whole unit back, so a provider redelivery can
/// safely redo it in full.
pub fn apply_settlement(
    conn: &mut Connection,
    provider: PaymentProvider,
    event_id: Option<&str>,
    intent_id: &str,
    observed: IntentStatus,
    capture_id: Option<&str>,
) -> Result<Applied> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    // Dedupe first: the unique (provider, event_id) insert is the durable
    // replay guard. A duplicate means some earlier delivery already ran
    // this whole unit to completion.
    if let Some(event_id) = event_id {
        if !queries::try_record_webhook_event(&tx, provider, event_id)? {
            return Ok(Applied::DuplicateEvent);
        }
    }

    let intent = queries::get_payment_intent(&tx, intent_id)?
        .ok_or_else(|| AppError::NotFound(format!("Payment intent not found: {}", intent_id)))?;
    let current = intent.status;

    if !observed.is_forward_from(current) {
        // Keep the event row: the delivery was real, it just reported a
        // state the intent has already passed.
        tx.commit()?;
        return Ok(Applied::NoOp { current });
    }

    let advanced = queries::advance_intent_status(&tx, intent_id, current, observed, capture_id)?;
    if !advanced {
        tx.commit()?;
        return Ok(Applied::NoOp { current });
    }

    let mut credited = false;
    if observed == IntentStatus::Paid {
        // First arrival into Paid: the one transition with a ledger effect.
        // The unique index on wallet_transactions.intent_id turns any
        // double-credit into a hard failure instead of silent money.
        queries::create_wallet_transaction(
            &tx,
            &CreateWalletTransaction {
                account_id: intent.account_id.clone(),
                kind: TransactionKind::Credit,
                amount_cents: intent.amount_cents,
                description: format!(
                    "Payment {} ({} {})",
                    intent.correlation_id,
                    format_amount(intent.amount_cents),
                    intent.currency
                ),
                status: TransactionStatus::Completed,
                payment_method: Some(match provider {
                    PaymentProvider::Paypal => PaymentMethod::Paypal,
                    PaymentProvider::Mollie => PaymentMethod::Mollie,
                }),
                intent_id: Some(intent.id.clone()),
                refund_request_id: None,
            },
        )?;
        credited = true;
    }

    tx.commit()?;

    tracing::info!(
        "Intent {} settled: {} -> {}{}",
        intent_id,
        current,
        observed,
        if credited { " (credited)" } else { "" }
    );

    Ok(Applied::Transitioned {
        from: current,
        to: observed,
        credited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_moves_forward_only() {
        use IntentStatus::*;
        assert!(Pending.is_forward_from(Created));
        assert!(Paid.is_forward_from(Pending));
        assert!(Refunded.is_forward_from(Paid));
        assert!(Failed.is_forward_from(Created));

        // backwards and sideways are rejected
        assert!(!Pending.is_forward_from(Paid));
        assert!(!Created.is_forward_from(Pending));
        assert!(!Failed.is_forward_from(Paid));
        assert!(!Paid.is_forward_from(Paid));
        assert!(!Paid.is_forward_from(Refunded));
    }

    #[test]
    fn mollie_statuses_map_per_table() {
        assert_eq!(from_mollie_status("paid"), Some(IntentStatus::Paid));
        assert_eq!(from_mollie_status("authorized"), Some(IntentStatus::Paid));
        assert_eq!(from_mollie_status("failed"), Some(IntentStatus::Failed));
        assert_eq!(from_mollie_status("expired"), Some(IntentStatus::Expired));
        assert_eq!(from_mollie_status("canceled"), Some(IntentStatus::Canceled));
        assert_eq!(from_mollie_status("pending"), Some(IntentStatus::Pending));
        assert_eq!(from_mollie_status("open"), Some(IntentStatus::Pending));
        assert_eq!(from_mollie_status("shipping"), None);
    }

    #[test]
    fn paypal_events_map_per_table() {
        assert_eq!(
            from_paypal_event_type("PAYMENT.CAPTURE.COMPLETED"),
            Some(IntentStatus::Paid)
        );
        assert_eq!(
            from_paypal_event_type("PAYMENT.CAPTURE.DENIED"),
            Some(IntentStatus::Failed)
        );
        assert_eq!(
            from_paypal_event_type("PAYMENT.CAPTURE.REFUNDED"),
            Some(IntentStatus::Refunded)
        );
        assert_eq!(
            from_paypal_event_type("CHECKOUT.ORDER.APPROVED"),
            Some(IntentStatus::Pending)
        );
        assert_eq!(from_paypal_event_type("CUSTOMER.DISPUTE.CREATED"), None);
    }
}
