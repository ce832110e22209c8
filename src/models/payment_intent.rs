use serde::{Deserialize, Serialize};

use crate::payments::PaymentProvider;
use crate::settlement::IntentStatus;

/// One attempted payment at a gateway. The primary key is the
/// provider-issued order/payment ID; `correlation_id` is the caller's order
/// reference, echoed back in webhooks for lookup. Rows are never deleted -
/// terminal intents stay for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider-issued ID (PayPal order ID, Mollie tr_ ID)
    pub id: String,
    pub provider: PaymentProvider,
    pub account_id: String,
    /// Caller-supplied order reference; ties the settlement credit to the
    /// order and links refund requests back to the payment.
    pub correlation_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub status: IntentStatus,
    /// PayPal capture ID, recorded when the capture webhook lands.
    /// Required for gateway-side refunds; Mollie refunds use `id` directly.
    pub capture_id: Option<String>,
    pub checkout_url: String,
    pub created_at: i64,
    pub last_transition_at: i64,
}

/// Data required to record a new intent after gateway creation succeeded.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    pub id: String,
    pub provider: PaymentProvider,
    pub account_id: String,
    pub correlation_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub checkout_url: String,
}
