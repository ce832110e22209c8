use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::{ApiResponse, Json, Path};
use crate::models::CreatePaymentIntent;
use crate::payments::{parse_amount, PaymentProvider};
use crate::retry::retry_with_backoff;
use crate::settlement::IntentStatus;

/// Checkout creation request, shared by both providers.
///
/// `amount` is a fixed-point decimal string ("99.99") - callers never send
/// floats for money. `order_id` is the caller's order reference and becomes
/// the intent's correlation ID.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub amount: String,
    #[serde(default)]
    pub currency: Option<String>,
    pub description: String,
    pub account_id: String,
    pub order_id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub return_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    fn validate(&self) -> Result<(i64, String)> {
        let amount_cents = parse_amount(&self.amount)?;

        if self.description.trim().is_empty() {
            return Err(AppError::BadRequest("Description is required".into()));
        }
        if self.account_id.trim().is_empty() {
            return Err(AppError::BadRequest("Account ID is required".into()));
        }
        if self.order_id.trim().is_empty() {
            return Err(AppError::BadRequest("Order ID is required".into()));
        }
        if self.return_url.trim().is_empty() || self.cancel_url.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Return and cancel URLs are required".into(),
            ));
        }

        let currency = self
            .currency
            .as_deref()
            .unwrap_or("EUR")
            .trim()
            .to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::BadRequest("Invalid currency code".into()));
        }

        Ok((amount_cents, currency))
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_id: String,
    pub checkout_url: String,
}

/// POST /checkout/paypal
pub async fn create_paypal_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutResponse>>> {
    let (amount_cents, currency) = request.validate()?;

    let client = state
        .paypal
        .clone()
        .ok_or_else(|| AppError::BadRequest("PayPal is not configured".into()))?;

    let (order_id, checkout_url) = retry_with_backoff(state.retry, || {
        client.create_order(
            amount_cents,
            &currency,
            &request.description,
            &request.order_id,
            &request.return_url,
            &request.cancel_url,
        )
    })
    .await?;

    let conn = state.db.get()?;
    let intent = queries::create_payment_intent(
        &conn,
        &CreatePaymentIntent {
            id: order_id,
            provider: PaymentProvider::Paypal,
            account_id: request.account_id.clone(),
            correlation_id: request.order_id.clone(),
            amount_cents,
            currency,
            description: request.description.clone(),
            checkout_url: checkout_url.clone(),
        },
    )?;

    tracing::info!(
        "PayPal checkout created: intent={}, order={}, customer={:?} {:?}",
        intent.id,
        request.order_id,
        request.customer_name,
        request.customer_email
    );

    Ok(ApiResponse::ok(CheckoutResponse {
        payment_id: intent.id,
        checkout_url,
    }))
}

/// POST /checkout/mollie
pub async fn create_mollie_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutResponse>>> {
    let (amount_cents, currency) = request.validate()?;

    let client = state
        .mollie
        .clone()
        .ok_or_else(|| AppError::BadRequest("Mollie is not configured".into()))?;

    let webhook_url = format!("{}/webhooks/mollie", state.base_url);

    let (payment_id, checkout_url) = retry_with_backoff(state.retry, || {
        client.create_payment(
            amount_cents,
            &currency,
            &request.description,
            &request.order_id,
            &request.account_id,
            &request.return_url,
            &webhook_url,
        )
    })
    .await?;

    let conn = state.db.get()?;
    let intent = queries::create_payment_intent(
        &conn,
        &CreatePaymentIntent {
            id: payment_id,
            provider: PaymentProvider::Mollie,
            account_id: request.account_id.clone(),
            correlation_id: request.order_id.clone(),
            amount_cents,
            currency,
            description: request.description.clone(),
            checkout_url: checkout_url.clone(),
        },
    )?;

    tracing::info!(
        "Mollie checkout created: intent={}, order={}, customer={:?} {:?}",
        intent.id,
        request.order_id,
        request.customer_name,
        request.customer_email
    );

    Ok(ApiResponse::ok(CheckoutResponse {
        payment_id: intent.id,
        checkout_url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CancelPath {
    pub payment_id: String,
}

/// POST /checkout/mollie/{payment_id}/cancel
///
/// Asks Mollie to cancel an unfinished payment. The resulting `canceled`
/// status lands through the webhook (or the sync endpoint) like any other
/// transition - this handler only issues the provider call.
pub async fn cancel_mollie_checkout(
    State(state): State<AppState>,
    Path(path): Path<CancelPath>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let client = state
        .mollie
        .clone()
        .ok_or_else(|| AppError::BadRequest("Mollie is not configured".into()))?;

    let intent = {
        let conn = state.db.get()?;
        queries::get_payment_intent(&conn, &path.payment_id)?.or_not_found("Payment not found")?
    };

    if intent.provider != PaymentProvider::Mollie {
        return Err(AppError::BadRequest("Not a Mollie payment".into()));
    }
    if !matches!(intent.status, IntentStatus::Created | IntentStatus::Pending) {
        return Err(AppError::Conflict(format!(
            "Payment is already {}",
            intent.status
        )));
    }

    let payment =
        retry_with_backoff(state.retry, || client.cancel_payment(&intent.id)).await?;

    Ok(ApiResponse::ok(serde_json::json!({
        "payment_id": payment.id,
        "provider_status": payment.status,
    })))
}
