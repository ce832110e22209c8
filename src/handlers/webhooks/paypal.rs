use axum::{body::Bytes, extract::State, http::HeaderMap};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::payments::{PayPalTransmission, PayPalWebhookEvent, PaymentProvider};
use crate::retry::retry_with_backoff;
use crate::settlement::{self, Applied, IntentStatus};

use super::common::{received, settle, ReceivedResponse};

/// POST /webhooks/paypal
///
/// Trust model: every delivery is checked against PayPal's
/// verify-webhook-signature endpoint before the payload is believed.
/// Missing transmission headers are rejected up front without a network
/// call; an unverifiable signature is a 401 so forged traffic earns no
/// retries.
pub async fn handle_paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReceivedResponse>> {
    let client = state
        .paypal
        .clone()
        .ok_or_else(|| AppError::Internal("PayPal is not configured".into()))?;

    let transmission = PayPalTransmission::from_headers(&headers)?;
    if !client.verify_webhook(&transmission, &body).await? {
        tracing::warn!("Rejected PayPal webhook: signature verification failed");
        return Err(AppError::Verification("Invalid webhook signature".into()));
    }

    let event: PayPalWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let Some(observed) = settlement::from_paypal_event_type(&event.event_type) else {
        tracing::debug!("Ignoring PayPal event type {}", event.event_type);
        return Ok(received());
    };

    // CHECKOUT.* events carry the order ID directly; PAYMENT.CAPTURE.*
    // events carry the capture ID and echo our correlation ID in custom_id.
    let is_capture_event = event.event_type.starts_with("PAYMENT.CAPTURE.");
    let intent = {
        let conn = state.db.get()?;
        if is_capture_event {
            match event.resource.custom_id.as_deref() {
                Some(correlation_id) => queries::get_payment_intent_by_correlation(
                    &conn,
                    PaymentProvider::Paypal,
                    correlation_id,
                )?,
                None => None,
            }
        } else {
            queries::get_payment_intent(&conn, &event.resource.id)?
        }
    };

    let Some(intent) = intent else {
        // Verified but not one of ours (or created by another environment).
        // Answer 200 so PayPal stops redelivering it.
        tracing::warn!(
            "PayPal event {} ({}) matches no payment intent",
            event.id,
            event.event_type
        );
        return Ok(received());
    };

    let capture_id = is_capture_event.then_some(event.resource.id.as_str());
    let applied = settle(
        &state,
        PaymentProvider::Paypal,
        Some(&event.id),
        &intent.id,
        observed,
        capture_id,
    )?;

    // Buyer approved the order: capture it so the COMPLETED webhook
    // follows. Runs after the response; settlement itself stays
    // webhook-driven.
    if event.event_type == "CHECKOUT.ORDER.APPROVED"
        && matches!(
            applied,
            Applied::Transitioned {
                to: IntentStatus::Pending,
                ..
            }
        )
    {
        spawn_capture(state.clone(), intent.id.clone());
    }

    Ok(received())
}

/// Capture an approved order in the background. Failures are logged only:
/// the reconciliation pass or a later webhook picks up whatever state the
/// order actually reached.
fn spawn_capture(state: AppState, order_id: String) {
    tokio::spawn(async move {
        let Some(client) = state.paypal.clone() else {
            return;
        };

        match retry_with_backoff(state.retry, || client.capture_order(&order_id)).await {
            Ok(order) => {
                tracing::info!("Captured PayPal order {}: {}", order.id, order.status);
            }
            Err(e) => {
                tracing::warn!("Failed to capture PayPal order {}: {}", order_id, e);
            }
        }
    });
}
