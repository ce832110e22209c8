use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ApiResponse, Json, Path, Query};
use crate::models::{
    CreateRefundRequest, PaymentIntent, RefundDecision, RefundRequest, WalletTransaction,
};
use crate::payments::{parse_amount, PaymentProvider};
use crate::retry::retry_with_backoff;
use crate::settlement::IntentStatus;

use super::webhooks::common::settle;

#[derive(Debug, Deserialize)]
pub struct AccountPath {
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestPath {
    pub request_id: String,
}

/// GET /refunds/{account_id}
pub async fn list_refunds(
    State(state): State<AppState>,
    Path(path): Path<AccountPath>,
) -> Result<Json<ApiResponse<Vec<RefundRequest>>>> {
    let conn = state.db.get()?;
    let requests = queries::list_refund_requests(&conn, &path.account_id)?;
    Ok(ApiResponse::ok(requests))
}

#[derive(Debug, Deserialize)]
pub struct CreateRefundBody {
    pub account_id: String,
    pub order_id: String,
    /// Fixed-point decimal string, e.g. "50.00"
    pub amount: String,
    pub reason: String,
}

/// POST /refunds
///
/// Files a refund request. At most one pending request may exist per
/// order; a duplicate is a 409.
pub async fn create_refund(
    State(state): State<AppState>,
    Json(body): Json<CreateRefundBody>,
) -> Result<Json<ApiResponse<RefundRequest>>> {
    let amount_cents = parse_amount(&body.amount)?;

    if body.account_id.trim().is_empty() || body.order_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Account ID and order ID are required".into(),
        ));
    }
    if body.reason.trim().is_empty() {
        return Err(AppError::BadRequest("Reason is required".into()));
    }

    let conn = state.db.get()?;
    let request = queries::create_refund_request(
        &conn,
        &CreateRefundRequest {
            account_id: body.account_id.clone(),
            order_id: body.order_id.clone(),
            amount_cents,
            reason: body.reason.clone(),
        },
    )?;

    Ok(ApiResponse::ok(request))
}

#[derive(Debug, Deserialize)]
pub struct DecideRefundBody {
    pub status: RefundDecision,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub processed_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionView {
    pub request: RefundRequest,
    /// The single ledger credit appended on approval; absent on rejection.
    pub transaction: Option<WalletTransaction>,
}

/// PUT /refunds/{request_id}
///
/// Admin decision on a pending request. Approval atomically appends
/// exactly one completed refund credit; a second decision attempt on the
/// same request is a 409. When the order was paid through a gateway, the
/// provider-side refund is issued after commit - the ledger credit is the
/// source of truth either way.
pub async fn decide_refund(
    State(state): State<AppState>,
    Path(path): Path<RequestPath>,
    Json(body): Json<DecideRefundBody>,
) -> Result<Json<ApiResponse<DecisionView>>> {
    let (request, transaction) = {
        let mut conn = state.db.get()?;
        queries::decide_refund_request(
            &mut conn,
            &path.request_id,
            body.status,
            body.admin_notes.as_deref(),
            body.processed_by.as_deref(),
        )?
    };

    tracing::info!(
        "Refund request {} {} by {:?}",
        request.id,
        request.status.as_str(),
        request.processed_by
    );

    if body.status == RefundDecision::Approved {
        let paid_intent = {
            let conn = state.db.get()?;
            queries::get_paid_intent_for_order(&conn, &request.order_id)?
        };
        if let Some(intent) = paid_intent {
            spawn_gateway_refund(state.clone(), intent, request.amount_cents);
        }
    }

    Ok(ApiResponse::ok(DecisionView {
        request,
        transaction,
    }))
}

/// DELETE /refunds/{request_id}?account_id=...
///
/// Requester-side cancellation, pending requests only.
#[derive(Debug, Deserialize)]
pub struct CancelRefundQuery {
    pub account_id: String,
}

pub async fn cancel_refund(
    State(state): State<AppState>,
    Path(path): Path<RequestPath>,
    Query(query): Query<CancelRefundQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let conn = state.db.get()?;
    queries::cancel_refund_request(&conn, &path.request_id, &query.account_id)?;

    Ok(ApiResponse::ok(serde_json::json!({
        "cancelled": path.request_id,
    })))
}

/// Issue the provider-side refund for a gateway-paid order and move the
/// intent to Refunded. Runs after the decision response; a failure here is
/// logged for operational follow-up and retried via the provider webhook
/// or a manual re-issue - the wallet credit has already been committed.
fn spawn_gateway_refund(state: AppState, intent: PaymentIntent, amount_cents: i64) {
    tokio::spawn(async move {
        let result = match intent.provider {
            PaymentProvider::Paypal => {
                let Some(client) = state.paypal.clone() else {
                    tracing::warn!("PayPal not configured; skipping gateway refund for {}", intent.id);
                    return;
                };
                let Some(capture_id) = intent.capture_id.clone() else {
                    tracing::warn!(
                        "Intent {} has no capture ID; cannot refund at PayPal",
                        intent.id
                    );
                    return;
                };
                retry_with_backoff(state.retry, || {
                    client.refund_capture(&capture_id, Some(amount_cents), &intent.currency)
                })
                .await
            }
            PaymentProvider::Mollie => {
                let Some(client) = state.mollie.clone() else {
                    tracing::warn!("Mollie not configured; skipping gateway refund for {}", intent.id);
                    return;
                };
                retry_with_backoff(state.retry, || {
                    client.refund_payment(
                        &intent.id,
                        Some(amount_cents),
                        &intent.currency,
                        Some("Refund approved"),
                    )
                })
                .await
            }
        };

        match result {
            Ok(refund_id) => {
                tracing::info!(
                    "Gateway refund {} issued for intent {}",
                    refund_id,
                    intent.id
                );
                if let Err(e) = settle(
                    &state,
                    intent.provider,
                    None,
                    &intent.id,
                    IntentStatus::Refunded,
                    None,
                ) {
                    tracing::error!("Failed to mark intent {} refunded: {}", intent.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Gateway refund failed for intent {}: {}", intent.id, e);
            }
        }
    });
}
