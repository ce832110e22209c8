use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{ApiResponse, Json, Path};
use crate::models::{
    CreateWalletTransaction, PaymentMethod, TransactionKind, TransactionStatus, WalletTransaction,
};
use crate::payments::{format_amount, parse_amount};

#[derive(Debug, Deserialize)]
pub struct AccountPath {
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionPath {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct WalletView {
    /// Derived fold over completed entries - recomputed on every read.
    pub balance_cents: i64,
    pub balance: String,
    pub transactions: Vec<WalletTransaction>,
}

/// GET /wallet/{account_id}
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(path): Path<AccountPath>,
) -> Result<Json<ApiResponse<WalletView>>> {
    let conn = state.db.get()?;
    let balance_cents = queries::wallet_balance(&conn, &path.account_id)?;
    let transactions = queries::list_wallet_transactions(&conn, &path.account_id)?;

    Ok(ApiResponse::ok(WalletView {
        balance_cents,
        balance: format_amount(balance_cents),
        transactions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Fixed-point decimal string, e.g. "50.00"
    pub amount: String,
    pub description: String,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction: WalletTransaction,
    pub balance_cents: i64,
}

/// POST /wallet/{account_id}/transactions
///
/// Manual append for the dashboards. Bank transfers start pending (they
/// need administrative confirmation); everything else is completed
/// immediately because the gateway already confirmed funds.
pub async fn create_transaction(
    State(state): State<AppState>,
    Path(path): Path<AccountPath>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionView>>> {
    let amount_cents = parse_amount(&request.amount)?;

    // Refund rows are minted exclusively by the refund workflow
    if request.kind == TransactionKind::Refund {
        return Err(AppError::BadRequest(
            "Refund transactions are created through refund requests".into(),
        ));
    }

    let status = if request.payment_method == Some(PaymentMethod::BankTransfer) {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Completed
    };

    let conn = state.db.get()?;
    let transaction = queries::create_wallet_transaction(
        &conn,
        &CreateWalletTransaction {
            account_id: path.account_id.clone(),
            kind: request.kind,
            amount_cents,
            description: request.description.clone(),
            status,
            payment_method: request.payment_method,
            intent_id: None,
            refund_request_id: None,
        },
    )?;

    let balance_cents = queries::wallet_balance(&conn, &path.account_id)?;

    Ok(ApiResponse::ok(TransactionView {
        transaction,
        balance_cents,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TransactionStatus,
}

/// PUT /wallet/transactions/{transaction_id}/status
///
/// One-shot settle of a pending entry (admin confirmation of a bank
/// transfer, or marking it failed). Settling twice is a conflict.
pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(path): Path<TransactionPath>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<TransactionView>>> {
    let conn = state.db.get()?;
    let transaction =
        queries::settle_wallet_transaction(&conn, &path.transaction_id, request.status)?;
    let balance_cents = queries::wallet_balance(&conn, &transaction.account_id)?;

    Ok(ApiResponse::ok(TransactionView {
        transaction,
        balance_cents,
    }))
}

/// DELETE /wallet/transactions/{transaction_id}
///
/// Only a pending bank transfer may be removed - the account holder
/// canceling before confirmation. Everything else is immutable history.
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(path): Path<TransactionPath>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let conn = state.db.get()?;
    queries::delete_wallet_transaction(&conn, &path.transaction_id)?;

    Ok(ApiResponse::ok(serde_json::json!({
        "deleted": path.transaction_id,
    })))
}
