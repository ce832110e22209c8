use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{AppError, Result};
use crate::id::{self, EntityType};
use crate::models::*;
use crate::payments::PaymentProvider;
use crate::settlement::IntentStatus;

use super::from_row::{
    query_all, query_one, PAYMENT_INTENT_COLS, REFUND_REQUEST_COLS, WALLET_TRANSACTION_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Whether a rusqlite error is a UNIQUE-constraint violation, used to turn
/// duplicate-write races into typed conflicts instead of opaque 500s.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============ Payment Intents ============

pub fn create_payment_intent(conn: &Connection, input: &CreatePaymentIntent) -> Result<PaymentIntent> {
    let ts = now();
    conn.execute(
        "INSERT INTO payment_intents (id, provider, account_id, correlation_id, amount_cents, currency, description, status, capture_id, checkout_url, created_at, last_transition_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10, ?10)",
        params![
            input.id,
            input.provider.as_str(),
            input.account_id,
            input.correlation_id,
            input.amount_cents,
            input.currency,
            input.description,
            IntentStatus::Created.as_str(),
            input.checkout_url,
            ts,
        ],
    )?;

    Ok(PaymentIntent {
        id: input.id.clone(),
        provider: input.provider,
        account_id: input.account_id.clone(),
        correlation_id: input.correlation_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        description: input.description.clone(),
        status: IntentStatus::Created,
        capture_id: None,
        checkout_url: input.checkout_url.clone(),
        created_at: ts,
        last_transition_at: ts,
    })
}

pub fn get_payment_intent(conn: &Connection, id: &str) -> Result<Option<PaymentIntent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_intents WHERE id = ?1",
            PAYMENT_INTENT_COLS
        ),
        &[&id],
    )
}

/// Resolve an intent from the correlation ID echoed back in provider
/// webhooks. When an order was retried the newest attempt wins; abandoned
/// attempts expire through their own webhooks.
pub fn get_payment_intent_by_correlation(
    conn: &Connection,
    provider: PaymentProvider,
    correlation_id: &str,
) -> Result<Option<PaymentIntent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_intents WHERE provider = ?1 AND correlation_id = ?2 ORDER BY created_at DESC LIMIT 1",
            PAYMENT_INTENT_COLS
        ),
        &[&provider.as_str(), &correlation_id],
    )
}

/// Find the paid gateway intent behind an order, if any. Used by the
/// refund workflow to decide whether a provider-side refund is possible.
pub fn get_paid_intent_for_order(
    conn: &Connection,
    order_id: &str,
) -> Result<Option<PaymentIntent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_intents WHERE correlation_id = ?1 AND status = 'paid' ORDER BY created_at DESC LIMIT 1",
            PAYMENT_INTENT_COLS
        ),
        &[&order_id],
    )
}

/// Compare-and-swap the intent status forward. The WHERE clause re-checks
/// the current status so a concurrent writer loses cleanly instead of
/// overwriting a transition it never saw.
///
/// Returns true if this call performed the transition.
pub fn advance_intent_status(
    conn: &Connection,
    id: &str,
    from: IntentStatus,
    to: IntentStatus,
    capture_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_intents
         SET status = ?1, last_transition_at = ?2, capture_id = COALESCE(?3, capture_id)
         WHERE id = ?4 AND status = ?5",
        params![to.as_str(), now(), capture_id, id, from.as_str()],
    )?;
    Ok(affected > 0)
}

// ============ Webhook Events ============

/// Atomically record a webhook event, returning true if this is a new
/// event. Uses INSERT OR IGNORE against the UNIQUE(provider, event_id)
/// constraint: replays lose the insert and return false.
pub fn try_record_webhook_event(
    conn: &Connection,
    provider: PaymentProvider,
    event_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, provider, event_id, received_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id::generate(EntityType::WebhookEvent),
            provider.as_str(),
            event_id,
            now()
        ],
    )?;
    Ok(affected > 0)
}

/// Purge webhook dedupe rows beyond the retention period. Providers retry
/// deliveries for a few days at most, so old rows only cost space.
/// Returns the number of deleted records.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE received_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Wallet Ledger ============

/// Append one ledger entry. A unique-constraint violation on intent_id or
/// refund_request_id means something tried to credit the same settlement
/// or refund twice - that is a ledger invariant breach, not a retryable
/// database hiccup.
pub fn create_wallet_transaction(
    conn: &Connection,
    input: &CreateWalletTransaction,
) -> Result<WalletTransaction> {
    let txn_id = id::generate(EntityType::WalletTransaction);
    let ts = now();

    let inserted = conn.execute(
        "INSERT INTO wallet_transactions (id, account_id, kind, amount_cents, description, status, payment_method, intent_id, refund_request_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            txn_id,
            input.account_id,
            input.kind.as_str(),
            input.amount_cents,
            input.description,
            input.status.as_str(),
            input.payment_method.map(|m| m.as_str()),
            input.intent_id,
            input.refund_request_id,
            ts,
        ],
    );

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(AppError::LedgerInvariant(format!(
                "Duplicate ledger entry for intent={:?} refund_request={:?}",
                input.intent_id, input.refund_request_id
            )));
        }
        return Err(e.into());
    }

    Ok(WalletTransaction {
        id: txn_id,
        account_id: input.account_id.clone(),
        kind: input.kind,
        amount_cents: input.amount_cents,
        description: input.description.clone(),
        status: input.status,
        payment_method: input.payment_method,
        intent_id: input.intent_id.clone(),
        refund_request_id: input.refund_request_id.clone(),
        created_at: ts,
        deletable: WalletTransaction::is_deletable(input.status, input.payment_method),
    })
}

pub fn get_wallet_transaction(conn: &Connection, id: &str) -> Result<Option<WalletTransaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM wallet_transactions WHERE id = ?1",
            WALLET_TRANSACTION_COLS
        ),
        &[&id],
    )
}

pub fn list_wallet_transactions(conn: &Connection, account_id: &str) -> Result<Vec<WalletTransaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM wallet_transactions WHERE account_id = ?1 ORDER BY created_at DESC, id DESC",
            WALLET_TRANSACTION_COLS
        ),
        &[&account_id],
    )
}

/// Spendable balance: the fold over completed rows, recomputed from the
/// transaction set on every call. No cached total exists to drift.
pub fn wallet_balance(conn: &Connection, account_id: &str) -> Result<i64> {
    let balance = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN kind IN ('credit', 'refund') THEN amount_cents ELSE -amount_cents END), 0)
         FROM wallet_transactions
         WHERE account_id = ?1 AND status = 'completed'",
        params![account_id],
        |row| row.get(0),
    )?;
    Ok(balance)
}

/// One-shot settle of a pending entry to completed or failed. The CAS on
/// status = 'pending' makes a second settle attempt a conflict, never a
/// silent overwrite.
pub fn settle_wallet_transaction(
    conn: &Connection,
    id: &str,
    final_status: TransactionStatus,
) -> Result<WalletTransaction> {
    if final_status == TransactionStatus::Pending {
        return Err(AppError::BadRequest(
            "Transactions can only be settled to completed or failed".into(),
        ));
    }

    let affected = conn.execute(
        "UPDATE wallet_transactions SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![final_status.as_str(), id],
    )?;

    if affected == 0 {
        return match get_wallet_transaction(conn, id)? {
            None => Err(AppError::NotFound(format!("Transaction not found: {}", id))),
            Some(txn) => Err(AppError::Conflict(format!(
                "Transaction {} is already {}",
                id,
                txn.status.as_str()
            ))),
        };
    }

    get_wallet_transaction(conn, id)?
        .ok_or_else(|| AppError::Internal("Transaction vanished after settle".into()))
}

/// Delete a ledger entry. Permitted only for pending bank transfers -
/// everything else is part of the immutable history. The WHERE clause
/// re-checks deletability so a concurrent settle wins over the delete.
pub fn delete_wallet_transaction(conn: &Connection, id: &str) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM wallet_transactions
         WHERE id = ?1 AND status = 'pending' AND payment_method = 'bank_transfer'",
        params![id],
    )?;

    if affected == 0 {
        return match get_wallet_transaction(conn, id)? {
            None => Err(AppError::NotFound(format!("Transaction not found: {}", id))),
            Some(_) => Err(AppError::Forbidden(
                "This transaction cannot be deleted".into(),
            )),
        };
    }
    Ok(())
}

// ============ Refund Requests ============

/// Create a refund request. The partial unique index on pending order IDs
/// makes the at-most-one-pending rule atomic: a concurrent duplicate loses
/// the insert and surfaces as a conflict.
pub fn create_refund_request(conn: &Connection, input: &CreateRefundRequest) -> Result<RefundRequest> {
    let request_id = id::generate(EntityType::RefundRequest);
    let ts = now();

    let inserted = conn.execute(
        "INSERT INTO refund_requests (id, account_id, order_id, amount_cents, reason, status, request_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            request_id,
            input.account_id,
            input.order_id,
            input.amount_cents,
            input.reason,
            RefundStatus::Pending.as_str(),
            ts,
        ],
    );

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(AppError::Conflict(
                "A pending refund request already exists for this order".into(),
            ));
        }
        return Err(e.into());
    }

    Ok(RefundRequest {
        id: request_id,
        account_id: input.account_id.clone(),
        order_id: input.order_id.clone(),
        amount_cents: input.amount_cents,
        reason: input.reason.clone(),
        status: RefundStatus::Pending,
        request_date: ts,
        processed_date: None,
        processed_by: None,
        admin_notes: None,
    })
}

pub fn get_refund_request(conn: &Connection, id: &str) -> Result<Option<RefundRequest>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM refund_requests WHERE id = ?1",
            REFUND_REQUEST_COLS
        ),
        &[&id],
    )
}

pub fn list_refund_requests(conn: &Connection, account_id: &str) -> Result<Vec<RefundRequest>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM refund_requests WHERE account_id = ?1 ORDER BY request_date DESC, id DESC",
            REFUND_REQUEST_COLS
        ),
        &[&account_id],
    )
}

/// Decide a pending refund request ATOMICALLY: the status CAS and (on
/// approval) the single refund ledger credit happen in one database
/// transaction. A second decision attempt loses the CAS and gets a
/// conflict; the request is immutable afterwards.
///
/// Returns the processed request and the credit appended on approval.
pub fn decide_refund_request(
    conn: &mut Connection,
    id: &str,
    decision: RefundDecision,
    admin_notes: Option<&str>,
    processed_by: Option<&str>,
) -> Result<(RefundRequest, Option<WalletTransaction>)> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let request = get_refund_request(&tx, id)?
        .ok_or_else(|| AppError::NotFound(format!("Refund request not found: {}", id)))?;

    let new_status = match decision {
        RefundDecision::Approved => RefundStatus::Approved,
        RefundDecision::Rejected => RefundStatus::Rejected,
    };

    let claimed = tx.execute(
        "UPDATE refund_requests
         SET status = ?1, processed_date = ?2, processed_by = ?3, admin_notes = ?4
         WHERE id = ?5 AND status = 'pending'",
        params![new_status.as_str(), now(), processed_by, admin_notes, id],
    )?;

    if claimed == 0 {
        return Err(AppError::Conflict(format!(
            "Refund request {} was already processed",
            id
        )));
    }

    let credit = if decision == RefundDecision::Approved {
        Some(create_wallet_transaction(
            &tx,
            &CreateWalletTransaction {
                account_id: request.account_id.clone(),
                kind: TransactionKind::Refund,
                amount_cents: request.amount_cents,
                description: format!("Refund for order {}", request.order_id),
                status: TransactionStatus::Completed,
                payment_method: None,
                intent_id: None,
                refund_request_id: Some(request.id.clone()),
            },
        )?)
    } else {
        None
    };

    tx.commit()?;

    let processed = get_refund_request(conn, id)?
        .ok_or_else(|| AppError::Internal("Refund request vanished after decision".into()))?;

    Ok((processed, credit))
}

/// Cancel a pending request (requester-initiated). Processed requests are
/// immutable; the CAS makes cancellation of one a forbidden no-op.
pub fn cancel_refund_request(conn: &Connection, id: &str, account_id: &str) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM refund_requests WHERE id = ?1 AND account_id = ?2 AND status = 'pending'",
        params![id, account_id],
    )?;

    if affected == 0 {
        return match get_refund_request(conn, id)? {
            None => Err(AppError::NotFound(format!(
                "Refund request not found: {}",
                id
            ))),
            Some(r) if r.account_id != account_id => Err(AppError::NotFound(format!(
                "Refund request not found: {}",
                id
            ))),
            Some(_) => Err(AppError::Forbidden(
                "Cannot cancel a processed refund request".into(),
            )),
        };
    }
    Ok(())
}
