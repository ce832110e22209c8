//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_enum_opt<T: std::str::FromStr>(
    row: &Row,
    col: usize,
    col_name: &str,
) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(col)? {
        None => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                col,
                col_name.to_string(),
                rusqlite::types::Type::Text,
            )
        }),
    }
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PAYMENT_INTENT_COLS: &str = "id, provider, account_id, correlation_id, amount_cents, currency, description, status, capture_id, checkout_url, created_at, last_transition_at";

pub const WALLET_TRANSACTION_COLS: &str = "id, account_id, kind, amount_cents, description, status, payment_method, intent_id, refund_request_id, created_at";

pub const REFUND_REQUEST_COLS: &str = "id, account_id, order_id, amount_cents, reason, status, request_date, processed_date, processed_by, admin_notes";

impl FromRow for PaymentIntent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentIntent {
            id: row.get(0)?,
            provider: parse_enum(row, 1, "provider")?,
            account_id: row.get(2)?,
            correlation_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            description: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            capture_id: row.get(8)?,
            checkout_url: row.get(9)?,
            created_at: row.get(10)?,
            last_transition_at: row.get(11)?,
        })
    }
}

impl FromRow for WalletTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status = parse_enum(row, 5, "status")?;
        let payment_method = parse_enum_opt(row, 6, "payment_method")?;
        Ok(WalletTransaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            kind: parse_enum(row, 2, "kind")?,
            amount_cents: row.get(3)?,
            description: row.get(4)?,
            status,
            payment_method,
            intent_id: row.get(7)?,
            refund_request_id: row.get(8)?,
            created_at: row.get(9)?,
            deletable: WalletTransaction::is_deletable(status, payment_method),
        })
    }
}

impl FromRow for RefundRequest {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(RefundRequest {
            id: row.get(0)?,
            account_id: row.get(1)?,
            order_id: row.get(2)?,
            amount_cents: row.get(3)?,
            reason: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            request_date: row.get(6)?,
            processed_date: row.get(7)?,
            processed_by: row.get(8)?,
            admin_notes: row.get(9)?,
        })
    }
}
