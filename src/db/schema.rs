use rusqlite::Connection;

/// Initialize the database schema.
///
/// WAL mode suits the workload: the ledger and webhook-event tables are
/// append-only, and settlement writes are short transactions.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;

        -- Payment intents (one row per gateway payment attempt)
        -- Primary key is the provider-issued ID. Rows are never deleted;
        -- status is advanced forward-only by the settlement machine.
        CREATE TABLE IF NOT EXISTS payment_intents (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL CHECK (provider IN ('paypal', 'mollie')),
            account_id TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            currency TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('created', 'pending', 'paid', 'failed', 'canceled', 'expired', 'refunded')),
            capture_id TEXT,
            checkout_url TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_transition_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payment_intents_correlation ON payment_intents(provider, correlation_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_payment_intents_account ON payment_intents(account_id);

        -- Webhook events (durable replay guard)
        -- The UNIQUE(provider, event_id) constraint IS the idempotency
        -- mechanism: processing is conditioned on winning this insert.
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            event_id TEXT NOT NULL,
            received_at INTEGER NOT NULL,
            UNIQUE(provider, event_id)
        );

        -- Wallet ledger (append-only)
        -- Balance is derived by folding completed rows; the only mutation
        -- ever applied is the one-shot pending -> completed|failed settle.
        -- The partial unique indexes enforce at-most-once credit per
        -- settlement and per approved refund request.
        CREATE TABLE IF NOT EXISTS wallet_transactions (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('credit', 'debit', 'refund')),
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
            payment_method TEXT CHECK (payment_method IS NULL OR payment_method IN ('bank_transfer', 'card', 'paypal', 'mollie')),
            intent_id TEXT REFERENCES payment_intents(id),
            refund_request_id TEXT REFERENCES refund_requests(id),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_wallet_txn_account_time ON wallet_transactions(account_id, created_at DESC);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_wallet_txn_intent ON wallet_transactions(intent_id) WHERE intent_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_wallet_txn_refund_request ON wallet_transactions(refund_request_id) WHERE refund_request_id IS NOT NULL;

        -- Refund requests
        -- The partial unique index allows exactly one pending request per
        -- order; decided rows are immutable.
        CREATE TABLE IF NOT EXISTS refund_requests (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            order_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            reason TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            request_date INTEGER NOT NULL,
            processed_date INTEGER,
            processed_by TEXT,
            admin_notes TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_refund_requests_pending_order ON refund_requests(order_id) WHERE status = 'pending';
        CREATE INDEX IF NOT EXISTS idx_refund_requests_account ON refund_requests(account_id, request_date DESC);
        "#,
    )?;
    Ok(())
}
