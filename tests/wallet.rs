//! Wallet ledger tests: balance derivation, one-shot settlement, and the
//! deletability rules for pending bank transfers.

#[path = "common/mod.rs"]
mod common;

use common::*;

// ============ Balance Derivation ============

#[test]
fn balance_is_fold_over_completed_entries() {
    let conn = setup_test_db();

    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        10_000,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );
    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Debit,
        2_500,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );
    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Refund,
        500,
        TransactionStatus::Completed,
        None,
    );

    let balance = queries::wallet_balance(&conn, "acct_1").expect("balance query failed");
    assert_eq!(balance, 10_000 - 2_500 + 500);
}

#[test]
fn pending_and_failed_entries_never_affect_balance() {
    let conn = setup_test_db();

    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        10_000,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );
    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        5_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );
    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Debit,
        9_999,
        TransactionStatus::Failed,
        Some(PaymentMethod::Card),
    );

    assert_eq!(queries::wallet_balance(&conn, "acct_1").unwrap(), 10_000);
}

#[test]
fn balance_is_scoped_per_account() {
    let conn = setup_test_db();

    append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        10_000,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );
    append_transaction(
        &conn,
        "acct_2",
        TransactionKind::Credit,
        7_777,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );

    assert_eq!(queries::wallet_balance(&conn, "acct_1").unwrap(), 10_000);
    assert_eq!(queries::wallet_balance(&conn, "acct_2").unwrap(), 7_777);
    assert_eq!(queries::wallet_balance(&conn, "acct_3").unwrap(), 0);
}

#[test]
fn balance_recomputes_after_every_mutation() {
    let conn = setup_test_db();

    let pending = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        4_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );
    assert_eq!(queries::wallet_balance(&conn, "acct_1").unwrap(), 0);

    queries::settle_wallet_transaction(&conn, &pending.id, TransactionStatus::Completed)
        .expect("settle should succeed");
    assert_eq!(queries::wallet_balance(&conn, "acct_1").unwrap(), 4_000);

    let deletable = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        1_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );
    queries::delete_wallet_transaction(&conn, &deletable.id).expect("delete should succeed");
    assert_eq!(queries::wallet_balance(&conn, "acct_1").unwrap(), 4_000);
}

// ============ One-Shot Settlement ============

#[test]
fn settle_transitions_pending_exactly_once() {
    let conn = setup_test_db();

    let txn = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        5_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );

    let settled = queries::settle_wallet_transaction(&conn, &txn.id, TransactionStatus::Completed)
        .expect("first settle should succeed");
    assert_eq!(settled.status, TransactionStatus::Completed);
    assert!(!settled.deletable, "settled entry is no longer deletable");

    // Second settle attempt must be rejected, not silently re-applied
    let err = queries::settle_wallet_transaction(&conn, &txn.id, TransactionStatus::Failed)
        .expect_err("second settle should fail");
    assert!(matches!(err, tally::error::AppError::Conflict(_)));

    // And the original outcome is untouched
    let reread = queries::get_wallet_transaction(&conn, &txn.id)
        .unwrap()
        .unwrap();
    assert_eq!(reread.status, TransactionStatus::Completed);
}

#[test]
fn settle_rejects_pending_as_target() {
    let conn = setup_test_db();

    let txn = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        5_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );

    let err = queries::settle_wallet_transaction(&conn, &txn.id, TransactionStatus::Pending)
        .expect_err("settling to pending makes no sense");
    assert!(matches!(err, tally::error::AppError::BadRequest(_)));
}

#[test]
fn settle_unknown_transaction_is_not_found() {
    let conn = setup_test_db();
    let err = queries::settle_wallet_transaction(
        &conn,
        "ty_txn_00000000000000000000000000000000",
        TransactionStatus::Completed,
    )
    .expect_err("unknown id should fail");
    assert!(matches!(err, tally::error::AppError::NotFound(_)));
}

// ============ Deletability ============

#[test]
fn pending_bank_transfer_is_deletable() {
    let conn = setup_test_db();

    let txn = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        5_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );
    assert!(txn.deletable);

    queries::delete_wallet_transaction(&conn, &txn.id).expect("delete should succeed");
    assert!(queries::get_wallet_transaction(&conn, &txn.id)
        .unwrap()
        .is_none());
}

#[test]
fn gateway_transactions_are_never_deletable() {
    let conn = setup_test_db();

    for method in [PaymentMethod::Card, PaymentMethod::Paypal, PaymentMethod::Mollie] {
        let txn = append_transaction(
            &conn,
            "acct_1",
            TransactionKind::Credit,
            5_000,
            TransactionStatus::Completed,
            Some(method),
        );
        assert!(!txn.deletable);

        let err = queries::delete_wallet_transaction(&conn, &txn.id)
            .expect_err("gateway entry must not be deletable");
        assert!(matches!(err, tally::error::AppError::Forbidden(_)));
    }
}

#[test]
fn confirmed_bank_transfer_is_no_longer_deletable() {
    let conn = setup_test_db();

    let txn = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        5_000,
        TransactionStatus::Pending,
        Some(PaymentMethod::BankTransfer),
    );
    queries::settle_wallet_transaction(&conn, &txn.id, TransactionStatus::Completed).unwrap();

    let err = queries::delete_wallet_transaction(&conn, &txn.id)
        .expect_err("confirmed transfer must not be deletable");
    assert!(matches!(err, tally::error::AppError::Forbidden(_)));
}

#[test]
fn transactions_list_newest_first() {
    let conn = setup_test_db();

    let first = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Credit,
        100,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );
    let second = append_transaction(
        &conn,
        "acct_1",
        TransactionKind::Debit,
        50,
        TransactionStatus::Completed,
        Some(PaymentMethod::Card),
    );

    let listed = queries::list_wallet_transactions(&conn, "acct_1").unwrap();
    assert_eq!(listed.len(), 2);
    // Same-second inserts fall back to id ordering; both entries are present
    let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
    assert!(ids.contains(&first.id.as_str()));
    assert!(ids.contains(&second.id.as_str()));
}
