//! Per-account serializability: a balance commit built from stale
//! account state must fail with `ConcurrentModification`, while
//! operations on different accounts proceed independently.

mod common;

use chrono::Utc;
use common::{dec, jan, place_order, test_engine, verified_account};
use credit_core::engine::build_schedule;
use credit_core::error::CreditError;
use credit_core::models::Direction;
use credit_core::services::{CommitApproval, CreditStore, NewLedgerEntry};

#[tokio::test]
async fn stale_account_version_is_rejected() {
    let (engine, _clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Stale Version", "10000.00").await;
    let first = place_order(&engine, account.account_id, "3000.00", 4).await;
    let second = place_order(&engine, account.account_id, "2000.00", 4).await;

    // Both operations observe the same account state...
    let observed = engine.get_account(account.account_id).await.unwrap();

    // ...the first commits and bumps the version...
    engine.approve_order(first.order_id).await.unwrap();

    // ...so the second's commit detects the lost update.
    let schedule =
        build_schedule(second.total_amount, second.installment_count, second.order_date).unwrap();
    let err = engine
        .store()
        .commit_approval(CommitApproval {
            order_id: second.order_id,
            expected_account_version: observed.version,
            approval_date: jan(1),
            schedule,
            entry: NewLedgerEntry {
                account_id: account.account_id,
                direction: Direction::Credit,
                amount: second.total_amount,
                order_id: Some(second.order_id),
                installment_id: None,
                description: format!("Credit order {} approved", second.order_number),
                balance_after: observed.outstanding_balance + second.total_amount,
                entry_date: jan(1),
                posted_utc: Utc::now(),
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::ConcurrentModification));

    // The rejected commit applied nothing.
    let order = engine.get_order(second.order_id).await.unwrap();
    assert_eq!(order.status, "pending");
    assert!(engine
        .store()
        .list_installments(second.order_id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        engine.available_credit(account.account_id).await.unwrap(),
        dec("7000.00")
    );

    // A retry from fresh state succeeds.
    engine.approve_order(second.order_id).await.unwrap();
    assert_eq!(
        engine.available_credit(account.account_id).await.unwrap(),
        dec("5000.00")
    );
}

#[tokio::test]
async fn distinct_accounts_do_not_contend() {
    let (engine, _clock) = test_engine(jan(1));
    let left = verified_account(&engine, "Left Shop", "5000.00").await;
    let right = verified_account(&engine, "Right Shop", "5000.00").await;
    let left_order = place_order(&engine, left.account_id, "1000.00", 4).await;
    let right_order = place_order(&engine, right.account_id, "2000.00", 4).await;

    let (left_result, right_result) = tokio::join!(
        engine.approve_order(left_order.order_id),
        engine.approve_order(right_order.order_id),
    );
    left_result.unwrap();
    right_result.unwrap();

    assert_eq!(
        engine.available_credit(left.account_id).await.unwrap(),
        dec("4000.00")
    );
    assert_eq!(
        engine.available_credit(right.account_id).await.unwrap(),
        dec("3000.00")
    );
}

#[tokio::test]
async fn racing_approvals_on_one_account_stay_consistent() {
    let (engine, _clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Race", "10000.00").await;
    let first = place_order(&engine, account.account_id, "3000.00", 4).await;
    let second = place_order(&engine, account.account_id, "2000.00", 4).await;

    // Whichever interleaving occurs, a loser surfaces as
    // ConcurrentModification and a retry from fresh state converges.
    let (r1, r2) = tokio::join!(
        engine.approve_order(first.order_id),
        engine.approve_order(second.order_id),
    );
    if let Err(e) = r1 {
        assert!(matches!(e, CreditError::ConcurrentModification));
        engine.approve_order(first.order_id).await.unwrap();
    }
    if let Err(e) = r2 {
        assert!(matches!(e, CreditError::ConcurrentModification));
        engine.approve_order(second.order_id).await.unwrap();
    }

    assert_eq!(
        engine.available_credit(account.account_id).await.unwrap(),
        dec("5000.00")
    );
    let entries = engine.store().list_entries(account.account_id).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn profile_change_between_read_and_commit_is_detected() {
    let (engine, _clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Limit Change", "10000.00").await;
    let order = place_order(&engine, account.account_id, "3000.00", 4).await;

    let observed = engine.get_account(account.account_id).await.unwrap();

    // Account management lowers the limit after the read; the version
    // bump invalidates the in-flight commit.
    engine
        .set_credit_limit(account.account_id, dec("1000.00"))
        .await
        .unwrap();

    let schedule =
        build_schedule(order.total_amount, order.installment_count, order.order_date).unwrap();
    let err = engine
        .store()
        .commit_approval(CommitApproval {
            order_id: order.order_id,
            expected_account_version: observed.version,
            approval_date: jan(1),
            schedule,
            entry: NewLedgerEntry {
                account_id: account.account_id,
                direction: Direction::Credit,
                amount: order.total_amount,
                order_id: Some(order.order_id),
                installment_id: None,
                description: format!("Credit order {} approved", order.order_number),
                balance_after: observed.outstanding_balance + order.total_amount,
                entry_date: jan(1),
                posted_utc: Utc::now(),
            },
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::ConcurrentModification));
}
