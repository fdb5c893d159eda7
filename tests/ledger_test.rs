//! Ledger store integration tests: entry snapshots, the zero floor on
//! the outstanding balance, transaction history ordering and statements.

mod common;

use common::{dec, jan, place_order, test_engine, verified_account};
use credit_core::models::Direction;
use credit_core::services::CreditStore;

#[tokio::test]
async fn entries_carry_balance_snapshots() {
    let (engine, clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Snapshots", "10000.00").await;
    let order = place_order(&engine, account.account_id, "10000.00", 4).await;
    let (order, installments) = engine.approve_order(order.order_id).await.unwrap();

    clock.set_today(jan(8));
    engine
        .record_payment(installments[0].installment_id, dec("2500.00"), None)
        .await
        .unwrap();

    let entries = engine.store().list_entries(account.account_id).await.unwrap();
    assert_eq!(entries.len(), 2);

    let extension = &entries[0];
    assert_eq!(extension.parsed_direction(), Some(Direction::Credit));
    assert_eq!(extension.amount, dec("10000.00"));
    assert_eq!(extension.balance_after, dec("10000.00"));
    assert_eq!(extension.order_id, Some(order.order_id));
    assert_eq!(extension.installment_id, None);
    assert_eq!(
        extension.description,
        format!("Credit order {} approved", order.order_number)
    );
    assert_eq!(extension.signed_amount(), dec("10000.00"));

    let payment = &entries[1];
    assert_eq!(payment.parsed_direction(), Some(Direction::Debit));
    assert_eq!(payment.balance_after, dec("7500.00"));
    assert_eq!(payment.installment_id, Some(installments[0].installment_id));
    assert_eq!(
        payment.description,
        format!("EMI 1 payment for {}", order.order_number)
    );
    assert_eq!(payment.signed_amount(), dec("-2500.00"));
}

#[tokio::test]
async fn over_payment_floors_the_balance_at_zero() {
    let (engine, _clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Floor", "10000.00").await;
    let order = place_order(&engine, account.account_id, "1000.00", 1).await;
    let (_, installments) = engine.approve_order(order.order_id).await.unwrap();

    // Paying five times the outstanding amount never drives the balance
    // negative.
    let outcome = engine
        .record_payment(installments[0].installment_id, dec("5000.00"), None)
        .await
        .unwrap();
    assert_eq!(outcome.entry.balance_after, dec("0.00"));
    assert_eq!(outcome.installment.amount_paid, dec("5000.00"));

    let account = engine.get_account(account.account_id).await.unwrap();
    assert_eq!(account.outstanding_balance, dec("0.00"));
    assert!(account.outstanding_balance >= dec("0.00"));
}

#[tokio::test]
async fn balance_stays_non_negative_across_mixed_operations() {
    let (engine, clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Invariant", "20000.00").await;

    let first = place_order(&engine, account.account_id, "6000.00", 3).await;
    let (_, first_installments) = engine.approve_order(first.order_id).await.unwrap();
    let second = place_order(&engine, account.account_id, "4000.00", 2).await;
    engine.approve_order(second.order_id).await.unwrap();

    clock.set_today(jan(9));
    engine
        .record_payment(first_installments[0].installment_id, dec("3000.00"), None)
        .await
        .unwrap();
    engine
        .cancel_order(
            second.order_id,
            credit_core::engine::ActorPrivilege::Admin,
        )
        .await
        .unwrap();
    engine
        .record_payment(first_installments[1].installment_id, dec("2000.00"), None)
        .await
        .unwrap();

    for entry in engine.store().list_entries(account.account_id).await.unwrap() {
        assert!(entry.balance_after >= dec("0.00"));
    }
    let account = engine.get_account(account.account_id).await.unwrap();
    assert_eq!(account.outstanding_balance, dec("1000.00"));
}

#[tokio::test]
async fn transaction_history_is_most_recent_first() {
    let (engine, clock) = test_engine(jan(1));
    let account = verified_account(&engine, "History", "10000.00").await;
    let order = place_order(&engine, account.account_id, "2000.00", 2).await;
    let (_, installments) = engine.approve_order(order.order_id).await.unwrap();

    clock.set_today(jan(16));
    engine
        .record_payment(installments[0].installment_id, dec("1000.00"), None)
        .await
        .unwrap();

    let entries = engine.account_entries(account.account_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, "debit");
    assert_eq!(entries[1].direction, "credit");
}

#[tokio::test]
async fn statement_reports_opening_running_and_closing_balances() {
    let (engine, clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Statement", "10000.00").await;
    let order = place_order(&engine, account.account_id, "10000.00", 4).await;
    let (_, installments) = engine.approve_order(order.order_id).await.unwrap();

    clock.set_today(jan(8));
    engine
        .record_payment(installments[0].installment_id, dec("2500.00"), None)
        .await
        .unwrap();
    clock.set_today(jan(20));
    engine
        .record_payment(installments[1].installment_id, dec("2500.00"), None)
        .await
        .unwrap();

    // Window opening after the credit extension: it folds into the
    // opening balance.
    let statement = engine
        .account_statement(account.account_id, jan(5), jan(31))
        .await
        .unwrap();
    assert_eq!(statement.opening_balance, dec("10000.00"));
    assert_eq!(statement.lines.len(), 2);
    assert_eq!(statement.lines[0].running_balance, dec("7500.00"));
    assert_eq!(statement.lines[1].running_balance, dec("5000.00"));
    assert_eq!(statement.closing_balance, dec("5000.00"));

    // Full-month window sees all three entries from a zero opening.
    let statement = engine
        .account_statement(account.account_id, jan(1), jan(31))
        .await
        .unwrap();
    assert_eq!(statement.opening_balance, dec("0.00"));
    assert_eq!(statement.lines.len(), 3);
    assert_eq!(statement.closing_balance, dec("5000.00"));

    // Empty window before any activity.
    let statement = engine
        .account_statement(account.account_id, jan(2), jan(4))
        .await
        .unwrap();
    assert_eq!(statement.opening_balance, dec("10000.00"));
    assert!(statement.lines.is_empty());
    assert_eq!(statement.closing_balance, dec("10000.00"));
}

#[tokio::test]
async fn paid_and_pending_amounts_follow_the_schedule() {
    let (engine, _clock) = test_engine(jan(1));
    let account = verified_account(&engine, "Amounts", "10000.00").await;
    let order = place_order(&engine, account.account_id, "999.99", 4).await;
    let (order, installments) = engine.approve_order(order.order_id).await.unwrap();

    let amounts: Vec<_> = installments.iter().map(|i| i.amount).collect();
    assert_eq!(
        amounts,
        vec![dec("250.00"), dec("250.00"), dec("250.00"), dec("249.99")]
    );

    engine
        .record_payment(installments[0].installment_id, dec("250.00"), None)
        .await
        .unwrap();

    let installments = engine.store().list_installments(order.order_id).await.unwrap();
    assert_eq!(order.paid_amount(&installments), dec("250.00"));
    assert_eq!(order.pending_amount(&installments), dec("749.99"));
}
