//! Common test utilities for credit-core integration tests.

use std::sync::Once;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use credit_core::clock::FixedClock;
use credit_core::config::CreditConfig;
use credit_core::engine::CreditEngine;
use credit_core::models::{Account, CreateAccount, CreateOrder, NewLineItem, Order, RiskCategory};
use credit_core::services::MemoryStore;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,credit_core=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Engine over the in-memory store with a settable clock.
pub fn test_engine(today: NaiveDate) -> (CreditEngine<MemoryStore, FixedClock>, FixedClock) {
    init_tracing();
    let clock = FixedClock::new(today);
    let engine = CreditEngine::new(MemoryStore::new(), clock.clone(), &CreditConfig::default());
    (engine, clock)
}

pub async fn verified_account(
    engine: &CreditEngine<MemoryStore, FixedClock>,
    name: &str,
    credit_limit: &str,
) -> Account {
    engine
        .create_account(CreateAccount {
            name: name.to_string(),
            verified: true,
            credit_limit: dec(credit_limit),
            risk_category: RiskCategory::Medium,
        })
        .await
        .expect("Failed to create account")
}

/// One line item whose total equals the given amount.
pub fn single_item(amount: &str) -> Vec<NewLineItem> {
    vec![NewLineItem {
        description: "Wholesale stock".to_string(),
        quantity: 1,
        unit_price: dec(amount),
    }]
}

/// Place an order for the given amount with the given installment count.
pub async fn place_order(
    engine: &CreditEngine<MemoryStore, FixedClock>,
    account_id: Uuid,
    amount: &str,
    installment_count: i32,
) -> Order {
    engine
        .create_order(CreateOrder {
            account_id,
            counterparty_id: Uuid::new_v4(),
            line_items: single_item(amount),
            installment_count: Some(installment_count),
            notes: None,
        })
        .await
        .expect("Failed to place order")
}
