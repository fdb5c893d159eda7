//! Persistence seam for the credit engine.
//!
//! The engine validates transitions and computes their effects; a
//! `CreditStore` applies each effect bundle atomically, scoped to one
//! account. Balance-touching commits carry the account version observed
//! at read time and must fail with `ConcurrentModification` when the
//! stored version no longer matches.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::schedule::ScheduledInstallment;
use crate::error::CreditError;
use crate::models::{
    Account, CreateAccount, Direction, Installment, LedgerEntry, LineItem, NewLineItem, Order,
    OrderStatus, RiskCategory,
};

/// Input for persisting a pending order with its line items.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub account_id: Uuid,
    pub counterparty_id: Uuid,
    pub total_amount: Decimal,
    pub installment_count: i32,
    pub order_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub line_items: Vec<NewLineItem>,
}

/// Input for appending one ledger entry, with the balance snapshot the
/// engine computed for it.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: Uuid,
    pub direction: Direction,
    pub amount: Decimal,
    pub order_id: Option<Uuid>,
    pub installment_id: Option<Uuid>,
    pub description: String,
    pub balance_after: Decimal,
    pub entry_date: NaiveDate,
    pub posted_utc: DateTime<Utc>,
}

/// Atomic effects of approving an order: status flip, installment batch,
/// credit-extension entry, balance increase.
#[derive(Debug, Clone)]
pub struct CommitApproval {
    pub order_id: Uuid,
    pub expected_account_version: i64,
    pub approval_date: NaiveDate,
    pub schedule: Vec<ScheduledInstallment>,
    pub entry: NewLedgerEntry,
}

/// Atomic effects of recording a payment: installment settlement, debit
/// entry, balance decrease (floored at zero), and auto-completion when
/// the last installment settles.
#[derive(Debug, Clone)]
pub struct CommitPayment {
    pub installment_id: Uuid,
    pub expected_account_version: i64,
    pub paid_date: NaiveDate,
    pub amount_paid: Decimal,
    pub is_late: bool,
    pub payment_reference: Option<String>,
    pub entry: NewLedgerEntry,
}

/// Atomic effects of cancelling an approved order: status flip,
/// compensating debit entry, balance restoration.
#[derive(Debug, Clone)]
pub struct CommitCancellation {
    pub order_id: Uuid,
    pub expected_account_version: i64,
    pub entry: NewLedgerEntry,
}

/// Result of a committed payment.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub installment: Installment,
    pub entry: LedgerEntry,
    /// True when this payment settled the order's last unpaid installment
    /// and the order moved to `completed`.
    pub order_completed: bool,
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    // Accounts
    async fn insert_account(&self, input: CreateAccount) -> Result<Account, CreditError>;
    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, CreditError>;
    /// Owned by the account-management collaborator; bumps the version.
    async fn set_verified(&self, account_id: Uuid, verified: bool)
        -> Result<Account, CreditError>;
    /// Owned by the account-management collaborator; bumps the version.
    /// Lowering the limit under existing debt is allowed.
    async fn set_credit_limit(
        &self,
        account_id: Uuid,
        credit_limit: Decimal,
    ) -> Result<Account, CreditError>;
    async fn set_risk_category(
        &self,
        account_id: Uuid,
        risk_category: RiskCategory,
    ) -> Result<Account, CreditError>;

    // Orders
    /// Allocate the next `ORD-YYYYMMDD-NNNN` number for the given day.
    async fn next_order_number(&self, date: NaiveDate) -> Result<String, CreditError>;
    async fn insert_order(&self, input: NewOrder) -> Result<Order, CreditError>;
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CreditError>;
    async fn get_order_by_number(&self, order_number: &str)
        -> Result<Option<Order>, CreditError>;
    /// Most recent first.
    async fn list_orders_for_account(&self, account_id: Uuid)
        -> Result<Vec<Order>, CreditError>;
    async fn list_line_items(&self, order_id: Uuid) -> Result<Vec<LineItem>, CreditError>;
    /// Status-only transition, guarded on the expected current status.
    /// Fails with `ConcurrentModification` when the order moved on since
    /// the caller read it.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<Order, CreditError>;

    // Installments
    async fn get_installment(
        &self,
        installment_id: Uuid,
    ) -> Result<Option<Installment>, CreditError>;
    /// Ordered by installment number.
    async fn list_installments(&self, order_id: Uuid) -> Result<Vec<Installment>, CreditError>;

    // Atomic transition commits
    async fn commit_approval(
        &self,
        commit: CommitApproval,
    ) -> Result<(Order, Vec<Installment>), CreditError>;
    async fn commit_payment(&self, commit: CommitPayment)
        -> Result<PaymentOutcome, CreditError>;
    async fn commit_cancellation(
        &self,
        commit: CommitCancellation,
    ) -> Result<Order, CreditError>;

    // Ledger
    /// All entries for an account, oldest first.
    async fn list_entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CreditError>;
}
