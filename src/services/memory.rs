//! In-memory credit store.
//!
//! Same transition semantics as the PostgreSQL store, backed by dashmap
//! tables. Balance-touching commits serialize on a per-account mutex and
//! re-check the account version under the lock, so lost updates surface
//! as `ConcurrentModification` exactly as they do against the database.
//! Used by the integration tests and by embedding callers that bring
//! their own persistence.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::CreditError;
use crate::models::{
    Account, CreateAccount, Installment, LedgerEntry, LineItem, Order, OrderStatus, RiskCategory,
};
use crate::services::store::{
    CommitApproval, CommitCancellation, CommitPayment, CreditStore, NewLedgerEntry, NewOrder,
    PaymentOutcome,
};

#[derive(Default)]
pub struct MemoryStore {
    accounts: DashMap<Uuid, Account>,
    orders: DashMap<Uuid, Order>,
    line_items: DashMap<Uuid, Vec<LineItem>>,
    installments: DashMap<Uuid, Installment>,
    entries: StdMutex<Vec<LedgerEntry>>,
    order_numbers: DashMap<NaiveDate, u32>,
    account_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn account_lock(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn push_entry(&self, input: NewLedgerEntry) -> LedgerEntry {
        let entry = LedgerEntry {
            entry_id: Uuid::new_v4(),
            account_id: input.account_id,
            direction: input.direction.as_str().to_string(),
            amount: input.amount,
            order_id: input.order_id,
            installment_id: input.installment_id,
            description: input.description,
            balance_after: input.balance_after,
            entry_date: input.entry_date,
            posted_utc: input.posted_utc,
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry.clone());
        entry
    }

    fn mutate_account<F>(&self, account_id: Uuid, f: F) -> Result<Account, CreditError>
    where
        F: FnOnce(&mut Account),
    {
        let mut account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))?;
        f(&mut account);
        account.version += 1;
        account.updated_utc = Utc::now();
        Ok(account.clone())
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn insert_account(&self, input: CreateAccount) -> Result<Account, CreditError> {
        let now = Utc::now();
        let account = Account {
            account_id: Uuid::new_v4(),
            name: input.name,
            verified: input.verified,
            credit_limit: input.credit_limit,
            outstanding_balance: Decimal::ZERO,
            risk_category: input.risk_category.as_str().to_string(),
            version: 0,
            created_utc: now,
            updated_utc: now,
        };
        self.accounts.insert(account.account_id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, CreditError> {
        Ok(self.accounts.get(&account_id).map(|a| a.clone()))
    }

    async fn set_verified(
        &self,
        account_id: Uuid,
        verified: bool,
    ) -> Result<Account, CreditError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;
        self.mutate_account(account_id, |a| a.verified = verified)
    }

    async fn set_credit_limit(
        &self,
        account_id: Uuid,
        credit_limit: Decimal,
    ) -> Result<Account, CreditError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;
        self.mutate_account(account_id, |a| a.credit_limit = credit_limit)
    }

    async fn set_risk_category(
        &self,
        account_id: Uuid,
        risk_category: RiskCategory,
    ) -> Result<Account, CreditError> {
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;
        self.mutate_account(account_id, |a| {
            a.risk_category = risk_category.as_str().to_string()
        })
    }

    async fn next_order_number(&self, date: NaiveDate) -> Result<String, CreditError> {
        let seq = {
            let mut counter = self.order_numbers.entry(date).or_insert(0);
            *counter += 1;
            *counter
        };
        Ok(format!("ORD-{}-{:04}", date.format("%Y%m%d"), seq))
    }

    async fn insert_order(&self, input: NewOrder) -> Result<Order, CreditError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = Order {
            order_id,
            order_number: input.order_number,
            account_id: input.account_id,
            counterparty_id: input.counterparty_id,
            total_amount: input.total_amount,
            installment_count: input.installment_count,
            status: OrderStatus::Pending.as_str().to_string(),
            order_date: input.order_date,
            due_date: input.due_date,
            approval_date: None,
            delivery_date: None,
            notes: input.notes,
            created_utc: now,
            updated_utc: now,
        };
        let items: Vec<LineItem> = input
            .line_items
            .into_iter()
            .map(|item| LineItem {
                line_item_id: Uuid::new_v4(),
                order_id,
                line_total: item.line_total(),
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                created_utc: now,
            })
            .collect();
        self.orders.insert(order_id, order.clone());
        self.line_items.insert(order_id, items);
        debug!(order_number = %order.order_number, "Order stored");
        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CreditError> {
        Ok(self.orders.get(&order_id).map(|o| o.clone()))
    }

    async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, CreditError> {
        Ok(self
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .map(|o| o.clone()))
    }

    async fn list_orders_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Order>, CreditError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.account_id == account_id)
            .map(|o| o.clone())
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn list_line_items(&self, order_id: Uuid) -> Result<Vec<LineItem>, CreditError> {
        Ok(self
            .line_items
            .get(&order_id)
            .map(|items| items.clone())
            .unwrap_or_default())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<Order, CreditError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| CreditError::NotFound(format!("order {}", order_id)))?;
        if order.status != from.as_str() {
            return Err(CreditError::ConcurrentModification);
        }
        order.status = to.as_str().to_string();
        if let Some(date) = delivery_date {
            order.delivery_date = Some(date);
        }
        order.updated_utc = Utc::now();
        Ok(order.clone())
    }

    async fn get_installment(
        &self,
        installment_id: Uuid,
    ) -> Result<Option<Installment>, CreditError> {
        Ok(self.installments.get(&installment_id).map(|i| i.clone()))
    }

    async fn list_installments(&self, order_id: Uuid) -> Result<Vec<Installment>, CreditError> {
        let mut installments: Vec<Installment> = self
            .installments
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| i.clone())
            .collect();
        installments.sort_by_key(|i| i.installment_number);
        Ok(installments)
    }

    async fn commit_approval(
        &self,
        commit: CommitApproval,
    ) -> Result<(Order, Vec<Installment>), CreditError> {
        let account_id = commit.entry.account_id;
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        {
            let account = self
                .accounts
                .get(&account_id)
                .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))?;
            if account.version != commit.expected_account_version {
                return Err(CreditError::ConcurrentModification);
            }
        }

        let order = {
            let mut order = self
                .orders
                .get_mut(&commit.order_id)
                .ok_or_else(|| CreditError::NotFound(format!("order {}", commit.order_id)))?;
            if order.status != OrderStatus::Pending.as_str() {
                return Err(CreditError::ConcurrentModification);
            }
            order.status = OrderStatus::Approved.as_str().to_string();
            order.approval_date = Some(commit.approval_date);
            order.updated_utc = Utc::now();
            order.clone()
        };

        let now = Utc::now();
        let mut installments = Vec::with_capacity(commit.schedule.len());
        for scheduled in &commit.schedule {
            let installment = Installment {
                installment_id: Uuid::new_v4(),
                order_id: commit.order_id,
                installment_number: scheduled.installment_number,
                amount: scheduled.amount,
                due_date: scheduled.due_date,
                is_paid: false,
                paid_date: None,
                amount_paid: Decimal::ZERO,
                is_late: false,
                payment_reference: None,
                created_utc: now,
                updated_utc: now,
            };
            self.installments
                .insert(installment.installment_id, installment.clone());
            installments.push(installment);
        }

        let amount = commit.entry.amount;
        self.mutate_account(account_id, |a| {
            a.outstanding_balance += amount;
        })?;
        self.push_entry(commit.entry);

        Ok((order, installments))
    }

    async fn commit_payment(
        &self,
        commit: CommitPayment,
    ) -> Result<PaymentOutcome, CreditError> {
        let account_id = commit.entry.account_id;
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        {
            let account = self
                .accounts
                .get(&account_id)
                .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))?;
            if account.version != commit.expected_account_version {
                return Err(CreditError::ConcurrentModification);
            }
        }

        let (installment, order_id) = {
            let mut installment =
                self.installments
                    .get_mut(&commit.installment_id)
                    .ok_or_else(|| {
                        CreditError::NotFound(format!("installment {}", commit.installment_id))
                    })?;
            if installment.is_paid {
                return Err(CreditError::InstallmentAlreadyPaid {
                    installment_number: installment.installment_number,
                });
            }
            installment.is_paid = true;
            installment.paid_date = Some(commit.paid_date);
            installment.amount_paid = commit.amount_paid;
            installment.is_late = commit.is_late;
            installment.payment_reference = commit.payment_reference.clone();
            installment.updated_utc = Utc::now();
            (installment.clone(), installment.order_id)
        };

        let amount = commit.entry.amount;
        self.mutate_account(account_id, |a| {
            a.outstanding_balance = (a.outstanding_balance - amount).max(Decimal::ZERO);
        })?;
        let entry = self.push_entry(commit.entry);

        let all_paid = self
            .installments
            .iter()
            .filter(|i| i.order_id == order_id)
            .all(|i| i.is_paid);
        let mut order_completed = false;
        if all_paid {
            let mut order = self
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| CreditError::NotFound(format!("order {}", order_id)))?;
            let completable = OrderStatus::parse(&order.status)
                .map(|s| s.can_transition_to(OrderStatus::Completed))
                .unwrap_or(false);
            if completable {
                order.status = OrderStatus::Completed.as_str().to_string();
                order.updated_utc = Utc::now();
                order_completed = true;
            }
        }

        Ok(PaymentOutcome {
            installment,
            entry,
            order_completed,
        })
    }

    async fn commit_cancellation(
        &self,
        commit: CommitCancellation,
    ) -> Result<Order, CreditError> {
        let account_id = commit.entry.account_id;
        let lock = self.account_lock(account_id);
        let _guard = lock.lock().await;

        {
            let account = self
                .accounts
                .get(&account_id)
                .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))?;
            if account.version != commit.expected_account_version {
                return Err(CreditError::ConcurrentModification);
            }
        }

        let order = {
            let mut order = self
                .orders
                .get_mut(&commit.order_id)
                .ok_or_else(|| CreditError::NotFound(format!("order {}", commit.order_id)))?;
            if order.status != OrderStatus::Approved.as_str() {
                return Err(CreditError::ConcurrentModification);
            }
            order.status = OrderStatus::Cancelled.as_str().to_string();
            order.updated_utc = Utc::now();
            order.clone()
        };

        let amount = commit.entry.amount;
        self.mutate_account(account_id, |a| {
            a.outstanding_balance = (a.outstanding_balance - amount).max(Decimal::ZERO);
        })?;
        self.push_entry(commit.entry);

        Ok(order)
    }

    async fn list_entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CreditError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }
}
