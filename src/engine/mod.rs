//! Order state machine and credit lifecycle orchestration.
//!
//! The engine validates every requested transition against the closed
//! transition table, computes the transition's effects (installment
//! schedule, ledger entry with balance snapshot), and hands them to the
//! store as one atomic commit scoped to the affected account.

pub mod guard;
pub mod schedule;

pub use guard::check_credit;
pub use schedule::{build_schedule, ScheduledInstallment};

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::CreditConfig;
use crate::error::{CreditError, RejectReason};
use crate::models::{
    Account, CreateAccount, CreateOrder, Direction, Installment, LedgerEntry, LineItem, Order,
    OrderStatus, RiskCategory, Statement, StatementLine, CREDIT_PERIOD_DAYS,
};
use crate::services::metrics::{
    CREDIT_CHECKS_TOTAL, INSTALLMENTS_CREATED, ORDER_TRANSITIONS_TOTAL, PAYMENTS_TOTAL,
};
use crate::services::{
    CommitApproval, CommitCancellation, CommitPayment, CreditStore, NewLedgerEntry, NewOrder,
    PaymentOutcome,
};

/// Privilege of the actor requesting a transition. Approved orders can
/// only be cancelled with `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorPrivilege {
    Standard,
    Admin,
}

/// The credit lifecycle engine.
///
/// Generic over the persistence seam and the clock so callers can run it
/// against PostgreSQL in production and the in-memory store with a fixed
/// clock under test.
pub struct CreditEngine<S, C> {
    store: S,
    clock: C,
    default_installment_count: i32,
    grace_days: i64,
}

impl<S: CreditStore, C: Clock> CreditEngine<S, C> {
    pub fn new(store: S, clock: C, config: &CreditConfig) -> Self {
        Self {
            store,
            clock,
            default_installment_count: config.default_installment_count,
            grace_days: config.grace_days,
        }
    }

    /// Direct access to the underlying store, for queries the engine does
    /// not wrap.
    pub fn store(&self) -> &S {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Create an account with its ledger state initialised in the same
    /// call (zero outstanding balance, version zero).
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_account(&self, input: CreateAccount) -> Result<Account, CreditError> {
        let account = self.store.insert_account(input).await?;
        info!(account_id = %account.account_id, "Account created");
        Ok(account)
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<Account, CreditError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))
    }

    /// Reflect a verification decision made by the account-management
    /// collaborator.
    pub async fn set_verified(
        &self,
        account_id: Uuid,
        verified: bool,
    ) -> Result<Account, CreditError> {
        self.store.set_verified(account_id, verified).await
    }

    /// Reflect a credit limit set by the account-management collaborator.
    pub async fn set_credit_limit(
        &self,
        account_id: Uuid,
        credit_limit: Decimal,
    ) -> Result<Account, CreditError> {
        if credit_limit < Decimal::ZERO {
            return Err(CreditError::Precondition(format!(
                "credit limit must not be negative, got {}",
                credit_limit
            )));
        }
        self.store.set_credit_limit(account_id, credit_limit).await
    }

    /// Record an externally computed default probability as an advisory
    /// risk category.
    #[instrument(skip(self))]
    pub async fn record_risk_assessment(
        &self,
        account_id: Uuid,
        default_probability: f64,
    ) -> Result<Account, CreditError> {
        let category = RiskCategory::from_default_probability(default_probability);
        let account = self.store.set_risk_category(account_id, category).await?;
        info!(account_id = %account_id, risk_category = %category, "Risk category updated");
        Ok(account)
    }

    // -------------------------------------------------------------------------
    // Order lifecycle
    // -------------------------------------------------------------------------

    /// Place a credit order.
    ///
    /// The credit limit guard runs first; a rejected order is never
    /// persisted and no order number is consumed. Credit is not drawn
    /// here - the ledger is untouched until approval.
    #[instrument(skip(self, input), fields(account_id = %input.account_id))]
    pub async fn create_order(&self, input: CreateOrder) -> Result<Order, CreditError> {
        if input.line_items.is_empty() {
            return Err(CreditError::Precondition(
                "order must have at least one line item".to_string(),
            ));
        }
        for item in &input.line_items {
            if item.quantity < 1 {
                return Err(CreditError::Precondition(format!(
                    "line item quantity must be at least 1, got {}",
                    item.quantity
                )));
            }
            if item.unit_price <= Decimal::ZERO {
                return Err(CreditError::Precondition(format!(
                    "line item unit price must be positive, got {}",
                    item.unit_price
                )));
            }
        }

        let installment_count = input
            .installment_count
            .unwrap_or(self.default_installment_count);
        if !(schedule::MIN_INSTALLMENT_COUNT..=schedule::MAX_INSTALLMENT_COUNT)
            .contains(&installment_count)
        {
            return Err(CreditError::Precondition(format!(
                "installment count must be between {} and {}, got {}",
                schedule::MIN_INSTALLMENT_COUNT,
                schedule::MAX_INSTALLMENT_COUNT,
                installment_count
            )));
        }

        let account = self.get_account(input.account_id).await?;
        let total_amount: Decimal = input.line_items.iter().map(|i| i.line_total()).sum();

        if let Err(e) = check_credit(&account, total_amount) {
            let outcome = match &e {
                CreditError::CreditRejected(RejectReason::Unverified) => "rejected_unverified",
                _ => "rejected_insufficient",
            };
            CREDIT_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
            return Err(e);
        }
        CREDIT_CHECKS_TOTAL.with_label_values(&["accepted"]).inc();

        let order_date = self.clock.today();
        let order_number = self.store.next_order_number(order_date).await?;
        let order = self
            .store
            .insert_order(NewOrder {
                order_number,
                account_id: input.account_id,
                counterparty_id: input.counterparty_id,
                total_amount,
                installment_count,
                order_date,
                due_date: order_date + Duration::days(CREDIT_PERIOD_DAYS),
                notes: input.notes,
                line_items: input.line_items,
            })
            .await?;

        info!(
            order_number = %order.order_number,
            total_amount = %order.total_amount,
            installment_count = order.installment_count,
            "Order placed, awaiting approval"
        );

        Ok(order)
    }

    /// Approve a pending order. This is the point credit is actually
    /// extended: the installment schedule, the credit-extension ledger
    /// entry and the balance increase commit together or not at all.
    #[instrument(skip(self))]
    pub async fn approve_order(
        &self,
        order_id: Uuid,
    ) -> Result<(Order, Vec<Installment>), CreditError> {
        let order = self.get_order(order_id).await?;
        let current = parsed_status(&order)?;
        ensure_transition(current, OrderStatus::Approved)?;

        let account = self.get_account(order.account_id).await?;
        let schedule = build_schedule(order.total_amount, order.installment_count, order.order_date)?;
        let today = self.clock.today();
        let balance_after = account.outstanding_balance + order.total_amount;

        let result = self
            .store
            .commit_approval(CommitApproval {
                order_id,
                expected_account_version: account.version,
                approval_date: today,
                schedule,
                entry: NewLedgerEntry {
                    account_id: order.account_id,
                    direction: Direction::Credit,
                    amount: order.total_amount,
                    order_id: Some(order_id),
                    installment_id: None,
                    description: format!("Credit order {} approved", order.order_number),
                    balance_after,
                    entry_date: today,
                    posted_utc: self.clock.now_utc(),
                },
            })
            .await;

        match result {
            Ok((order, installments)) => {
                ORDER_TRANSITIONS_TOTAL
                    .with_label_values(&["approve", "ok"])
                    .inc();
                INSTALLMENTS_CREATED.inc_by(installments.len() as f64);
                info!(
                    order_number = %order.order_number,
                    total_amount = %order.total_amount,
                    installments = installments.len(),
                    balance_after = %balance_after,
                    "Order approved, credit extended"
                );
                Ok((order, installments))
            }
            Err(e) => {
                ORDER_TRANSITIONS_TOTAL
                    .with_label_values(&["approve", "error"])
                    .inc();
                Err(e)
            }
        }
    }

    /// Mark an approved order as dispatched. Status-only, no ledger effect.
    #[instrument(skip(self))]
    pub async fn dispatch_order(&self, order_id: Uuid) -> Result<Order, CreditError> {
        self.status_only_transition(order_id, OrderStatus::Dispatched, "dispatch")
            .await
    }

    /// Mark a dispatched order as delivered. Status-only, no ledger effect.
    #[instrument(skip(self))]
    pub async fn deliver_order(&self, order_id: Uuid) -> Result<Order, CreditError> {
        self.status_only_transition(order_id, OrderStatus::Delivered, "deliver")
            .await
    }

    async fn status_only_transition(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        transition: &str,
    ) -> Result<Order, CreditError> {
        let order = self.get_order(order_id).await?;
        let current = parsed_status(&order)?;
        ensure_transition(current, requested)?;

        let delivery_date = match requested {
            OrderStatus::Delivered => Some(self.clock.today()),
            _ => None,
        };

        let result = self
            .store
            .update_order_status(order_id, current, requested, delivery_date)
            .await;
        let status = if result.is_ok() { "ok" } else { "error" };
        ORDER_TRANSITIONS_TOTAL
            .with_label_values(&[transition, status])
            .inc();
        if let Ok(ref order) = result {
            info!(order_number = %order.order_number, status = %order.status, "Order status updated");
        }
        result
    }

    /// Record a payment against an installment.
    ///
    /// Over- and under-payment are permitted; any positive amount settles
    /// the installment. When the last unpaid installment settles, the
    /// order completes automatically within the same commit.
    #[instrument(skip(self, reference))]
    pub async fn record_payment(
        &self,
        installment_id: Uuid,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<PaymentOutcome, CreditError> {
        if amount <= Decimal::ZERO {
            return Err(CreditError::Precondition(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let installment = self
            .store
            .get_installment(installment_id)
            .await?
            .ok_or_else(|| CreditError::NotFound(format!("installment {}", installment_id)))?;
        if installment.is_paid {
            return Err(CreditError::InstallmentAlreadyPaid {
                installment_number: installment.installment_number,
            });
        }

        let order = self.get_order(installment.order_id).await?;
        let current = parsed_status(&order)?;
        if current.is_terminal() {
            // Payment drives toward completion; a terminal order cannot
            // accept it.
            return Err(CreditError::InvalidTransition {
                current,
                requested: OrderStatus::Completed,
            });
        }

        let account = self.get_account(order.account_id).await?;
        let today = self.clock.today();
        let is_late = today > installment.due_date;
        let balance_after = (account.outstanding_balance - amount).max(Decimal::ZERO);

        let outcome = self
            .store
            .commit_payment(CommitPayment {
                installment_id,
                expected_account_version: account.version,
                paid_date: today,
                amount_paid: amount,
                is_late,
                payment_reference: reference,
                entry: NewLedgerEntry {
                    account_id: order.account_id,
                    direction: Direction::Debit,
                    amount,
                    order_id: Some(order.order_id),
                    installment_id: Some(installment_id),
                    description: format!(
                        "EMI {} payment for {}",
                        installment.installment_number, order.order_number
                    ),
                    balance_after,
                    entry_date: today,
                    posted_utc: self.clock.now_utc(),
                },
            })
            .await?;

        PAYMENTS_TOTAL
            .with_label_values(&[if is_late { "late" } else { "on_time" }])
            .inc();
        if is_late {
            warn!(
                order_number = %order.order_number,
                installment_number = installment.installment_number,
                due_date = %installment.due_date,
                paid_date = %today,
                "Late EMI payment"
            );
        }
        if outcome.order_completed {
            ORDER_TRANSITIONS_TOTAL
                .with_label_values(&["complete", "ok"])
                .inc();
            info!(order_number = %order.order_number, "All EMIs paid, order completed");
        }

        Ok(outcome)
    }

    /// Cancel an order.
    ///
    /// Pending orders cancel without ledger effect (credit was never
    /// drawn). Approved orders are admin-only and reverse the credit
    /// extension with a compensating debit entry.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        actor: ActorPrivilege,
    ) -> Result<Order, CreditError> {
        let order = self.get_order(order_id).await?;
        let current = parsed_status(&order)?;
        ensure_transition(current, OrderStatus::Cancelled)?;

        if current == OrderStatus::Approved && actor != ActorPrivilege::Admin {
            return Err(CreditError::InvalidTransition {
                current,
                requested: OrderStatus::Cancelled,
            });
        }

        let result = match current {
            OrderStatus::Pending => {
                self.store
                    .update_order_status(order_id, current, OrderStatus::Cancelled, None)
                    .await
            }
            OrderStatus::Approved => {
                let account = self.get_account(order.account_id).await?;
                let today = self.clock.today();
                let balance_after =
                    (account.outstanding_balance - order.total_amount).max(Decimal::ZERO);
                self.store
                    .commit_cancellation(CommitCancellation {
                        order_id,
                        expected_account_version: account.version,
                        entry: NewLedgerEntry {
                            account_id: order.account_id,
                            direction: Direction::Debit,
                            amount: order.total_amount,
                            order_id: Some(order_id),
                            installment_id: None,
                            description: format!(
                                "Order {} cancelled - balance restored",
                                order.order_number
                            ),
                            balance_after,
                            entry_date: today,
                            posted_utc: self.clock.now_utc(),
                        },
                    })
                    .await
            }
            // The transition table only admits cancellation from the two
            // states above.
            _ => Err(CreditError::InvalidTransition {
                current,
                requested: OrderStatus::Cancelled,
            }),
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        ORDER_TRANSITIONS_TOTAL
            .with_label_values(&["cancel", status])
            .inc();
        if let Ok(ref order) = result {
            info!(order_number = %order.order_number, "Order cancelled");
        }
        result
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, CreditError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CreditError::NotFound(format!("order {}", order_id)))
    }

    pub async fn order_line_items(&self, order_id: Uuid) -> Result<Vec<LineItem>, CreditError> {
        self.store.list_line_items(order_id).await
    }

    /// Credit limit minus outstanding balance.
    pub async fn available_credit(&self, account_id: Uuid) -> Result<Decimal, CreditError> {
        Ok(self.get_account(account_id).await?.available_credit())
    }

    /// Unpaid installments of an order, by installment number.
    pub async fn pending_installments(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<Installment>, CreditError> {
        let installments = self.store.list_installments(order_id).await?;
        Ok(installments.into_iter().filter(|i| !i.is_paid).collect())
    }

    /// Unpaid installments past their due date as of today.
    pub async fn overdue_installments(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<Installment>, CreditError> {
        let today = self.clock.today();
        let installments = self.store.list_installments(order_id).await?;
        Ok(installments
            .into_iter()
            .filter(|i| i.is_overdue(today))
            .collect())
    }

    /// Whether an installment is overdue as of today.
    pub fn is_overdue(&self, installment: &Installment) -> bool {
        installment.is_overdue(self.clock.today())
    }

    /// Advisory default check: any installment unpaid past its due date
    /// plus the grace window. Reporting only - never gates further credit.
    pub async fn is_defaulted(&self, order_id: Uuid) -> Result<bool, CreditError> {
        let today = self.clock.today();
        let installments = self.store.list_installments(order_id).await?;
        Ok(installments
            .iter()
            .any(|i| !i.is_paid && i.due_date + Duration::days(self.grace_days) < today))
    }

    /// Transaction history for an account, most recent first.
    pub async fn account_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, CreditError> {
        let mut entries = self.store.list_entries(account_id).await?;
        entries.reverse();
        Ok(entries)
    }

    /// Account statement for a date range, with running balances taken
    /// from the entries' balance snapshots.
    pub async fn account_statement(
        &self,
        account_id: Uuid,
        period_start: chrono::NaiveDate,
        period_end: chrono::NaiveDate,
    ) -> Result<Statement, CreditError> {
        if period_start > period_end {
            return Err(CreditError::Precondition(format!(
                "statement period start {} is after end {}",
                period_start, period_end
            )));
        }
        // Ensure the account exists before answering with an empty statement.
        self.get_account(account_id).await?;

        let entries = self.store.list_entries(account_id).await?;
        let mut opening_balance = Decimal::ZERO;
        let mut lines = Vec::new();
        for entry in entries {
            if entry.entry_date < period_start {
                opening_balance = entry.balance_after;
            } else if entry.entry_date <= period_end {
                let direction = entry.parsed_direction().ok_or_else(|| {
                    CreditError::Storage(anyhow::anyhow!(
                        "unknown ledger direction '{}'",
                        entry.direction
                    ))
                })?;
                lines.push(StatementLine {
                    entry_id: entry.entry_id,
                    entry_date: entry.entry_date,
                    direction,
                    amount: entry.amount,
                    description: entry.description,
                    running_balance: entry.balance_after,
                });
            }
        }
        let closing_balance = lines
            .last()
            .map(|l| l.running_balance)
            .unwrap_or(opening_balance);

        Ok(Statement {
            account_id,
            period_start,
            period_end,
            opening_balance,
            closing_balance,
            lines,
        })
    }
}

fn parsed_status(order: &Order) -> Result<OrderStatus, CreditError> {
    order.parsed_status().ok_or_else(|| {
        CreditError::Storage(anyhow::anyhow!("unknown order status '{}'", order.status))
    })
}

fn ensure_transition(current: OrderStatus, requested: OrderStatus) -> Result<(), CreditError> {
    if current.can_transition_to(requested) {
        Ok(())
    } else {
        Err(CreditError::InvalidTransition { current, requested })
    }
}
