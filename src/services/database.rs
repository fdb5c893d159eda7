//! PostgreSQL credit store.
//!
//! Transition guards live in the SQL itself: status flips carry the
//! expected current status in the WHERE clause, and balance updates carry
//! the account version observed by the engine. A guarded statement that
//! matches no row means the state moved underneath the caller, surfaced
//! as `ConcurrentModification`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::CreditError;
use crate::models::{
    Account, CreateAccount, Installment, LedgerEntry, LineItem, Order, OrderStatus, RiskCategory,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    CommitApproval, CommitCancellation, CommitPayment, CreditStore, NewLedgerEntry, NewOrder,
    PaymentOutcome,
};

const ACCOUNT_COLUMNS: &str = "account_id, name, verified, credit_limit, outstanding_balance, risk_category, version, created_utc, updated_utc";
const ORDER_COLUMNS: &str = "order_id, order_number, account_id, counterparty_id, total_amount, installment_count, status, order_date, due_date, approval_date, delivery_date, notes, created_utc, updated_utc";
const INSTALLMENT_COLUMNS: &str = "installment_id, order_id, installment_number, amount, due_date, is_paid, paid_date, amount_paid, is_late, payment_reference, created_utc, updated_utc";
const ENTRY_COLUMNS: &str = "entry_id, account_id, direction, amount, order_id, installment_id, description, balance_after, entry_date, posted_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, CreditError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), CreditError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CreditError::Storage(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), CreditError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CreditError::Storage(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Account Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_account_row(&self, input: &CreateAccount) -> Result<Account, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_account"])
            .start_timer();

        let account_id = Uuid::new_v4();
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (account_id, name, verified, credit_limit, outstanding_balance, risk_category, version)
            VALUES ($1, $2, $3, $4, 0, $5, 0)
            RETURNING {ACCOUNT_COLUMNS}
            "#,
        ))
        .bind(account_id)
        .bind(&input.name)
        .bind(input.verified)
        .bind(input.credit_limit)
        .bind(input.risk_category.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to create account: {}", e)))?;

        timer.observe_duration();

        info!(account_id = %account.account_id, "Account created");

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn get_account_row(&self, account_id: Uuid) -> Result<Option<Account>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_account"])
            .start_timer();

        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            WHERE account_id = $1
            "#,
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to get account: {}", e)))?;

        timer.observe_duration();

        Ok(account)
    }

    /// Apply one profile mutation, bumping the optimistic version.
    async fn update_account_profile(
        &self,
        account_id: Uuid,
        operation: &'static str,
        set_clause: &str,
        bind: AccountProfileBind<'_>,
    ) -> Result<Account, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&[operation])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE accounts
            SET {set_clause}, version = version + 1, updated_utc = NOW()
            WHERE account_id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#,
        );
        let query = sqlx::query_as::<_, Account>(&sql).bind(account_id);
        let query = match bind {
            AccountProfileBind::Bool(v) => query.bind(v),
            AccountProfileBind::Amount(v) => query.bind(v),
            AccountProfileBind::Text(v) => query.bind(v),
        };
        let account = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                CreditError::Storage(anyhow::anyhow!("Failed to update account: {}", e))
            })?
            .ok_or_else(|| CreditError::NotFound(format!("account {}", account_id)))?;

        timer.observe_duration();

        Ok(account)
    }

    // -------------------------------------------------------------------------
    // Order Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(order_number = %input.order_number))]
    async fn insert_order_row(&self, input: NewOrder) -> Result<Order, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                order_id, order_number, account_id, counterparty_id, total_amount,
                installment_count, status, order_date, due_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(order_id)
        .bind(&input.order_number)
        .bind(input.account_id)
        .bind(input.counterparty_id)
        .bind(input.total_amount)
        .bind(input.installment_count)
        .bind(input.order_date)
        .bind(input.due_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to insert order: {}", e)))?;

        for item in &input.line_items {
            sqlx::query(
                r#"
                INSERT INTO line_items (line_item_id, order_id, description, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                CreditError::Storage(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(order_number = %order.order_number, "Order stored");

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order_row(&self, order_id: Uuid) -> Result<Option<Order>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE order_id = $1
            "#,
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id, from = %from, to = %to))]
    async fn update_order_status_row(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<Order, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_order_status"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $3,
                delivery_date = COALESCE($4, delivery_date),
                updated_utc = NOW()
            WHERE order_id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(delivery_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to update order status: {}", e))
        })?
        .ok_or(CreditError::ConcurrentModification)?;

        timer.observe_duration();

        info!(order_number = %order.order_number, status = %order.status, "Order status updated");

        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Transition Commits
    // -------------------------------------------------------------------------

    #[instrument(skip(self, commit), fields(order_id = %commit.order_id))]
    async fn commit_approval_tx(
        &self,
        commit: CommitApproval,
    ) -> Result<(Order, Vec<Installment>), CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_approval"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = 'approved', approval_date = $2, updated_utc = NOW()
            WHERE order_id = $1 AND status = 'pending'
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(commit.order_id)
        .bind(commit.approval_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to approve order: {}", e)))?;
        let order = match order {
            Some(order) => order,
            None => {
                tx.rollback().await.ok();
                return Err(CreditError::ConcurrentModification);
            }
        };

        let bumped = apply_balance_delta(
            &mut tx,
            commit.entry.account_id,
            commit.entry.amount,
            BalanceDelta::Extend,
            commit.expected_account_version,
        )
        .await?;
        if !bumped {
            tx.rollback().await.ok();
            return Err(CreditError::ConcurrentModification);
        }

        let mut installments = Vec::with_capacity(commit.schedule.len());
        for scheduled in &commit.schedule {
            let installment = sqlx::query_as::<_, Installment>(&format!(
                r#"
                INSERT INTO installments (installment_id, order_id, installment_number, amount, due_date)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {INSTALLMENT_COLUMNS}
                "#,
            ))
            .bind(Uuid::new_v4())
            .bind(commit.order_id)
            .bind(scheduled.installment_number)
            .bind(scheduled.amount)
            .bind(scheduled.due_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                CreditError::Storage(anyhow::anyhow!("Failed to insert installment: {}", e))
            })?;
            installments.push(installment);
        }

        insert_entry(&mut tx, &commit.entry).await?;

        tx.commit().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            order_number = %order.order_number,
            installments = installments.len(),
            "Approval committed"
        );

        Ok((order, installments))
    }

    #[instrument(skip(self, commit), fields(installment_id = %commit.installment_id))]
    async fn commit_payment_tx(
        &self,
        commit: CommitPayment,
    ) -> Result<PaymentOutcome, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let installment = sqlx::query_as::<_, Installment>(&format!(
            r#"
            UPDATE installments
            SET is_paid = TRUE,
                paid_date = $2,
                amount_paid = $3,
                is_late = $4,
                payment_reference = $5,
                updated_utc = NOW()
            WHERE installment_id = $1 AND is_paid = FALSE
            RETURNING {INSTALLMENT_COLUMNS}
            "#,
        ))
        .bind(commit.installment_id)
        .bind(commit.paid_date)
        .bind(commit.amount_paid)
        .bind(commit.is_late)
        .bind(&commit.payment_reference)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to settle installment: {}", e)))?;
        let installment = match installment {
            Some(installment) => installment,
            None => {
                tx.rollback().await.ok();
                // Distinguish a missing installment from one another payer
                // settled first.
                let existing = sqlx::query_scalar::<_, i32>(
                    "SELECT installment_number FROM installments WHERE installment_id = $1",
                )
                .bind(commit.installment_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    CreditError::Storage(anyhow::anyhow!("Failed to get installment: {}", e))
                })?;
                return match existing {
                    Some(installment_number) => {
                        Err(CreditError::InstallmentAlreadyPaid { installment_number })
                    }
                    None => Err(CreditError::NotFound(format!(
                        "installment {}",
                        commit.installment_id
                    ))),
                };
            }
        };

        let bumped = apply_balance_delta(
            &mut tx,
            commit.entry.account_id,
            commit.entry.amount,
            BalanceDelta::Settle,
            commit.expected_account_version,
        )
        .await?;
        if !bumped {
            tx.rollback().await.ok();
            return Err(CreditError::ConcurrentModification);
        }

        let entry = insert_entry(&mut tx, &commit.entry).await?;

        let unpaid: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM installments WHERE order_id = $1 AND is_paid = FALSE",
        )
        .bind(installment.order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to count unpaid installments: {}", e))
        })?;

        let mut order_completed = false;
        if unpaid == 0 {
            let completed = sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE orders
                SET status = 'completed', updated_utc = NOW()
                WHERE order_id = $1 AND status IN ('approved', 'dispatched', 'delivered')
                RETURNING order_id
                "#,
            )
            .bind(installment.order_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                CreditError::Storage(anyhow::anyhow!("Failed to complete order: {}", e))
            })?;
            order_completed = completed.is_some();
        }

        tx.commit().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            installment_number = installment.installment_number,
            amount_paid = %installment.amount_paid,
            order_completed = order_completed,
            "Payment committed"
        );

        Ok(PaymentOutcome {
            installment,
            entry,
            order_completed,
        })
    }

    #[instrument(skip(self, commit), fields(order_id = %commit.order_id))]
    async fn commit_cancellation_tx(
        &self,
        commit: CommitCancellation,
    ) -> Result<Order, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_cancellation"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_utc = NOW()
            WHERE order_id = $1 AND status = 'approved'
            RETURNING {ORDER_COLUMNS}
            "#,
        ))
        .bind(commit.order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to cancel order: {}", e)))?;
        let order = match order {
            Some(order) => order,
            None => {
                tx.rollback().await.ok();
                return Err(CreditError::ConcurrentModification);
            }
        };

        let bumped = apply_balance_delta(
            &mut tx,
            commit.entry.account_id,
            commit.entry.amount,
            BalanceDelta::Settle,
            commit.expected_account_version,
        )
        .await?;
        if !bumped {
            tx.rollback().await.ok();
            return Err(CreditError::ConcurrentModification);
        }

        insert_entry(&mut tx, &commit.entry).await?;

        tx.commit().await.map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(order_number = %order.order_number, "Cancellation committed");

        Ok(order)
    }
}

enum AccountProfileBind<'a> {
    Bool(bool),
    Amount(Decimal),
    Text(&'a str),
}

enum BalanceDelta {
    /// outstanding += amount
    Extend,
    /// outstanding -= amount, floored at zero
    Settle,
}

/// Version-guarded balance mutation inside an open transaction. Returns
/// false when the expected version no longer matches.
async fn apply_balance_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
    amount: Decimal,
    delta: BalanceDelta,
    expected_version: i64,
) -> Result<bool, CreditError> {
    let sql = match delta {
        BalanceDelta::Extend => {
            r#"
            UPDATE accounts
            SET outstanding_balance = outstanding_balance + $2,
                version = version + 1,
                updated_utc = NOW()
            WHERE account_id = $1 AND version = $3
            RETURNING version
            "#
        }
        BalanceDelta::Settle => {
            r#"
            UPDATE accounts
            SET outstanding_balance = GREATEST(outstanding_balance - $2, 0),
                version = version + 1,
                updated_utc = NOW()
            WHERE account_id = $1 AND version = $3
            RETURNING version
            "#
        }
    };

    let updated = sqlx::query_scalar::<_, i64>(sql)
        .bind(account_id)
        .bind(amount)
        .bind(expected_version)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to update balance: {}", e)))?;

    Ok(updated.is_some())
}

/// Append one ledger entry inside an open transaction.
async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &NewLedgerEntry,
) -> Result<LedgerEntry, CreditError> {
    sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO ledger_entries (
            entry_id, account_id, direction, amount, order_id, installment_id,
            description, balance_after, entry_date, posted_utc
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ENTRY_COLUMNS}
        "#,
    ))
    .bind(Uuid::new_v4())
    .bind(entry.account_id)
    .bind(entry.direction.as_str())
    .bind(entry.amount)
    .bind(entry.order_id)
    .bind(entry.installment_id)
    .bind(&entry.description)
    .bind(entry.balance_after)
    .bind(entry.entry_date)
    .bind(entry.posted_utc)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to insert ledger entry: {}", e)))
}

#[async_trait]
impl CreditStore for Database {
    async fn insert_account(&self, input: CreateAccount) -> Result<Account, CreditError> {
        self.create_account_row(&input).await
    }

    async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>, CreditError> {
        self.get_account_row(account_id).await
    }

    async fn set_verified(
        &self,
        account_id: Uuid,
        verified: bool,
    ) -> Result<Account, CreditError> {
        self.update_account_profile(
            account_id,
            "set_verified",
            "verified = $2",
            AccountProfileBind::Bool(verified),
        )
        .await
    }

    async fn set_credit_limit(
        &self,
        account_id: Uuid,
        credit_limit: Decimal,
    ) -> Result<Account, CreditError> {
        self.update_account_profile(
            account_id,
            "set_credit_limit",
            "credit_limit = $2",
            AccountProfileBind::Amount(credit_limit),
        )
        .await
    }

    async fn set_risk_category(
        &self,
        account_id: Uuid,
        risk_category: RiskCategory,
    ) -> Result<Account, CreditError> {
        self.update_account_profile(
            account_id,
            "set_risk_category",
            "risk_category = $2",
            AccountProfileBind::Text(risk_category.as_str()),
        )
        .await
    }

    async fn next_order_number(&self, date: NaiveDate) -> Result<String, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_order_number"])
            .start_timer();

        let number = sqlx::query_scalar::<_, String>("SELECT next_order_number($1)")
            .bind(date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                CreditError::Storage(anyhow::anyhow!("Failed to allocate order number: {}", e))
            })?;

        timer.observe_duration();

        Ok(number)
    }

    async fn insert_order(&self, input: NewOrder) -> Result<Order, CreditError> {
        self.insert_order_row(input).await
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, CreditError> {
        self.get_order_row(order_id).await
    }

    async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order_by_number"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE order_number = $1
            "#,
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }

    async fn list_orders_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Order>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders_for_account"])
            .start_timer();

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE account_id = $1
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to list orders: {}", e)))?;

        timer.observe_duration();

        Ok(orders)
    }

    async fn list_line_items(&self, order_id: Uuid) -> Result<Vec<LineItem>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_line_items"])
            .start_timer();

        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, order_id, description, quantity, unit_price, line_total, created_utc
            FROM line_items
            WHERE order_id = $1
            ORDER BY created_utc, line_item_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to list line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<Order, CreditError> {
        self.update_order_status_row(order_id, from, to, delivery_date)
            .await
    }

    async fn get_installment(
        &self,
        installment_id: Uuid,
    ) -> Result<Option<Installment>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_installment"])
            .start_timer();

        let installment = sqlx::query_as::<_, Installment>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS}
            FROM installments
            WHERE installment_id = $1
            "#,
        ))
        .bind(installment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to get installment: {}", e)))?;

        timer.observe_duration();

        Ok(installment)
    }

    async fn list_installments(&self, order_id: Uuid) -> Result<Vec<Installment>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_installments"])
            .start_timer();

        let installments = sqlx::query_as::<_, Installment>(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS}
            FROM installments
            WHERE order_id = $1
            ORDER BY installment_number
            "#,
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            CreditError::Storage(anyhow::anyhow!("Failed to list installments: {}", e))
        })?;

        timer.observe_duration();

        Ok(installments)
    }

    async fn commit_approval(
        &self,
        commit: CommitApproval,
    ) -> Result<(Order, Vec<Installment>), CreditError> {
        self.commit_approval_tx(commit).await
    }

    async fn commit_payment(
        &self,
        commit: CommitPayment,
    ) -> Result<PaymentOutcome, CreditError> {
        self.commit_payment_tx(commit).await
    }

    async fn commit_cancellation(
        &self,
        commit: CommitCancellation,
    ) -> Result<Order, CreditError> {
        self.commit_cancellation_tx(commit).await
    }

    async fn list_entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CreditError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_entries"])
            .start_timer();

        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY posted_utc, entry_id
            "#,
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CreditError::Storage(anyhow::anyhow!("Failed to list entries: {}", e)))?;

        timer.observe_duration();

        Ok(entries)
    }
}
