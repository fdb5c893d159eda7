//! Installment (EMI) model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One scheduled partial payment of an order's credit extension.
///
/// Created as a batch when the order is approved; mutated only by payment
/// recording; never deleted. `amount_paid` may differ from the scheduled
/// `amount` (over/under payment is permitted and settles the installment
/// either way).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Installment {
    pub installment_id: Uuid,
    pub order_id: Uuid,
    /// 1..N, unique per order.
    pub installment_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub is_paid: bool,
    pub paid_date: Option<NaiveDate>,
    /// Actual amount received; zero until paid.
    pub amount_paid: Decimal,
    /// True iff paid_date > due_date.
    pub is_late: bool,
    /// UPI id, cheque number, etc.
    pub payment_reference: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Installment {
    /// Unpaid and past due as of the given date.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_paid && self.due_date < as_of
    }

    /// Days past due, zero if paid or not yet due.
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        if self.is_paid || as_of <= self.due_date {
            return 0;
        }
        (as_of - self.due_date).num_days()
    }

    /// Days until the due date, `None` once paid. Negative when overdue.
    pub fn days_until_due(&self, as_of: NaiveDate) -> Option<i64> {
        if self.is_paid {
            return None;
        }
        Some((self.due_date - as_of).num_days())
    }
}
