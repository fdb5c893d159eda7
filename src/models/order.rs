//! Order model and lifecycle state machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Installment;

/// Days from order date to the final payment due date.
pub const CREDIT_PERIOD_DAYS: i64 = 30;

/// Order lifecycle status.
///
/// `Defaulted` is deliberately absent: it is a computed, advisory
/// condition (unpaid installments past due date plus grace window), not a
/// stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Dispatched,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Strict parse. Unknown strings are rejected rather than mapped to a
    /// fallback status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "approved" => Some(OrderStatus::Approved),
            "dispatched" => Some(OrderStatus::Dispatched),
            "delivered" => Some(OrderStatus::Delivered),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// No transitions leave a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// The transition table. Completion is reachable from any post-approval
    /// status because the final installment payment completes the order
    /// wherever it currently sits.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Dispatched)
                | (Approved, Cancelled)
                | (Approved, Completed)
                | (Dispatched, Delivered)
                | (Dispatched, Completed)
                | (Delivered, Completed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credit-based order. Never deleted; terminal states end the lifecycle.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    /// Human-facing number, `ORD-YYYYMMDD-NNNN`, sequential per day.
    pub order_number: String,
    /// The credit-taking account (shop owner).
    pub account_id: Uuid,
    /// The fulfilling party (wholesaler).
    pub counterparty_id: Uuid,
    /// Sum of line item totals.
    pub total_amount: Decimal,
    pub installment_count: i32,
    pub status: String,
    pub order_date: NaiveDate,
    /// order_date + 30 days, fixed regardless of installment count.
    pub due_date: NaiveDate,
    pub approval_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Order {
    pub fn parsed_status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    /// Sum of amounts actually received on settled installments.
    pub fn paid_amount(&self, installments: &[Installment]) -> Decimal {
        installments
            .iter()
            .filter(|i| i.order_id == self.order_id && i.is_paid)
            .map(|i| i.amount_paid)
            .sum()
    }

    pub fn pending_amount(&self, installments: &[Installment]) -> Decimal {
        self.total_amount - self.paid_amount(installments)
    }

    /// True if any installment is unpaid past its due date.
    pub fn is_overdue(&self, installments: &[Installment], as_of: NaiveDate) -> bool {
        installments
            .iter()
            .any(|i| i.order_id == self.order_id && i.is_overdue(as_of))
    }
}

/// One product line within an order. The description is a snapshot taken
/// at order time; the catalog itself lives outside this core.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub order_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input line item. The line total is always recomputed from quantity and
/// unit price, never supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub account_id: Uuid,
    pub counterparty_id: Uuid,
    pub line_items: Vec<NewLineItem>,
    /// 1-12; falls back to the configured default (4) when absent.
    pub installment_count: Option<i32>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn pending_cannot_skip_approval() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Dispatched));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn only_pending_and_approved_can_cancel() {
        for from in ALL {
            let expected = matches!(from, OrderStatus::Pending | OrderStatus::Approved);
            assert_eq!(from.can_transition_to(OrderStatus::Cancelled), expected);
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("defaulted"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }
}
