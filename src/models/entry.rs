//! Ledger entry model: the append-only audit trail of balance changes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Entry direction.
///
/// `Credit` is a credit extension (outstanding balance goes up), `Debit`
/// is a payment received (outstanding balance goes down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Direction::Credit),
            "debit" => Some(Direction::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one balance change. Amounts are always positive;
/// the direction carries the sign.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub direction: String,
    pub amount: Decimal,
    pub order_id: Option<Uuid>,
    pub installment_id: Option<Uuid>,
    pub description: String,
    /// The account's outstanding balance immediately after this entry.
    pub balance_after: Decimal,
    pub entry_date: NaiveDate,
    pub posted_utc: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn parsed_direction(&self) -> Option<Direction> {
        Direction::parse(&self.direction)
    }

    /// Signed effect on the outstanding balance (positive for credit
    /// extensions, negative for payments).
    pub fn signed_amount(&self) -> Decimal {
        match self.parsed_direction() {
            Some(Direction::Credit) => self.amount,
            Some(Direction::Debit) => -self.amount,
            None => Decimal::ZERO,
        }
    }
}

/// Statement line with running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLine {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub direction: Direction,
    pub amount: Decimal,
    pub description: String,
    pub running_balance: Decimal,
}

/// Account statement for a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub lines: Vec<StatementLine>,
}
