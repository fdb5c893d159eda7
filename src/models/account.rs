//! Account model and credit profile helpers.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Risk classification. Advisory only: it is set from an external scoring
/// collaborator and never gates credit decisions here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "low" => RiskCategory::Low,
            "high" => RiskCategory::High,
            _ => RiskCategory::Medium,
        }
    }

    /// Map an externally supplied default probability onto a category.
    pub fn from_default_probability(probability: f64) -> Self {
        if probability < 0.2 {
            RiskCategory::Low
        } else if probability < 0.5 {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credit-taking party.
///
/// `outstanding_balance` is maintained by the engine and never goes
/// negative (clamped to zero on over-payment). `outstanding <=
/// credit_limit` is enforced at credit-extension time only; lowering the
/// limit under existing debt is allowed and is not an error state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub account_id: Uuid,
    pub name: String,
    /// Set by the account-management collaborator; unverified accounts
    /// cannot take credit.
    pub verified: bool,
    pub credit_limit: Decimal,
    pub outstanding_balance: Decimal,
    pub risk_category: String,
    /// Optimistic concurrency counter, bumped on every balance or
    /// profile mutation.
    pub version: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Account {
    pub fn parsed_risk(&self) -> RiskCategory {
        RiskCategory::from_string(&self.risk_category)
    }

    /// Credit limit minus current outstanding balance.
    pub fn available_credit(&self) -> Decimal {
        self.credit_limit - self.outstanding_balance
    }

    /// Share of the credit limit currently in use, 0-100.
    pub fn credit_utilization_percent(&self) -> f64 {
        if self.credit_limit.is_zero() {
            return 0.0;
        }
        ((self.outstanding_balance / self.credit_limit) * Decimal::from(100))
            .to_f64()
            .unwrap_or(0.0)
    }
}

/// Input for creating an account.
///
/// Account construction is explicit: the ledger state (zero outstanding,
/// version zero) is initialised in the same call, not by a persistence
/// hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub name: String,
    pub verified: bool,
    pub credit_limit: Decimal,
    pub risk_category: RiskCategory,
}
