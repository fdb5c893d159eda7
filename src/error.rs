//! Error taxonomy for the credit engine.
//!
//! Every fallible operation returns one of these as an explicit value;
//! nothing is swallowed or silently corrected.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::OrderStatus;

/// Why the credit limit guard refused a credit extension.
///
/// Business-expected refusals, shown to the requesting user rather than
/// logged as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The account has not been verified by an administrator.
    Unverified,
    /// The proposed amount exceeds the account's available credit.
    InsufficientCredit {
        available: Decimal,
        requested: Decimal,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Unverified => {
                write!(f, "account is not verified")
            }
            RejectReason::InsufficientCredit {
                available,
                requested,
            } => {
                write!(
                    f,
                    "insufficient credit: available {}, required {}",
                    available, requested
                )
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CreditError {
    /// Credit extension refused by the guard.
    #[error("Credit rejected: {0}")]
    CreditRejected(RejectReason),

    /// A lifecycle transition not present in the transition table was
    /// requested. Caller misuse, never silently corrected.
    #[error("Invalid transition: order is {current}, requested {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// Payment was recorded against an installment that is already settled.
    #[error("Installment {installment_number} is already paid")]
    InstallmentAlreadyPaid { installment_number: i32 },

    /// The account state changed between read and commit (lost update).
    /// The caller should retry the whole operation from fresh state.
    #[error("Concurrent modification detected, retry from fresh state")]
    ConcurrentModification,

    /// Malformed input (non-positive installment count, negative total,
    /// empty order, ...). Fatal to the call, not retryable.
    #[error("Precondition violation: {0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}
