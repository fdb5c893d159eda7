//! Credit limit guard.

use rust_decimal::Decimal;

use crate::error::{CreditError, RejectReason};
use crate::models::Account;

/// Check whether an account may take on `proposed_amount` of new credit.
///
/// Side-effect free, so it may be called speculatively without
/// committing anything. The boundary is inclusive: a proposal exactly
/// equal to the available credit passes.
pub fn check_credit(account: &Account, proposed_amount: Decimal) -> Result<(), CreditError> {
    if !account.verified {
        return Err(CreditError::CreditRejected(RejectReason::Unverified));
    }

    let available = account.available_credit();
    if proposed_amount > available {
        return Err(CreditError::CreditRejected(
            RejectReason::InsufficientCredit {
                available,
                requested: proposed_amount,
            },
        ));
    }

    Ok(())
}
