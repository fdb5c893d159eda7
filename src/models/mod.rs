//! Domain models for the credit ledger.

mod account;
mod entry;
mod installment;
mod order;

pub use account::{Account, CreateAccount, RiskCategory};
pub use entry::{Direction, LedgerEntry, Statement, StatementLine};
pub use installment::Installment;
pub use order::{
    CreateOrder, LineItem, NewLineItem, Order, OrderStatus, CREDIT_PERIOD_DAYS,
};
