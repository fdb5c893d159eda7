//! Persistence and observability services.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{
    CommitApproval, CommitCancellation, CommitPayment, CreditStore, NewLedgerEntry, NewOrder,
    PaymentOutcome,
};
