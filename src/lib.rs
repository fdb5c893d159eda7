//! credit-core - credit ledger and EMI lifecycle engine for shop-credit
//! (udhaar) operations between shop owners and wholesalers.
//!
//! The engine owns the order state machine (pending through completion or
//! cancellation), installment scheduling, the credit limit guard, and the
//! append-only ledger of balance changes. Persistence goes through the
//! [`services::CreditStore`] seam: PostgreSQL in production
//! ([`services::Database`]), in-memory for tests and embedders
//! ([`services::MemoryStore`]).

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
