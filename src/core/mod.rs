//! Core business logic module
//!
//! This module contains the ledger's core components:
//! - `traits` - Store seams the services operate through
//! - `account_store` - Concurrent in-memory account directory
//! - `loan_store` - Concurrent in-memory loan store with event and audit logs
//! - `ledger` - Deposits, withdrawals, and compensated transfers
//! - `loan_engine` - Loan opening, interest-bearing payments, audited deletion
//! - `loan_requests` - The PENDING to ACCEPTED/DECLINED request state machine
//! - `saga` - Explicit compensating sequences for multi-entity mutations
//! - `retry` - Bounded retry policy for audit-critical writes

pub mod account_store;
pub mod ledger;
pub mod loan_engine;
pub mod loan_requests;
pub mod loan_store;
pub mod retry;
pub mod saga;
pub mod traits;

pub use account_store::AccountStore;
pub use ledger::Ledger;
pub use loan_engine::LoanEngine;
pub use loan_requests::LoanRequestService;
pub use loan_store::MemoryLoanStore;
pub use retry::RetryPolicy;
pub use saga::{Saga, Step};
pub use traits::{AccountDirectory, LoanStore};
