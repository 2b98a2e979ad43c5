//! Bank Ledger Engine Library
//! # Overview
//!
//! This library provides the transactional core of a small banking
//! application: money movement between accounts and an interest-bearing
//! loan lifecycle, with explicit compensation wherever an operation
//! spans more than one row
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Loan, Transaction, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Deposits, withdrawals, and compensated transfers
//!   - [`core::loan_engine`] - Loan payments with lazy interest and audited deletion
//!   - [`core::loan_requests`] - Loan request intake and review
//!   - [`core::account_store`] / [`core::loan_store`] - Concurrent in-memory stores
//!   - [`core::saga`] / [`core::retry`] - Compensation and bounded-retry plumbing
//!
//! # Operations
//!
//! The engine supports the following operations:
//!
//! - **Deposit**: Credit funds to an account
//! - **Withdraw**: Debit funds from an account (requires sufficient balance)
//! - **Transfer**: Move funds to another account, compensated on partial failure
//! - **Loan request**: Submit, accept (disburse and open the loan), or decline
//! - **Loan payment**: Fold accrued interest into the debt, then pay it down
//! - **Loan deletion**: Remove a loan behind a mandatory audit record
//!
//! # Concurrency
//!
//! Every mutation of an account or loan runs under that row's lock, so
//! concurrent mutators of the same row serialize while different rows
//! proceed in parallel. Multi-row operations are sagas with explicit
//! compensating actions rather than cross-row transactions.

// Module declarations
pub mod core;
pub mod types;

pub use core::{
    AccountDirectory, AccountStore, Ledger, LoanEngine, LoanRequestService, LoanStore,
    MemoryLoanStore, RetryPolicy,
};
pub use types::{
    Account, AccountId, LedgerError, Loan, LoanDeletion, LoanEvent, LoanEventKind, LoanId,
    LoanRequest, RequestId, RequestStatus, Transaction, TransactionAction, TransactionId, Transfer,
    TransferId,
};
