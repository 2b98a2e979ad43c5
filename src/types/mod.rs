//! Types module
//!
//! Contains the data records persisted by the ledger core.
//! This module organizes types into logical submodules:
//! - `account`: Account state and identifiers
//! - `loan`: Loans, the loan event log, and deletion audit records
//! - `request`: Loan requests and their status workflow
//! - `transaction`: Deposit/withdraw and transfer audit rows
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod error;
pub mod loan;
pub mod request;
pub mod transaction;

pub use account::{Account, AccountId, Version};
pub use error::LedgerError;
pub use loan::{Loan, LoanDeletion, LoanDeletionId, LoanEvent, LoanEventId, LoanEventKind, LoanId};
pub use request::{LoanRequest, RequestId, RequestStatus};
pub use transaction::{
    Transaction, TransactionAction, TransactionId, Transfer, TransferId,
};
