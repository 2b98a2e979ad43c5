//! Core traits for the account directory and loan store seams
//!
//! This module defines the trait abstractions behind which any
//! transactional store can sit. The engine ships concurrent in-memory
//! implementations; a relational implementation would map `update` to a
//! `SELECT ... FOR UPDATE` read-modify-write and surface its timeouts
//! as transient errors through the same signatures.

use crate::types::{
    Account, AccountId, LedgerError, Loan, LoanDeletion, LoanEvent, LoanEventKind, LoanId, Version,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Lookup and locked mutation of accounts
///
/// `update` must hold an exclusive per-row lock for the whole
/// read-modify-write so concurrent mutators of the same account
/// serialize, must increment the row version by exactly 1 on success,
/// and must refuse to persist a negative balance. The store itself
/// never retries; callers decide.
pub trait AccountDirectory: Send + Sync {
    /// Fetch an account by id
    fn get(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Fetch an account by its contact address
    fn get_by_email(&self, email: &str) -> Result<Account, LedgerError>;

    /// Mutate an account under its row lock
    ///
    /// The closure runs on a draft of the current row; nothing is
    /// persisted if it returns an error. Passing `expected_version`
    /// turns the call into a compare-and-swap that fails with
    /// [`LedgerError::Conflict`] when the row has moved on.
    fn update<F>(
        &self,
        id: AccountId,
        expected_version: Option<Version>,
        f: F,
    ) -> Result<Account, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<(), LedgerError>;
}

/// Storage for loans, their event log, and deletion audit records
///
/// Loans are always addressed by `(loan_id, account_id)`: a loan owned
/// by a different account is reported as absent, not as forbidden.
pub trait LoanStore: Send + Sync {
    /// Insert a new loan row with `remaining` equal to the principal
    fn insert(
        &self,
        account_id: AccountId,
        amount: Decimal,
        daily_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Loan, LedgerError>;

    /// Fetch a loan owned by the given account
    fn get(&self, loan_id: LoanId, account_id: AccountId) -> Result<Loan, LedgerError>;

    /// Mutate a loan under its row lock
    ///
    /// Same contract as [`AccountDirectory::update`]: draft semantics,
    /// version bumped by 1, a negative remaining balance refused.
    fn update<F>(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        f: F,
    ) -> Result<Loan, LedgerError>
    where
        F: FnOnce(&mut Loan) -> Result<(), LedgerError>;

    /// Remove a loan row
    fn delete(&self, loan_id: LoanId, account_id: AccountId) -> Result<(), LedgerError>;

    /// Append an entry to a loan's event log
    fn append_event(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        kind: LoanEventKind,
        now: DateTime<Utc>,
    ) -> Result<LoanEvent, LedgerError>;

    /// Record a deletion audit snapshot, assigning its id and timestamp
    fn insert_deletion(&self, record: LoanDeletion) -> Result<LoanDeletion, LedgerError>;

    /// All loans owned by an account
    fn loans_for(&self, account_id: AccountId) -> Vec<Loan>;

    /// A loan's event history in append order
    fn events_for(&self, loan_id: LoanId) -> Vec<LoanEvent>;

    /// Deletion audit records referencing a loan
    fn deletions_for(&self, loan_id: LoanId) -> Vec<LoanDeletion>;
}
