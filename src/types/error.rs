//! Error types for the bank ledger engine
//!
//! This module defines all error types that can occur during ledger
//! operations, following the taxonomy the engine's callers dispatch on:
//!
//! - **Validation**: field-tagged, caller-correctable (bad amount,
//!   insufficient funds, empty reason)
//! - **NotFound**: entity absent, or present but owned by someone else
//! - **Conflict**: version mismatch on an optimistic update
//! - **Transient**: store timeout or lock contention; retried only where
//!   a retry policy is explicitly applied
//! - **Integrity**: an invariant broken mid-operation, e.g. a failed
//!   compensation after a partial transfer
//! - **Overflow**: checked arithmetic failed while mutating a balance

use thiserror::Error;

/// Main error type for the ledger engine
///
/// Validation and not-found errors are returned immediately without
/// retry. Transient store errors abort multi-step operations and
/// surface the first failure, except where a compensating action or an
/// explicit retry policy is defined.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A caller-supplied field failed validation
    ///
    /// The field name matches what an API layer would echo back in a
    /// structured field-error payload.
    #[error("{field}: {message}")]
    Validation {
        /// The offending field
        field: String,
        /// Why it was rejected
        message: String,
    },

    /// The entity does not exist, or is not owned by the caller
    ///
    /// Ownership mismatches are deliberately indistinguishable from
    /// absence so a caller cannot probe other accounts' records.
    #[error("{entity} not found")]
    NotFound {
        /// Entity kind ("account", "loan", "loan request", ...)
        entity: &'static str,
    },

    /// An optimistic update lost the race
    #[error("version conflict on {entity} {id}: expected {expected}, found {found}")]
    Conflict {
        /// Entity kind
        entity: &'static str,
        /// Row identifier
        id: u64,
        /// The version the caller read
        expected: u32,
        /// The version actually stored
        found: u32,
    },

    /// The store failed in a way that may succeed on retry
    ///
    /// Timeouts and lock contention land here. Only the loan deletion
    /// path retries these; everywhere else they surface directly.
    #[error("transient store failure during {operation}: {message}")]
    Transient {
        /// What the store was asked to do
        operation: String,
        /// The underlying failure
        message: String,
    },

    /// A ledger invariant was violated mid-operation
    ///
    /// The ledger may be in a detectably inconsistent state; the
    /// condition is logged at error level when raised.
    #[error("integrity violation: {message}")]
    Integrity {
        /// What went wrong
        message: String,
    },

    /// Checked arithmetic failed while mutating a balance
    #[error("arithmetic overflow in {operation} for account {account}")]
    Overflow {
        /// Operation that would overflow
        operation: String,
        /// Account being mutated
        account: u64,
    },
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a field-tagged validation error
    pub fn validation(field: &str, message: &str) -> Self {
        LedgerError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// The validation error every balance check produces
    pub fn insufficient_funds() -> Self {
        LedgerError::validation("account balance", "insufficient funds")
    }

    /// Create a NotFound error for the given entity kind
    pub fn not_found(entity: &'static str) -> Self {
        LedgerError::NotFound { entity }
    }

    /// Create a Conflict error
    pub fn conflict(entity: &'static str, id: u64, expected: u32, found: u32) -> Self {
        LedgerError::Conflict {
            entity,
            id,
            expected,
            found,
        }
    }

    /// Create a Transient store error
    pub fn transient(operation: &str, message: &str) -> Self {
        LedgerError::Transient {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an Integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        LedgerError::Integrity {
            message: message.into(),
        }
    }

    /// Create an Overflow error
    pub fn overflow(operation: &str, account: u64) -> Self {
        LedgerError::Overflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Whether a bounded-retry policy may re-attempt the failed call
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transient { .. })
    }

    /// Whether the error is caller-correctable input rejection
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation { .. })
    }
}
