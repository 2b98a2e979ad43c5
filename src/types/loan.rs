//! Loan-related types for the bank ledger engine
//!
//! A loan is stored as a materialized projection row (the current
//! remaining balance) plus an append-only event log recording the money
//! taken and every payment made against it. Deleting a loan leaves an
//! immutable `LoanDeletion` audit snapshot behind.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loan identifier
pub type LoanId = u64;

/// Loan event identifier
pub type LoanEventId = u64;

/// Loan deletion audit record identifier
pub type LoanDeletionId = u64;

/// An outstanding balance owed by an account, accruing simple daily
/// interest on the remaining amount
///
/// Invariant: `remaining` never goes below zero. `last_updated_at`
/// advances on every payment so that interest is charged only on the
/// interval since the balance last changed, never re-charged on paid
/// portions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Loan identifier
    pub id: LoanId,

    /// When the loan was opened
    pub created_at: DateTime<Utc>,

    /// The owing account
    pub account_id: AccountId,

    /// Original principal
    pub amount: Decimal,

    /// Daily interest rate as a percentage (5 means 5%/day); zero is
    /// allowed for interest-free loans
    pub daily_rate: Decimal,

    /// Remaining balance owed, including interest already materialized
    /// by previous payments
    pub remaining: Decimal,

    /// When `remaining` last changed
    pub last_updated_at: DateTime<Utc>,

    /// Row version, incremented on every mutation
    pub version: u32,
}

/// What a loan event records
///
/// The loan's history is an append-only log of these, with the current
/// `Loan::remaining` as the materialized projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action", content = "amount")]
pub enum LoanEventKind {
    /// Principal handed out when the loan was opened
    Taken(Decimal),

    /// A payment applied against the balance
    ///
    /// Never exceeds the total owed at the time of payment, even if the
    /// payer tendered more.
    Paid(Decimal),
}

impl LoanEventKind {
    /// The amount carried by the event, regardless of direction
    pub fn amount(&self) -> Decimal {
        match self {
            LoanEventKind::Taken(amount) | LoanEventKind::Paid(amount) => *amount,
        }
    }
}

/// One entry in a loan's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanEvent {
    /// Event identifier
    pub id: LoanEventId,

    /// When the event was recorded
    pub created_at: DateTime<Utc>,

    /// The loan this event belongs to
    pub loan_id: LoanId,

    /// The owing account, denormalized for per-account history queries
    pub account_id: AccountId,

    /// What happened and for how much
    pub kind: LoanEventKind,
}

/// Audit snapshot written before a loan row is destroyed
///
/// Committed durably before the loan itself is removed, so a failed
/// deletion leaves evidence an operator can reconcile against.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDeletion {
    /// Audit record identifier
    pub id: LoanDeletionId,

    /// When the deletion was recorded
    pub created_at: DateTime<Utc>,

    /// Snapshot of the loan's creation time
    pub loan_created_at: DateTime<Utc>,

    /// Snapshot of the loan's last update time
    pub loan_last_updated_at: DateTime<Utc>,

    /// The deleted loan
    pub loan_id: LoanId,

    /// The account that owed the loan
    pub debtor_id: AccountId,

    /// Who performed the deletion
    pub deleted_by: AccountId,

    /// Original principal at deletion time
    pub amount: Decimal,

    /// Daily interest rate at deletion time
    pub daily_rate: Decimal,

    /// Remaining balance at deletion time
    pub remaining: Decimal,

    /// Free-text justification supplied by the deleting actor
    pub reason: String,
}
