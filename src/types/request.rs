//! Loan request types
//!
//! A loan request is a proposal to open a loan, resolved through a
//! PENDING -> ACCEPTED | DECLINED workflow. Transitions are
//! one-directional: once a request reaches a terminal status it is
//! never mutated again.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loan request identifier
pub type RequestId = u64;

/// Where a loan request stands in its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    /// Submitted, awaiting a decision
    Pending,

    /// Approved; the requested amount was credited and a loan opened
    Accepted,

    /// Rejected with no side effects
    Declined,
}

impl RequestStatus {
    /// Whether the status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::Declined)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Accepted => write!(f, "ACCEPTED"),
            RequestStatus::Declined => write!(f, "DECLINED"),
        }
    }
}

/// A proposal to open a loan, subject to approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Request identifier
    pub id: RequestId,

    /// When the request was submitted
    pub created_at: DateTime<Utc>,

    /// The requesting account
    pub account_id: AccountId,

    /// Amount asked for
    pub amount: Decimal,

    /// Proposed daily interest rate (percentage)
    pub daily_rate: Decimal,

    /// Current workflow status
    pub status: RequestStatus,
}
