//! Transaction and transfer audit rows
//!
//! This module defines the append-only records written alongside every
//! balance mutation: deposit/withdraw transactions and two-party transfers.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transaction identifier
pub type TransactionId = u64;

/// Transfer identifier
pub type TransferId = u64;

/// Direction of a single-account balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionAction {
    /// Credit funds to an account
    Deposit,

    /// Debit funds from an account
    ///
    /// Requires a sufficient balance; the ledger rejects a withdrawal
    /// that would leave the balance negative.
    Withdraw,
}

impl std::fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionAction::Deposit => write!(f, "DEPOSIT"),
            TransactionAction::Withdraw => write!(f, "WITHDRAW"),
        }
    }
}

/// Deposit/withdraw audit row
///
/// Created atomically with the corresponding balance mutation and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Row identifier
    pub id: TransactionId,

    /// When the mutation was applied
    pub created_at: DateTime<Utc>,

    /// The account whose balance moved
    pub account_id: AccountId,

    /// Whether funds were credited or debited
    pub action: TransactionAction,

    /// Amount moved, always positive
    pub amount: Decimal,

    /// Who performed the operation (an operator name or the account
    /// holder themselves); free text supplied by the caller
    pub performed_by: String,
}

/// Two-party transfer audit row
///
/// Written only after both legs of the transfer have succeeded, so the
/// presence of a row implies the money actually moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Row identifier
    pub id: TransferId,

    /// When the transfer completed
    pub created_at: DateTime<Utc>,

    /// Source account
    pub from_account_id: AccountId,

    /// Destination account
    pub to_account_id: AccountId,

    /// Amount moved, always positive
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display_matches_persisted_form() {
        assert_eq!(TransactionAction::Deposit.to_string(), "DEPOSIT");
        assert_eq!(TransactionAction::Withdraw.to_string(), "WITHDRAW");
    }
}
