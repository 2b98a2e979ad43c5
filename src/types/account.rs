//! Account-related types for the bank ledger engine
//!
//! This module defines the Account record and related identifiers
//! for tracking a customer's currency holdings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account identifier
///
/// Allocated sequentially by the account store, starting at 1.
/// 0 is never a valid account id.
pub type AccountId = u64;

/// Monotonic row version
///
/// Incremented by exactly 1 on every successful mutation. Used for
/// optimistic concurrency: a caller may pass the version it last read,
/// and the mutation is rejected with a conflict if the row has moved on.
pub type Version = u32;

/// A customer's currency holding
///
/// Invariant: `balance` is never observable below zero. The account
/// store refuses to persist a mutation that would leave it negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier, unique across the ledger
    pub id: AccountId,

    /// Display name
    pub name: String,

    /// Contact address, unique across accounts; transfers resolve
    /// their destination through it
    pub email: String,

    /// Current balance with fixed-point precision
    pub balance: Decimal,

    /// Whether the account has completed activation
    pub activated: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Row version, incremented on every mutation
    pub version: Version,
}

impl Account {
    /// Create a new account with a zero balance, not yet activated
    pub fn new(id: AccountId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Account {
            id,
            name: name.into(),
            email: email.into(),
            balance: Decimal::ZERO,
            activated: false,
            created_at: Utc::now(),
            version: 1,
        }
    }
}
