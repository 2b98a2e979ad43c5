//! Concurrent in-memory account store
//!
//! This module provides the `AccountStore`, the in-memory
//! implementation of [`AccountDirectory`]. It uses `DashMap` for
//! per-account entry locks: holding the entry during an update is the
//! in-memory analogue of a `SELECT ... FOR UPDATE` row lock, so
//! concurrent mutators of the same account serialize while different
//! accounts proceed in parallel.

use crate::core::traits::AccountDirectory;
use crate::types::{Account, AccountId, LedgerError, Version};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe account storage with per-row locking
///
/// Mutations go through [`AccountStore::update`] (via the
/// [`AccountDirectory`] trait), which runs the caller's closure on a
/// draft of the row and persists it only if the closure succeeds and
/// the resulting balance is non-negative. Every persisted mutation
/// increments the row version by exactly 1.
pub struct AccountStore {
    accounts: DashMap<AccountId, Account>,
    emails: DashMap<String, AccountId>,
    next_id: AtomicU64,
}

impl AccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        AccountStore {
            accounts: DashMap::new(),
            emails: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new account with a zero balance
    ///
    /// # Errors
    ///
    /// Returns a validation error on an empty name or an email address
    /// already registered to another account.
    pub fn create(&self, name: &str, email: &str) -> Result<Account, LedgerError> {
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name", "must be given"));
        }
        if email.trim().is_empty() {
            return Err(LedgerError::validation("email", "must be given"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // The email index entry doubles as the uniqueness claim; whoever
        // inserts it first wins.
        let claimed = *self.emails.entry(email.to_string()).or_insert(id);
        if claimed != id {
            return Err(LedgerError::validation(
                "email",
                "a user with this email address already exists",
            ));
        }

        let account = Account::new(id, name, email);
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    /// Mark an account as activated
    pub fn activate(&self, id: AccountId) -> Result<Account, LedgerError> {
        AccountDirectory::update(self, id, None, |account| {
            account.activated = true;
            Ok(())
        })
    }

    /// Number of registered accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no accounts are registered
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for AccountStore {
    fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| LedgerError::not_found("account"))
    }

    fn get_by_email(&self, email: &str) -> Result<Account, LedgerError> {
        let id = self
            .emails
            .get(email)
            .map(|entry| *entry)
            .ok_or_else(|| LedgerError::not_found("account"))?;
        self.get(id)
    }

    fn update<F>(
        &self,
        id: AccountId,
        expected_version: Option<Version>,
        f: F,
    ) -> Result<Account, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<(), LedgerError>,
    {
        // The entry guard is the row lock; it is held for the whole
        // read-modify-write.
        let mut entry = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("account"))?;

        if let Some(expected) = expected_version {
            if entry.version != expected {
                return Err(LedgerError::conflict("account", id, expected, entry.version));
            }
        }

        let mut draft = entry.clone();
        f(&mut draft)?;

        if draft.balance < Decimal::ZERO {
            return Err(LedgerError::integrity(format!(
                "refusing to persist negative balance {} for account {id}",
                draft.balance
            )));
        }

        draft.version = entry.version + 1;
        *entry = draft;
        Ok(entry.clone())
    }
}
