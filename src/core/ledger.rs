//! Ledger mutator: atomic balance changes and their audit trail
//!
//! This module provides the `Ledger`, the component through which every
//! plain balance mutation flows: deposits, withdrawals, and two-party
//! transfers. Each mutation happens under the account's row lock and
//! leaves an append-only audit row behind.
//!
//! A transfer is two sequential single-account mutations, not one
//! two-row transaction, so a failure between the legs is repaired by an
//! explicit compensating credit of the source account rather than a
//! store-level rollback.

use crate::core::saga::{Saga, Step};
use crate::core::traits::AccountDirectory;
use crate::types::{
    AccountId, LedgerError, Transaction, TransactionAction, Transfer,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Performs atomic balance changes and records their audit trail
pub struct Ledger<D: AccountDirectory> {
    directory: Arc<D>,
    transactions: RwLock<Vec<Transaction>>,
    transfers: RwLock<Vec<Transfer>>,
    next_transaction_id: AtomicU64,
    next_transfer_id: AtomicU64,
}

impl<D: AccountDirectory + 'static> Ledger<D> {
    /// Create a ledger over the given account directory
    pub fn new(directory: Arc<D>) -> Self {
        Ledger {
            directory,
            transactions: RwLock::new(Vec::new()),
            transfers: RwLock::new(Vec::new()),
            next_transaction_id: AtomicU64::new(1),
            next_transfer_id: AtomicU64::new(1),
        }
    }

    /// Credit funds to an account
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive amount, NotFound
    /// for an unknown account, and an overflow error if the balance
    /// cannot hold the result.
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        performed_by: &str,
    ) -> Result<Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }

        self.directory.update(account_id, None, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::overflow("deposit", account_id))?;
            Ok(())
        })?;

        self.record_transaction(account_id, TransactionAction::Deposit, amount, performed_by)
    }

    /// Debit funds from an account
    ///
    /// The balance check happens under the account's row lock, so a
    /// concurrent withdrawal cannot drive the balance negative.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive amount or an
    /// amount exceeding the current balance.
    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        performed_by: &str,
    ) -> Result<Transaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }

        self.directory.update(account_id, None, |account| {
            if account.balance < amount {
                return Err(LedgerError::insufficient_funds());
            }
            account.balance = account
                .balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::overflow("withdraw", account_id))?;
            Ok(())
        })?;

        self.record_transaction(account_id, TransactionAction::Withdraw, amount, performed_by)
    }

    /// Move funds between two accounts, destination resolved by email
    ///
    /// Runs as a two-step saga: debit the source, credit the
    /// destination. If the credit fails the debit is compensated and
    /// the credit's error is surfaced; if the compensation itself fails
    /// the ledger is left inconsistent and an integrity error is
    /// returned instead. The transfer audit row is written only after
    /// both legs succeed.
    ///
    /// # Errors
    ///
    /// NotFound for an unknown destination address; validation errors
    /// for self-transfer, non-positive amount, or insufficient source
    /// balance; the failing leg's error (or an integrity error) on a
    /// partial failure.
    pub fn transfer(
        &self,
        from_account_id: AccountId,
        to_email: &str,
        amount: Decimal,
    ) -> Result<Transfer, LedgerError> {
        let destination = self.directory.get_by_email(to_email)?;
        if destination.id == from_account_id {
            return Err(LedgerError::validation(
                "to account",
                "cannot be your own account",
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }

        let source = self.directory.get(from_account_id)?;
        if source.balance < amount {
            return Err(LedgerError::insufficient_funds());
        }

        let to_account_id = destination.id;
        let debit = {
            let directory = Arc::clone(&self.directory);
            let undo_directory = Arc::clone(&self.directory);
            Step::new(
                "debit source",
                move || {
                    directory
                        .update(from_account_id, None, |account| {
                            if account.balance < amount {
                                return Err(LedgerError::insufficient_funds());
                            }
                            account.balance = account.balance.checked_sub(amount).ok_or_else(
                                || LedgerError::overflow("transfer debit", from_account_id),
                            )?;
                            Ok(())
                        })
                        .map(|_| ())
                },
                move || {
                    undo_directory
                        .update(from_account_id, None, |account| {
                            account.balance = account.balance.checked_add(amount).ok_or_else(
                                || LedgerError::overflow("transfer compensation", from_account_id),
                            )?;
                            Ok(())
                        })
                        .map(|_| ())
                },
            )
        };
        let credit = {
            let directory = Arc::clone(&self.directory);
            Step::irreversible("credit destination", move || {
                directory
                    .update(to_account_id, None, |account| {
                        account.balance = account
                            .balance
                            .checked_add(amount)
                            .ok_or_else(|| LedgerError::overflow("transfer credit", to_account_id))?;
                        Ok(())
                    })
                    .map(|_| ())
            })
        };

        Saga::new("transfer").step(debit).step(credit).run()?;

        let row = Transfer {
            id: self.next_transfer_id.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            from_account_id,
            to_account_id,
            amount,
        };
        self.transfers
            .write()
            .map_err(|_| LedgerError::transient("record transfer", "journal poisoned"))?
            .push(row.clone());
        Ok(row)
    }

    /// Transactions touching the given account, oldest first
    pub fn transactions_for(&self, account_id: AccountId) -> Vec<Transaction> {
        self.transactions
            .read()
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.account_id == account_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transfers the given account participated in, oldest first
    pub fn transfers_for(&self, account_id: AccountId) -> Vec<Transfer> {
        self.transfers
            .read()
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        row.from_account_id == account_id || row.to_account_id == account_id
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record_transaction(
        &self,
        account_id: AccountId,
        action: TransactionAction,
        amount: Decimal,
        performed_by: &str,
    ) -> Result<Transaction, LedgerError> {
        let row = Transaction {
            id: self.next_transaction_id.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            account_id,
            action,
            amount,
            performed_by: performed_by.to_string(),
        };
        self.transactions
            .write()
            .map_err(|_| LedgerError::transient("record transaction", "journal poisoned"))?
            .push(row.clone());
        Ok(row)
    }
}
