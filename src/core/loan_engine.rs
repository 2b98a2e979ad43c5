//! Loan lifecycle: opening, interest-bearing payments, audited deletion
//!
//! This module provides the `LoanEngine`, which owns every mutation of a
//! loan after it exists: applying payments with lazy simple interest,
//! and deleting a loan behind a mandatory audit record.
//!
//! Interest accrues lazily. Nothing runs on a timer; each payment first
//! folds the interest accumulated since the loan row was last touched
//! into the amount owed, then applies the payment against that total.
//!
//! A payment spans two rows (the loan and the payer's account) without a
//! shared transaction, so the loan mutation is explicitly rolled back if
//! the payer debit fails.

use crate::core::retry::RetryPolicy;
use crate::core::traits::{AccountDirectory, LoanStore};
use crate::types::{
    AccountId, LedgerError, Loan, LoanDeletion, LoanEvent, LoanEventKind, LoanId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

/// Days elapsed between two instants, whole and fractional, never
/// negative
///
/// Interest accrues continuously: 36 hours is 1.5 days, not 1. A clock
/// that appears to run backwards yields zero elapsed time and therefore
/// zero interest.
fn elapsed_days(since: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    let seconds = (now - since).num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(86_400)
}

/// Drives the loan lifecycle over an account directory and a loan store
pub struct LoanEngine<D: AccountDirectory, S: LoanStore> {
    directory: Arc<D>,
    store: S,
    retry: RetryPolicy,
}

impl<D: AccountDirectory, S: LoanStore> LoanEngine<D, S> {
    /// Create an engine with the default retry policy for audit writes
    pub fn new(directory: Arc<D>, store: S) -> Self {
        LoanEngine {
            directory,
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Create an engine with an explicit retry policy
    pub fn with_retry(directory: Arc<D>, store: S, retry: RetryPolicy) -> Self {
        LoanEngine {
            directory,
            store,
            retry,
        }
    }

    /// The underlying loan store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open a loan for an account
    ///
    /// The loan starts with `remaining` equal to the principal and a
    /// "taken" entry in its event log.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive principal or a
    /// negative daily rate, and NotFound for an unknown account.
    pub fn open_loan(
        &self,
        account_id: AccountId,
        amount: Decimal,
        daily_rate: Decimal,
    ) -> Result<Loan, LedgerError> {
        self.open_loan_at(account_id, amount, daily_rate, Utc::now())
    }

    /// [`open_loan`](Self::open_loan) with an explicit clock
    pub fn open_loan_at(
        &self,
        account_id: AccountId,
        amount: Decimal,
        daily_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Loan, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }
        if daily_rate < Decimal::ZERO {
            return Err(LedgerError::validation("daily rate", "must not be negative"));
        }
        self.directory.get(account_id)?;

        let loan = self.store.insert(account_id, amount, daily_rate, now)?;
        if let Err(err) = self
            .store
            .append_event(loan.id, account_id, LoanEventKind::Taken(amount), now)
        {
            if let Err(undo_err) = self.store.delete(loan.id, account_id) {
                error!(
                    loan_id = loan.id,
                    error = %undo_err,
                    "failed to remove loan after event log write failed"
                );
                return Err(LedgerError::integrity(format!(
                    "loan {} exists without a taken event: {undo_err}",
                    loan.id
                )));
            }
            return Err(err);
        }

        info!(loan_id = loan.id, account_id, %amount, %daily_rate, "loan opened");
        Ok(loan)
    }

    /// Apply a payment to a loan
    ///
    /// Interest accrued since the loan was last touched is added to the
    /// amount owed first; the payment then reduces that total. A payment
    /// larger than the total owed is capped at it, so a loan is settled
    /// by paying at most `remaining + interest`, never more. The payer's
    /// balance is debited by the amount actually applied.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive payment, a loan
    /// already paid off, or a payer balance below the payment; NotFound
    /// for a loan the account does not own. If the payer debit fails
    /// after the loan row was updated, the loan row is restored and the
    /// debit's error is returned.
    pub fn make_payment(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        payment: Decimal,
    ) -> Result<LoanEvent, LedgerError> {
        self.make_payment_at(loan_id, account_id, payment, Utc::now())
    }

    /// [`make_payment`](Self::make_payment) with an explicit clock
    pub fn make_payment_at(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        payment: Decimal,
        now: DateTime<Utc>,
    ) -> Result<LoanEvent, LedgerError> {
        if payment <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }

        let loan = self.store.get(loan_id, account_id)?;
        if loan.remaining == Decimal::ZERO {
            return Err(LedgerError::validation("loan", "is already paid off"));
        }

        let payer = self.directory.get(account_id)?;
        if payer.balance < payment {
            return Err(LedgerError::insufficient_funds());
        }

        // Fold accrued interest into the debt, then apply the payment,
        // all under the loan's row lock. The paid-off check and the
        // pre-mutation snapshot both come from the locked row, never
        // from the unlocked read above, so a payment that landed in
        // between is neither paid against twice nor overwritten by the
        // rollback below.
        let mut prior_remaining = Decimal::ZERO;
        let mut prior_updated_at = now;
        let mut paid = Decimal::ZERO;
        self.store.update(loan_id, account_id, |loan| {
            if loan.remaining == Decimal::ZERO {
                return Err(LedgerError::validation("loan", "is already paid off"));
            }
            prior_remaining = loan.remaining;
            prior_updated_at = loan.last_updated_at;
            let days = elapsed_days(loan.last_updated_at, now);
            let interest = days
                .checked_mul(loan.remaining)
                .and_then(|x| x.checked_mul(loan.daily_rate))
                .and_then(|x| x.checked_div(Decimal::ONE_HUNDRED))
                .ok_or_else(|| LedgerError::overflow("loan interest", account_id))?;
            let total_owed = loan
                .remaining
                .checked_add(interest)
                .ok_or_else(|| LedgerError::overflow("loan interest", account_id))?;

            paid = payment.min(total_owed);
            loan.remaining = total_owed
                .checked_sub(payment)
                .ok_or_else(|| LedgerError::overflow("loan payment", account_id))?
                .max(Decimal::ZERO);
            loan.last_updated_at = now;
            Ok(())
        })?;

        // Debit the payer by what was actually applied. The balance is
        // re-checked under the account's row lock; the earlier check
        // only filtered the obvious rejection before touching the loan.
        let debit = self.directory.update(account_id, None, |account| {
            if account.balance < paid {
                return Err(LedgerError::insufficient_funds());
            }
            account.balance = account
                .balance
                .checked_sub(paid)
                .ok_or_else(|| LedgerError::overflow("loan payment", account_id))?;
            Ok(())
        });

        if let Err(debit_err) = debit {
            let restore = self.store.update(loan_id, account_id, |loan| {
                loan.remaining = prior_remaining;
                loan.last_updated_at = prior_updated_at;
                Ok(())
            });
            if let Err(restore_err) = restore {
                error!(
                    loan_id,
                    account_id,
                    error = %restore_err,
                    "failed to restore loan after payer debit failed"
                );
                return Err(LedgerError::integrity(format!(
                    "loan {loan_id} updated but payer debit failed and restore failed: \
                     {restore_err}"
                )));
            }
            return Err(debit_err);
        }

        match self
            .store
            .append_event(loan_id, account_id, LoanEventKind::Paid(paid), now)
        {
            Ok(event) => {
                info!(loan_id, account_id, amount = %paid, "loan payment applied");
                Ok(event)
            }
            Err(append_err) => {
                let refund = self.directory.update(account_id, None, |account| {
                    account.balance = account
                        .balance
                        .checked_add(paid)
                        .ok_or_else(|| LedgerError::overflow("loan payment refund", account_id))?;
                    Ok(())
                });
                let restore = self.store.update(loan_id, account_id, |loan| {
                    loan.remaining = prior_remaining;
                    loan.last_updated_at = prior_updated_at;
                    Ok(())
                });
                if refund.is_err() || restore.is_err() {
                    error!(
                        loan_id,
                        account_id,
                        error = %append_err,
                        "failed to unwind payment after event log write failed"
                    );
                    return Err(LedgerError::integrity(format!(
                        "payment on loan {loan_id} applied without an event log entry: \
                         {append_err}"
                    )));
                }
                Err(append_err)
            }
        }
    }

    /// Delete a loan behind a mandatory audit record
    ///
    /// A snapshot of the loan is written to the deletion audit log
    /// before the row is removed; each of the two writes is retried
    /// under the engine's retry policy. If the audit write ultimately
    /// fails the loan is left untouched. If the delete ultimately fails
    /// the audit record remains, which is the intended bias: an audit
    /// record without a deletion is noise, a deletion without an audit
    /// record is a hole.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero id or a blank reason,
    /// NotFound for a loan the debtor does not own, and the last store
    /// error if either write exhausts its retries.
    pub fn delete_loan(
        &self,
        loan_id: LoanId,
        debtor_id: AccountId,
        deleted_by: AccountId,
        reason: &str,
    ) -> Result<LoanDeletion, LedgerError> {
        if loan_id == 0 {
            return Err(LedgerError::validation("loan ID", "must be given"));
        }
        if debtor_id == 0 {
            return Err(LedgerError::validation("debtor ID", "must be given"));
        }
        if deleted_by == 0 {
            return Err(LedgerError::validation("deleted by ID", "must be given"));
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::validation("reason", "must be given"));
        }

        let loan = self.store.get(loan_id, debtor_id)?;
        let snapshot = LoanDeletion {
            id: 0,
            created_at: Utc::now(),
            loan_created_at: loan.created_at,
            loan_last_updated_at: loan.last_updated_at,
            loan_id: loan.id,
            debtor_id: loan.account_id,
            deleted_by,
            amount: loan.amount,
            daily_rate: loan.daily_rate,
            remaining: loan.remaining,
            reason: reason.to_string(),
        };

        let record = self
            .retry
            .run("record loan deletion", || {
                self.store.insert_deletion(snapshot.clone())
            })?;
        self.retry
            .run("delete loan", || self.store.delete(loan_id, debtor_id))?;

        info!(loan_id, debtor_id, deleted_by, reason, "loan deleted");
        Ok(record)
    }

    /// All loans owned by an account
    pub fn loans_for(&self, account_id: AccountId) -> Vec<Loan> {
        self.store.loans_for(account_id)
    }

    /// A loan's event history in append order
    pub fn events_for(&self, loan_id: LoanId) -> Vec<LoanEvent> {
        self.store.events_for(loan_id)
    }

    /// Deletion audit records referencing a loan
    pub fn deletions_for(&self, loan_id: LoanId) -> Vec<LoanDeletion> {
        self.store.deletions_for(loan_id)
    }
}
