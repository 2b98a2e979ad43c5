//! Concurrent in-memory loan store
//!
//! In-memory implementation of [`LoanStore`]: loan rows in a `DashMap`
//! (per-loan entry locks, same row-lock discipline as the account
//! store), with the event log and deletion audit records as append-only
//! journals.

use crate::core::traits::LoanStore;
use crate::types::{
    AccountId, LedgerError, Loan, LoanDeletion, LoanEvent, LoanEventKind, LoanId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Thread-safe loan storage with per-row locking and append-only logs
pub struct MemoryLoanStore {
    loans: DashMap<LoanId, Loan>,
    events: RwLock<Vec<LoanEvent>>,
    deletions: RwLock<Vec<LoanDeletion>>,
    next_loan_id: AtomicU64,
    next_event_id: AtomicU64,
    next_deletion_id: AtomicU64,
}

impl MemoryLoanStore {
    /// Create an empty store
    pub fn new() -> Self {
        MemoryLoanStore {
            loans: DashMap::new(),
            events: RwLock::new(Vec::new()),
            deletions: RwLock::new(Vec::new()),
            next_loan_id: AtomicU64::new(1),
            next_event_id: AtomicU64::new(1),
            next_deletion_id: AtomicU64::new(1),
        }
    }

    /// Number of open loans
    pub fn len(&self) -> usize {
        self.loans.len()
    }

    /// Whether no loans are open
    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

impl Default for MemoryLoanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanStore for MemoryLoanStore {
    fn insert(
        &self,
        account_id: AccountId,
        amount: Decimal,
        daily_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Loan, LedgerError> {
        let id = self.next_loan_id.fetch_add(1, Ordering::Relaxed);
        let loan = Loan {
            id,
            created_at: now,
            account_id,
            amount,
            daily_rate,
            remaining: amount,
            last_updated_at: now,
            version: 1,
        };
        self.loans.insert(id, loan.clone());
        Ok(loan)
    }

    fn get(&self, loan_id: LoanId, account_id: AccountId) -> Result<Loan, LedgerError> {
        self.loans
            .get(&loan_id)
            .filter(|loan| loan.account_id == account_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| LedgerError::not_found("loan"))
    }

    fn update<F>(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        f: F,
    ) -> Result<Loan, LedgerError>
    where
        F: FnOnce(&mut Loan) -> Result<(), LedgerError>,
    {
        let mut entry = self
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| LedgerError::not_found("loan"))?;
        if entry.account_id != account_id {
            return Err(LedgerError::not_found("loan"));
        }

        let mut draft = entry.clone();
        f(&mut draft)?;

        if draft.remaining < Decimal::ZERO {
            return Err(LedgerError::integrity(format!(
                "refusing to persist negative remaining balance {} for loan {loan_id}",
                draft.remaining
            )));
        }

        draft.version = entry.version + 1;
        *entry = draft;
        Ok(entry.clone())
    }

    fn delete(&self, loan_id: LoanId, account_id: AccountId) -> Result<(), LedgerError> {
        let removed = self
            .loans
            .remove_if(&loan_id, |_, loan| loan.account_id == account_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(LedgerError::not_found("loan")),
        }
    }

    fn append_event(
        &self,
        loan_id: LoanId,
        account_id: AccountId,
        kind: LoanEventKind,
        now: DateTime<Utc>,
    ) -> Result<LoanEvent, LedgerError> {
        let event = LoanEvent {
            id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            created_at: now,
            loan_id,
            account_id,
            kind,
        };
        self.events
            .write()
            .map_err(|_| LedgerError::transient("append loan event", "event log poisoned"))?
            .push(event.clone());
        Ok(event)
    }

    fn insert_deletion(&self, mut record: LoanDeletion) -> Result<LoanDeletion, LedgerError> {
        record.id = self.next_deletion_id.fetch_add(1, Ordering::Relaxed);
        record.created_at = Utc::now();
        self.deletions
            .write()
            .map_err(|_| LedgerError::transient("record loan deletion", "audit log poisoned"))?
            .push(record.clone());
        Ok(record)
    }

    fn loans_for(&self, account_id: AccountId) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.clone())
            .collect();
        loans.sort_by_key(|loan| loan.id);
        loans
    }

    fn events_for(&self, loan_id: LoanId) -> Vec<LoanEvent> {
        self.events
            .read()
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.loan_id == loan_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deletions_for(&self, loan_id: LoanId) -> Vec<LoanDeletion> {
        self.deletions
            .read()
            .map(|deletions| {
                deletions
                    .iter()
                    .filter(|record| record.loan_id == loan_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_loan() -> (MemoryLoanStore, Loan) {
        let store = MemoryLoanStore::new();
        let loan = store
            .insert(1, Decimal::new(20000, 2), Decimal::new(5, 0), Utc::now())
            .unwrap();
        (store, loan)
    }

    #[test]
    fn test_insert_sets_remaining_to_principal() {
        let (_, loan) = store_with_loan();

        assert_eq!(loan.remaining, loan.amount);
        assert_eq!(loan.version, 1);
        assert_eq!(loan.created_at, loan.last_updated_at);
    }

    #[test]
    fn test_get_with_wrong_owner_is_not_found() {
        let (store, loan) = store_with_loan();

        assert!(store.get(loan.id, 1).is_ok());
        assert_eq!(
            store.get(loan.id, 2).unwrap_err(),
            LedgerError::not_found("loan")
        );
    }

    #[test]
    fn test_update_bumps_version_and_persists() {
        let (store, loan) = store_with_loan();

        let updated = store
            .update(loan.id, 1, |l| {
                l.remaining = Decimal::new(15000, 2);
                Ok(())
            })
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(store.get(loan.id, 1).unwrap().remaining, Decimal::new(15000, 2));
    }

    #[test]
    fn test_update_refuses_negative_remaining() {
        let (store, loan) = store_with_loan();

        let result = store.update(loan.id, 1, |l| {
            l.remaining = Decimal::new(-100, 2);
            Ok(())
        });

        assert!(matches!(result.unwrap_err(), LedgerError::Integrity { .. }));
        assert_eq!(store.get(loan.id, 1).unwrap().version, 1);
    }

    #[test]
    fn test_delete_respects_ownership() {
        let (store, loan) = store_with_loan();

        assert_eq!(
            store.delete(loan.id, 2).unwrap_err(),
            LedgerError::not_found("loan")
        );
        assert!(store.delete(loan.id, 1).is_ok());
        assert_eq!(
            store.get(loan.id, 1).unwrap_err(),
            LedgerError::not_found("loan")
        );
    }

    #[test]
    fn test_events_are_returned_in_append_order() {
        let (store, loan) = store_with_loan();
        let now = Utc::now();

        store
            .append_event(loan.id, 1, LoanEventKind::Taken(loan.amount), now)
            .unwrap();
        store
            .append_event(loan.id, 1, LoanEventKind::Paid(Decimal::new(5000, 2)), now)
            .unwrap();

        let events = store.events_for(loan.id);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, LoanEventKind::Taken(_)));
        assert!(matches!(events[1].kind, LoanEventKind::Paid(_)));
        assert!(events[0].id < events[1].id);
    }

    #[test]
    fn test_insert_deletion_assigns_identity() {
        let (store, loan) = store_with_loan();
        let record = LoanDeletion {
            id: 0,
            created_at: Utc::now(),
            loan_created_at: loan.created_at,
            loan_last_updated_at: loan.last_updated_at,
            loan_id: loan.id,
            debtor_id: loan.account_id,
            deleted_by: 9,
            amount: loan.amount,
            daily_rate: loan.daily_rate,
            remaining: loan.remaining,
            reason: "written off".to_string(),
        };

        let stored = store.insert_deletion(record).unwrap();

        assert_eq!(stored.id, 1);
        assert_eq!(store.deletions_for(loan.id).len(), 1);
    }

    #[test]
    fn test_loans_for_filters_by_owner() {
        let store = MemoryLoanStore::new();
        let now = Utc::now();
        store.insert(1, Decimal::TEN, Decimal::ZERO, now).unwrap();
        store.insert(2, Decimal::TEN, Decimal::ZERO, now).unwrap();
        store.insert(1, Decimal::ONE, Decimal::ZERO, now).unwrap();

        let loans = store.loans_for(1);

        assert_eq!(loans.len(), 2);
        assert!(loans.iter().all(|loan| loan.account_id == 1));
    }
}
