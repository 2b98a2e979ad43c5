//! Loan request intake and the PENDING to ACCEPTED/DECLINED state machine
//!
//! A request is the only path by which a loan comes into existence. It
//! starts PENDING; a reviewer either declines it or accepts it, and
//! acceptance disburses the principal to the account and opens the loan
//! in one operation.
//!
//! The status flip to ACCEPTED happens before the disbursement saga
//! runs and is not part of it. If the saga fails, the request stays
//! ACCEPTED with no loan behind it and the error surfaces to the
//! caller; the money movement itself is compensated. Re-running accept
//! on such a request reports it as not found, like any other
//! non-pending request.

use crate::core::loan_engine::LoanEngine;
use crate::core::saga::{Saga, Step};
use crate::core::traits::{AccountDirectory, LoanStore};
use crate::types::{AccountId, LedgerError, Loan, LoanRequest, RequestId, RequestStatus};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Accepts, declines, and tracks loan requests
pub struct LoanRequestService<D: AccountDirectory, S: LoanStore> {
    requests: DashMap<RequestId, LoanRequest>,
    next_id: AtomicU64,
    directory: Arc<D>,
    engine: Arc<LoanEngine<D, S>>,
}

impl<D, S> LoanRequestService<D, S>
where
    D: AccountDirectory + 'static,
    S: LoanStore + 'static,
{
    /// Create a service over the given directory and loan engine
    pub fn new(directory: Arc<D>, engine: Arc<LoanEngine<D, S>>) -> Self {
        LoanRequestService {
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
            directory,
            engine,
        }
    }

    /// Submit a new request, which starts PENDING
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive amount or a
    /// negative daily rate, and NotFound for an unknown account.
    pub fn submit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        daily_rate: Decimal,
    ) -> Result<LoanRequest, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount", "must be greater than 0"));
        }
        if daily_rate < Decimal::ZERO {
            return Err(LedgerError::validation("daily rate", "must not be negative"));
        }
        self.directory.get(account_id)?;

        let request = LoanRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            created_at: Utc::now(),
            account_id,
            amount,
            daily_rate,
            status: RequestStatus::Pending,
        };
        self.requests.insert(request.id, request.clone());
        info!(request_id = request.id, account_id, %amount, "loan request submitted");
        Ok(request)
    }

    /// Accept a pending request: disburse the principal and open the loan
    ///
    /// The status flips to ACCEPTED first, under the request's entry
    /// lock, so a concurrent accept of the same request loses with
    /// NotFound. The disbursement then runs as a saga: credit the
    /// account, open the loan. If opening the loan fails the credit is
    /// compensated, but the status is not rolled back; the request
    /// stays ACCEPTED without a loan and the failure surfaces.
    ///
    /// # Errors
    ///
    /// NotFound for an unknown, foreign, or non-pending request; the
    /// saga's error if disbursement fails.
    pub fn accept(&self, request_id: RequestId, account_id: AccountId) -> Result<Loan, LedgerError> {
        let (amount, daily_rate) = {
            let mut entry = self
                .requests
                .get_mut(&request_id)
                .ok_or_else(|| LedgerError::not_found("loan request"))?;
            if entry.account_id != account_id || entry.status != RequestStatus::Pending {
                return Err(LedgerError::not_found("loan request"));
            }
            entry.status = RequestStatus::Accepted;
            (entry.amount, entry.daily_rate)
        };

        let opened: Arc<Mutex<Option<Loan>>> = Arc::new(Mutex::new(None));
        let credit = {
            let directory = Arc::clone(&self.directory);
            let undo_directory = Arc::clone(&self.directory);
            Step::new(
                "credit account",
                move || {
                    directory
                        .update(account_id, None, |account| {
                            account.balance =
                                account.balance.checked_add(amount).ok_or_else(|| {
                                    LedgerError::overflow("loan disbursement", account_id)
                                })?;
                            Ok(())
                        })
                        .map(|_| ())
                },
                move || {
                    undo_directory
                        .update(account_id, None, |account| {
                            account.balance =
                                account.balance.checked_sub(amount).ok_or_else(|| {
                                    LedgerError::overflow("loan disbursement", account_id)
                                })?;
                            Ok(())
                        })
                        .map(|_| ())
                },
            )
        };
        let open = {
            let engine = Arc::clone(&self.engine);
            let opened = Arc::clone(&opened);
            Step::irreversible("open loan", move || {
                let loan = engine.open_loan(account_id, amount, daily_rate)?;
                *opened.lock().map_err(|_| {
                    LedgerError::transient("open loan", "result slot poisoned")
                })? = Some(loan);
                Ok(())
            })
        };

        Saga::new("accept loan request")
            .step(credit)
            .step(open)
            .run()?;

        let loan = opened
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| LedgerError::integrity("accepted request produced no loan"))?;
        info!(request_id, account_id, loan_id = loan.id, "loan request accepted");
        Ok(loan)
    }

    /// Decline a pending request
    ///
    /// # Errors
    ///
    /// NotFound for an unknown, foreign, or non-pending request.
    pub fn decline(
        &self,
        request_id: RequestId,
        account_id: AccountId,
    ) -> Result<LoanRequest, LedgerError> {
        let mut entry = self
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| LedgerError::not_found("loan request"))?;
        if entry.account_id != account_id || entry.status != RequestStatus::Pending {
            return Err(LedgerError::not_found("loan request"));
        }
        entry.status = RequestStatus::Declined;
        info!(request_id, account_id, "loan request declined");
        Ok(entry.clone())
    }

    /// Fetch a request owned by the given account
    pub fn get(&self, request_id: RequestId, account_id: AccountId) -> Result<LoanRequest, LedgerError> {
        self.requests
            .get(&request_id)
            .filter(|request| request.account_id == account_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| LedgerError::not_found("loan request"))
    }

    /// All requests submitted by an account, oldest first
    pub fn requests_for(&self, account_id: AccountId) -> Vec<LoanRequest> {
        let mut requests: Vec<LoanRequest> = self
            .requests
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.clone())
            .collect();
        requests.sort_by_key(|request| request.id);
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account_store::AccountStore;
    use crate::core::loan_store::MemoryLoanStore;
    use crate::core::retry::RetryPolicy;
    use crate::types::{
        Account, LoanDeletion, LoanEvent, LoanEventKind, LoanId,
    };
    use chrono::{DateTime, Utc};

    type Service = LoanRequestService<AccountStore, MemoryLoanStore>;

    fn service() -> (Arc<AccountStore>, Arc<LoanEngine<AccountStore, MemoryLoanStore>>, Service) {
        let directory = Arc::new(AccountStore::new());
        let engine = Arc::new(LoanEngine::with_retry(
            Arc::clone(&directory),
            MemoryLoanStore::new(),
            RetryPolicy::no_retries(),
        ));
        let service = LoanRequestService::new(Arc::clone(&directory), Arc::clone(&engine));
        (directory, engine, service)
    }

    fn account(directory: &AccountStore) -> Account {
        directory.create("Ada", "ada@example.com").unwrap()
    }

    #[test]
    fn test_submit_creates_pending_request() {
        let (directory, _, service) = service();
        let account = account(&directory);

        let request = service
            .submit(account.id, Decimal::new(20000, 2), Decimal::new(5, 0))
            .unwrap();

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.amount, Decimal::new(20000, 2));
        assert_eq!(service.requests_for(account.id).len(), 1);
    }

    #[test]
    fn test_submit_rejects_bad_input() {
        let (directory, _, service) = service();
        let account = account(&directory);

        assert!(service
            .submit(account.id, Decimal::ZERO, Decimal::ONE)
            .unwrap_err()
            .is_validation());
        assert!(service
            .submit(account.id, Decimal::ONE, Decimal::new(-1, 0))
            .unwrap_err()
            .is_validation());
        assert_eq!(
            service.submit(99, Decimal::ONE, Decimal::ONE).unwrap_err(),
            LedgerError::not_found("account")
        );
    }

    #[test]
    fn test_accept_disburses_and_opens_loan() {
        let (directory, engine, service) = service();
        let account = account(&directory);
        let request = service
            .submit(account.id, Decimal::new(20000, 2), Decimal::new(5, 0))
            .unwrap();

        let loan = service.accept(request.id, account.id).unwrap();

        assert_eq!(loan.account_id, account.id);
        assert_eq!(loan.amount, Decimal::new(20000, 2));
        assert_eq!(loan.remaining, Decimal::new(20000, 2));
        assert_eq!(
            directory.get(account.id).unwrap().balance,
            Decimal::new(20000, 2)
        );
        assert_eq!(
            service.get(request.id, account.id).unwrap().status,
            RequestStatus::Accepted
        );
        let events = engine.events_for(loan.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LoanEventKind::Taken(Decimal::new(20000, 2)));
    }

    #[test]
    fn test_accept_is_single_shot() {
        let (directory, _, service) = service();
        let account = account(&directory);
        let request = service
            .submit(account.id, Decimal::new(20000, 2), Decimal::ZERO)
            .unwrap();
        service.accept(request.id, account.id).unwrap();

        let result = service.accept(request.id, account.id);

        assert_eq!(result.unwrap_err(), LedgerError::not_found("loan request"));
        // No second disbursement
        assert_eq!(
            directory.get(account.id).unwrap().balance,
            Decimal::new(20000, 2)
        );
    }

    #[test]
    fn test_accept_foreign_request_is_not_found() {
        let (directory, _, service) = service();
        let owner = account(&directory);
        let stranger = directory.create("Ben", "ben@example.com").unwrap();
        let request = service
            .submit(owner.id, Decimal::new(20000, 2), Decimal::ZERO)
            .unwrap();

        let result = service.accept(request.id, stranger.id);

        assert_eq!(result.unwrap_err(), LedgerError::not_found("loan request"));
        assert_eq!(
            service.get(request.id, owner.id).unwrap().status,
            RequestStatus::Pending
        );
    }

    #[test]
    fn test_decline_is_terminal() {
        let (directory, _, service) = service();
        let account = account(&directory);
        let request = service
            .submit(account.id, Decimal::new(20000, 2), Decimal::ZERO)
            .unwrap();

        let declined = service.decline(request.id, account.id).unwrap();
        assert_eq!(declined.status, RequestStatus::Declined);

        // Neither accept nor a second decline can move it on
        assert_eq!(
            service.accept(request.id, account.id).unwrap_err(),
            LedgerError::not_found("loan request")
        );
        assert_eq!(
            service.decline(request.id, account.id).unwrap_err(),
            LedgerError::not_found("loan request")
        );
        assert_eq!(directory.get(account.id).unwrap().balance, Decimal::ZERO);
    }

    /// Loan store whose inserts always fail, so accepting a request
    /// disburses and then cannot open the loan.
    struct InsertAlwaysFails {
        inner: MemoryLoanStore,
    }

    impl LoanStore for InsertAlwaysFails {
        fn insert(
            &self,
            _account_id: AccountId,
            _amount: Decimal,
            _daily_rate: Decimal,
            _now: DateTime<Utc>,
        ) -> Result<crate::types::Loan, LedgerError> {
            Err(LedgerError::transient("insert loan", "store timeout"))
        }

        fn get(&self, loan_id: LoanId, account_id: AccountId) -> Result<crate::types::Loan, LedgerError> {
            self.inner.get(loan_id, account_id)
        }

        fn update<F>(
            &self,
            loan_id: LoanId,
            account_id: AccountId,
            f: F,
        ) -> Result<crate::types::Loan, LedgerError>
        where
            F: FnOnce(&mut crate::types::Loan) -> Result<(), LedgerError>,
        {
            self.inner.update(loan_id, account_id, f)
        }

        fn delete(&self, loan_id: LoanId, account_id: AccountId) -> Result<(), LedgerError> {
            self.inner.delete(loan_id, account_id)
        }

        fn append_event(
            &self,
            loan_id: LoanId,
            account_id: AccountId,
            kind: LoanEventKind,
            now: DateTime<Utc>,
        ) -> Result<LoanEvent, LedgerError> {
            self.inner.append_event(loan_id, account_id, kind, now)
        }

        fn insert_deletion(&self, record: LoanDeletion) -> Result<LoanDeletion, LedgerError> {
            self.inner.insert_deletion(record)
        }

        fn loans_for(&self, account_id: AccountId) -> Vec<crate::types::Loan> {
            self.inner.loans_for(account_id)
        }

        fn events_for(&self, loan_id: LoanId) -> Vec<LoanEvent> {
            self.inner.events_for(loan_id)
        }

        fn deletions_for(&self, loan_id: LoanId) -> Vec<LoanDeletion> {
            self.inner.deletions_for(loan_id)
        }
    }

    #[test]
    fn test_failed_disbursement_compensates_credit_but_not_status() {
        let directory = Arc::new(AccountStore::new());
        let account = account(&directory);
        let engine = Arc::new(LoanEngine::with_retry(
            Arc::clone(&directory),
            InsertAlwaysFails {
                inner: MemoryLoanStore::new(),
            },
            RetryPolicy::no_retries(),
        ));
        let service = LoanRequestService::new(Arc::clone(&directory), Arc::clone(&engine));
        let request = service
            .submit(account.id, Decimal::new(20000, 2), Decimal::ZERO)
            .unwrap();

        let result = service.accept(request.id, account.id);

        assert_eq!(
            result.unwrap_err(),
            LedgerError::transient("insert loan", "store timeout")
        );
        // The credit was compensated, but the status flip was not: the
        // request is stuck ACCEPTED with no loan behind it.
        assert_eq!(directory.get(account.id).unwrap().balance, Decimal::ZERO);
        assert_eq!(
            service.get(request.id, account.id).unwrap().status,
            RequestStatus::Accepted
        );
        assert!(engine.loans_for(account.id).is_empty());
        assert_eq!(
            service.accept(request.id, account.id).unwrap_err(),
            LedgerError::not_found("loan request")
        );
    }
}
