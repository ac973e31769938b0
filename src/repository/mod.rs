//! entity repository over a swappable store backend.
//!
//! [`Store`] is the raw backend capability set: row CRUD plus
//! begin/commit/rollback. [`Repository`] wraps a store with existence checks
//! and the restrict-on-delete guards, and hands out [`Transaction`] guards
//! that roll back unless committed.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::errors::{LedgerError, Result};
use crate::model::{Client, Loan, NewClient, NewLoan, NewPayment, Payment};
use crate::types::{ClientId, LoanId, PaymentId};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("constraint violated: {message}")]
    Constraint {
        message: String,
    },

    #[error("corrupt row: {message}")]
    Corrupt {
        message: String,
    },

    #[error("a transaction is already active")]
    TransactionActive,

    #[error("no active transaction")]
    NoTransaction,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// backend capability set: row storage for the three tables
///
/// Reads return rows ordered by identity ascending. Writes outside a
/// transaction are durable when the call returns.
pub trait Store {
    fn insert_client(&mut self, client: NewClient) -> StoreResult<Client>;
    fn client(&self, id: ClientId) -> StoreResult<Option<Client>>;
    fn clients(&self) -> StoreResult<Vec<Client>>;
    /// false when no row has this identity
    fn update_client(&mut self, client: &Client) -> StoreResult<bool>;
    fn delete_client(&mut self, id: ClientId) -> StoreResult<bool>;

    fn insert_loan(&mut self, loan: NewLoan) -> StoreResult<Loan>;
    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>>;
    fn loans(&self) -> StoreResult<Vec<Loan>>;
    fn loans_for_client(&self, client_id: ClientId) -> StoreResult<Vec<Loan>>;
    fn update_loan(&mut self, loan: &Loan) -> StoreResult<bool>;
    fn delete_loan(&mut self, id: LoanId) -> StoreResult<bool>;

    fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment>;
    fn payment(&self, id: PaymentId) -> StoreResult<Option<Payment>>;
    fn payments(&self) -> StoreResult<Vec<Payment>>;
    fn payments_for_loan(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>>;

    fn begin(&mut self) -> StoreResult<()>;
    fn commit(&mut self) -> StoreResult<()>;
    fn rollback(&mut self) -> StoreResult<()>;
}

/// guarded CRUD over a store
#[derive(Debug)]
pub struct Repository<S: Store> {
    store: S,
}

impl<S: Store> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    // clients

    pub fn create_client(&mut self, client: NewClient) -> Result<Client> {
        let client = self.store.insert_client(client)?;
        debug!(client_id = %client.id, "client row inserted");
        Ok(client)
    }

    pub fn client(&self, id: ClientId) -> Result<Client> {
        self.store
            .client(id)?
            .ok_or(LedgerError::ClientNotFound { id })
    }

    pub fn clients(&self) -> Result<Vec<Client>> {
        Ok(self.store.clients()?)
    }

    pub fn update_client(&mut self, client: &Client) -> Result<()> {
        if !self.store.update_client(client)? {
            return Err(LedgerError::ClientNotFound { id: client.id });
        }
        Ok(())
    }

    /// refused while the client owns any loan
    pub fn delete_client(&mut self, id: ClientId) -> Result<()> {
        self.client(id)?;

        let loans = self.store.loans_for_client(id)?.len();
        if loans > 0 {
            warn!(client_id = %id, loans, "client delete refused");
            return Err(LedgerError::ClientHasLoans { id, loans });
        }

        if !self.store.delete_client(id)? {
            return Err(LedgerError::ClientNotFound { id });
        }
        debug!(client_id = %id, "client row deleted");
        Ok(())
    }

    // loans

    pub fn create_loan(&mut self, loan: NewLoan) -> Result<Loan> {
        self.client(loan.client_id)?;
        let loan = self.store.insert_loan(loan)?;
        debug!(loan_id = %loan.id, client_id = %loan.client_id, "loan row inserted");
        Ok(loan)
    }

    pub fn loan(&self, id: LoanId) -> Result<Loan> {
        self.store.loan(id)?.ok_or(LedgerError::LoanNotFound { id })
    }

    pub fn loans(&self) -> Result<Vec<Loan>> {
        Ok(self.store.loans()?)
    }

    pub fn loans_for_client(&self, client_id: ClientId) -> Result<Vec<Loan>> {
        self.client(client_id)?;
        Ok(self.store.loans_for_client(client_id)?)
    }

    /// the owning client is immutable on every backend
    pub fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        let stored = self.loan(loan.id)?;
        if stored.client_id != loan.client_id {
            warn!(loan_id = %loan.id, owner = %stored.client_id, requested = %loan.client_id, "loan owner change refused");
            return Err(LedgerError::LoanOwnerImmutable {
                loan_id: loan.id,
                client_id: stored.client_id,
            });
        }

        if !self.store.update_loan(loan)? {
            return Err(LedgerError::LoanNotFound { id: loan.id });
        }
        Ok(())
    }

    /// refused while the loan has any payment
    pub fn delete_loan(&mut self, id: LoanId) -> Result<()> {
        self.loan(id)?;

        let payments = self.store.payments_for_loan(id)?.len();
        if payments > 0 {
            warn!(loan_id = %id, payments, "loan delete refused");
            return Err(LedgerError::LoanHasPayments { id, payments });
        }

        if !self.store.delete_loan(id)? {
            return Err(LedgerError::LoanNotFound { id });
        }
        debug!(loan_id = %id, "loan row deleted");
        Ok(())
    }

    // payments

    pub fn create_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        self.loan(payment.loan_id)?;
        let payment = self.store.insert_payment(payment)?;
        debug!(payment_id = %payment.id, loan_id = %payment.loan_id, "payment row inserted");
        Ok(payment)
    }

    pub fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.store
            .payment(id)?
            .ok_or(LedgerError::PaymentNotFound { id })
    }

    pub fn payments(&self) -> Result<Vec<Payment>> {
        Ok(self.store.payments()?)
    }

    pub fn payments_for_loan(&self, loan_id: LoanId) -> Result<Vec<Payment>> {
        self.loan(loan_id)?;
        Ok(self.store.payments_for_loan(loan_id)?)
    }

    /// open a transaction; it rolls back on drop unless committed
    pub fn begin(&mut self) -> Result<Transaction<'_, S>> {
        self.store.begin()?;
        Ok(Transaction {
            repo: self,
            finished: false,
        })
    }
}

/// scoped all-or-nothing unit over a repository
pub struct Transaction<'r, S: Store> {
    repo: &'r mut Repository<S>,
    finished: bool,
}

impl<S: Store> Transaction<'_, S> {
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if let Err(err) = self.repo.store.commit() {
            // the store may still hold the open transaction
            if let Err(rollback_err) = self.repo.store.rollback() {
                error!(error = %rollback_err, "rollback after failed commit failed");
            }
            return Err(err.into());
        }
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        Ok(self.repo.store.rollback()?)
    }
}

impl<S: Store> Deref for Transaction<'_, S> {
    type Target = Repository<S>;

    fn deref(&self) -> &Repository<S> {
        self.repo
    }
}

impl<S: Store> DerefMut for Transaction<'_, S> {
    fn deref_mut(&mut self) -> &mut Repository<S> {
        self.repo
    }
}

impl<S: Store> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction dropped without commit, rolling back");
        if let Err(err) = self.repo.store.rollback() {
            error!(error = %err, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::errors::ErrorKind;
    use crate::types::{CreditScore, LoanTerms};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn repo() -> Repository<MemoryStore> {
        Repository::new(MemoryStore::new())
    }

    fn new_client(name: &str) -> NewClient {
        NewClient::new(name, "0917", "Davao", CreditScore::new(dec!(80)).unwrap()).unwrap()
    }

    fn new_loan(client_id: ClientId) -> NewLoan {
        let terms = LoanTerms::new(Money::from_major(5_000), Rate::from_percentage(10), 6).unwrap();
        NewLoan::application(client_id, terms, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    #[test]
    fn test_crud_round_trip() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();
        assert_eq!(repo.client(client.id).unwrap(), client);

        let mut edited = client.clone();
        edited.phone = "0999".to_string();
        repo.update_client(&edited).unwrap();
        assert_eq!(repo.client(client.id).unwrap().phone, "0999");

        repo.delete_client(client.id).unwrap();
        assert_eq!(repo.client(client.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();
        let mut ghost = client.clone();
        ghost.id = ClientId(99);
        assert!(matches!(
            repo.update_client(&ghost),
            Err(LedgerError::ClientNotFound { id: ClientId(99) })
        ));
    }

    #[test]
    fn test_loan_requires_existing_client() {
        let mut repo = repo();
        let err = repo.create_loan(new_loan(ClientId(7))).unwrap_err();
        assert!(matches!(err, LedgerError::ClientNotFound { id: ClientId(7) }));
        assert!(repo.loans().unwrap().is_empty());
    }

    #[test]
    fn test_delete_guards() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();
        let loan = repo.create_loan(new_loan(client.id)).unwrap();

        let err = repo.delete_client(client.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        repo.create_payment(NewPayment {
            loan_id: loan.id,
            amount: Money::from_major(100),
            payment_date: loan.issue_date,
        })
        .unwrap();

        let err = repo.delete_loan(loan.id).unwrap_err();
        assert!(matches!(err, LedgerError::LoanHasPayments { payments: 1, .. }));
        assert!(repo.loan(loan.id).is_ok());
    }

    #[test]
    fn test_payment_by_id() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();
        let loan = repo.create_loan(new_loan(client.id)).unwrap();
        let payment = repo
            .create_payment(NewPayment {
                loan_id: loan.id,
                amount: Money::from_major(250),
                payment_date: loan.issue_date,
            })
            .unwrap();

        assert_eq!(repo.payment(payment.id).unwrap(), payment);
        let err = repo.payment(PaymentId(40)).unwrap_err();
        assert!(matches!(err, LedgerError::PaymentNotFound { id: PaymentId(40) }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_loan_owner_change_refused() {
        let mut repo = repo();
        let first = repo.create_client(new_client("Lito")).unwrap();
        let second = repo.create_client(new_client("Mila")).unwrap();
        let loan = repo.create_loan(new_loan(first.id)).unwrap();

        let mut moved = loan.clone();
        moved.client_id = second.id;
        let err = repo.update_loan(&moved).unwrap_err();
        assert!(matches!(err, LedgerError::LoanOwnerImmutable { client_id, .. } if client_id == first.id));
        assert_eq!(repo.loan(loan.id).unwrap(), loan);

        let mut ghost = loan;
        ghost.id = LoanId(77);
        assert!(matches!(
            repo.update_loan(&ghost),
            Err(LedgerError::LoanNotFound { id: LoanId(77) })
        ));
    }

    #[test]
    fn test_delete_unguarded_loan_then_client() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();
        let loan = repo.create_loan(new_loan(client.id)).unwrap();

        repo.delete_loan(loan.id).unwrap();
        repo.delete_client(client.id).unwrap();
        assert!(repo.clients().unwrap().is_empty());
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();

        {
            let mut tx = repo.begin().unwrap();
            tx.create_loan(new_loan(client.id)).unwrap();
            assert_eq!(tx.loans().unwrap().len(), 1);
        }

        assert!(repo.loans().unwrap().is_empty());
    }

    #[test]
    fn test_transaction_commit_persists() {
        let mut repo = repo();
        let client = repo.create_client(new_client("Lito")).unwrap();

        let mut tx = repo.begin().unwrap();
        tx.create_loan(new_loan(client.id)).unwrap();
        tx.commit().unwrap();

        assert_eq!(repo.loans().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_begin_is_refused() {
        let mut repo = repo();
        let mut tx = repo.begin().unwrap();
        assert!(matches!(
            tx.begin().err(),
            Some(LedgerError::Store(StoreError::TransactionActive))
        ));
    }
}
