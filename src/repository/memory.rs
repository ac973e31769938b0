use std::collections::BTreeMap;

use crate::model::{Client, Loan, NewClient, NewLoan, NewPayment, Payment};
use crate::repository::{Store, StoreError, StoreResult};
use crate::types::{ClientId, LoanId, PaymentId};

#[derive(Debug, Clone, Default)]
struct Tables {
    clients: BTreeMap<ClientId, Client>,
    loans: BTreeMap<LoanId, Loan>,
    payments: BTreeMap<PaymentId, Payment>,
    last_client_id: i64,
    last_loan_id: i64,
    last_payment_id: i64,
}

/// in-memory store; a transaction snapshots the tables and restores them on rollback
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

impl Store for MemoryStore {
    fn insert_client(&mut self, client: NewClient) -> StoreResult<Client> {
        let id = ClientId(next_id(&mut self.tables.last_client_id));
        let client = Client::from_new(id, client);
        self.tables.clients.insert(id, client.clone());
        Ok(client)
    }

    fn client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(self.tables.clients.get(&id).cloned())
    }

    fn clients(&self) -> StoreResult<Vec<Client>> {
        Ok(self.tables.clients.values().cloned().collect())
    }

    fn update_client(&mut self, client: &Client) -> StoreResult<bool> {
        match self.tables.clients.get_mut(&client.id) {
            Some(row) => {
                *row = client.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_client(&mut self, id: ClientId) -> StoreResult<bool> {
        if self.tables.loans.values().any(|l| l.client_id == id) {
            return Err(StoreError::Constraint {
                message: format!("loans reference client {id}"),
            });
        }
        Ok(self.tables.clients.remove(&id).is_some())
    }

    fn insert_loan(&mut self, loan: NewLoan) -> StoreResult<Loan> {
        if !self.tables.clients.contains_key(&loan.client_id) {
            return Err(StoreError::Constraint {
                message: format!("client {} does not exist", loan.client_id),
            });
        }
        let id = LoanId(next_id(&mut self.tables.last_loan_id));
        let loan = Loan::from_new(id, loan);
        self.tables.loans.insert(id, loan.clone());
        Ok(loan)
    }

    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>> {
        Ok(self.tables.loans.get(&id).cloned())
    }

    fn loans(&self) -> StoreResult<Vec<Loan>> {
        Ok(self.tables.loans.values().cloned().collect())
    }

    fn loans_for_client(&self, client_id: ClientId) -> StoreResult<Vec<Loan>> {
        Ok(self
            .tables
            .loans
            .values()
            .filter(|l| l.client_id == client_id)
            .cloned()
            .collect())
    }

    fn update_loan(&mut self, loan: &Loan) -> StoreResult<bool> {
        match self.tables.loans.get_mut(&loan.id) {
            Some(row) => {
                // owning client is immutable
                if row.client_id != loan.client_id {
                    return Err(StoreError::Constraint {
                        message: format!("loan {} cannot change owner", loan.id),
                    });
                }
                *row = loan.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_loan(&mut self, id: LoanId) -> StoreResult<bool> {
        if self.tables.payments.values().any(|p| p.loan_id == id) {
            return Err(StoreError::Constraint {
                message: format!("payments reference loan {id}"),
            });
        }
        Ok(self.tables.loans.remove(&id).is_some())
    }

    fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment> {
        if !self.tables.loans.contains_key(&payment.loan_id) {
            return Err(StoreError::Constraint {
                message: format!("loan {} does not exist", payment.loan_id),
            });
        }
        let id = PaymentId(next_id(&mut self.tables.last_payment_id));
        let payment = Payment::from_new(id, payment);
        self.tables.payments.insert(id, payment.clone());
        Ok(payment)
    }

    fn payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.tables.payments.get(&id).cloned())
    }

    fn payments(&self) -> StoreResult<Vec<Payment>> {
        Ok(self.tables.payments.values().cloned().collect())
    }

    fn payments_for_loan(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>> {
        Ok(self
            .tables
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionActive);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }
}
