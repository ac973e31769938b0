//! the `Ledger` session object.
//!
//! One ledger owns one store, the configuration and the event log. Every
//! operation takes `&mut self`, so at most one operation is in flight.
//! Lifecycle, payment and report operations live beside their own modules
//! as further `impl` blocks on this type.

use hourglass_rs::SafeTimeProvider;
use rust_decimal_macros::dec;
use tracing::info;

use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::model::{Client, Loan, NewClient};
use crate::payments::amortization::LoanFigures;
use crate::reports::{ClientLoans, LoanView};
use crate::repository::{Repository, Store};
use crate::types::{ClientId, CreditScore, LoanId};

#[derive(Debug)]
pub struct Ledger<S: Store> {
    pub(crate) repo: Repository<S>,
    pub(crate) config: LedgerConfig,
    pub(crate) events: EventStore,
}

impl<S: Store> Ledger<S> {
    /// open a ledger over `store`; the configuration is validated first
    pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repo: Repository::new(store),
            config,
            events: EventStore::new(),
        })
    }

    /// ledger with the standard configuration
    pub fn with_store(store: S) -> Self {
        Self {
            repo: Repository::new(store),
            config: LedgerConfig::standard(),
            events: EventStore::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn repository(&self) -> &Repository<S> {
        &self.repo
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub fn into_store(self) -> S {
        self.repo.into_inner()
    }

    // clients

    pub fn register_client(&mut self, details: NewClient, time: &SafeTimeProvider) -> Result<Client> {
        let client = self.repo.create_client(details)?;

        info!(client_id = %client.id, credit_score = %client.credit_score, "client registered");
        self.events.emit(Event::ClientRegistered {
            client_id: client.id,
            credit_score: client.credit_score,
            timestamp: time.now(),
        });
        Ok(client)
    }

    pub fn client(&self, id: ClientId) -> Result<Client> {
        self.repo.client(id)
    }

    pub fn clients(&self) -> Result<Vec<Client>> {
        self.repo.clients()
    }

    /// replace name, phone, address and credit score
    pub fn edit_client(
        &mut self,
        id: ClientId,
        details: NewClient,
        time: &SafeTimeProvider,
    ) -> Result<Client> {
        let mut client = self.repo.client(id)?;
        client.apply(details);
        self.repo.update_client(&client)?;

        info!(client_id = %id, "client updated");
        self.events.emit(Event::ClientUpdated {
            client_id: id,
            timestamp: time.now(),
        });
        Ok(client)
    }

    /// refused with a conflict while the client owns any loan
    pub fn delete_client(&mut self, id: ClientId, time: &SafeTimeProvider) -> Result<()> {
        self.repo.delete_client(id)?;

        info!(client_id = %id, "client deleted");
        self.events.emit(Event::ClientDeleted {
            client_id: id,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// the client's loans with their figures and the summed outstanding balance
    pub fn loans_for_client(&self, id: ClientId) -> Result<ClientLoans> {
        let client = self.repo.client(id)?;
        let loans: Vec<LoanView> = self
            .repo
            .loans_for_client(id)?
            .into_iter()
            .map(LoanView::from_loan)
            .collect();
        let total_outstanding = loans.iter().map(|l| l.figures.outstanding_balance).sum();

        Ok(ClientLoans {
            client,
            loans,
            total_outstanding,
        })
    }

    /// register a few sample clients when the ledger has none
    ///
    /// Returns the clients created, empty if any client already existed.
    pub fn seed_sample_clients(&mut self, time: &SafeTimeProvider) -> Result<Vec<Client>> {
        if !self.repo.clients()?.is_empty() {
            return Ok(Vec::new());
        }

        let samples = [
            ("Maria Santos", "0917-555-0101", "Quezon City", dec!(75.0)),
            ("Jose Ramos", "0918-555-0202", "Cebu City", dec!(65.0)),
            ("Liza Mendoza", "0919-555-0303", "Davao City", dec!(80.0)),
        ];

        let mut tx = self.repo.begin()?;
        let mut created = Vec::with_capacity(samples.len());
        for (name, phone, address, score) in samples {
            let details = NewClient::new(name, phone, address, CreditScore::new(score)?)?;
            created.push(tx.create_client(details)?);
        }
        tx.commit()?;

        let now = time.now();
        for client in &created {
            self.events.emit(Event::ClientRegistered {
                client_id: client.id,
                credit_score: client.credit_score,
                timestamp: now,
            });
        }
        info!(clients = created.len(), "sample clients seeded");
        Ok(created)
    }

    // loans

    pub fn loan(&self, id: LoanId) -> Result<Loan> {
        self.repo.loan(id)
    }

    pub fn loans(&self) -> Result<Vec<Loan>> {
        self.repo.loans()
    }

    /// amortization figures of a loan at its current paid amount
    pub fn loan_figures(&self, id: LoanId) -> Result<LoanFigures> {
        Ok(self.repo.loan(id)?.figures())
    }

    /// remaining payable of a loan, the most a payment may carry
    pub fn payoff_amount(&self, id: LoanId) -> Result<Money> {
        Ok(self.repo.loan(id)?.figures().remaining_payable)
    }
}
