//! read-only reports over the ledger.
//!
//! Outstanding figures use the amortization engine's floor-based balance
//! per loan, so they match what a loan shows on its own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::Result;
use crate::ledger::Ledger;
use crate::model::{Client, Loan};
use crate::payments::amortization::LoanFigures;
use crate::repository::Store;
use crate::types::{ClientId, LoanId, LoanStatus, PaymentId};

/// a loan with its current figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanView {
    pub loan: Loan,
    pub figures: LoanFigures,
}

impl LoanView {
    pub fn from_loan(loan: Loan) -> Self {
        let figures = loan.figures();
        Self { loan, figures }
    }
}

/// a client's loans and the summed outstanding balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLoans {
    pub client: Client,
    pub loans: Vec<LoanView>,
    pub total_outstanding: Money,
}

/// totals over APPROVED and PAID loans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub loan_count: usize,
    pub total_principal: Money,
    pub total_paid: Money,
    pub total_outstanding: Money,
}

/// one payment joined with its loan and client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub payment_id: PaymentId,
    pub loan_id: LoanId,
    pub client_id: ClientId,
    pub client_name: String,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub loan_status: LoanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub entries: Vec<CollectionEntry>,
    pub total_collected: Money,
}

/// loan totals for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoanTotals {
    pub loan_count: usize,
    pub total_principal: Money,
    pub total_paid: Money,
    pub total_outstanding: Money,
}

impl LoanTotals {
    fn add(&mut self, view: &LoanView) {
        self.loan_count += 1;
        self.total_principal += view.loan.principal();
        self.total_paid += view.loan.paid_amount;
        self.total_outstanding += view.figures.outstanding_balance;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    pub client: Client,
    pub loans: Vec<LoanView>,
    pub totals: LoanTotals,
}

/// every client with their loans, clients without loans included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLoanReport {
    pub sections: Vec<ClientSection>,
}

macro_rules! impl_to_json {
    ($($report:ty),*) => {
        $(impl $report {
            /// pretty-printed json export
            pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
                serde_json::to_string_pretty(self)
            }
        })*
    };
}

impl_to_json!(
    ClientLoans,
    PortfolioSummary,
    CollectionReport,
    ClientLoanReport,
    crate::payments::PaymentHistory
);

impl<S: Store> Ledger<S> {
    /// loan count, principal, paid and outstanding over APPROVED and PAID loans
    pub fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        let mut summary = PortfolioSummary::default();
        for loan in self.repo.loans()? {
            if !matches!(loan.status, LoanStatus::Approved | LoanStatus::Paid) {
                continue;
            }
            summary.loan_count += 1;
            summary.total_principal += loan.principal();
            summary.total_paid += loan.paid_amount;
            summary.total_outstanding += loan.figures().outstanding_balance;
        }
        Ok(summary)
    }

    /// every payment with its client's name and the loan's current status
    pub fn collection_report(&self) -> Result<CollectionReport> {
        let clients = self.repo.clients()?;
        let loans = self.repo.loans()?;

        let mut entries = Vec::new();
        let mut total_collected = Money::ZERO;
        for payment in self.repo.payments()? {
            let Some(loan) = loans.iter().find(|l| l.id == payment.loan_id) else {
                continue;
            };
            let Some(client) = clients.iter().find(|c| c.id == loan.client_id) else {
                continue;
            };
            total_collected += payment.amount;
            entries.push(CollectionEntry {
                payment_id: payment.id,
                loan_id: loan.id,
                client_id: client.id,
                client_name: client.name.clone(),
                amount: payment.amount,
                payment_date: payment.payment_date,
                loan_status: loan.status,
            });
        }

        Ok(CollectionReport {
            entries,
            total_collected,
        })
    }

    /// per-client loan figures with summary totals
    pub fn client_loan_report(&self) -> Result<ClientLoanReport> {
        let loans = self.repo.loans()?;
        let sections = self
            .repo
            .clients()?
            .into_iter()
            .map(|client| {
                let mut totals = LoanTotals::default();
                let views: Vec<LoanView> = loans
                    .iter()
                    .filter(|l| l.client_id == client.id)
                    .cloned()
                    .map(LoanView::from_loan)
                    .collect();
                views.iter().for_each(|v| totals.add(v));
                ClientSection {
                    client,
                    loans: views,
                    totals,
                }
            })
            .collect();

        Ok(ClientLoanReport { sections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::model::NewClient;
    use crate::repository::MemoryStore;
    use crate::types::{CreditScore, LoanTerms};
    use chrono::{DateTime, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            "2024-03-15T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        ))
    }

    /// two clients: one approved loan with a payment, one rejected loan, one client with nothing
    fn populated() -> (Ledger<MemoryStore>, LoanId, LoanId) {
        let time = clock();
        let mut ledger = Ledger::with_store(MemoryStore::new());

        let good = ledger
            .register_client(
                NewClient::new("Gloria", "0917", "Pasig", CreditScore::new(dec!(85)).unwrap()).unwrap(),
                &time,
            )
            .unwrap();
        let fair = ledger
            .register_client(
                NewClient::new("Efren", "0918", "Iriga", CreditScore::new(dec!(60)).unwrap()).unwrap(),
                &time,
            )
            .unwrap();
        ledger
            .register_client(
                NewClient::new("Nilo", "0919", "Tarlac", CreditScore::standard()).unwrap(),
                &time,
            )
            .unwrap();

        let zero_rate = LoanTerms::new(Money::from_major(1_200), Rate::ZERO, 12).unwrap();
        let approved = ledger.apply_for_loan(good.id, zero_rate, &time).unwrap();
        ledger.approve_loan(approved.id, &time).unwrap();
        ledger.record_payment(approved.id, Money::from_major(300), &time).unwrap();

        let rejected = ledger.apply_for_loan(fair.id, zero_rate, &time).unwrap();
        assert!(!ledger.approve_loan(rejected.id, &time).unwrap().is_approved());

        (ledger, approved.id, rejected.id)
    }

    #[test]
    fn test_portfolio_counts_approved_and_paid_only() {
        let (ledger, _, _) = populated();
        let summary = ledger.portfolio_summary().unwrap();

        assert_eq!(summary.loan_count, 1);
        assert_eq!(summary.total_principal, Money::from_major(1_200));
        assert_eq!(summary.total_paid, Money::from_major(300));
        assert_eq!(summary.total_outstanding, Money::from_major(900));
    }

    #[test]
    fn test_collection_report_joins_client_and_status() {
        let (ledger, approved, _) = populated();
        let report = ledger.collection_report().unwrap();

        assert_eq!(report.entries.len(), 1);
        let entry = &report.entries[0];
        assert_eq!(entry.loan_id, approved);
        assert_eq!(entry.client_name, "Gloria");
        assert_eq!(entry.loan_status, LoanStatus::Approved);
        assert_eq!(report.total_collected, Money::from_major(300));
    }

    #[test]
    fn test_client_loan_report_includes_clients_without_loans() {
        let (ledger, _, rejected) = populated();
        let report = ledger.client_loan_report().unwrap();

        assert_eq!(report.sections.len(), 3);
        let gloria = &report.sections[0];
        assert_eq!(gloria.totals.loan_count, 1);
        assert_eq!(gloria.totals.total_outstanding, Money::from_major(900));

        let efren = &report.sections[1];
        assert_eq!(efren.loans[0].loan.id, rejected);
        assert_eq!(efren.loans[0].loan.status, LoanStatus::Reject);

        let nilo = &report.sections[2];
        assert!(nilo.loans.is_empty());
        assert_eq!(nilo.totals, LoanTotals::default());
    }

    #[test]
    fn test_client_loans_total() {
        let (ledger, _, _) = populated();
        let gloria = ledger.clients().unwrap()[0].id;
        let loans = ledger.loans_for_client(gloria).unwrap();
        assert_eq!(loans.loans.len(), 1);
        assert_eq!(loans.total_outstanding, Money::from_major(900));
    }

    #[test]
    fn test_json_export() {
        let (ledger, approved, _) = populated();
        let json = ledger.portfolio_summary().unwrap().to_json().unwrap();
        assert!(json.contains("\"loan_count\": 1"));

        let history = ledger.payment_history(approved).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&history).unwrap();
        assert_eq!(value["payments"].as_array().unwrap().len(), 1);
        assert_eq!(value["payments"][0]["payment_date"], "2024-03-15");
    }
}
