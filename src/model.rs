use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::payments::amortization::LoanFigures;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::types::{ClientId, CreditScore, LoanId, LoanStatus, LoanTerms, PaymentId};

/// client fields without identity, validated on construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub credit_score: CreditScore,
}

impl NewClient {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        credit_score: CreditScore,
    ) -> Result<Self> {
        let client = Self {
            name: name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
            address: address.into().trim().to_string(),
            credit_score,
        };
        for (field, value) in [
            ("name", &client.name),
            ("phone", &client.phone),
            ("address", &client.address),
        ] {
            if value.is_empty() {
                return Err(LedgerError::validation(format!("client {field} must not be empty")));
            }
        }
        Ok(client)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub credit_score: CreditScore,
}

impl Client {
    pub fn from_new(id: ClientId, new: NewClient) -> Self {
        Self {
            id,
            name: new.name,
            phone: new.phone,
            address: new.address,
            credit_score: new.credit_score,
        }
    }

    /// replace editable fields, keeping identity
    pub fn apply(&mut self, details: NewClient) {
        self.name = details.name;
        self.phone = details.phone;
        self.address = details.address;
        self.credit_score = details.credit_score;
    }
}

/// loan row to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub client_id: ClientId,
    pub terms: LoanTerms,
    pub status: LoanStatus,
    pub issue_date: NaiveDate,
    pub paid_amount: Money,
}

impl NewLoan {
    /// fresh application: pending, nothing paid
    pub fn application(client_id: ClientId, terms: LoanTerms, issue_date: NaiveDate) -> Self {
        Self {
            client_id,
            terms,
            status: LoanStatus::Pending,
            issue_date,
            paid_amount: Money::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub client_id: ClientId,
    pub terms: LoanTerms,
    pub status: LoanStatus,
    pub issue_date: NaiveDate,
    pub paid_amount: Money,
}

impl Loan {
    pub fn from_new(id: LoanId, new: NewLoan) -> Self {
        Self {
            id,
            client_id: new.client_id,
            terms: new.terms,
            status: new.status,
            issue_date: new.issue_date,
            paid_amount: new.paid_amount,
        }
    }

    pub fn principal(&self) -> Money {
        self.terms.principal
    }

    pub fn annual_rate(&self) -> Rate {
        self.terms.annual_rate
    }

    pub fn duration_months(&self) -> u32 {
        self.terms.duration_months
    }

    /// amortization figures at the current paid amount
    pub fn figures(&self) -> LoanFigures {
        LoanFigures::compute(&self.terms, self.paid_amount)
    }
}

/// payment row to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: NaiveDate,
}

impl Payment {
    pub fn from_new(id: PaymentId, new: NewPayment) -> Self {
        Self {
            id,
            loan_id: new.loan_id,
            amount: new.amount,
            payment_date: new.payment_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_trims_and_validates() {
        let client = NewClient::new("  Ana Reyes ", "0917", "Cebu", CreditScore::standard()).unwrap();
        assert_eq!(client.name, "Ana Reyes");

        let err = NewClient::new("Ana", "   ", "Cebu", CreditScore::standard()).unwrap_err();
        assert!(err.to_string().contains("phone"));
    }
}
