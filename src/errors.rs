use thiserror::Error;

use crate::decimal::Money;
use crate::repository::StoreError;
use crate::types::{ClientId, CreditScore, LoanId, LoanStatus, PaymentId};

/// coarse classification of ledger failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InvalidTransition,
    Store,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid input: {message}")]
    Validation {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("client not found: {id}")]
    ClientNotFound {
        id: ClientId,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("loan {loan_id} belongs to client {client_id} and cannot change owner")]
    LoanOwnerImmutable {
        loan_id: LoanId,
        client_id: ClientId,
    },

    #[error("client {id} has {loans} loan(s) and cannot be deleted")]
    ClientHasLoans {
        id: ClientId,
        loans: usize,
    },

    #[error("loan {id} has {payments} payment(s) and cannot be deleted")]
    LoanHasPayments {
        id: LoanId,
        payments: usize,
    },

    #[error("credit score {score} below minimum {minimum} for loan application")]
    CreditScoreTooLow {
        score: CreditScore,
        minimum: CreditScore,
    },

    #[error("client {client_id} already has pending loan {loan_id}")]
    PendingLoanExists {
        client_id: ClientId,
        loan_id: LoanId,
    },

    #[error("invalid status transition for loan {loan_id}: {from} -> {to}")]
    InvalidTransition {
        loan_id: LoanId,
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("loan {loan_id} not approved for payments: current status is {status}")]
    NotApproved {
        loan_id: LoanId,
        status: LoanStatus,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("payment {amount} exceeds outstanding balance {balance}")]
    ExceedsBalance {
        amount: Money,
        balance: Money,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. }
            | LedgerError::InvalidConfiguration { .. }
            | LedgerError::CreditScoreTooLow { .. }
            | LedgerError::PendingLoanExists { .. }
            | LedgerError::LoanOwnerImmutable { .. }
            | LedgerError::InvalidPaymentAmount { .. }
            | LedgerError::ExceedsBalance { .. } => ErrorKind::Validation,
            LedgerError::ClientNotFound { .. }
            | LedgerError::LoanNotFound { .. }
            | LedgerError::PaymentNotFound { .. } => ErrorKind::NotFound,
            LedgerError::ClientHasLoans { .. } | LedgerError::LoanHasPayments { .. } => {
                ErrorKind::Conflict
            }
            LedgerError::InvalidTransition { .. } | LedgerError::NotApproved { .. } => {
                ErrorKind::InvalidTransition
            }
            LedgerError::Store(_) => ErrorKind::Store,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = LedgerError::ClientHasLoans {
            id: ClientId(1),
            loans: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "client 1 has 2 loan(s) and cannot be deleted");

        let err = LedgerError::NotApproved {
            loan_id: LoanId(4),
            status: LoanStatus::Pending,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(err.to_string().contains("PENDING"));

        let err = LedgerError::PaymentNotFound { id: PaymentId(12) };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "payment not found: 12");

        let err: LedgerError = StoreError::TransactionActive.into();
        assert_eq!(err.kind(), ErrorKind::Store);
    }
}
