pub mod amortization;

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::ledger::Ledger;
use crate::model::{Loan, NewPayment, Payment};
use crate::repository::Store;
use crate::types::{LoanId, LoanStatus, PaymentId};

pub use amortization::{
    monthly_payment, outstanding_balance, remaining_payable, total_interest, total_payable,
    LoanFigures,
};

/// outcome of a recorded payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    /// loan after the payment was applied
    pub loan: Loan,
    /// the payment completed the total payable and the loan is now PAID
    pub settled: bool,
}

/// payments of one loan with their sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub loan_id: LoanId,
    pub payments: Vec<Payment>,
    pub total_paid: Money,
}

impl<S: Store> Ledger<S> {
    /// record a payment against an APPROVED loan
    ///
    /// The payment must be positive and no larger than the remaining payable.
    /// The payment row, the new paid amount and a PAID transition are
    /// written in one transaction.
    pub fn record_payment(
        &mut self,
        loan_id: LoanId,
        amount: Money,
        time: &SafeTimeProvider,
    ) -> Result<PaymentReceipt> {
        let mut loan = self.repo.loan(loan_id)?;
        if loan.status != LoanStatus::Approved {
            warn!(loan_id = %loan_id, status = %loan.status, "payment refused, loan not approved");
            return Err(LedgerError::NotApproved {
                loan_id,
                status: loan.status,
            });
        }

        if !amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount { amount });
        }

        let figures = loan.figures();
        if amount > figures.remaining_payable {
            warn!(loan_id = %loan_id, %amount, balance = %figures.remaining_payable, "payment refused, exceeds balance");
            return Err(LedgerError::ExceedsBalance {
                amount,
                balance: figures.remaining_payable,
            });
        }

        let now = time.now();
        loan.paid_amount += amount;
        let settled = loan.paid_amount >= figures.total_payable;
        if settled {
            loan.status = LoanStatus::Paid;
        }

        let mut tx = self.repo.begin()?;
        let payment = tx.create_payment(NewPayment {
            loan_id,
            amount,
            payment_date: now.date_naive(),
        })?;
        tx.update_loan(&loan)?;
        tx.commit()?;

        let remaining_payable = loan.figures().remaining_payable;
        info!(
            payment_id = %payment.id,
            loan_id = %loan_id,
            %amount,
            paid = %loan.paid_amount,
            %remaining_payable,
            "payment recorded"
        );
        self.events.emit(Event::PaymentRecorded {
            payment_id: payment.id,
            loan_id,
            amount,
            remaining_payable,
            timestamp: now,
        });

        if settled {
            info!(loan_id = %loan_id, total_paid = %loan.paid_amount, "loan settled");
            self.events.emit(Event::LoanSettled {
                loan_id,
                total_paid: loan.paid_amount,
                timestamp: now,
            });
        }

        Ok(PaymentReceipt {
            payment,
            loan,
            settled,
        })
    }

    pub fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.repo.payment(id)
    }

    /// every payment of a loan in recording order
    pub fn payment_history(&self, loan_id: LoanId) -> Result<PaymentHistory> {
        let payments = self.repo.payments_for_loan(loan_id)?;
        let total_paid = payments.iter().map(|p| p.amount).sum();
        Ok(PaymentHistory {
            loan_id,
            payments,
            total_paid,
        })
    }
}
