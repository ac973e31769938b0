//! loan lifecycle: application, approval, rejection and administrative edits.
//!
//! ```text
//! PENDING --approve (score >= approval minimum)--> APPROVED --settled--> PAID
//!    |    --approve (score below minimum)-------> REJECT
//!    +----reject--------------------------------> REJECT
//! ```
//!
//! REJECT and PAID are terminal. APPROVED -> PAID happens only through
//! payment processing. A client has at most one PENDING loan at any time.

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::ledger::Ledger;
use crate::model::{Loan, NewLoan};
use crate::repository::{Repository, Store};
use crate::types::{ClientId, CreditScore, LoanId, LoanStatus, LoanTerms};

/// result of an approval request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalOutcome {
    Approved(Loan),
    /// score below the approval minimum; the loan is now REJECT
    AutoRejected {
        loan: Loan,
        score: CreditScore,
        minimum: CreditScore,
    },
}

impl ApprovalOutcome {
    pub fn loan(&self) -> &Loan {
        match self {
            ApprovalOutcome::Approved(loan) | ApprovalOutcome::AutoRejected { loan, .. } => loan,
        }
    }

    pub fn into_loan(self) -> Loan {
        match self {
            ApprovalOutcome::Approved(loan) | ApprovalOutcome::AutoRejected { loan, .. } => loan,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalOutcome::Approved(_))
    }
}

/// administrative replacement of a loan's terms and status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanEdit {
    pub terms: LoanTerms,
    pub status: LoanStatus,
}

impl<S: Store> Ledger<S> {
    /// submit a PENDING application dated today
    ///
    /// Fails without creating a loan when the client is missing, the score
    /// is below the application minimum, the client already has a PENDING
    /// loan, or the term is longer than allowed.
    pub fn apply_for_loan(
        &mut self,
        client_id: ClientId,
        terms: LoanTerms,
        time: &SafeTimeProvider,
    ) -> Result<Loan> {
        let client = self.repo.client(client_id)?;
        self.check_term(&terms)?;

        let minimum = self.config.credit_policy.min_score_to_apply;
        if client.credit_score < minimum {
            warn!(client_id = %client_id, score = %client.credit_score, %minimum, "application refused");
            return Err(LedgerError::CreditScoreTooLow {
                score: client.credit_score,
                minimum,
            });
        }

        if let Some(pending) = pending_loan(&self.repo, client_id, None)? {
            warn!(client_id = %client_id, loan_id = %pending.id, "application refused, loan already pending");
            return Err(LedgerError::PendingLoanExists {
                client_id,
                loan_id: pending.id,
            });
        }

        let now = time.now();
        let loan = self
            .repo
            .create_loan(NewLoan::application(client_id, terms, now.date_naive()))?;

        info!(
            loan_id = %loan.id,
            client_id = %client_id,
            amount = %terms.principal,
            rate = %terms.annual_rate,
            months = terms.duration_months,
            "loan applied"
        );
        self.events.emit(Event::LoanApplied {
            loan_id: loan.id,
            client_id,
            amount: terms.principal,
            timestamp: now,
        });
        Ok(loan)
    }

    /// decide a PENDING loan against the client's credit score
    pub fn approve_loan(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<ApprovalOutcome> {
        let mut loan = self.repo.loan(loan_id)?;
        ensure_transition(&loan, LoanStatus::Approved)?;

        let client = self.repo.client(loan.client_id)?;
        let minimum = self.config.credit_policy.min_score_to_approve;
        let now = time.now();

        if client.credit_score < minimum {
            loan.status = LoanStatus::Reject;
            self.repo.update_loan(&loan)?;

            warn!(loan_id = %loan_id, score = %client.credit_score, %minimum, "loan auto-rejected");
            self.events.emit(Event::LoanRejected {
                loan_id,
                automatic: true,
                timestamp: now,
            });
            return Ok(ApprovalOutcome::AutoRejected {
                loan,
                score: client.credit_score,
                minimum,
            });
        }

        loan.status = LoanStatus::Approved;
        self.repo.update_loan(&loan)?;

        let monthly_payment = loan.figures().monthly_payment;
        info!(loan_id = %loan_id, %monthly_payment, "loan approved");
        self.events.emit(Event::LoanApproved {
            loan_id,
            monthly_payment,
            timestamp: now,
        });
        Ok(ApprovalOutcome::Approved(loan))
    }

    /// operator rejection of a PENDING loan
    pub fn reject_loan(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<Loan> {
        let mut loan = self.repo.loan(loan_id)?;
        ensure_transition(&loan, LoanStatus::Reject)?;

        loan.status = LoanStatus::Reject;
        self.repo.update_loan(&loan)?;

        info!(loan_id = %loan_id, "loan rejected");
        self.events.emit(Event::LoanRejected {
            loan_id,
            automatic: false,
            timestamp: time.now(),
        });
        Ok(loan)
    }

    /// administrative edit of terms and status
    ///
    /// Any status may be set from any status. The term limit still applies,
    /// and a client never ends up with two PENDING loans.
    pub fn edit_loan(&mut self, loan_id: LoanId, edit: LoanEdit, time: &SafeTimeProvider) -> Result<Loan> {
        let mut loan = self.repo.loan(loan_id)?;
        self.check_term(&edit.terms)?;

        if edit.status == LoanStatus::Pending {
            if let Some(pending) = pending_loan(&self.repo, loan.client_id, Some(loan_id))? {
                warn!(loan_id = %loan_id, pending = %pending.id, "edit refused, client already has a pending loan");
                return Err(LedgerError::PendingLoanExists {
                    client_id: loan.client_id,
                    loan_id: pending.id,
                });
            }
        }

        let old_status = loan.status;
        loan.terms = edit.terms;
        loan.status = edit.status;
        self.repo.update_loan(&loan)?;

        info!(loan_id = %loan_id, from = %old_status, to = %edit.status, "loan edited");
        self.events.emit(Event::LoanEdited {
            loan_id,
            old_status,
            new_status: edit.status,
            timestamp: time.now(),
        });
        Ok(loan)
    }

    /// refused with a conflict while the loan has payments
    pub fn delete_loan(&mut self, loan_id: LoanId, time: &SafeTimeProvider) -> Result<()> {
        self.repo.delete_loan(loan_id)?;

        info!(loan_id = %loan_id, "loan deleted");
        self.events.emit(Event::LoanDeleted {
            loan_id,
            timestamp: time.now(),
        });
        Ok(())
    }

    fn check_term(&self, terms: &LoanTerms) -> Result<()> {
        terms.validate()?;
        let max = self.config.limits.max_term_months;
        if terms.duration_months > max {
            return Err(LedgerError::validation(format!(
                "duration {} months exceeds the maximum of {max}",
                terms.duration_months
            )));
        }
        Ok(())
    }
}

fn ensure_transition(loan: &Loan, to: LoanStatus) -> Result<()> {
    if !loan.status.can_transition_to(to) {
        return Err(LedgerError::InvalidTransition {
            loan_id: loan.id,
            from: loan.status,
            to,
        });
    }
    Ok(())
}

/// the client's PENDING loan other than `except`, if any
fn pending_loan<S: Store>(
    repo: &Repository<S>,
    client_id: ClientId,
    except: Option<LoanId>,
) -> Result<Option<Loan>> {
    Ok(repo
        .loans_for_client(client_id)?
        .into_iter()
        .find(|l| l.status == LoanStatus::Pending && Some(l.id) != except))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::errors::ErrorKind;
    use crate::model::{NewClient, NewPayment};
    use crate::repository::MemoryStore;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use hourglass_rs::TimeSource;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            "2024-07-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        ))
    }

    fn terms() -> LoanTerms {
        LoanTerms::new(Money::from_major(12_000), Rate::from_percentage(12), 12).unwrap()
    }

    fn ledger_with_client(score: Decimal) -> (Ledger<MemoryStore>, ClientId) {
        let mut ledger = Ledger::with_store(MemoryStore::new());
        let client = ledger
            .register_client(
                NewClient::new("Teresa", "0917", "Baguio", CreditScore::new(score).unwrap()).unwrap(),
                &clock(),
            )
            .unwrap();
        (ledger, client.id)
    }

    #[rstest]
    #[case(dec!(0), false)]
    #[case(dec!(49.9), false)]
    #[case(dec!(50), true)]
    #[case(dec!(75), true)]
    fn test_application_gate(#[case] score: Decimal, #[case] accepted: bool) {
        let (mut ledger, client_id) = ledger_with_client(score);
        let result = ledger.apply_for_loan(client_id, terms(), &clock());

        assert_eq!(result.is_ok(), accepted);
        if !accepted {
            assert!(matches!(result, Err(LedgerError::CreditScoreTooLow { .. })));
            assert!(ledger.loans().unwrap().is_empty());
        }
    }

    #[rstest]
    #[case(dec!(50), false)]
    #[case(dec!(69.9), false)]
    #[case(dec!(70), true)]
    #[case(dec!(100), true)]
    fn test_approval_gate(#[case] score: Decimal, #[case] approved: bool) {
        let (mut ledger, client_id) = ledger_with_client(score);
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();

        let outcome = ledger.approve_loan(loan.id, &clock()).unwrap();
        assert_eq!(outcome.is_approved(), approved);

        let expected = if approved { LoanStatus::Approved } else { LoanStatus::Reject };
        assert_eq!(outcome.loan().status, expected);
        assert_eq!(ledger.loan(loan.id).unwrap().status, expected);
    }

    #[test]
    fn test_auto_reject_reports_scores() {
        let (mut ledger, client_id) = ledger_with_client(dec!(65));
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();

        match ledger.approve_loan(loan.id, &clock()).unwrap() {
            ApprovalOutcome::AutoRejected { score, minimum, .. } => {
                assert_eq!(score.to_string(), "65.0");
                assert_eq!(minimum.to_string(), "70.0");
            }
            other => panic!("expected auto-rejection, got {other:?}"),
        }
        assert!(matches!(
            ledger.events().last(),
            Some(Event::LoanRejected { automatic: true, .. })
        ));
    }

    #[test]
    fn test_issue_date_comes_from_clock() {
        let time = clock();
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        time.test_control().unwrap().advance(Duration::days(3));

        let loan = ledger.apply_for_loan(client_id, terms(), &time).unwrap();
        assert_eq!(loan.issue_date, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.paid_amount, Money::ZERO);
    }

    #[test]
    fn test_single_pending_loan_per_client() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let first = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();

        let err = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap_err();
        assert!(matches!(err, LedgerError::PendingLoanExists { loan_id, .. } if loan_id == first.id));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(ledger.loans().unwrap().len(), 1);

        // once decided, a new application is accepted
        ledger.reject_loan(first.id, &clock()).unwrap();
        assert!(ledger.apply_for_loan(client_id, terms(), &clock()).is_ok());
    }

    #[test]
    fn test_application_for_missing_client() {
        let mut ledger = Ledger::with_store(MemoryStore::new());
        let err = ledger.apply_for_loan(ClientId(5), terms(), &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_term_limit() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let long = LoanTerms::new(Money::from_major(1_000), Rate::ZERO, 361).unwrap();
        let err = ledger.apply_for_loan(client_id, long, &clock()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
    }

    #[test]
    fn test_oversized_principal_is_refused() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        // fields are public, so this skips LoanTerms::new
        let huge = LoanTerms {
            principal: Money::from_str_exact("75000000000000000000000000000").unwrap(),
            annual_rate: Rate::from_percentage(12),
            duration_months: 12,
        };
        let err = ledger.apply_for_loan(client_id, huge, &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.loans().unwrap().is_empty());

        let largest = LoanTerms::new(
            Money::from_major(LoanTerms::MAX_PRINCIPAL),
            Rate::from_percentage(12),
            12,
        )
        .unwrap();
        let loan = ledger.apply_for_loan(client_id, largest, &clock()).unwrap();
        let outcome = ledger.approve_loan(loan.id, &clock()).unwrap();
        assert!(outcome.is_approved());
        let figures = ledger.loan(loan.id).unwrap().figures();
        assert!(figures.total_payable > largest.principal);
    }

    #[test]
    fn test_terminal_states_refuse_transitions() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();
        ledger.reject_loan(loan.id, &clock()).unwrap();

        let err = ledger.approve_loan(loan.id, &clock()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition { from: LoanStatus::Reject, to: LoanStatus::Approved, .. }
        ));
        assert_eq!(
            ledger.reject_loan(loan.id, &clock()).unwrap_err().kind(),
            ErrorKind::InvalidTransition
        );
    }

    #[test]
    fn test_approved_loan_cannot_be_rejected_or_reapproved() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();
        assert!(ledger.approve_loan(loan.id, &clock()).unwrap().is_approved());

        assert!(ledger.reject_loan(loan.id, &clock()).is_err());
        assert!(ledger.approve_loan(loan.id, &clock()).is_err());
    }

    #[test]
    fn test_admin_edit_bypasses_state_machine() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();
        ledger.reject_loan(loan.id, &clock()).unwrap();

        let new_terms = LoanTerms::new(Money::from_major(8_000), Rate::from_percentage(10), 6).unwrap();
        let edited = ledger
            .edit_loan(
                loan.id,
                LoanEdit {
                    terms: new_terms,
                    status: LoanStatus::Approved,
                },
                &clock(),
            )
            .unwrap();

        assert_eq!(edited.status, LoanStatus::Approved);
        assert_eq!(edited.terms, new_terms);
        assert_eq!(edited.client_id, loan.client_id);
        assert_eq!(edited.issue_date, loan.issue_date);
        assert_eq!(ledger.loan(loan.id).unwrap(), edited);
    }

    #[test]
    fn test_admin_edit_keeps_pending_exclusive() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let first = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();
        ledger.reject_loan(first.id, &clock()).unwrap();
        let second = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();

        let err = ledger
            .edit_loan(
                first.id,
                LoanEdit {
                    terms: terms(),
                    status: LoanStatus::Pending,
                },
                &clock(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::PendingLoanExists { loan_id, .. } if loan_id == second.id));

        // re-saving the pending loan itself is fine
        assert!(ledger
            .edit_loan(
                second.id,
                LoanEdit {
                    terms: terms(),
                    status: LoanStatus::Pending,
                },
                &clock(),
            )
            .is_ok());
    }

    #[test]
    fn test_delete_loan_guard() {
        let (mut ledger, client_id) = ledger_with_client(dec!(80));
        let loan = ledger.apply_for_loan(client_id, terms(), &clock()).unwrap();
        ledger
            .repo
            .create_payment(NewPayment {
                loan_id: loan.id,
                amount: Money::from_major(10),
                payment_date: loan.issue_date,
            })
            .unwrap();

        let err = ledger.delete_loan(loan.id, &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(ledger.loan(loan.id).is_ok());

        let err = ledger.delete_client(client_id, &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
