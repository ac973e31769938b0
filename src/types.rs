use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};

/// surrogate identifier of a client row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub i64);

/// surrogate identifier of a loan row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub i64);

/// surrogate identifier of a payment row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub i64);

macro_rules! impl_id_display {
    ($($id:ty),*) => {
        $(impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

impl_id_display!(ClientId, LoanId, PaymentId);

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// application submitted, awaiting decision
    Pending,
    /// approved and accepting payments
    Approved,
    /// rejected by an operator or by credit-score gating
    Reject,
    /// fully settled
    Paid,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Pending,
        LoanStatus::Approved,
        LoanStatus::Reject,
        LoanStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Reject => "REJECT",
            LoanStatus::Paid => "PAID",
        }
    }

    /// no status change is accepted once reached
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Reject | LoanStatus::Paid)
    }

    /// transitions reachable through the lifecycle (admin edits bypass this)
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Approved)
                | (LoanStatus::Pending, LoanStatus::Reject)
                | (LoanStatus::Approved, LoanStatus::Paid)
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(LoanStatus::Pending),
            "APPROVED" => Ok(LoanStatus::Approved),
            "REJECT" => Ok(LoanStatus::Reject),
            "PAID" => Ok(LoanStatus::Paid),
            other => Err(LedgerError::validation(format!("unknown loan status: {other}"))),
        }
    }
}

/// client credit score, 0 to 100 inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CreditScore(Decimal);

impl CreditScore {
    pub const MIN: CreditScore = CreditScore(Decimal::ZERO);
    pub const MAX: CreditScore = CreditScore(Decimal::ONE_HUNDRED);

    pub fn new(score: Decimal) -> Result<Self> {
        if score < Decimal::ZERO || score > Decimal::ONE_HUNDRED {
            return Err(LedgerError::validation(format!(
                "credit score must be between 0 and 100, got {score}"
            )));
        }
        Ok(CreditScore(score))
    }

    /// default score assigned when none is supplied
    pub fn standard() -> Self {
        CreditScore(dec!(75.0))
    }

    /// caller guarantees `0 <= score <= 100`
    pub(crate) const fn from_decimal_unchecked(score: Decimal) -> Self {
        CreditScore(score)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CreditScore {
    type Error = LedgerError;

    fn try_from(d: Decimal) -> Result<Self> {
        CreditScore::new(d)
    }
}

impl From<CreditScore> for Decimal {
    fn from(score: CreditScore) -> Decimal {
        score.0
    }
}

impl fmt::Display for CreditScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// validated loan terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLoanTerms")]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub duration_months: u32,
}

impl LoanTerms {
    /// largest principal accepted, in major units
    pub const MAX_PRINCIPAL: i64 = 1_000_000_000_000_000;
    /// largest annual rate accepted, in whole percent
    pub const MAX_ANNUAL_PERCENT: u32 = 10_000;

    pub fn new(principal: Money, annual_rate: Rate, duration_months: u32) -> Result<Self> {
        let terms = Self {
            principal,
            annual_rate,
            duration_months,
        };
        terms.validate()?;
        Ok(terms)
    }

    /// the checks `new` applies; the fields are public, so callers that
    /// take terms from outside re-run them
    pub fn validate(&self) -> Result<()> {
        let Self {
            principal,
            annual_rate,
            duration_months,
        } = *self;

        if !principal.is_positive() {
            return Err(LedgerError::validation(format!(
                "loan amount must be positive, got {principal}"
            )));
        }
        if principal > Money::from_major(Self::MAX_PRINCIPAL) {
            return Err(LedgerError::validation(format!(
                "loan amount {principal} exceeds the maximum of {}",
                Self::MAX_PRINCIPAL
            )));
        }
        if annual_rate.is_negative() {
            return Err(LedgerError::validation(format!(
                "interest rate must be non-negative, got {annual_rate}"
            )));
        }
        if annual_rate > Rate::from_percentage(Self::MAX_ANNUAL_PERCENT) {
            return Err(LedgerError::validation(format!(
                "interest rate {} exceeds the maximum of {}%",
                // the rate may be too large to scale into a percentage
                annual_rate.as_decimal(),
                Self::MAX_ANNUAL_PERCENT
            )));
        }
        if duration_months == 0 {
            return Err(LedgerError::validation("duration must be at least one month"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawLoanTerms {
    principal: Money,
    annual_rate: Rate,
    duration_months: u32,
}

impl TryFrom<RawLoanTerms> for LoanTerms {
    type Error = LedgerError;

    fn try_from(raw: RawLoanTerms) -> Result<Self> {
        LoanTerms::new(raw.principal, raw.annual_rate, raw.duration_months)
    }
}
