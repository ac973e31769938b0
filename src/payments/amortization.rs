//! amortization engine: pure functions over loan terms and the amount paid so far.
//!
//! `outstanding_balance` approximates the remaining principal by rounding the
//! paid amount down to whole installments (`k = floor(paid / installment)`)
//! and evaluating the closed-form balance after `k` payments. A partial
//! installment therefore does not reduce the figure until it completes.
//! This is a known approximation, not a schedule walk.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::LoanTerms;

/// amortization figures for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFigures {
    pub monthly_payment: Money,
    pub total_interest: Money,
    pub total_payable: Money,
    pub outstanding_balance: Money,
    pub remaining_payable: Money,
}

impl LoanFigures {
    pub fn compute(terms: &LoanTerms, paid: Money) -> Self {
        let LoanTerms {
            principal,
            annual_rate,
            duration_months,
        } = *terms;

        Self {
            monthly_payment: monthly_payment(principal, annual_rate, duration_months),
            total_interest: total_interest(principal, annual_rate, duration_months),
            total_payable: total_payable(principal, annual_rate, duration_months),
            outstanding_balance: outstanding_balance(principal, annual_rate, duration_months, paid),
            remaining_payable: remaining_payable(principal, annual_rate, duration_months, paid),
        }
    }
}

/// equal monthly installment
///
/// straight-line `principal / months` at a zero rate, otherwise the annuity
/// payment `P * r * (1 + r)^n / ((1 + r)^n - 1)` with `r` the monthly rate.
pub fn monthly_payment(principal: Money, annual_rate: Rate, months: u32) -> Money {
    if months == 0 {
        return principal;
    }

    let r = annual_rate.monthly_rate().as_decimal();
    if r.is_zero() {
        return principal / Decimal::from(months);
    }

    let p = principal.as_decimal();
    let payment = growth_factor(r, months)
        .and_then(|g| p.checked_mul(r)?.checked_mul(g)?.checked_div(g - Decimal::ONE))
        // growth past the decimal range: the annuity has converged to interest only
        .unwrap_or_else(|| p.saturating_mul(r));

    Money::from_decimal(payment)
}

/// `monthly_payment * months - principal`, saturating at the decimal range
pub fn total_interest(principal: Money, annual_rate: Rate, months: u32) -> Money {
    let installments = monthly_payment(principal, annual_rate, months)
        .as_decimal()
        .saturating_mul(Decimal::from(months));
    Money::from_decimal(installments.saturating_sub(principal.as_decimal()))
}

/// principal plus total interest
pub fn total_payable(principal: Money, annual_rate: Rate, months: u32) -> Money {
    let interest = total_interest(principal, annual_rate, months);
    Money::from_decimal(principal.as_decimal().saturating_add(interest.as_decimal()))
}

/// remaining principal after the whole installments covered by `paid`
pub fn outstanding_balance(principal: Money, annual_rate: Rate, months: u32, paid: Money) -> Money {
    let r = annual_rate.monthly_rate().as_decimal();
    if r.is_zero() {
        return principal.saturating_sub(paid);
    }

    let installment = monthly_payment(principal, annual_rate, months);
    let k = installments_covered(paid, installment, months);
    if k >= months {
        return Money::ZERO;
    }

    let remaining_fraction = match (growth_factor(r, months), growth_factor(r, k)) {
        (Some(gn), Some(gk)) => (gn - gk) / (gn - Decimal::ONE),
        // (1 + r)^n out of range: (1 + r)^k / (1 + r)^n vanishes
        _ => Decimal::ONE,
    };

    (principal * remaining_fraction).max(Money::ZERO)
}

/// principal plus interest still owed: `total_payable - paid`, floored at zero
pub fn remaining_payable(principal: Money, annual_rate: Rate, months: u32, paid: Money) -> Money {
    total_payable(principal, annual_rate, months).saturating_sub(paid)
}

/// whole installments covered by `paid`, capped at the term
fn installments_covered(paid: Money, installment: Money, months: u32) -> u32 {
    if !installment.is_positive() || !paid.is_positive() {
        return 0;
    }

    paid.as_decimal()
        .checked_div(installment.as_decimal())
        .and_then(|n| n.floor().to_u32())
        .unwrap_or(months)
        .min(months)
}

/// (1 + r)^n, or None if it leaves the decimal range
fn growth_factor(r: Decimal, n: u32) -> Option<Decimal> {
    let base = Decimal::ONE + r;
    let mut factor = Decimal::ONE;
    for _ in 0..n {
        factor = factor.checked_mul(base)?;
    }
    Some(factor)
}
