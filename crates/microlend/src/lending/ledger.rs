//! Loan state machine and the one-time amortization snapshot.
//!
//! Everything here is pure: functions take the current loan and return the next one,
//! leaving persistence and locking to the service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{Loan, LoanAction, LoanId, LoanStatus, MemberId, Policy};
use super::error::LendingError;
use super::money::{Money, Rate};
use super::policy;

/// Flat-rate pricing of a principal over a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Amortization {
    pub interest: Money,
    pub total_payable: Money,
}

/// `interest = principal * rate/100 * term/12`, simple and non-compounding.
pub fn amortize(principal: Money, rate: Rate, term_months: u32) -> Amortization {
    // Divide last so exact half-cent results are not lost to a repeating 1/12.
    let raw_interest =
        principal.value() * rate.fraction() * Decimal::from(term_months) / Decimal::from(12u32);
    // Inputs are non-negative, so rounding cannot fail.
    let interest = Money::new(raw_interest).unwrap_or(Money::ZERO);
    Amortization {
        interest,
        total_payable: principal + interest,
    }
}

/// Terms requested by a member when applying for or editing a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanTerms {
    pub principal: Money,
    pub term_months: u32,
    pub purpose: String,
}

/// Builds a new PENDING loan, snapshotting the policy rate and pricing it once.
pub fn open_loan(
    id: LoanId,
    member: MemberId,
    policy: &Policy,
    terms: LoanTerms,
    now: DateTime<Utc>,
) -> Result<Loan, LendingError> {
    policy::validate(policy, terms.principal, terms.term_months)?;
    let pricing = amortize(terms.principal, policy.interest_rate, terms.term_months);

    Ok(Loan {
        id,
        member,
        officer: None,
        policy: Some(policy.id.clone()),
        purpose: terms.purpose,
        principal_amount: terms.principal,
        term_months: terms.term_months,
        interest_rate: policy.interest_rate,
        total_payable: pricing.total_payable,
        balance: pricing.total_payable,
        status: LoanStatus::Pending,
        created_at: now,
        approved_at: None,
        disbursed_at: None,
        version: 0,
    })
}

/// Applies a staff action. The input loan is never modified; on error the caller keeps
/// the original.
pub fn transition(loan: &Loan, action: LoanAction, now: DateTime<Utc>) -> Result<Loan, LendingError> {
    let mut next = loan.clone();
    match (loan.status, action) {
        (LoanStatus::Pending, LoanAction::Approve) => {
            next.status = LoanStatus::Approved;
            next.approved_at = Some(now);
        }
        (LoanStatus::Pending, LoanAction::Reject) => {
            next.status = LoanStatus::Rejected;
        }
        (LoanStatus::Approved, LoanAction::Disburse) => {
            next.status = LoanStatus::Disbursed;
            next.disbursed_at = Some(now);
        }
        (from, action) => return Err(LendingError::InvalidTransition { from, action }),
    }
    Ok(next)
}

/// Re-prices a PENDING loan under a (possibly different) policy.
///
/// Payments already recorded against the loan (`repaid`) still count toward the new
/// total, and a revised total they already cover closes the loan.
pub fn revise(
    loan: &Loan,
    policy: &Policy,
    terms: LoanTerms,
    repaid: Money,
) -> Result<Loan, LendingError> {
    ensure_pending(loan)?;
    policy::validate(policy, terms.principal, terms.term_months)?;
    let pricing = amortize(terms.principal, policy.interest_rate, terms.term_months);

    let mut next = loan.clone();
    next.policy = Some(policy.id.clone());
    next.purpose = terms.purpose;
    next.principal_amount = terms.principal;
    next.term_months = terms.term_months;
    next.interest_rate = policy.interest_rate;
    next.total_payable = pricing.total_payable;
    next.balance = pricing.total_payable.saturating_sub(repaid);
    if next.balance.is_zero() {
        next.status = LoanStatus::Closed;
    }
    Ok(next)
}

/// Only PENDING loans may be edited, deleted, or withdrawn by their member.
pub fn ensure_pending(loan: &Loan) -> Result<(), LendingError> {
    if loan.is_pending() {
        Ok(())
    } else {
        Err(LendingError::NotEditable {
            status: loan.status,
        })
    }
}

/// Reduces the balance by `amount`. A balance that reaches zero closes the loan whatever
/// its current status.
pub fn credit(loan: &Loan, amount: Money) -> Loan {
    let mut next = loan.clone();
    next.balance = loan.balance.saturating_sub(amount);
    if next.balance.is_zero() {
        next.status = LoanStatus::Closed;
    }
    next
}
