use serde::Serialize;

use super::domain::{Loan, LoanStatus, Repayment};
use super::money::Money;

/// Dashboard figures over the loans an actor can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioSummary {
    pub total_loans: usize,
    pub pending_loans: usize,
    /// Loans that are neither CLOSED nor REJECTED.
    pub active_loans: usize,
    pub closed_loans: usize,
    /// DISBURSED loans still carrying a balance.
    pub outstanding_loans: usize,
    pub total_principal: Money,
    pub total_repaid: Money,
    pub outstanding_balance: Money,
}

impl PortfolioSummary {
    pub fn from_records(loans: &[Loan], repayments: &[Repayment]) -> Self {
        let count = |status: LoanStatus| loans.iter().filter(|loan| loan.status == status).count();

        Self {
            total_loans: loans.len(),
            pending_loans: count(LoanStatus::Pending),
            active_loans: loans.iter().filter(|loan| loan.status.is_active()).count(),
            closed_loans: count(LoanStatus::Closed),
            outstanding_loans: loans
                .iter()
                .filter(|loan| loan.status == LoanStatus::Disbursed && !loan.balance.is_zero())
                .count(),
            total_principal: loans.iter().map(|loan| loan.principal_amount).sum(),
            total_repaid: repayments.iter().map(|repayment| repayment.amount).sum(),
            outstanding_balance: loans
                .iter()
                .filter(|loan| loan.status.is_active())
                .map(|loan| loan.balance)
                .sum(),
        }
    }
}
