//! Loan lifecycle and balance accounting.
//!
//! Policies bound what a member may borrow, the ledger prices and moves loans through
//! their statuses, repayments reduce balances until closure, and scoping decides which
//! records each actor may see or act upon. Storage and the organization directory are
//! traits so the web layer and tests can supply their own.

pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod money;
pub mod policy;
pub mod portfolio;
pub mod repository;
pub mod router;
pub mod scoping;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, CompanyId, Loan, LoanAction, LoanId, LoanStatus, MemberId, MemberProfile, Office,
    OfficeId, OfficerAssignment, Policy, PolicyId, Repayment, RepaymentId, UserId,
};
pub use error::LendingError;
pub use ledger::{amortize, Amortization};
pub use memory::{InMemoryDirectory, InMemoryLoanStore};
pub use money::{Money, MoneyError, Rate};
pub use policy::{validate, PolicyViolation};
pub use portfolio::PortfolioSummary;
pub use repository::{Directory, LoanRepository, RepositoryError};
pub use router::{lending_router, ACTOR_HEADER};
pub use scoping::{visible_loans, visible_members, LoanScope, MemberScope};
pub use service::{LendingService, LoanApplication, LoanDetail, RepaymentRequest};
