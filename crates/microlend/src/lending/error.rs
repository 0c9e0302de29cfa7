use super::domain::{LoanAction, LoanStatus};
use super::policy::PolicyViolation;
use super::repository::RepositoryError;

/// Error raised by lending operations. Every variant is a rejected operation; none of them
/// leaves a loan partially updated.
#[derive(Debug, thiserror::Error)]
pub enum LendingError {
    #[error(transparent)]
    Validation(#[from] PolicyViolation),
    #[error("cannot {} a loan that is {}", .action.label(), .from.label())]
    InvalidTransition { from: LoanStatus, action: LoanAction },
    #[error("loan is {} and can no longer be changed", .status.label())]
    NotEditable { status: LoanStatus },
    #[error("transaction {0} has already been applied")]
    DuplicateTransaction(String),
    #[error("repayment amount must be greater than zero")]
    InvalidAmount,
    #[error("loan is already closed")]
    LoanAlreadyClosed,
    #[error("loan was rejected and cannot take repayments")]
    LoanRejected,
    #[error("policy is not offered to this member's company")]
    PolicyOutOfScope,
    #[error("actor is not permitted to perform this action")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for LendingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateTransaction(transaction_id) => {
                LendingError::DuplicateTransaction(transaction_id)
            }
            other => LendingError::Repository(other),
        }
    }
}
