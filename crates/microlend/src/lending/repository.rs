use super::domain::{
    Actor, CompanyId, Loan, LoanId, MemberId, MemberProfile, Office, OfficeId, Policy, PolicyId,
    Repayment, UserId,
};
use super::scoping::LoanScope;

/// Storage abstraction for loans and their repayments.
///
/// Implementations must enforce a unique constraint on `Repayment::transaction_id` and
/// must apply `commit_repayment` as a single atomic unit. A transaction id stays taken
/// even after `delete_loan` removes the repayment that used it.
pub trait LoanRepository: Send + Sync {
    /// Persists a new loan, returning it with its first version stamped.
    fn insert_loan(&self, loan: Loan) -> Result<Loan, RepositoryError>;
    fn fetch_loan(&self, id: &LoanId) -> Result<Option<Loan>, RepositoryError>;
    /// Overwrites a loan if its stored version still equals `expected_version`.
    fn update_loan(&self, loan: Loan, expected_version: u64) -> Result<Loan, RepositoryError>;
    /// Removes a loan and any repayments recorded against it.
    fn delete_loan(&self, id: &LoanId, expected_version: u64) -> Result<(), RepositoryError>;
    fn list_loans(&self, scope: &LoanScope) -> Result<Vec<Loan>, RepositoryError>;
    /// Inserts `repayment` and writes `loan` together: both land or neither does.
    fn commit_repayment(
        &self,
        repayment: Repayment,
        loan: Loan,
        expected_version: u64,
    ) -> Result<(Repayment, Loan), RepositoryError>;
    fn repayment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Repayment>, RepositoryError>;
    fn repayments_for_loan(&self, id: &LoanId) -> Result<Vec<Repayment>, RepositoryError>;
}

/// Read access to the organization, membership, and policy records maintained elsewhere.
pub trait Directory: Send + Sync {
    fn actor(&self, user: &UserId) -> Result<Option<Actor>, RepositoryError>;
    fn office(&self, id: &OfficeId) -> Result<Option<Office>, RepositoryError>;
    fn member(&self, id: &MemberId) -> Result<Option<MemberProfile>, RepositoryError>;
    fn members(&self) -> Result<Vec<MemberProfile>, RepositoryError>;
    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError>;
    fn policies_for(&self, company: &CompanyId) -> Result<Vec<Policy>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, found {found}")]
    StaleWrite { expected: u64, found: u64 },
    #[error("transaction id {0} is already recorded")]
    DuplicateTransaction(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
