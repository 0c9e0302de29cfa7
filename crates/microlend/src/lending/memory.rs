//! In-memory implementations of the storage seams, used by the API binary and tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use super::domain::{
    Actor, CompanyId, Loan, LoanId, MemberId, MemberProfile, Office, OfficeId, Policy, PolicyId,
    Repayment, UserId,
};
use super::repository::{Directory, LoanRepository, RepositoryError};
use super::scoping::LoanScope;

#[derive(Default)]
struct LedgerTables {
    loans: BTreeMap<LoanId, Loan>,
    repayments: Vec<Repayment>,
    transactions: HashMap<String, usize>,
    /// Transaction ids whose repayments were removed with their loan. They stay taken.
    retired_transactions: HashSet<String>,
}

/// Loans and repayments behind one mutex, so a repayment and its balance update are
/// applied under the same critical section.
#[derive(Default, Clone)]
pub struct InMemoryLoanStore {
    tables: Arc<Mutex<LedgerTables>>,
}

impl InMemoryLoanStore {
    pub fn repayment_count(&self) -> usize {
        self.tables
            .lock()
            .expect("loan store mutex poisoned")
            .repayments
            .len()
    }
}

fn check_version(stored: &Loan, expected_version: u64) -> Result<(), RepositoryError> {
    if stored.version == expected_version {
        Ok(())
    } else {
        Err(RepositoryError::StaleWrite {
            expected: expected_version,
            found: stored.version,
        })
    }
}

impl LoanRepository for InMemoryLoanStore {
    fn insert_loan(&self, mut loan: Loan) -> Result<Loan, RepositoryError> {
        let mut tables = self.tables.lock().expect("loan store mutex poisoned");
        if tables.loans.contains_key(&loan.id) {
            return Err(RepositoryError::Conflict);
        }
        loan.version = 1;
        tables.loans.insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    fn fetch_loan(&self, id: &LoanId) -> Result<Option<Loan>, RepositoryError> {
        let tables = self.tables.lock().expect("loan store mutex poisoned");
        Ok(tables.loans.get(id).cloned())
    }

    fn update_loan(&self, mut loan: Loan, expected_version: u64) -> Result<Loan, RepositoryError> {
        let mut tables = self.tables.lock().expect("loan store mutex poisoned");
        let stored = tables
            .loans
            .get_mut(&loan.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(stored, expected_version)?;
        loan.version = expected_version + 1;
        *stored = loan.clone();
        Ok(loan)
    }

    fn delete_loan(&self, id: &LoanId, expected_version: u64) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().expect("loan store mutex poisoned");
        let stored = tables.loans.get(id).ok_or(RepositoryError::NotFound)?;
        check_version(stored, expected_version)?;
        tables.loans.remove(id);

        let LedgerTables {
            repayments,
            transactions,
            retired_transactions,
            ..
        } = &mut *tables;
        repayments.retain(|repayment| {
            if &repayment.loan == id {
                retired_transactions.insert(repayment.transaction_id.clone());
                false
            } else {
                true
            }
        });
        transactions.clear();
        for (index, repayment) in repayments.iter().enumerate() {
            transactions.insert(repayment.transaction_id.clone(), index);
        }
        Ok(())
    }

    fn list_loans(&self, scope: &LoanScope) -> Result<Vec<Loan>, RepositoryError> {
        let tables = self.tables.lock().expect("loan store mutex poisoned");
        Ok(tables
            .loans
            .values()
            .filter(|loan| scope.permits(loan))
            .cloned()
            .collect())
    }

    fn commit_repayment(
        &self,
        repayment: Repayment,
        mut loan: Loan,
        expected_version: u64,
    ) -> Result<(Repayment, Loan), RepositoryError> {
        let mut tables = self.tables.lock().expect("loan store mutex poisoned");

        // Validate both writes before applying either.
        if tables.transactions.contains_key(&repayment.transaction_id)
            || tables
                .retired_transactions
                .contains(&repayment.transaction_id)
        {
            return Err(RepositoryError::DuplicateTransaction(
                repayment.transaction_id,
            ));
        }
        let stored = tables.loans.get(&loan.id).ok_or(RepositoryError::NotFound)?;
        check_version(stored, expected_version)?;

        loan.version = expected_version + 1;
        tables.loans.insert(loan.id.clone(), loan.clone());
        let index = tables.repayments.len();
        tables
            .transactions
            .insert(repayment.transaction_id.clone(), index);
        tables.repayments.push(repayment.clone());
        Ok((repayment, loan))
    }

    fn repayment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Repayment>, RepositoryError> {
        let tables = self.tables.lock().expect("loan store mutex poisoned");
        Ok(tables
            .transactions
            .get(transaction_id)
            .and_then(|index| tables.repayments.get(*index))
            .cloned())
    }

    fn repayments_for_loan(&self, id: &LoanId) -> Result<Vec<Repayment>, RepositoryError> {
        let tables = self.tables.lock().expect("loan store mutex poisoned");
        Ok(tables
            .repayments
            .iter()
            .filter(|repayment| &repayment.loan == id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct DirectoryTables {
    actors: HashMap<UserId, Actor>,
    offices: HashMap<OfficeId, Office>,
    members: BTreeMap<MemberId, MemberProfile>,
    policies: BTreeMap<PolicyId, Policy>,
}

/// Organization, membership, and policy records held in memory.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    tables: Arc<RwLock<DirectoryTables>>,
}

impl InMemoryDirectory {
    pub fn add_office(&self, office: Office) {
        let mut tables = self.tables.write().expect("directory lock poisoned");
        tables.offices.insert(office.id.clone(), office);
    }

    pub fn add_actor(&self, actor: Actor) {
        let mut tables = self.tables.write().expect("directory lock poisoned");
        tables.actors.insert(actor.user().clone(), actor);
    }

    /// Registers a member profile and its member identity. National ids are unique.
    pub fn register_member(&self, profile: MemberProfile) -> Result<Actor, RepositoryError> {
        let mut tables = self.tables.write().expect("directory lock poisoned");
        let taken = tables
            .members
            .values()
            .any(|existing| existing.national_id == profile.national_id);
        if taken || tables.members.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }

        let actor = Actor::Member {
            user: profile.user.clone(),
            profile: profile.id.clone(),
        };
        tables.actors.insert(profile.user.clone(), actor.clone());
        tables.members.insert(profile.id.clone(), profile);
        Ok(actor)
    }

    /// Publishes or replaces a policy. Existing loans keep the terms they snapshotted.
    pub fn put_policy(&self, policy: Policy) {
        let mut tables = self.tables.write().expect("directory lock poisoned");
        tables.policies.insert(policy.id.clone(), policy);
    }
}

impl Directory for InMemoryDirectory {
    fn actor(&self, user: &UserId) -> Result<Option<Actor>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables.actors.get(user).cloned())
    }

    fn office(&self, id: &OfficeId) -> Result<Option<Office>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables.offices.get(id).cloned())
    }

    fn member(&self, id: &MemberId) -> Result<Option<MemberProfile>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables.members.get(id).cloned())
    }

    fn members(&self) -> Result<Vec<MemberProfile>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables.members.values().cloned().collect())
    }

    fn policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables.policies.get(id).cloned())
    }

    fn policies_for(&self, company: &CompanyId) -> Result<Vec<Policy>, RepositoryError> {
        let tables = self.tables.read().expect("directory lock poisoned");
        Ok(tables
            .policies
            .values()
            .filter(|policy| &policy.company == company)
            .cloned()
            .collect())
    }
}
