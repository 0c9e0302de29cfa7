use std::sync::Arc;

use axum::response::Response;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::lending::domain::{
    Actor, CompanyId, Loan, LoanAction, LoanId, MemberId, MemberProfile, Office, OfficeId,
    Policy, PolicyId, Repayment, UserId,
};
use crate::lending::memory::{InMemoryDirectory, InMemoryLoanStore};
use crate::lending::money::{Money, Rate};
use crate::lending::repository::{LoanRepository, RepositoryError};
use crate::lending::scoping::LoanScope;
use crate::lending::service::{LendingService, LoanApplication, RepaymentRequest};

pub(super) type MemoryService = LendingService<InMemoryLoanStore, InMemoryDirectory>;

pub(super) fn money(value: Decimal) -> Money {
    Money::new(value).expect("non-negative amount")
}

pub(super) fn standard_policy() -> Policy {
    Policy {
        id: PolicyId("pol-standard".to_string()),
        company: CompanyId("co-1".to_string()),
        name: "Standard".to_string(),
        interest_rate: Rate::new(dec!(12)).expect("valid rate"),
        min_amount: money(dec!(1000)),
        max_amount: money(dec!(50000)),
        max_term_months: 24,
    }
}

pub(super) fn premium_policy() -> Policy {
    Policy {
        id: PolicyId("pol-premium".to_string()),
        company: CompanyId("co-1".to_string()),
        name: "Premium".to_string(),
        interest_rate: Rate::new(dec!(8.5)).expect("valid rate"),
        min_amount: money(dec!(20000)),
        max_amount: money(dec!(200000)),
        max_term_months: 36,
    }
}

pub(super) fn foreign_policy() -> Policy {
    Policy {
        id: PolicyId("pol-foreign".to_string()),
        company: CompanyId("co-2".to_string()),
        name: "Other company".to_string(),
        interest_rate: Rate::new(dec!(10)).expect("valid rate"),
        min_amount: money(dec!(100)),
        max_amount: money(dec!(100000)),
        max_term_months: 60,
    }
}

pub(super) fn admin() -> Actor {
    Actor::Admin {
        user: UserId("u-admin".to_string()),
    }
}

pub(super) fn manager() -> Actor {
    Actor::Manager {
        user: UserId("u-manager".to_string()),
        office: OfficeId("off-1".to_string()),
    }
}

pub(super) fn other_manager() -> Actor {
    Actor::Manager {
        user: UserId("u-manager-2".to_string()),
        office: OfficeId("off-2".to_string()),
    }
}

pub(super) fn officer() -> Actor {
    Actor::Officer {
        user: UserId("u-officer".to_string()),
        office: OfficeId("off-1".to_string()),
    }
}

pub(super) fn colleague_officer() -> Actor {
    Actor::Officer {
        user: UserId("u-officer-3".to_string()),
        office: OfficeId("off-1".to_string()),
    }
}

pub(super) fn other_officer() -> Actor {
    Actor::Officer {
        user: UserId("u-officer-2".to_string()),
        office: OfficeId("off-2".to_string()),
    }
}

pub(super) fn member() -> Actor {
    Actor::Member {
        user: UserId("u-member".to_string()),
        profile: MemberId("m-1".to_string()),
    }
}

pub(super) fn other_member() -> Actor {
    Actor::Member {
        user: UserId("u-member-2".to_string()),
        profile: MemberId("m-2".to_string()),
    }
}

pub(super) fn member_id() -> MemberId {
    MemberId("m-1".to_string())
}

pub(super) fn profile(id: &str, user: &str, national_id: &str, office: Option<&str>) -> MemberProfile {
    MemberProfile {
        id: MemberId(id.to_string()),
        user: UserId(user.to_string()),
        national_id: national_id.to_string(),
        phone_number: format!("+2547000{national_id}"),
        office: office.map(|office| OfficeId(office.to_string())),
    }
}

pub(super) fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::default();
    for (id, company) in [("off-1", "co-1"), ("off-2", "co-1"), ("off-3", "co-2")] {
        directory.add_office(Office {
            id: OfficeId(id.to_string()),
            company: CompanyId(company.to_string()),
            name: format!("Office {id}"),
        });
    }
    for actor in [
        admin(),
        manager(),
        other_manager(),
        officer(),
        colleague_officer(),
        other_officer(),
    ] {
        directory.add_actor(actor);
    }
    directory
        .register_member(profile("m-1", "u-member", "1001", Some("off-1")))
        .expect("member one registers");
    directory
        .register_member(profile("m-2", "u-member-2", "1002", Some("off-2")))
        .expect("member two registers");
    directory
        .register_member(profile("m-3", "u-member-3", "1003", None))
        .expect("member without office registers");
    directory.put_policy(standard_policy());
    directory.put_policy(premium_policy());
    directory.put_policy(foreign_policy());
    directory
}

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryLoanStore>, Arc<InMemoryDirectory>) {
    let store = Arc::new(InMemoryLoanStore::default());
    let directory = Arc::new(seeded_directory());
    let service = LendingService::new(store.clone(), directory.clone());
    (service, store, directory)
}

pub(super) fn application(principal: Decimal, term_months: u32) -> LoanApplication {
    LoanApplication {
        policy: standard_policy().id,
        principal_amount: money(principal),
        term_months,
        purpose: "Stock for market stall".to_string(),
    }
}

pub(super) fn repayment(transaction_id: &str, amount: Decimal) -> RepaymentRequest {
    RepaymentRequest {
        transaction_id: transaction_id.to_string(),
        payer_phone: "+254700001001".to_string(),
        amount,
    }
}

pub(super) fn officer_id() -> UserId {
    officer().user().clone()
}

/// 10,000 over 12 months at 12%: total payable 11,200.00.
pub(super) fn pending_loan(service: &MemoryService) -> Loan {
    service
        .create_loan(&member_id(), application(dec!(10000), 12))
        .expect("loan created")
}

pub(super) fn assigned_loan(service: &MemoryService) -> Loan {
    let loan = pending_loan(service);
    service
        .assign_officer(&admin(), &loan.id, &officer_id())
        .expect("officer assigned")
}

pub(super) fn disbursed_loan(service: &MemoryService) -> Loan {
    let loan = assigned_loan(service);
    service
        .transition(&officer(), &loan.id, LoanAction::Approve)
        .expect("approved");
    service
        .transition(&officer(), &loan.id, LoanAction::Disburse)
        .expect("disbursed")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Storage that fails every call.
pub(super) struct UnavailableRepository;

impl LoanRepository for UnavailableRepository {
    fn insert_loan(&self, _loan: Loan) -> Result<Loan, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_loan(&self, _id: &LoanId) -> Result<Option<Loan>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_loan(&self, _loan: Loan, _expected_version: u64) -> Result<Loan, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_loan(&self, _id: &LoanId, _expected_version: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_loans(&self, _scope: &LoanScope) -> Result<Vec<Loan>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_repayment(
        &self,
        _repayment: Repayment,
        _loan: Loan,
        _expected_version: u64,
    ) -> Result<(Repayment, Loan), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn repayment_by_transaction(
        &self,
        _transaction_id: &str,
    ) -> Result<Option<Repayment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn repayments_for_loan(&self, _id: &LoanId) -> Result<Vec<Repayment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
