use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    Actor, Loan, LoanAction, LoanId, LoanStatus, MemberId, MemberProfile, OfficerAssignment,
    Policy, PolicyId, Repayment, RepaymentId, UserId,
};
use super::error::LendingError;
use super::ledger::{self, LoanTerms};
use super::money::Money;
use super::portfolio::PortfolioSummary;
use super::repository::{Directory, LoanRepository};
use super::scoping::{self, LoanScope};

/// Loan request submitted by a member, either new or as an edit of a PENDING loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub policy: PolicyId,
    pub principal_amount: Money,
    pub term_months: u32,
    #[serde(default)]
    pub purpose: String,
}

impl LoanApplication {
    fn terms(&self) -> LoanTerms {
        LoanTerms {
            principal: self.principal_amount,
            term_months: self.term_months,
            purpose: self.purpose.clone(),
        }
    }
}

/// Incoming payment notification. The amount stays a raw decimal so non-positive values
/// can be rejected as `InvalidAmount` rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRequest {
    pub transaction_id: String,
    pub payer_phone: String,
    pub amount: Decimal,
}

/// A loan together with the repayments recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanDetail {
    pub loan: Loan,
    pub repayments: Vec<Repayment>,
}

static LOAN_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REPAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_loan_id() -> LoanId {
    let id = LOAN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LoanId(format!("loan-{id:06}"))
}

fn next_repayment_id() -> RepaymentId {
    let id = REPAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RepaymentId(format!("rep-{id:06}"))
}

/// One mutex per loan. Operations on the same loan queue up; different loans never
/// contend beyond the brief map lookup.
#[derive(Default)]
struct LoanLocks {
    slots: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl LoanLocks {
    fn slot(&self, id: &LoanId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(id.clone()).or_default().clone()
    }

    fn forget(&self, id: &LoanId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Service composing the loan ledger, repayment processing, and access scoping over the
/// storage seams.
pub struct LendingService<R, D> {
    loans: Arc<R>,
    directory: Arc<D>,
    locks: LoanLocks,
}

impl<R, D> LendingService<R, D>
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    pub fn new(loans: Arc<R>, directory: Arc<D>) -> Self {
        Self {
            loans,
            directory,
            locks: LoanLocks::default(),
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    #[cfg(test)]
    pub(crate) fn lock_slots(&self) -> usize {
        self.locks.len()
    }

    /// Opens a PENDING loan for `member` under a policy offered by the member's company.
    pub fn create_loan(
        &self,
        member: &MemberId,
        application: LoanApplication,
    ) -> Result<Loan, LendingError> {
        let profile = self
            .directory
            .member(member)?
            .ok_or(LendingError::NotFound("member"))?;
        let policy = self.scoped_policy(&profile, &application.policy)?;

        let loan = ledger::open_loan(
            next_loan_id(),
            profile.id,
            &policy,
            application.terms(),
            Utc::now(),
        )?;
        let stored = self.loans.insert_loan(loan)?;

        info!(
            loan_id = %stored.id.0,
            member = %stored.member.0,
            principal = %stored.principal_amount,
            total_payable = %stored.total_payable,
            "loan application created"
        );
        Ok(stored)
    }

    /// Policies a member may apply under, resolved member → office → company.
    pub fn policies_for_member(&self, member: &MemberId) -> Result<Vec<Policy>, LendingError> {
        let profile = self
            .directory
            .member(member)?
            .ok_or(LendingError::NotFound("member"))?;
        let Some(office_id) = profile.office else {
            return Ok(Vec::new());
        };
        let office = self
            .directory
            .office(&office_id)?
            .ok_or(LendingError::NotFound("office"))?;
        Ok(self.directory.policies_for(&office.company)?)
    }

    /// Applies an approve/reject/disburse action on behalf of scoped staff.
    pub fn transition(
        &self,
        actor: &Actor,
        loan_id: &LoanId,
        action: LoanAction,
    ) -> Result<Loan, LendingError> {
        let slot = self.existing_slot(loan_id)?;
        let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.visible_loan(actor, loan_id)?;
        if !scoping::can_decide(actor, &loan) {
            return Err(LendingError::Forbidden);
        }

        let next = match ledger::transition(&loan, action, Utc::now()) {
            Ok(next) => next,
            Err(err) => {
                warn!(
                    loan_id = %loan.id.0,
                    status = loan.status.label(),
                    action = action.label(),
                    "rejected loan transition"
                );
                return Err(err);
            }
        };
        let stored = self.loans.update_loan(next, loan.version)?;

        info!(
            loan_id = %stored.id.0,
            actor = %actor.user().0,
            from = loan.status.label(),
            status = stored.status.label(),
            "loan transitioned"
        );
        Ok(stored)
    }

    /// Lets the owning member change the terms of a PENDING loan, re-pricing it.
    pub fn edit(
        &self,
        actor: &Actor,
        loan_id: &LoanId,
        application: LoanApplication,
    ) -> Result<Loan, LendingError> {
        let slot = self.existing_slot(loan_id)?;
        let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.owned_loan(actor, loan_id)?;
        ledger::ensure_pending(&loan)?;

        let profile = self
            .directory
            .member(&loan.member)?
            .ok_or(LendingError::NotFound("member"))?;
        let policy = self.scoped_policy(&profile, &application.policy)?;
        let repaid: Money = self
            .loans
            .repayments_for_loan(&loan.id)?
            .iter()
            .map(|repayment| repayment.amount)
            .sum();
        let next = ledger::revise(&loan, &policy, application.terms(), repaid)?;
        let stored = self.loans.update_loan(next, loan.version)?;

        info!(
            loan_id = %stored.id.0,
            principal = %stored.principal_amount,
            term_months = stored.term_months,
            total_payable = %stored.total_payable,
            "loan application edited"
        );
        Ok(stored)
    }

    /// Lets the owning member withdraw a PENDING loan.
    pub fn delete(&self, actor: &Actor, loan_id: &LoanId) -> Result<(), LendingError> {
        let slot = self.existing_slot(loan_id)?;
        let held = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self.owned_loan(actor, loan_id)?;
        ledger::ensure_pending(&loan)?;
        self.loans.delete_loan(&loan.id, loan.version)?;

        drop(held);
        self.locks.forget(loan_id);
        info!(loan_id = %loan_id.0, "loan application deleted");
        Ok(())
    }

    /// Hands a non-terminal, undisbursed loan to an officer.
    pub fn assign_officer(
        &self,
        actor: &Actor,
        loan_id: &LoanId,
        officer: &UserId,
    ) -> Result<Loan, LendingError> {
        let slot = self.existing_slot(loan_id)?;
        let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self
            .loans
            .fetch_loan(loan_id)?
            .ok_or(LendingError::NotFound("loan"))?;
        let loan = self.with_current_office(loan)?;
        let officer_office = match self.directory.actor(officer)? {
            Some(Actor::Officer { office, .. }) => office,
            _ => return Err(LendingError::NotFound("officer")),
        };
        let member_office = self
            .directory
            .member(&loan.member)?
            .and_then(|profile| profile.office);

        if !scoping::can_assign(actor, &loan, member_office.as_ref(), &officer_office) {
            return Err(LendingError::Forbidden);
        }
        if !matches!(loan.status, LoanStatus::Pending | LoanStatus::Approved) {
            return Err(LendingError::NotEditable {
                status: loan.status,
            });
        }

        let mut next = loan.clone();
        next.officer = Some(OfficerAssignment {
            officer: officer.clone(),
            office: officer_office,
        });
        let stored = self.loans.update_loan(next, loan.version)?;

        info!(
            loan_id = %stored.id.0,
            officer = %officer.0,
            actor = %actor.user().0,
            "loan officer assigned"
        );
        Ok(stored)
    }

    /// Records a payment and reduces the loan balance in one storage commit.
    ///
    /// Replays of a known `transaction_id` fail with `DuplicateTransaction` and leave the
    /// balance untouched. A balance driven to zero closes the loan regardless of status.
    pub fn apply_repayment(
        &self,
        loan_id: &LoanId,
        request: RepaymentRequest,
    ) -> Result<Repayment, LendingError> {
        if request.amount <= Decimal::ZERO {
            return Err(LendingError::InvalidAmount);
        }
        let amount = Money::new(request.amount).map_err(|_| LendingError::InvalidAmount)?;
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        if self
            .loans
            .repayment_by_transaction(&request.transaction_id)?
            .is_some()
        {
            warn!(
                loan_id = %loan_id.0,
                transaction_id = %request.transaction_id,
                "duplicate repayment notification ignored"
            );
            return Err(LendingError::DuplicateTransaction(request.transaction_id));
        }

        let slot = self.existing_slot(loan_id)?;
        let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let loan = self
            .loans
            .fetch_loan(loan_id)?
            .ok_or(LendingError::NotFound("loan"))?;
        match loan.status {
            LoanStatus::Closed => return Err(LendingError::LoanAlreadyClosed),
            LoanStatus::Rejected => return Err(LendingError::LoanRejected),
            LoanStatus::Pending | LoanStatus::Approved | LoanStatus::Disbursed => {}
        }
        if loan.status != LoanStatus::Disbursed {
            debug!(
                loan_id = %loan.id.0,
                status = loan.status.label(),
                "repayment received before disbursement"
            );
        }

        let repayment = Repayment {
            id: next_repayment_id(),
            loan: loan.id.clone(),
            transaction_id: request.transaction_id,
            payer_phone: request.payer_phone,
            amount,
            paid_at: Utc::now(),
        };
        let next = ledger::credit(&loan, amount);

        let (repayment, stored) = match self.loans.commit_repayment(repayment, next, loan.version)
        {
            Ok(committed) => committed,
            Err(err) => {
                let err = LendingError::from(err);
                if let LendingError::DuplicateTransaction(transaction_id) = &err {
                    warn!(
                        loan_id = %loan.id.0,
                        transaction_id = %transaction_id,
                        "duplicate repayment rejected by storage"
                    );
                }
                return Err(err);
            }
        };

        info!(
            loan_id = %stored.id.0,
            transaction_id = %repayment.transaction_id,
            amount = %repayment.amount,
            balance = %stored.balance,
            "repayment applied"
        );
        if stored.status == LoanStatus::Closed {
            info!(loan_id = %stored.id.0, previous_status = loan.status.label(), "loan closed");
        }
        Ok(repayment)
    }

    /// Loans visible to `actor`, newest first, optionally narrowed to one status.
    pub fn loans_for(
        &self,
        actor: &Actor,
        status: Option<LoanStatus>,
    ) -> Result<Vec<Loan>, LendingError> {
        let mut loans = self.scoped_loans(actor)?;
        if let Some(status) = status {
            loans.retain(|loan| loan.status == status);
        }
        loans.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(loans)
    }

    pub fn loan_detail(&self, actor: &Actor, loan_id: &LoanId) -> Result<LoanDetail, LendingError> {
        let loan = self.visible_loan(actor, loan_id)?;
        let repayments = self.loans.repayments_for_loan(&loan.id)?;
        Ok(LoanDetail { loan, repayments })
    }

    /// Repayments against loans visible to `actor`, most recent first.
    pub fn repayments_for(&self, actor: &Actor) -> Result<Vec<Repayment>, LendingError> {
        let loans = self.scoped_loans(actor)?;
        let mut repayments = Vec::new();
        for loan in &loans {
            repayments.extend(self.loans.repayments_for_loan(&loan.id)?);
        }
        repayments.sort_by_key(|repayment| Reverse(repayment.paid_at));
        Ok(repayments)
    }

    pub fn visible_members(&self, actor: &Actor) -> Result<Vec<MemberProfile>, LendingError> {
        let scope = scoping::visible_members(actor);
        let members = self.directory.members()?;
        Ok(members
            .into_iter()
            .filter(|member| scope.permits(member))
            .collect())
    }

    pub fn portfolio_summary(&self, actor: &Actor) -> Result<PortfolioSummary, LendingError> {
        let loans = self.scoped_loans(actor)?;
        let mut repayments = Vec::new();
        for loan in &loans {
            repayments.extend(self.loans.repayments_for_loan(&loan.id)?);
        }
        Ok(PortfolioSummary::from_records(&loans, &repayments))
    }

    fn scoped_policy(
        &self,
        profile: &MemberProfile,
        policy_id: &PolicyId,
    ) -> Result<Policy, LendingError> {
        let policy = self
            .directory
            .policy(policy_id)?
            .ok_or(LendingError::NotFound("policy"))?;
        let office = match &profile.office {
            Some(office_id) => self.directory.office(office_id)?,
            None => None,
        };
        match office {
            Some(office) if office.company == policy.company => Ok(policy),
            _ => Err(LendingError::PolicyOutOfScope),
        }
    }

    /// Per-loan lock slot. Slots are only registered for loans that exist.
    fn existing_slot(&self, loan_id: &LoanId) -> Result<Arc<Mutex<()>>, LendingError> {
        if self.loans.fetch_loan(loan_id)?.is_none() {
            return Err(LendingError::NotFound("loan"));
        }
        Ok(self.locks.slot(loan_id))
    }

    /// Replaces the stored office of the assigned officer with the one the directory
    /// currently lists, so manager scope follows officers who change office.
    fn with_current_office(&self, mut loan: Loan) -> Result<Loan, LendingError> {
        if let Some(assignment) = loan.officer.as_mut() {
            if let Some(Actor::Officer { office, .. }) = self.directory.actor(&assignment.officer)? {
                assignment.office = office;
            }
        }
        Ok(loan)
    }

    fn scoped_loans(&self, actor: &Actor) -> Result<Vec<Loan>, LendingError> {
        let scope = scoping::visible_loans(actor);
        // Stored offices may be stale, so office scope filters after the refresh.
        let stored = match &scope {
            LoanScope::Office(_) => self.loans.list_loans(&LoanScope::Unrestricted)?,
            _ => self.loans.list_loans(&scope)?,
        };

        let mut loans = Vec::with_capacity(stored.len());
        for loan in stored {
            let loan = self.with_current_office(loan)?;
            if scope.permits(&loan) {
                loans.push(loan);
            }
        }
        Ok(loans)
    }

    /// Fetches a loan the actor can see. Loans outside the actor's scope are reported as
    /// missing so their existence is not leaked.
    fn visible_loan(&self, actor: &Actor, loan_id: &LoanId) -> Result<Loan, LendingError> {
        let Some(loan) = self.loans.fetch_loan(loan_id)? else {
            return Err(LendingError::NotFound("loan"));
        };
        let loan = self.with_current_office(loan)?;
        if scoping::visible_loans(actor).permits(&loan) {
            Ok(loan)
        } else {
            Err(LendingError::NotFound("loan"))
        }
    }

    fn owned_loan(&self, actor: &Actor, loan_id: &LoanId) -> Result<Loan, LendingError> {
        let loan = self.visible_loan(actor, loan_id)?;
        if scoping::owns(actor, &loan) {
            Ok(loan)
        } else {
            Err(LendingError::Forbidden)
        }
    }
}
