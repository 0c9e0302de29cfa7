//! Which loans and members an actor may see or act upon.
//!
//! The organizational hierarchy is company → office → officer → member. Every rule below
//! is a pure function of the actor and the record, so callers can use the returned
//! predicates to filter whatever query their storage layer supports.

use super::domain::{Actor, Loan, MemberId, MemberProfile, OfficeId, UserId};

/// Predicate over loans visible to a single actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanScope {
    OwnedBy(MemberId),
    AssignedTo(UserId),
    Office(OfficeId),
    Unrestricted,
}

impl LoanScope {
    pub fn permits(&self, loan: &Loan) -> bool {
        match self {
            LoanScope::OwnedBy(member) => &loan.member == member,
            LoanScope::AssignedTo(officer) => loan.officer_id() == Some(officer),
            LoanScope::Office(office) => loan.officer_office() == Some(office),
            LoanScope::Unrestricted => true,
        }
    }
}

pub fn visible_loans(actor: &Actor) -> LoanScope {
    match actor {
        Actor::Member { profile, .. } => LoanScope::OwnedBy(profile.clone()),
        Actor::Officer { user, .. } => LoanScope::AssignedTo(user.clone()),
        Actor::Manager { office, .. } => LoanScope::Office(office.clone()),
        Actor::Admin { .. } => LoanScope::Unrestricted,
    }
}

/// Whether `actor` may approve, reject, or disburse `loan`.
///
/// Staff scopes double as mutation rights; members never hold them, not even on their
/// own loans.
pub fn can_decide(actor: &Actor, loan: &Loan) -> bool {
    match actor {
        Actor::Member { .. } => false,
        Actor::Officer { .. } | Actor::Manager { .. } | Actor::Admin { .. } => {
            visible_loans(actor).permits(loan)
        }
    }
}

/// Whether `actor` is the member who owns `loan` (edit/delete rights while PENDING).
pub fn owns(actor: &Actor, loan: &Loan) -> bool {
    match actor {
        Actor::Member { profile, .. } => &loan.member == profile,
        _ => false,
    }
}

/// Whether `actor` may hand `loan` to an officer based in `officer_office`.
///
/// Managers stay inside their office: the new officer must work there, and the loan
/// must already sit in that office or, when unassigned, belong to one of its members.
pub fn can_assign(
    actor: &Actor,
    loan: &Loan,
    member_office: Option<&OfficeId>,
    officer_office: &OfficeId,
) -> bool {
    match actor {
        Actor::Admin { .. } => true,
        Actor::Manager { office, .. } => {
            let loan_office = loan.officer_office().or(member_office);
            office == officer_office && loan_office == Some(office)
        }
        Actor::Officer { .. } | Actor::Member { .. } => false,
    }
}

/// Predicate over member profiles visible to an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberScope {
    Only(MemberId),
    Office(OfficeId),
    Unrestricted,
}

impl MemberScope {
    pub fn permits(&self, member: &MemberProfile) -> bool {
        match self {
            MemberScope::Only(id) => &member.id == id,
            MemberScope::Office(office) => member.office.as_ref() == Some(office),
            MemberScope::Unrestricted => true,
        }
    }
}

pub fn visible_members(actor: &Actor) -> MemberScope {
    match actor {
        Actor::Member { profile, .. } => MemberScope::Only(profile.clone()),
        Actor::Officer { office, .. } | Actor::Manager { office, .. } => {
            MemberScope::Office(office.clone())
        }
        Actor::Admin { .. } => MemberScope::Unrestricted,
    }
}
