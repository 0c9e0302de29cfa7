use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::{Money, Rate};

/// Identifier wrapper for companies, the top of the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Identifier wrapper for offices; every office belongs to one company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfficeId(pub String);

/// Identifier of an authenticated user account (staff or member).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier of a member profile, the borrower side of a loan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepaymentId(pub String);

/// Branch office scoped to a single company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub company: CompanyId,
    pub name: String,
}

/// Borrower profile attached to a member account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub user: UserId,
    pub national_id: String,
    pub phone_number: String,
    pub office: Option<OfficeId>,
}

/// Loan product terms published by a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub company: CompanyId,
    pub name: String,
    pub interest_rate: Rate,
    pub min_amount: Money,
    pub max_amount: Money,
    pub max_term_months: u32,
}

/// Authenticated identity with its organizational assignment.
///
/// Each variant carries only what scoping needs, so permission checks are exhaustive
/// matches rather than role-string comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Admin { user: UserId },
    Manager { user: UserId, office: OfficeId },
    Officer { user: UserId, office: OfficeId },
    Member { user: UserId, profile: MemberId },
}

impl Actor {
    pub fn user(&self) -> &UserId {
        match self {
            Actor::Admin { user }
            | Actor::Manager { user, .. }
            | Actor::Officer { user, .. }
            | Actor::Member { user, .. } => user,
        }
    }

    pub const fn role_label(&self) -> &'static str {
        match self {
            Actor::Admin { .. } => "admin",
            Actor::Manager { .. } => "manager",
            Actor::Officer { .. } => "officer",
            Actor::Member { .. } => "member",
        }
    }
}

/// Lifecycle of a loan. REJECTED and CLOSED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Closed,
}

impl LoanStatus {
    pub const fn all() -> [Self; 5] {
        [
            Self::Pending,
            Self::Approved,
            Self::Rejected,
            Self::Disbursed,
            Self::Closed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Closed => "CLOSED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Rejected | LoanStatus::Closed)
    }

    /// Loans still carrying obligations or awaiting a decision.
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// Staff-initiated status changes. Closure is never an action; it follows from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanAction {
    Approve,
    Reject,
    Disburse,
}

impl LoanAction {
    pub const fn all() -> [Self; 3] {
        [Self::Approve, Self::Reject, Self::Disburse]
    }

    pub const fn label(self) -> &'static str {
        match self {
            LoanAction::Approve => "approve",
            LoanAction::Reject => "reject",
            LoanAction::Disburse => "disburse",
        }
    }
}

/// Officer assigned to a loan, with the office captured at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerAssignment {
    pub officer: UserId,
    pub office: OfficeId,
}

/// A member's loan, carrying the policy terms snapshotted when it was priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub member: MemberId,
    pub officer: Option<OfficerAssignment>,
    pub policy: Option<PolicyId>,
    pub purpose: String,
    pub principal_amount: Money,
    pub term_months: u32,
    pub interest_rate: Rate,
    pub total_payable: Money,
    pub balance: Money,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    /// Bumped on every persisted write; used for optimistic conflict detection.
    pub version: u64,
}

impl Loan {
    pub fn is_pending(&self) -> bool {
        self.status == LoanStatus::Pending
    }

    pub fn officer_id(&self) -> Option<&UserId> {
        self.officer.as_ref().map(|assignment| &assignment.officer)
    }

    pub fn officer_office(&self) -> Option<&OfficeId> {
        self.officer.as_ref().map(|assignment| &assignment.office)
    }

    /// Amount collected so far.
    pub fn amount_repaid(&self) -> Money {
        self.total_payable.saturating_sub(self.balance)
    }
}

/// Immutable record of one incoming payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub loan: LoanId,
    pub transaction_id: String,
    pub payer_phone: String,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}
