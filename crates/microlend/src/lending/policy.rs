use super::domain::Policy;
use super::money::Money;

/// Reasons a requested principal/term pair falls outside a policy's bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("principal {principal} is outside the policy range {min}..={max}")]
    AmountOutOfRange {
        principal: Money,
        min: Money,
        max: Money,
    },
    #[error("term of {term_months} months exceeds the policy maximum of {max_term_months}")]
    TermExceeded { term_months: u32, max_term_months: u32 },
    #[error("term must be at least one month")]
    InvalidTerm,
}

/// Checks a loan request against the policy bounds. Pure; consulted at application
/// and edit time only.
pub fn validate(policy: &Policy, principal: Money, term_months: u32) -> Result<(), PolicyViolation> {
    if principal < policy.min_amount || principal > policy.max_amount {
        return Err(PolicyViolation::AmountOutOfRange {
            principal,
            min: policy.min_amount,
            max: policy.max_amount,
        });
    }

    if term_months == 0 {
        return Err(PolicyViolation::InvalidTerm);
    }

    if term_months > policy.max_term_months {
        return Err(PolicyViolation::TermExceeded {
            term_months,
            max_term_months: policy.max_term_months,
        });
    }

    Ok(())
}
