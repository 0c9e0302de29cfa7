use metrics_exporter_prometheus::PrometheusHandle;
use microlend::lending::{
    Actor, CompanyId, InMemoryDirectory, LendingError, MemberId, MemberProfile, Money, Office,
    OfficeId, Policy, PolicyId, Rate, UserId,
};
use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_COMPANY: &str = "co-umoja";
pub(crate) const DEMO_OFFICE: &str = "off-nairobi";
pub(crate) const DEMO_ADMIN: &str = "u-admin";
pub(crate) const DEMO_MANAGER: &str = "u-manager";
pub(crate) const DEMO_OFFICER: &str = "u-officer";
pub(crate) const DEMO_MEMBER: &str = "u-wanjiku";
pub(crate) const DEMO_MEMBER_PROFILE: &str = "m-0001";
pub(crate) const DEMO_POLICY: &str = "pol-biashara";

fn money(units: i64) -> Result<Money, LendingError> {
    Money::new(Decimal::from(units)).map_err(|_| LendingError::InvalidAmount)
}

fn rate(percent: Decimal) -> Result<Rate, LendingError> {
    Rate::new(percent).map_err(|_| LendingError::InvalidAmount)
}

/// One company with a single branch, its staff, one member, and two loan products.
pub(crate) fn seed_directory() -> Result<InMemoryDirectory, LendingError> {
    let directory = InMemoryDirectory::default();
    let company = CompanyId(DEMO_COMPANY.to_string());
    let office = OfficeId(DEMO_OFFICE.to_string());

    directory.add_office(Office {
        id: office.clone(),
        company: company.clone(),
        name: "Nairobi CBD".to_string(),
    });
    directory.add_actor(Actor::Admin {
        user: UserId(DEMO_ADMIN.to_string()),
    });
    directory.add_actor(Actor::Manager {
        user: UserId(DEMO_MANAGER.to_string()),
        office: office.clone(),
    });
    directory.add_actor(Actor::Officer {
        user: UserId(DEMO_OFFICER.to_string()),
        office: office.clone(),
    });
    directory.register_member(MemberProfile {
        id: MemberId(DEMO_MEMBER_PROFILE.to_string()),
        user: UserId(DEMO_MEMBER.to_string()),
        national_id: "27450013".to_string(),
        phone_number: "+254712000001".to_string(),
        office: Some(office),
    })?;

    directory.put_policy(Policy {
        id: PolicyId(DEMO_POLICY.to_string()),
        company: company.clone(),
        name: "Biashara working capital".to_string(),
        interest_rate: rate(Decimal::from(12))?,
        min_amount: money(1_000)?,
        max_amount: money(50_000)?,
        max_term_months: 24,
    });
    directory.put_policy(Policy {
        id: PolicyId("pol-kilimo".to_string()),
        company,
        name: "Kilimo seasonal".to_string(),
        interest_rate: rate(Decimal::new(95, 1))?,
        min_amount: money(5_000)?,
        max_amount: money(150_000)?,
        max_term_months: 12,
    });

    Ok(directory)
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|err| format!("failed to parse '{raw}' as a decimal amount ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use microlend::lending::Directory;

    #[test]
    fn seeded_member_sees_both_products() {
        let directory = seed_directory().expect("seed succeeds");
        let member = directory
            .actor(&UserId(DEMO_MEMBER.to_string()))
            .expect("lookup")
            .expect("member registered");
        assert_eq!(member.role_label(), "member");
        let policies = directory
            .policies_for(&CompanyId(DEMO_COMPANY.to_string()))
            .expect("policies listed");
        assert_eq!(policies.len(), 2);
    }

    #[test]
    fn parse_amount_rejects_text() {
        assert!(parse_amount("12.50").is_ok());
        assert!(parse_amount("twelve").is_err());
    }
}
