use rust_decimal_macros::dec;

use super::common::*;
use crate::lending::domain::LoanStatus;
use crate::lending::error::LendingError;
use crate::lending::policy::{validate, PolicyViolation};

#[test]
fn accepts_bounds_inclusively() {
    let policy = standard_policy();
    assert_eq!(validate(&policy, money(dec!(1000)), 24), Ok(()));
    assert_eq!(validate(&policy, money(dec!(50000)), 1), Ok(()));
}

#[test]
fn rejects_principal_below_minimum() {
    let policy = standard_policy();
    match validate(&policy, money(dec!(999.99)), 12) {
        Err(PolicyViolation::AmountOutOfRange { principal, min, max }) => {
            assert_eq!(principal, money(dec!(999.99)));
            assert_eq!(min, policy.min_amount);
            assert_eq!(max, policy.max_amount);
        }
        other => panic!("expected amount out of range, got {other:?}"),
    }
}

#[test]
fn rejects_principal_above_maximum() {
    let policy = standard_policy();
    assert!(matches!(
        validate(&policy, money(dec!(60000)), 12),
        Err(PolicyViolation::AmountOutOfRange { .. })
    ));
}

#[test]
fn rejects_term_beyond_policy_maximum() {
    let policy = standard_policy();
    assert_eq!(
        validate(&policy, money(dec!(5000)), 25),
        Err(PolicyViolation::TermExceeded {
            term_months: 25,
            max_term_months: 24,
        })
    );
}

#[test]
fn rejects_zero_term() {
    let policy = standard_policy();
    assert_eq!(
        validate(&policy, money(dec!(5000)), 0),
        Err(PolicyViolation::InvalidTerm)
    );
}

#[test]
fn create_loan_surfaces_amount_out_of_range() {
    let (service, store, _) = build_service();

    match service.create_loan(&member_id(), application(dec!(60000), 12)) {
        Err(LendingError::Validation(PolicyViolation::AmountOutOfRange { .. })) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(service
        .loans_for(&admin(), None)
        .expect("list succeeds")
        .is_empty());
    assert_eq!(store.repayment_count(), 0);
}

#[test]
fn create_loan_requires_policy_from_member_company() {
    let (service, _, _) = build_service();
    let mut request = application(dec!(5000), 12);
    request.policy = foreign_policy().id;

    assert!(matches!(
        service.create_loan(&member_id(), request),
        Err(LendingError::PolicyOutOfScope)
    ));
}

#[test]
fn member_without_office_has_no_policies_in_scope() {
    let (service, _, _) = build_service();
    let unplaced = crate::lending::domain::MemberId("m-3".to_string());

    assert!(service
        .policies_for_member(&unplaced)
        .expect("lookup succeeds")
        .is_empty());
    assert!(matches!(
        service.create_loan(&unplaced, application(dec!(5000), 12)),
        Err(LendingError::PolicyOutOfScope)
    ));
}

#[test]
fn policies_for_member_lists_company_products() {
    let (service, _, _) = build_service();
    let mut names: Vec<String> = service
        .policies_for_member(&member_id())
        .expect("lookup succeeds")
        .into_iter()
        .map(|policy| policy.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Premium".to_string(), "Standard".to_string()]);
}

#[test]
fn unknown_policy_and_member_are_not_found() {
    let (service, _, _) = build_service();
    let mut request = application(dec!(5000), 12);
    request.policy = crate::lending::domain::PolicyId("pol-missing".to_string());
    assert!(matches!(
        service.create_loan(&member_id(), request),
        Err(LendingError::NotFound("policy"))
    ));

    let ghost = crate::lending::domain::MemberId("m-ghost".to_string());
    assert!(matches!(
        service.create_loan(&ghost, application(dec!(5000), 12)),
        Err(LendingError::NotFound("member"))
    ));
}

#[test]
fn policy_edits_do_not_touch_existing_loans() {
    let (service, _, directory) = build_service();
    let loan = pending_loan(&service);

    let mut repriced = standard_policy();
    repriced.interest_rate = crate::lending::money::Rate::new(dec!(30)).expect("valid rate");
    repriced.max_amount = money(dec!(5000));
    directory.put_policy(repriced);

    let detail = service
        .loan_detail(&member(), &loan.id)
        .expect("member sees own loan");
    assert_eq!(detail.loan.interest_rate.percent(), dec!(12));
    assert_eq!(detail.loan.total_payable, money(dec!(11200)));
    assert_eq!(detail.loan.status, LoanStatus::Pending);
}
