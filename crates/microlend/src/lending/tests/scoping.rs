use rust_decimal_macros::dec;

use super::common::*;
use crate::lending::domain::{
    Actor, LoanAction, LoanStatus, MemberId, OfficeId, OfficerAssignment, UserId,
};
use crate::lending::error::LendingError;
use crate::lending::scoping::{
    can_assign, can_decide, owns, visible_loans, visible_members, LoanScope, MemberScope,
};

fn loan_assigned_to(officer: &str, office: &str) -> crate::lending::domain::Loan {
    let (service, _, _) = build_service();
    let mut loan = pending_loan(&service);
    loan.officer = Some(OfficerAssignment {
        officer: UserId(officer.to_string()),
        office: OfficeId(office.to_string()),
    });
    loan
}

#[test]
fn scopes_follow_the_hierarchy() {
    assert_eq!(visible_loans(&member()), LoanScope::OwnedBy(member_id()));
    assert_eq!(visible_loans(&officer()), LoanScope::AssignedTo(officer_id()));
    assert_eq!(
        visible_loans(&manager()),
        LoanScope::Office(OfficeId("off-1".to_string()))
    );
    assert_eq!(visible_loans(&admin()), LoanScope::Unrestricted);
}

#[test]
fn loan_predicates_match_each_role() {
    let loan = loan_assigned_to("u-officer", "off-1");

    assert!(visible_loans(&member()).permits(&loan));
    assert!(!visible_loans(&other_member()).permits(&loan));
    assert!(visible_loans(&officer()).permits(&loan));
    assert!(!visible_loans(&colleague_officer()).permits(&loan));
    assert!(visible_loans(&manager()).permits(&loan));
    assert!(!visible_loans(&other_manager()).permits(&loan));
    assert!(visible_loans(&admin()).permits(&loan));
}

#[test]
fn unassigned_loans_are_only_visible_to_owner_and_admin() {
    let (service, _, _) = build_service();
    let loan = pending_loan(&service);

    assert!(visible_loans(&member()).permits(&loan));
    assert!(visible_loans(&admin()).permits(&loan));
    assert!(!visible_loans(&officer()).permits(&loan));
    assert!(!visible_loans(&manager()).permits(&loan));
}

#[test]
fn decision_rights_mirror_staff_visibility() {
    let loan = loan_assigned_to("u-officer", "off-1");

    assert!(can_decide(&officer(), &loan));
    assert!(can_decide(&manager(), &loan));
    assert!(can_decide(&admin(), &loan));
    assert!(!can_decide(&member(), &loan));
    assert!(!can_decide(&colleague_officer(), &loan));
    assert!(!can_decide(&other_manager(), &loan));
}

#[test]
fn ownership_is_member_only() {
    let loan = loan_assigned_to("u-officer", "off-1");
    assert!(owns(&member(), &loan));
    assert!(!owns(&other_member(), &loan));
    assert!(!owns(&officer(), &loan));
    assert!(!owns(&admin(), &loan));
}

#[test]
fn managers_assign_within_their_office() {
    let (service, _, _) = build_service();
    let unassigned = pending_loan(&service);
    let off_1 = OfficeId("off-1".to_string());
    let off_2 = OfficeId("off-2".to_string());

    assert!(can_assign(&manager(), &unassigned, Some(&off_1), &off_1));
    assert!(!can_assign(&manager(), &unassigned, Some(&off_1), &off_2));
    assert!(!can_assign(&other_manager(), &unassigned, Some(&off_1), &off_2));
    assert!(!can_assign(&manager(), &unassigned, None, &off_1));
    assert!(can_assign(&admin(), &unassigned, None, &off_2));
    assert!(!can_assign(&officer(), &unassigned, Some(&off_1), &off_1));

    let elsewhere = loan_assigned_to("u-officer-2", "off-2");
    assert!(!can_assign(&manager(), &elsewhere, Some(&off_1), &off_1));
}

#[test]
fn member_visibility_tracks_office() {
    let member_one = profile("m-1", "u-member", "1001", Some("off-1"));
    let member_two = profile("m-2", "u-member-2", "1002", Some("off-2"));

    assert_eq!(visible_members(&member()), MemberScope::Only(member_id()));
    assert!(visible_members(&member()).permits(&member_one));
    assert!(!visible_members(&member()).permits(&member_two));
    assert!(visible_members(&officer()).permits(&member_one));
    assert!(!visible_members(&officer()).permits(&member_two));
    assert!(visible_members(&other_manager()).permits(&member_two));
    assert!(visible_members(&admin()).permits(&member_two));
}

#[test]
fn service_lists_respect_scope() {
    let (service, _, _) = build_service();
    let mine = assigned_loan(&service);
    let other = service
        .create_loan(&MemberId("m-2".to_string()), application(dec!(2000), 3))
        .expect("second member applies");
    service
        .assign_officer(&admin(), &other.id, other_officer().user())
        .expect("assigned in off-2");

    let ids = |loans: Vec<crate::lending::domain::Loan>| -> Vec<_> {
        loans.into_iter().map(|loan| loan.id).collect()
    };

    assert_eq!(ids(service.loans_for(&member(), None).unwrap()), vec![mine.id.clone()]);
    assert_eq!(ids(service.loans_for(&officer(), None).unwrap()), vec![mine.id.clone()]);
    assert_eq!(
        ids(service.loans_for(&other_manager(), None).unwrap()),
        vec![other.id.clone()]
    );
    assert_eq!(service.loans_for(&admin(), None).unwrap().len(), 2);
    assert!(service
        .loans_for(&admin(), Some(LoanStatus::Closed))
        .unwrap()
        .is_empty());

    let members: Vec<_> = service
        .visible_members(&manager())
        .unwrap()
        .into_iter()
        .map(|profile| profile.id)
        .collect();
    assert_eq!(members, vec![member_id()]);
}

#[test]
fn loans_are_listed_newest_first() {
    let (service, _, _) = build_service();
    let first = pending_loan(&service);
    let second = pending_loan(&service);

    let listed = service.loans_for(&member(), None).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[test]
fn manager_scope_follows_the_officer_current_office() {
    let (service, _, directory) = build_service();
    let loan = assigned_loan(&service);
    assert_eq!(service.loans_for(&manager(), None).unwrap().len(), 1);

    directory.add_actor(Actor::Officer {
        user: officer_id(),
        office: OfficeId("off-2".to_string()),
    });

    assert!(service.loans_for(&manager(), None).unwrap().is_empty());
    assert!(service.loan_detail(&manager(), &loan.id).is_err());

    let moved = service.loan_detail(&other_manager(), &loan.id).expect("new office sees it");
    assert_eq!(
        moved.loan.officer_office(),
        Some(&OfficeId("off-2".to_string()))
    );
    assert_eq!(service.portfolio_summary(&other_manager()).unwrap().total_loans, 1);

    let approved = service
        .transition(&other_manager(), &loan.id, LoanAction::Approve)
        .expect("new office manager decides");
    assert_eq!(approved.status, LoanStatus::Approved);
    assert!(matches!(
        service.transition(&manager(), &loan.id, LoanAction::Disburse),
        Err(LendingError::NotFound("loan"))
    ));
}
