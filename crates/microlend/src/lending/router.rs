use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{Actor, LoanAction, LoanId, LoanStatus, UserId};
use super::error::LendingError;
use super::repository::{Directory, LoanRepository};
use super::service::{LendingService, LoanApplication, RepaymentRequest};

/// Header carrying the user id established by the upstream authentication layer.
pub const ACTOR_HEADER: &str = "x-user-id";

type SharedService<R, D> = Arc<LendingService<R, D>>;

/// Router builder exposing the lending operations as JSON endpoints.
pub fn lending_router<R, D>(service: SharedService<R, D>) -> Router
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    Router::new()
        .route(
            "/api/v1/loans",
            get(list_loans_handler::<R, D>).post(create_loan_handler::<R, D>),
        )
        .route(
            "/api/v1/loans/:loan_id",
            get(loan_detail_handler::<R, D>)
                .put(edit_loan_handler::<R, D>)
                .delete(delete_loan_handler::<R, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/actions",
            post(transition_handler::<R, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/officer",
            post(assign_officer_handler::<R, D>),
        )
        .route(
            "/api/v1/loans/:loan_id/repayments",
            post(repayment_handler::<R, D>),
        )
        .route("/api/v1/repayments", get(list_repayments_handler::<R, D>))
        .route("/api/v1/members", get(list_members_handler::<R, D>))
        .route("/api/v1/policies", get(list_policies_handler::<R, D>))
        .route("/api/v1/portfolio", get(portfolio_handler::<R, D>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoanListQuery {
    #[serde(default)]
    pub(crate) status: Option<LoanStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ActionRequest {
    pub(crate) action: LoanAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssignOfficerRequest {
    pub(crate) officer: UserId,
}

fn error_payload(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) fn error_response(err: LendingError) -> Response {
    let status = match &err {
        LendingError::Validation(_) | LendingError::InvalidAmount => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LendingError::InvalidTransition { .. }
        | LendingError::NotEditable { .. }
        | LendingError::DuplicateTransaction(_)
        | LendingError::LoanAlreadyClosed
        | LendingError::LoanRejected => StatusCode::CONFLICT,
        LendingError::PolicyOutOfScope | LendingError::Forbidden => StatusCode::FORBIDDEN,
        LendingError::NotFound(_) => StatusCode::NOT_FOUND,
        LendingError::Repository(source) => {
            error!(error = %source, "lending storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_payload(status, err.to_string())
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LendingError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Resolves the calling actor, answering 401 when the identity is missing or unknown.
fn resolve_actor<R, D>(
    service: &SharedService<R, D>,
    headers: &HeaderMap,
) -> Result<Actor, Response>
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let Some(user) = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Err(error_payload(
            StatusCode::UNAUTHORIZED,
            "missing authenticated user",
        ));
    };

    match service.directory().actor(&UserId(user.to_string())) {
        Ok(Some(actor)) => Ok(actor),
        Ok(None) => Err(error_payload(StatusCode::UNAUTHORIZED, "unknown user")),
        Err(err) => Err(error_response(LendingError::from(err))),
    }
}

macro_rules! actor_or_return {
    ($service:expr, $headers:expr) => {
        match resolve_actor(&$service, &$headers) {
            Ok(actor) => actor,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn list_loans_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
    Query(query): Query<LoanListQuery>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.loans_for(&actor, query.status))
}

pub(crate) async fn create_loan_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
    axum::Json(application): axum::Json<LoanApplication>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    let Actor::Member { profile, .. } = &actor else {
        return error_response(LendingError::Forbidden);
    };
    respond(StatusCode::CREATED, service.create_loan(profile, application))
}

pub(crate) async fn loan_detail_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.loan_detail(&actor, &LoanId(loan_id)))
}

pub(crate) async fn edit_loan_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
    axum::Json(application): axum::Json<LoanApplication>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.edit(&actor, &LoanId(loan_id), application),
    )
}

pub(crate) async fn delete_loan_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    match service.delete(&actor, &LoanId(loan_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ActionRequest>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.transition(&actor, &LoanId(loan_id), request.action),
    )
}

pub(crate) async fn assign_officer_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<AssignOfficerRequest>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(
        StatusCode::OK,
        service.assign_officer(&actor, &LoanId(loan_id), &request.officer),
    )
}

pub(crate) async fn repayment_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<RepaymentRequest>,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    let loan_id = LoanId(loan_id);
    if let Err(err) = service.loan_detail(&actor, &loan_id) {
        return error_response(err);
    }
    respond(
        StatusCode::CREATED,
        service.apply_repayment(&loan_id, request),
    )
}

pub(crate) async fn list_repayments_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.repayments_for(&actor))
}

pub(crate) async fn list_members_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.visible_members(&actor))
}

pub(crate) async fn list_policies_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    let Actor::Member { profile, .. } = &actor else {
        return error_response(LendingError::Forbidden);
    };
    respond(StatusCode::OK, service.policies_for_member(profile))
}

pub(crate) async fn portfolio_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    headers: HeaderMap,
) -> Response
where
    R: LoanRepository + 'static,
    D: Directory + 'static,
{
    let actor = actor_or_return!(service, headers);
    respond(StatusCode::OK, service.portfolio_summary(&actor))
}
