use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::consensus::ReviewDecision;
use super::domain::{
    CompetencyId, CycleDraft, CycleId, CycleStatus, EmployeeId, ParticipationRole,
    RatingSubmission, RoleWeights, ScopedCompetency,
};
use super::error::EvaluationError;
use super::repository::{CycleRepository, RepositoryError, ReviewNotifier};
use super::service::{CycleServiceError, EvaluationCycleService};

type SharedService<R, N> = State<Arc<EvaluationCycleService<R, N>>>;

#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    pub employee_id: EmployeeId,
    pub participation: ParticipationRole,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub target: CycleStatus,
}

/// Review decision as posted by HR; the decision time is stamped on receipt.
#[derive(Debug, Deserialize)]
pub struct ReviewDecisionRequest {
    pub final_score: f64,
    pub decided_by: EmployeeId,
    #[serde(default)]
    pub note: Option<String>,
}

/// Router exposing cycle administration, rating intake and reporting.
pub fn cycle_router<R, N>(service: Arc<EvaluationCycleService<R, N>>) -> Router
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    Router::new()
        .route("/api/v1/cycles", post(create_handler::<R, N>))
        .route("/api/v1/cycles/:cycle_id", get(cycle_handler::<R, N>))
        .route(
            "/api/v1/cycles/:cycle_id/weights",
            put(weights_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/competencies",
            put(competencies_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/participants",
            post(participant_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/transitions",
            post(transition_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/submissions",
            post(submission_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/progress",
            get(progress_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/subjects/:subject_id/report",
            get(report_handler::<R, N>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/subjects/:subject_id/reviews/:competency_id",
            post(review_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R, N>(
    State(service): SharedService<R, N>,
    Json(draft): Json<CycleDraft>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.create_cycle(draft) {
        Ok(cycle) => (StatusCode::CREATED, Json(cycle)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cycle_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.get_cycle(&CycleId(cycle_id)) {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn weights_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
    Json(weights): Json<RoleWeights>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.update_weights(&CycleId(cycle_id), weights) {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn competencies_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
    Json(competencies): Json<Vec<ScopedCompetency>>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.set_competencies(&CycleId(cycle_id), competencies) {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn participant_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.add_participant(
        &CycleId(cycle_id),
        request.employee_id,
        request.participation,
    ) {
        Ok(participant) => (StatusCode::CREATED, Json(participant)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.transition(&CycleId(cycle_id), request.target) {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submission_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
    Json(submission): Json<RatingSubmission>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.submit_ratings(&CycleId(cycle_id), submission) {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn progress_handler<R, N>(
    State(service): SharedService<R, N>,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.progress(&CycleId(cycle_id)) {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler<R, N>(
    State(service): SharedService<R, N>,
    Path((cycle_id, subject_id)): Path<(String, String)>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    match service.subject_report(&CycleId(cycle_id), &EmployeeId(subject_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_handler<R, N>(
    State(service): SharedService<R, N>,
    Path((cycle_id, subject_id, competency_id)): Path<(String, String, String)>,
    Json(request): Json<ReviewDecisionRequest>,
) -> Response
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    let decision = ReviewDecision {
        final_score: request.final_score,
        decided_by: request.decided_by,
        decided_at: Utc::now(),
        note: request.note,
    };
    match service.decide_review(
        &CycleId(cycle_id),
        &EmployeeId(subject_id),
        &CompetencyId(competency_id),
        &decision,
    ) {
        Ok(review) => (StatusCode::CREATED, Json(review)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(err: &CycleServiceError) -> StatusCode {
    match err {
        CycleServiceError::Evaluation(evaluation) => match evaluation {
            EvaluationError::InvalidTransition { .. }
            | EvaluationError::WeightsFrozen { .. }
            | EvaluationError::ScopeFrozen { .. }
            | EvaluationError::EnrollmentClosed { .. }
            | EvaluationError::RatingsNotAccepted { .. }
            | EvaluationError::AggregationUnavailable { .. }
            | EvaluationError::ReviewAlreadySettled { .. } => StatusCode::CONFLICT,
            EvaluationError::UnassignedRater { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        CycleServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        CycleServiceError::Repository(
            RepositoryError::Conflict
            | RepositoryError::StatusConflict { .. }
            | RepositoryError::StaleRevision { .. },
        ) => StatusCode::CONFLICT,
        CycleServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: CycleServiceError) -> Response {
    let status = status_for(&err);
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
