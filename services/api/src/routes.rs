use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use talent_review::error::AppError;
use talent_review::workflows::evaluation360::{
    cycle_router, CycleRepository, EvaluationCycleService, ReviewNotifier,
};
use talent_review::workflows::surveys::{
    summarize_nps, summarize_nps_by, summarize_pulse, NpsResponse, NpsSummary, PulseQuestion,
    PulseResponse, PulseSummary,
};

#[derive(Debug, Deserialize)]
pub(crate) struct NpsRequest {
    pub(crate) responses: Vec<NpsResponse>,
    #[serde(default)]
    pub(crate) by_department: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct NpsReport {
    pub(crate) overall: NpsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) departments: Option<BTreeMap<String, NpsSummary>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PulseRequest {
    pub(crate) questions: Vec<PulseQuestion>,
    pub(crate) responses: Vec<PulseResponse>,
}

pub(crate) fn with_cycle_routes<R, N>(service: Arc<EvaluationCycleService<R, N>>) -> axum::Router
where
    R: CycleRepository + 'static,
    N: ReviewNotifier + 'static,
{
    cycle_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/surveys/nps", post(nps_endpoint))
        .route("/api/v1/surveys/pulse", post(pulse_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn nps_endpoint(
    Json(payload): Json<NpsRequest>,
) -> Result<Json<NpsReport>, AppError> {
    let overall = summarize_nps(&payload.responses)?;
    let departments = if payload.by_department {
        Some(summarize_nps_by(&payload.responses, |response| {
            response
                .department
                .clone()
                .unwrap_or_else(|| "unassigned".to_string())
        })?)
    } else {
        None
    };

    Ok(Json(NpsReport {
        overall,
        departments,
    }))
}

pub(crate) async fn pulse_endpoint(
    Json(payload): Json<PulseRequest>,
) -> Result<Json<PulseSummary>, AppError> {
    let summary = summarize_pulse(&payload.questions, &payload.responses)?;
    Ok(Json(summary))
}
