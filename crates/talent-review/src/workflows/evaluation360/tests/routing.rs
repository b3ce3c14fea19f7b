use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::evaluation360::domain::RaterRole;
use crate::workflows::evaluation360::repository::RepositoryError;
use crate::workflows::evaluation360::router::{cycle_router, status_for};
use crate::workflows::evaluation360::service::CycleServiceError;

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn create_returns_created_draft() {
    let (service, _, _) = build_service();
    let router = cycle_router(Arc::new(service));

    let payload = serde_json::to_value(draft()).expect("draft serializes");
    let response = router
        .oneshot(json_request("POST", "/api/v1/cycles", payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "draft");
    assert_eq!(body["weights"]["self"], 20.0);
}

#[tokio::test]
async fn create_rejects_invalid_weights_as_unprocessable() {
    let (service, _, _) = build_service();
    let router = cycle_router(Arc::new(service));

    let mut payload = serde_json::to_value(draft()).expect("draft serializes");
    payload["weights"]["subordinate"] = json!(10.0);
    let response = router
        .oneshot(json_request("POST", "/api/v1/cycles", payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn unknown_cycle_returns_not_found() {
    let (service, _, _) = build_service();
    let router = cycle_router(Arc::new(service));

    let response = router
        .oneshot(get_request("/api/v1/cycles/cycle-missing"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn backward_transition_conflicts() {
    let (service, _, _) = build_service();
    let cycle = active_cycle(&service);
    let router = cycle_router(Arc::new(service));
    let uri = format!("/api/v1/cycles/{}/transitions", cycle.id);

    let response = router
        .oneshot(json_request("POST", &uri, json!({ "target": "draft" })))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unassigned_rater_is_forbidden() {
    let (service, _, _) = build_service();
    let cycle = active_cycle(&service);
    let router = cycle_router(Arc::new(service));
    let uri = format!("/api/v1/cycles/{}/submissions", cycle.id);

    let payload = serde_json::to_value(submission("eva", RaterRole::Peer, &full_scores(3)))
        .expect("submission serializes");
    let response = router
        .oneshot(json_request("POST", &uri, payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn submission_then_report_round_trip() {
    let (service, _, _) = build_service();
    let cycle = active_cycle(&service);
    let router = cycle_router(Arc::new(service));
    let submissions = format!("/api/v1/cycles/{}/submissions", cycle.id);

    let payload = serde_json::to_value(submission("bruno", RaterRole::Manager, &full_scores(4)))
        .expect("submission serializes");
    let response = router
        .clone()
        .oneshot(json_request("POST", &submissions, payload))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let receipt = read_json_body(response).await;
    assert_eq!(receipt["rater_complete"], true);

    let report_uri = format!("/api/v1/cycles/{}/subjects/ana/report", cycle.id);
    let response = router
        .oneshot(get_request(&report_uri))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json_body(response).await;
    assert_eq!(report["overall"], 4.0);
    assert_eq!(report["competencies"][0]["consensus"]["outcome"], "final");
}

#[tokio::test]
async fn review_decision_is_stored_once_and_settles_report() {
    let (service, _, _) = build_service();
    let cycle = active_cycle(&service);
    for (rater, role, score) in [("ana", RaterRole::SelfReview, 2), ("bruno", RaterRole::Manager, 5)] {
        service
            .submit_ratings(&cycle.id, submission(rater, role, &[("communication", score)]))
            .expect("submission accepted");
    }
    let router = cycle_router(Arc::new(service));
    let review_uri = format!("/api/v1/cycles/{}/subjects/ana/reviews/communication", cycle.id);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &review_uri,
            json!({ "final_score": 4.0, "decided_by": "hr-partner", "note": "calibrated" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let stored = read_json_body(response).await;
    assert_eq!(stored["decision"]["final_score"], 4.0);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &review_uri,
            json!({ "final_score": 1.0, "decided_by": "hr-partner" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let report_uri = format!("/api/v1/cycles/{}/subjects/ana/report", cycle.id);
    let response = router
        .oneshot(get_request(&report_uri))
        .await
        .expect("router responds");
    let report = read_json_body(response).await;
    assert_eq!(report["requires_review"], false);
    let communication = report["competencies"]
        .as_array()
        .and_then(|rows| {
            rows.iter()
                .find(|row| row["competency_id"] == "communication")
        })
        .expect("communication row");
    assert_eq!(communication["consensus"]["outcome"], "final");
    assert_eq!(communication["consensus"]["score"], 4.0);
    assert_eq!(communication["review"]["note"], "calibrated");
}

#[test]
fn stale_revision_maps_to_conflict() {
    let err = CycleServiceError::Repository(RepositoryError::StaleRevision {
        expected: 1,
        actual: 2,
    });
    assert_eq!(status_for(&err), StatusCode::CONFLICT);
}

#[test]
fn repository_outage_maps_to_internal_error() {
    let err = CycleServiceError::Repository(RepositoryError::Unavailable("offline".to_string()));
    assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
}
