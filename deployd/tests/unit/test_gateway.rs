//! Gateway tests

use std::sync::Arc;

use axum::http::StatusCode;
use deployd::app::options::ServerOptions;
use deployd::deploy::builder::BuildOutcome;
use deployd::deploy::slot;
use deployd::models::deployment::{DeploymentState, DeploymentStatus};
use deployd::server::serve::router;
use deployd::server::state::ServerState;

use crate::support::{
    push_event, push_request, secret, send, signed_push, Harness,
};

#[tokio::test]
async fn test_status_before_any_trigger() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    assert_eq!(
        harness.get("/").await,
        (StatusCode::OK, "Last deployment succeeded".to_string())
    );
    assert_eq!(
        harness.status.get().await.unwrap(),
        DeploymentStatus::not_started()
    );
}

#[tokio::test]
async fn test_trigger_runs_deployment() {
    let harness = Harness::start("", BuildOutcome::succeeded("deployed\n")).await;

    let (code, body) = harness.push(&push_event("refs/heads/main")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, "Deployment started");

    // Running deployments still read as succeeded
    harness.wait_for_state(DeploymentState::Started).await;
    assert_eq!(harness.get("/").await.0, StatusCode::OK);

    harness.builder.release();
    let done = harness.wait_for_state(DeploymentState::Succeeded).await;
    assert_eq!(done.output, "deployed\n");
    assert_eq!(harness.get("/").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_deployment_reports_500() {
    let harness = Harness::start("", BuildOutcome::failed("make: *** [deploy] Error 2")).await;

    assert_eq!(harness.push("{}").await.0, StatusCode::OK);
    harness.builder.release();
    harness.wait_for_state(DeploymentState::Failed).await;

    assert_eq!(
        harness.get("/").await,
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Last deployment failed".to_string()
        )
    );
}

#[tokio::test]
async fn test_second_trigger_conflicts_while_running() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    assert_eq!(harness.push("{}").await.0, StatusCode::OK);
    harness.wait_for_state(DeploymentState::Started).await;

    assert_eq!(
        harness.push("{}").await,
        (
            StatusCode::CONFLICT,
            "Deployment already in progress".to_string()
        )
    );

    harness.builder.release();
    harness.wait_for_state(DeploymentState::Succeeded).await;
    harness.wait_for_free_slot().await;

    harness.builder.set_outcome(BuildOutcome::failed("boom"));
    assert_eq!(harness.push("{}").await.0, StatusCode::OK);
    harness.builder.release();
    let done = harness.wait_for_state(DeploymentState::Failed).await;
    assert_eq!(done.output, "boom");
}

#[tokio::test]
async fn test_simultaneous_triggers_admit_exactly_one() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    let (first, second) = tokio::join!(harness.push("{}"), harness.push("{}"));
    let mut codes = vec![first.0, second.0];
    codes.sort();
    assert_eq!(codes, vec![StatusCode::OK, StatusCode::CONFLICT]);

    harness.builder.release();
    harness.wait_for_state(DeploymentState::Succeeded).await;
}

#[tokio::test]
async fn test_invalid_signature_is_rejected() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    let (code, body) = harness
        .send(push_request("{}", Some("sha1=0000000000000000000000000000000000000000")))
        .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("Invalid signature: Signature validation failed. Expected: sha1="));
    assert!(body.ends_with("actual: sha1=0000000000000000000000000000000000000000"));
    assert!(harness.slot.is_free());
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    let (code, _) = harness.send(push_request("{}", None)).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(harness.slot.is_free());
}

#[tokio::test]
async fn test_other_branch_is_ignored() {
    let harness = Harness::start("main", BuildOutcome::succeeded("")).await;

    assert_eq!(
        harness.push(&push_event("refs/heads/feature")).await,
        (
            StatusCode::OK,
            "Not-configured branch detected. No operation required.".to_string()
        )
    );
    assert!(harness.slot.is_free());
    assert_eq!(
        harness.status.get().await.unwrap().state,
        DeploymentState::NotStarted
    );

    // The slot is still available for a real trigger
    assert_eq!(
        harness.push(&push_event("refs/heads/main")).await,
        (StatusCode::OK, "Deployment started".to_string())
    );
    harness.builder.release();
    harness.wait_for_state(DeploymentState::Succeeded).await;
}

#[tokio::test]
async fn test_undecodable_body_with_branch_filter() {
    let harness = Harness::start("main", BuildOutcome::succeeded("")).await;

    assert_eq!(
        harness.push("this is not json").await,
        (StatusCode::BAD_REQUEST, "Failed to decode body".to_string())
    );
    assert!(harness.slot.is_free());
    assert_eq!(harness.push(&push_event("refs/heads/main")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_null_body_with_branch_filter_is_ignored() {
    let harness = Harness::start("main", BuildOutcome::succeeded("")).await;

    assert_eq!(
        harness.push("null").await,
        (
            StatusCode::OK,
            "Not-configured branch detected. No operation required.".to_string()
        )
    );
    assert!(harness.slot.is_free());
}

#[tokio::test]
async fn test_any_body_accepted_without_branch_filter() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;
    assert_eq!(harness.push("this is not json").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_status_detail() {
    let harness = Harness::start("", BuildOutcome::failed("exit 2")).await;
    harness.push("{}").await;
    harness.builder.release();
    harness.wait_for_state(DeploymentState::Failed).await;

    let (code, body) = harness.get("/status").await;
    assert_eq!(code, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, serde_json::json!({"state": "failed", "output": "exit 2"}));
}

#[tokio::test]
async fn test_health_and_version() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;

    let (code, body) = harness.get("/health").await;
    assert_eq!(code, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "deployd");

    let (code, body) = harness.get("/version").await;
    assert_eq!(code, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_other_methods_not_allowed() {
    let harness = Harness::start("", BuildOutcome::succeeded("")).await;
    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(harness.send(request).await.0, StatusCode::METHOD_NOT_ALLOWED);
    assert!(harness.slot.is_free());
}

#[tokio::test]
async fn test_stopped_worker_reports_503() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _store) = deployd::status::store::StatusStore::spawn(
        DeploymentStatus::default(),
        deployd::filesys::file::File::new(dir.path().join("status")),
        Box::pin(std::future::pending::<()>()),
    );
    let (job_slot, triggers) = slot::channel();
    drop(triggers);

    let state = ServerState::new(secret(), "", status, job_slot);
    let router = router(&ServerOptions::default(), Arc::new(state));

    assert_eq!(
        send(&router, signed_push("{}")).await,
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Deployment worker unavailable".to_string()
        )
    );
}
