//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::authn::signature::{verify_signature, SIGNATURE_HEADER};
use crate::deploy::slot::ScheduleError;
use crate::models::deployment::{DeploymentState, DeploymentStatus};
use crate::models::event::PushEvent;
use crate::server::state::ServerState;
use crate::utils::version_info;

pub const LAST_SUCCEEDED: &str = "Last deployment succeeded";
pub const LAST_FAILED: &str = "Last deployment failed";
pub const STATUS_UNAVAILABLE: &str = "Deployment status unavailable";
pub const BODY_UNREADABLE: &str = "Failed to read the request body";
pub const BODY_UNDECODABLE: &str = "Failed to decode body";
pub const BRANCH_IGNORED: &str = "Not-configured branch detected. No operation required.";
pub const DEPLOYMENT_STARTED: &str = "Deployment started";
pub const DEPLOYMENT_IN_PROGRESS: &str = "Deployment already in progress";
pub const WORKER_UNAVAILABLE: &str = "Deployment worker unavailable";

/// Last deployment outcome as plain text
///
/// Anything but a failure, including a deployment that has not started or is
/// still running, is reported as a success.
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.status.get().await {
        Ok(status) if status.state == DeploymentState::Failed => {
            (StatusCode::INTERNAL_SERVER_ERROR, LAST_FAILED).into_response()
        }
        Ok(_) => (StatusCode::OK, LAST_SUCCEEDED).into_response(),
        Err(e) => {
            error!("Failed to query deployment status: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, STATUS_UNAVAILABLE).into_response()
        }
    }
}

/// Webhook delivery handler
pub async fn trigger_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match body {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to read the request body: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, BODY_UNREADABLE).into_response();
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if let Err(e) = verify_signature(&payload, signature, &state.secret) {
        warn!(expected = %e.expected, actual = %e.actual, "Rejected webhook with invalid signature");
        return (StatusCode::BAD_REQUEST, format!("Invalid signature: {}", e)).into_response();
    }

    if let Some(expected_ref) = &state.branch_ref {
        let event = match PushEvent::from_slice(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to decode body: {}", e);
                return (StatusCode::BAD_REQUEST, BODY_UNDECODABLE).into_response();
            }
        };
        if &event.git_ref != expected_ref {
            debug!("Ignoring push to {} (watching {})", event.git_ref, expected_ref);
            return (StatusCode::OK, BRANCH_IGNORED).into_response();
        }
    }

    match state.slot.try_schedule() {
        Ok(()) => {
            info!("Deployment scheduled");
            (StatusCode::OK, DEPLOYMENT_STARTED).into_response()
        }
        Err(ScheduleError::Busy) => {
            info!("Deployment already in progress, rejecting trigger");
            (StatusCode::CONFLICT, DEPLOYMENT_IN_PROGRESS).into_response()
        }
        Err(ScheduleError::Closed) => {
            warn!("Deployment worker has stopped, rejecting trigger");
            (StatusCode::SERVICE_UNAVAILABLE, WORKER_UNAVAILABLE).into_response()
        }
    }
}

/// Detailed status handler
pub async fn status_detail_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<DeploymentStatus>, StatusCode> {
    state.status.get().await.map(Json).map_err(|e| {
        error!("Failed to query deployment status: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployd".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}
