//! Admin HTTP surface.
//!
//! Three routes only: trigger a run, read the deployer state, and a
//! liveness probe. Triggered runs go through exactly the same entry guard
//! as scheduled ones; `force=1` is the operator override that reopens the
//! lane when persisted state went stale in a way the restart marker did not
//! catch.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gantry_types::RunResponse;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::coordinator::Coordinator;
use crate::lifecycle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

/// Create the admin API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/run", post(trigger_run))
        .route("/v1/state", get(deployer_state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    timestamp: String,
}

/// Basic liveness probe; does not touch the state store.
async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "deployd".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct RunParams {
    /// `force=1` resets persisted state to ready before the run.
    force: Option<String>,
    /// `synchronous=1` waits for the run and returns its report.
    synchronous: Option<String>,
}

/// `POST /v1/run` - trigger an install run.
async fn trigger_run(
    State(state): State<AppState>,
    Query(params): Query<RunParams>,
) -> Response {
    if params.force.as_deref() == Some("1") {
        if let Err(err) = state.coordinator.reset_state() {
            return internal_error(err);
        }
    }

    if params.synchronous.as_deref() == Some("1") {
        return match state.coordinator.run().await {
            Ok(report) => (
                StatusCode::OK,
                Json(RunResponse {
                    dispatched: false,
                    report: Some(report),
                }),
            )
                .into_response(),
            Err(err) => internal_error(err),
        };
    }

    lifecycle::spawn_run(Arc::clone(&state.coordinator));
    (
        StatusCode::ACCEPTED,
        Json(RunResponse {
            dispatched: true,
            report: None,
        }),
    )
        .into_response()
}

/// `GET /v1/state` - current installer state plus queue depth.
async fn deployer_state(State(state): State<AppState>) -> Response {
    match state.coordinator.status() {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => internal_error(err),
    }
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
