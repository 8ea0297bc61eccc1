// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the read-only REST API.
//!
//! Handles GET /api/messages, GET /api/status, GET /health.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use courier_core::{CourierError, Identity};
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Error body when `/api/messages` is missing a participant.
pub const HISTORY_PARAMS_REQUIRED: &str = "Both user1 and user2 parameters are required";

/// Query for GET /api/messages.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub user1: Option<String>,
    #[serde(default)]
    pub user2: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn engine_error(err: CourierError) -> Response {
    match err {
        CourierError::EngineUnavailable => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        other => {
            tracing::error!(error = %other, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// GET /api/messages?user1=..&user2=..
///
/// Returns the conversation between the two users, oldest first. The order
/// of `user1` and `user2` does not matter.
pub async fn get_messages(
    State(state): State<GatewayState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
    let (Some(user1), Some(user2)) = (non_empty(params.user1), non_empty(params.user2)) else {
        return error_response(StatusCode::BAD_REQUEST, HISTORY_PARAMS_REQUIRED);
    };

    match state
        .engine
        .history(Identity::from(user1), Identity::from(user2))
        .await
    {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /api/status
pub async fn get_status(State(state): State<GatewayState>) -> Response {
    match state.engine.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /health
///
/// Answers without touching the engine, so it stays up even if the engine
/// task has stopped.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
