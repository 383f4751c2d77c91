//! HTTP API Routes
//!
//! - GET  /health - liveness
//! - GET  /api/agents - agent listing
//! - POST /api/agents/flowcloser/message - one conversation turn
//! - POST /api/agents/flowcloser/ghostwriter - pitch generation
//! - GET  /metrics - Prometheus text

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agents::traits::DEFAULT_SESSION_ID;
use crate::agents::ConversationTurn;
use crate::channels::Channel;
use crate::ghostwriter::{generate_pitch, LeadContext, PitchOptions};
use crate::observability::get_metrics_prometheus;
use crate::server::state::AppState;

pub const DEFAULT_API_USER: &str = "user";

/// Error body for failed requests
#[derive(Serialize)]
pub struct ApiError {
    error: String,
}

impl ApiError {
    pub fn response(status: StatusCode, message: &str) -> Response {
        (
            status,
            Json(Self {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Status and Health
// ============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn get_agents(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "agents": ["flowcloser"],
        "status": "ok",
        "models": {
            "primary": state.closer.primary_id(),
            "fallback": state.closer.fallback_id(),
        },
        "uptimeSecs": state.uptime_secs(),
    }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics_prometheus(),
    )
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub channel: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub response: String,
    pub session_id: String,
}

pub async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            info!("Rejected message body: {}", rejection);
            return ApiError::response(StatusCode::BAD_REQUEST, "Message is required");
        }
    };

    let Some(message) = request.message.filter(|m| !m.trim().is_empty()) else {
        return ApiError::response(StatusCode::BAD_REQUEST, "Message is required");
    };

    let session_id = request
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    let channel = request
        .channel
        .as_deref()
        .and_then(Channel::from_str)
        .unwrap_or(Channel::Api);
    let user_id = request
        .user_id
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_API_USER.to_string());

    let turn = ConversationTurn::new(message, channel, user_id).with_session(session_id.clone());

    match state.closer.ask(&turn).await {
        Ok(result) => Json(MessageResponse {
            response: result.final_text,
            session_id,
        })
        .into_response(),
        Err(e) => {
            error!("Error processing message: {}", e);
            ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process message")
        }
    }
}

// ============================================================================
// Ghostwriter
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GhostwriterRequest {
    pub lead: LeadContext,
    pub options: Option<PitchOptions>,
}

pub async fn post_ghostwriter(
    State(state): State<AppState>,
    payload: Result<Json<GhostwriterRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ApiError::response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let options = request.options.unwrap_or_default();
    let pitch = generate_pitch(&request.lead, &options, state.config.portfolio_url.as_deref());
    Json(serde_json::json!({ "pitch": pitch })).into_response()
}
