use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiResponse, state::AppState};
use crate::error::RelayError;
use crate::models::GenerateRequest;

pub const GENERATION_ID_HEADER: &str = "x-generation-id";

#[derive(Debug, Deserialize, Default)]
pub struct StopRequest {
    #[serde(default)]
    pub generation_id: Option<Uuid>,
}

// POST /api/chat/stream
//
// Streams the assistant reply as plain chunked text. The generation handle
// is exposed in a response header so callers can stop this generation
// precisely instead of "whatever is running".
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    match state.relay.handle(request).await {
        Ok(started) => (
            [
                (
                    header::CONTENT_TYPE,
                    "text/plain; charset=utf-8".to_string(),
                ),
                (
                    HeaderName::from_static(GENERATION_ID_HEADER),
                    started.id.to_string(),
                ),
            ],
            Body::from_stream(started.stream),
        )
            .into_response(),
        Err(e @ RelayError::InvalidRequest(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
    }
}

// POST /api/chat/stop
//
// Always acknowledges with success: racing a stop against natural
// completion is expected, and "nothing was running" is not an error. The
// body is optional; without a generation id the most recently started
// generation is stopped.
pub async fn stop(State(state): State<AppState>, body: Bytes) -> Json<ApiResponse<()>> {
    let target = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<StopRequest>(&body)
            .ok()
            .and_then(|r| r.generation_id)
    };

    if state.registry.cancel(target) {
        Json(ApiResponse::message("Stream stopping"))
    } else {
        Json(ApiResponse::message("No active generation"))
    }
}
