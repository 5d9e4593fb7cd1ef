use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::types::*;
use crate::config::HostConfig;
use crate::message::MessageEnvelope;
use crate::render::PluginFrameWidget;
use crate::state::AppState;

pub(super) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        frames: state.dashboard.registry().len(),
        stream_clients: state.stream_client_count(),
    })
}

pub(super) async fn get_config(State(state): State<Arc<AppState>>) -> Json<HostConfig> {
    Json(state.config.clone())
}

/// Current widget tree, one entry per configured plugin.
pub(super) async fn list_frames(State(state): State<Arc<AppState>>) -> Json<Vec<PluginFrameWidget>> {
    Json(state.dashboard.widgets().to_vec())
}

/// Accept one plugin message. The body is parsed by hand so that iframe
/// bridges posting without a JSON content type are still accepted.
pub(super) async fn post_message(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let envelope: MessageEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: format!("Invalid message envelope: {e}") }),
            )
                .into_response();
        }
    };
    let outcome = state.dashboard.dispatch(&envelope);
    (StatusCode::ACCEPTED, Json(outcome)).into_response()
}
