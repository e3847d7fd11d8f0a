use crate::server::AppState;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json};
use nala_channels::OutboundMessage;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct SendRequest {
    channel: String,
    recipient: String,
    message: String,
}

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/messages/send", post(send_message))
}

#[tracing::instrument(level = "info", skip_all)]
async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<SendRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(adapter) = state.channels.get(&req.channel) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "error", "error": "unknown channel" })),
        );
    };

    if let Err(e) = adapter
        .send(&req.recipient, OutboundMessage::text(req.message))
        .await
    {
        tracing::warn!(channel = %req.channel, error = %e, "manual send failed");
        return (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
        );
    }

    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
