use crate::server::AppState;
use axum::extract::Path;
use axum::routing::get;
use axum::{Extension, Json};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/chats", get(list_chats))
        .route("/api/v1/chats/{chat_id}/context", get(get_context))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_chats(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "max_context": state.context.max_context(),
        "chat_count": state.context.chat_count(),
        "chats": state.context.chat_ids(),
    }))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_context(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "chat_id": chat_id,
        "messages": state.context.get(&chat_id),
    }))
}
