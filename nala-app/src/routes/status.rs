use crate::server::AppState;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Extension;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/status", get(get_status))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_status(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, String) {
    match state.status.collect().await {
        Ok(report) => (StatusCode::OK, report),
        Err(e) => {
            tracing::error!(error = %e, "server info collection failed");
            (StatusCode::INTERNAL_SERVER_ERROR, state.status_failure.clone())
        }
    }
}
