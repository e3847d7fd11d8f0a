//! Nala server: HTTP API, channel webhooks and the gateway.

use crate::channel_plugins;
use crate::config::{NalaConfig, ServerConfig};
use crate::context::ContextStore;
use crate::gateway::Gateway;
use crate::routes;
use crate::status::{StatusReporter, SysinfoMetrics};
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use nala_channels::{ChannelAdapter, OutboundMessage};
use nala_llm::{LlmClient, ReplyCleaner};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub started_at: Instant,
    pub bot_name: String,
    pub status_failure: String,
    pub channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    pub context: Arc<ContextStore>,
    pub status: Arc<StatusReporter>,
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = NalaConfig::load_with_path(config_path).await?;
    cfg.validate_channels()?;
    let api_key_configured = cfg.require_api_key().is_ok();
    if !api_key_configured {
        tracing::warn!("llm.api_key is not set; `nala serve` will refuse to start");
    }
    tracing::info!(
        bot_name = %cfg.general.bot_name,
        max_context = cfg.general.max_context,
        model = %cfg.llm.model,
        api_key_configured,
        whatsapp_enabled = cfg.channels.whatsapp.enabled,
        bind_addr = %cfg.server.bind_addr,
        config_path = %path.display(),
        "config ok"
    );
    Ok(())
}

pub async fn status(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = NalaConfig::load(config_path).await?;
    let reporter = StatusReporter::new(Arc::new(SysinfoMetrics::new(
        cfg.status.network_interface.clone(),
    )));
    let report = reporter.collect().await?;
    println!("{report}");
    Ok(())
}

pub async fn send_one_shot(
    config_path: Option<PathBuf>,
    recipient: &str,
    message: &str,
) -> Result<()> {
    let cfg = NalaConfig::load(config_path).await?;
    cfg.validate_channels()?;
    let adapter = channel_plugins::build_adapter(&cfg, channel_plugins::WHATSAPP)?;
    adapter
        .send(recipient, OutboundMessage::text(message))
        .await?;
    tracing::info!(recipient = %recipient, "one-shot message sent");
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = NalaConfig::load_with_path(config_path).await?;
    cfg.validate_channels()?;
    let api_key = cfg.require_api_key()?;
    let addr = cfg.bind_addr()?;
    let started_at = Instant::now();
    tracing::info!(
        config_path = %cfg_path.display(),
        bind_addr = %addr,
        bot_name = %cfg.general.bot_name,
        max_context = cfg.general.max_context,
        model = %cfg.llm.model,
        disclaimer_prefixes = ?cfg.llm.disclaimer_prefixes,
        network_interface = ?cfg.status.network_interface,
        http_timeout_seconds = cfg.server.http_timeout_seconds,
        http_max_in_flight = cfg.server.http_max_in_flight,
        queue_inbound_buffer = cfg.queue.inbound_buffer,
        whatsapp_enabled = cfg.channels.whatsapp.enabled,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(cfg.queue.inbound_buffer);
    let channel_plugins::ChannelLoadResult {
        channels,
        routers: channel_routers,
    } = channel_plugins::load_enabled_channels(&cfg, inbound_tx.clone()).await?;
    tracing::info!(loaded_channels = channels.len(), "channel plugins loaded");

    let completion = LlmClient::with_endpoint(api_key, &cfg.llm.model, &cfg.llm.endpoint)?
        .with_cleaner(ReplyCleaner::new(&cfg.llm.disclaimer_prefixes));
    let context = Arc::new(ContextStore::new(cfg.general.max_context));
    let status = Arc::new(StatusReporter::new(Arc::new(SysinfoMetrics::new(
        cfg.status.network_interface.clone(),
    ))));

    let gateway = Arc::new(Gateway::new(
        &cfg,
        context.clone(),
        Arc::new(completion),
        status.clone(),
        channels.clone(),
    )?);
    let shutdown = CancellationToken::new();
    let gateway_handle = gateway.start(inbound_rx, shutdown.child_token());
    tracing::info!(
        channel_count = channels.len(),
        channels = ?channels.keys().collect::<Vec<_>>(),
        "gateway started"
    );

    let state = Arc::new(AppState {
        started_at,
        bot_name: cfg.general.bot_name.clone(),
        status_failure: cfg.replies.status_failure.clone(),
        channels,
        context,
        status,
    });
    let app = build_app(state, channel_routers, &cfg.server);

    tracing::info!(%addr, "nala serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");

    shutdown.cancel();
    drop(inbound_tx);
    match gateway_handle.await {
        Ok(()) => tracing::info!("gateway shutdown completed"),
        Err(e) => tracing::error!(error = %e, "gateway task join failed during shutdown"),
    }

    Ok(())
}

pub fn build_app(
    state: Arc<AppState>,
    channel_routers: Vec<Router>,
    server: &ServerConfig,
) -> Router {
    let mut app = routes::router().layer(Extension(state));
    for plugin_router in channel_routers {
        app = app.merge(plugin_router);
    }

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    app.layer(GlobalConcurrencyLimitLayer::new(server.http_max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
            _ = shutdown.cancelled() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::warn!("received ctrl-c; beginning graceful shutdown"),
                Err(e) => tracing::error!(error = %e, "failed to await ctrl-c signal"),
            },
            _ = shutdown.cancelled() => {}
        }
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MessageRecord, Speaker};
    use crate::status::tests::sample_snapshot;
    use crate::status::{HostSnapshot, MetricsSource};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use tower::ServiceExt;

    struct FixedMetrics(Option<HostSnapshot>);

    #[async_trait]
    impl MetricsSource for FixedMetrics {
        async fn snapshot(&self) -> Result<HostSnapshot> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("platform unsupported"))
        }
    }

    fn app(metrics: Option<HostSnapshot>) -> (Router, Arc<ContextStore>) {
        let context = Arc::new(ContextStore::new(5));
        let state = Arc::new(AppState {
            started_at: Instant::now(),
            bot_name: "Nala".to_string(),
            status_failure: "❌ Failed to fetch server info.".to_string(),
            channels: HashMap::new(),
            context: context.clone(),
            status: Arc::new(StatusReporter::new(Arc::new(FixedMetrics(metrics)))),
        });
        (
            build_app(state, Vec::new(), &ServerConfig::default()),
            context,
        )
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (
            status,
            headers,
            String::from_utf8(body.to_vec()).expect("utf8 body"),
        )
    }

    #[tokio::test]
    async fn health_reports_ok_and_sets_request_id() {
        let (app, _) = app(None);
        let (status, headers, body) = get(app, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-request-id"));
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["bot_name"], "Nala");
    }

    #[tokio::test]
    async fn chat_context_route_returns_window() {
        let (app, context) = app(None);
        context.append(
            "628111",
            MessageRecord {
                speaker: Speaker::User,
                text: "hi nala".to_string(),
                id: "wamid.1".to_string(),
                timestamp: 1_700_000_000,
                quoted_text: None,
            },
        );

        let (status, _, body) = get(app.clone(), "/api/v1/chats").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["chats"], serde_json::json!(["628111"]));

        let (_, _, body) = get(app, "/api/v1/chats/628111/context").await;
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["messages"][0]["text"], "hi nala");
        assert_eq!(json["messages"][0]["speaker"], "user");
    }

    #[tokio::test]
    async fn status_route_returns_report_or_apology() {
        let (app_ok, _) = app(Some(sample_snapshot()));
        let (status, _, body) = get(app_ok, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("*Server Info*"));

        let (app_err, _) = app(None);
        let (status, _, body) = get(app_err, "/api/v1/status").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "❌ Failed to fetch server info.");
    }
}
