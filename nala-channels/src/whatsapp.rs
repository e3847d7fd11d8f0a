use crate::message_log::{LoggedMessage, MessageLog};
use crate::traits::ChannelAdapter;
use crate::types::{
    DeliveryStatus, InboundMessage, InboundMessageKind, MessageId, OutboundMessage,
    QuotedMessage, QuotedRef,
};
use anyhow::{Result, anyhow};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const WHATSAPP_WEBHOOK_PATH: &str = "/api/v1/channels/whatsapp/webhook";

const WHATSAPP_CHANNEL_ID: &str = "whatsapp";
const WHATSAPP_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v20.0";

#[derive(Clone)]
pub struct WhatsAppCloudAdapter {
    http: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    graph_base_url: String,
    log: Arc<MessageLog>,
}

impl WhatsAppCloudAdapter {
    pub fn new(access_token: &str, phone_number_id: &str) -> Result<Self> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(anyhow!("whatsapp access token is required"));
        }
        let phone_number_id = phone_number_id.trim();
        if phone_number_id.is_empty() {
            return Err(anyhow!("whatsapp phone number id is required"));
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            access_token: access_token.to_string(),
            phone_number_id: phone_number_id.to_string(),
            graph_base_url: WHATSAPP_GRAPH_BASE_URL.to_string(),
            log: Arc::new(MessageLog::default()),
        })
    }

    pub fn with_graph_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.graph_base_url = base_url.into();
        self
    }

    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    fn messages_url(&self) -> Result<Url> {
        Url::parse(&format!(
            "{}/{}/messages",
            self.graph_base_url.trim_end_matches('/'),
            self.phone_number_id
        ))
        .map_err(|e| anyhow!("invalid whatsapp graph API URL: {e}"))
    }

    /// Webhook routes for the Cloud API: the GET verification handshake and
    /// the POST event ingest.
    pub fn webhook_router(
        self: &Arc<Self>,
        inbound_tx: mpsc::Sender<InboundMessage>,
        verify_token: String,
        app_secret: Option<String>,
    ) -> Router {
        let state = Arc::new(WhatsAppWebhookState {
            adapter: self.clone(),
            inbound_tx,
            verify_token,
            app_secret: app_secret
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
        });
        Router::new()
            .route(
                WHATSAPP_WEBHOOK_PATH,
                get(whatsapp_webhook_verify).post(whatsapp_webhook_ingest),
            )
            .with_state(state)
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for WhatsAppCloudAdapter {
    fn channel_id(&self) -> &str {
        WHATSAPP_CHANNEL_ID
    }

    async fn start(&self, _tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        // Inbound events arrive through `webhook_router`.
        Ok(())
    }

    #[tracing::instrument(level = "info", skip_all, fields(recipient_id = %recipient_id))]
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()> {
        let to = recipient_id.trim();
        if to.is_empty() {
            return Err(anyhow!("recipient_id (E.164 phone number) is required"));
        }
        let text = message.content.trim();
        if text.is_empty() {
            return Err(anyhow!("message content is empty"));
        }

        let url = self.messages_url()?;
        let mut payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text,
            }
        });
        if let Some(reply_to) = message.reply_to_message_id.as_ref() {
            payload["context"] = serde_json::json!({ "message_id": reply_to.as_str() });
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!(
                "whatsapp send failed: status={} body={}",
                status,
                body
            ));
        }

        match serde_json::from_str::<WhatsAppSendResponse>(&body) {
            Ok(sent) => {
                for message in sent.messages {
                    self.log.record(
                        message.id.into(),
                        LoggedMessage {
                            body: text.to_string(),
                            from_me: true,
                            author: None,
                            sender_name: None,
                        },
                    );
                }
            }
            Err(error) => {
                tracing::warn!(%error, "whatsapp send response not understood; reply not logged");
            }
        }

        Ok(())
    }

    async fn fetch_quoted(&self, quoted: &QuotedRef) -> Result<QuotedMessage> {
        Ok(self.log.resolve(quoted))
    }
}

#[derive(Clone)]
struct WhatsAppWebhookState {
    adapter: Arc<WhatsAppCloudAdapter>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    verify_token: String,
    app_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppVerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn whatsapp_webhook_verify(
    State(state): State<Arc<WhatsAppWebhookState>>,
    Query(query): Query<WhatsAppVerifyQuery>,
) -> impl IntoResponse {
    let mode = query.mode.as_deref().map(str::trim).unwrap_or_default();
    let token = query
        .verify_token
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if mode.eq_ignore_ascii_case("subscribe") && !token.is_empty() && token == state.verify_token
    {
        tracing::info!("whatsapp webhook verified");
        return (StatusCode::OK, query.challenge.unwrap_or_default()).into_response();
    }
    tracing::warn!("whatsapp webhook verification rejected");
    (StatusCode::FORBIDDEN, "verification failed".to_string()).into_response()
}

#[tracing::instrument(level = "info", skip_all)]
async fn whatsapp_webhook_ingest(
    State(state): State<Arc<WhatsAppWebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = state.app_secret.as_deref() {
        let check = check_signature(&headers, &body, secret);
        if check != SignatureCheck::Valid {
            tracing::warn!(reason = check.reason(), "whatsapp webhook signature rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "status": "error",
                    "error": check.reason(),
                })),
            )
                .into_response();
        }
    }

    let payload: WhatsAppWebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "status": "error",
                    "error": format!("invalid whatsapp webhook payload: {error}"),
                })),
            )
                .into_response();
        }
    };

    let log = state.adapter.message_log();
    let mut accepted = 0usize;
    for value in payload.entry.into_iter().flat_map(|e| e.changes).map(|c| c.value) {
        for inbound in convert_change_value(&value, log) {
            if let Err(error) = state.inbound_tx.send(inbound).await {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({
                        "status": "error",
                        "error": format!("whatsapp inbound queue closed: {error}"),
                    })),
                )
                    .into_response();
            }
            accepted += 1;
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "accepted": accepted,
        })),
    )
        .into_response()
}

/// Converts one webhook change into inbound events, recording text messages
/// in `log` so later replies to them can be resolved.
fn convert_change_value(value: &WhatsAppChangeValue, log: &MessageLog) -> Vec<InboundMessage> {
    let metadata = value.metadata.clone().unwrap_or_default();
    let names: HashMap<&str, &str> = value
        .contacts
        .iter()
        .filter_map(|c| {
            let name = c.profile.as_ref()?.name.as_deref()?;
            Some((c.wa_id.as_str(), name))
        })
        .collect();

    let mut out = Vec::with_capacity(value.messages.len() + value.statuses.len());
    for message in &value.messages {
        let sender_name = names.get(message.from.trim()).map(|n| n.to_string());
        let Some(inbound) = convert_whatsapp_message(message, &metadata, sender_name) else {
            continue;
        };
        log.record(
            inbound.message_id.clone(),
            LoggedMessage {
                body: inbound.content.clone(),
                from_me: false,
                author: Some(inbound.sender_id.clone()),
                sender_name: inbound.sender_name.clone(),
            },
        );
        out.push(inbound);
    }
    for status in &value.statuses {
        if let Some(inbound) = convert_whatsapp_status(status, &metadata, log) {
            out.push(inbound);
        }
    }
    out
}

fn convert_whatsapp_message(
    message: &WhatsAppMessage,
    metadata: &WhatsAppMetadata,
    sender_name: Option<String>,
) -> Option<InboundMessage> {
    let sender = message.from.trim();
    if sender.is_empty() {
        return None;
    }
    if message.message_type != "text" {
        tracing::debug!(message_type = %message.message_type, "ignoring non-text whatsapp message");
        return None;
    }
    let content = message
        .text
        .as_ref()
        .map(|text| text.body.trim())
        .filter(|value| !value.is_empty())?
        .to_string();

    let message_id = if message.id.trim().is_empty() {
        ulid::Ulid::new().to_string()
    } else {
        message.id.clone()
    };
    let quoted = message
        .context
        .as_ref()
        .filter(|context| !context.id.trim().is_empty())
        .map(|context| QuotedRef {
            message_id: context.id.clone().into(),
            author: context
                .from
                .as_deref()
                .map(str::trim)
                .filter(|from| !from.is_empty())
                .map(Into::into),
        });

    Some(InboundMessage {
        kind: InboundMessageKind::Message,
        message_id: message_id.into(),
        channel_id: WHATSAPP_CHANNEL_ID.into(),
        chat_id: sender.into(),
        sender_id: sender.into(),
        sender_name,
        recipient_id: metadata.display_phone_number.as_deref().map(Into::into),
        content,
        quoted,
        timestamp: parse_timestamp(message.timestamp.as_deref()),
        metadata: serde_json::json!({
            "provider": "whatsapp_cloud",
            "phone_number_id": metadata.phone_number_id,
            "message": message,
        }),
        received_at: Utc::now(),
    })
}

fn convert_whatsapp_status(
    status: &WhatsAppStatus,
    metadata: &WhatsAppMetadata,
    log: &MessageLog,
) -> Option<InboundMessage> {
    let delivery = match status.status.as_str() {
        "sent" => DeliveryStatus::Server,
        "delivered" => DeliveryStatus::Device,
        "read" => DeliveryStatus::Read,
        "failed" => DeliveryStatus::Failed,
        other => {
            tracing::debug!(status = %other, "ignoring unknown whatsapp status");
            return None;
        }
    };
    let message_id: MessageId = status.id.clone().into();
    let recipient = status.recipient_id.trim();
    let content = log.get(&message_id).map(|m| m.body).unwrap_or_default();

    Some(InboundMessage {
        kind: InboundMessageKind::Delivery(delivery),
        message_id,
        channel_id: WHATSAPP_CHANNEL_ID.into(),
        chat_id: recipient.into(),
        sender_id: recipient.into(),
        sender_name: None,
        recipient_id: metadata.display_phone_number.as_deref().map(Into::into),
        content,
        quoted: None,
        timestamp: parse_timestamp(status.timestamp.as_deref()),
        metadata: serde_json::json!({
            "provider": "whatsapp_cloud",
            "phone_number_id": metadata.phone_number_id,
            "errors": status.errors,
        }),
        received_at: Utc::now(),
    })
}

fn parse_timestamp(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or_else(|| Utc::now().timestamp())
}

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureCheck {
    Valid,
    Missing,
    Malformed,
    Mismatch,
}

impl SignatureCheck {
    fn reason(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Missing => "missing x-hub-signature-256",
            Self::Malformed => "malformed x-hub-signature-256",
            Self::Mismatch => "invalid x-hub-signature-256",
        }
    }
}

/// Meta signs the raw body as `sha256=<hex hmac>` keyed by the app secret.
fn check_signature(headers: &HeaderMap, body: &[u8], app_secret: &str) -> SignatureCheck {
    let Some(header) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
    else {
        return SignatureCheck::Missing;
    };
    let Some(claimed) = header.strip_prefix("sha256=").and_then(decode_hex) else {
        return SignatureCheck::Malformed;
    };
    if digests_match(&hmac_sha256(app_secret.as_bytes(), body), &claimed) {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Mismatch
    }
}

fn hmac_sha256(key: &[u8], payload: &[u8]) -> [u8; 32] {
    const BLOCK: usize = 64;
    let mut key_block = [0_u8; BLOCK];
    if key.len() > BLOCK {
        key_block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let inner_digest = Sha256::new()
        .chain_update(key_block.map(|b| b ^ 0x36))
        .chain_update(payload)
        .finalize();
    Sha256::new()
        .chain_update(key_block.map(|b| b ^ 0x5c))
        .chain_update(inner_digest)
        .finalize()
        .into()
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 || !raw.is_ascii() {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// Runs over every byte regardless of where the first difference is.
fn digests_match(expected: &[u8], claimed: &[u8]) -> bool {
    expected.len() == claimed.len()
        && expected
            .iter()
            .zip(claimed)
            .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[derive(Debug, Deserialize)]
struct WhatsAppSendResponse {
    #[serde(default)]
    messages: Vec<WhatsAppSentMessage>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppSentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppWebhookPayload {
    #[serde(default)]
    entry: Vec<WhatsAppEntry>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppEntry {
    #[serde(default)]
    changes: Vec<WhatsAppChange>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppChange {
    #[serde(default)]
    value: WhatsAppChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppChangeValue {
    #[serde(default)]
    metadata: Option<WhatsAppMetadata>,
    #[serde(default)]
    contacts: Vec<WhatsAppContact>,
    #[serde(default)]
    messages: Vec<WhatsAppMessage>,
    #[serde(default)]
    statuses: Vec<WhatsAppStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WhatsAppMetadata {
    #[serde(default)]
    display_phone_number: Option<String>,
    #[serde(default)]
    phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppContact {
    #[serde(default)]
    wa_id: String,
    #[serde(default)]
    profile: Option<WhatsAppProfile>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppProfile {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WhatsAppMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type", default)]
    message_type: String,
    #[serde(default)]
    text: Option<WhatsAppText>,
    #[serde(default)]
    context: Option<WhatsAppContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WhatsAppText {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WhatsAppContext {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct WhatsAppStatus {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    recipient_id: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter() -> Arc<WhatsAppCloudAdapter> {
        Arc::new(WhatsAppCloudAdapter::new("token", "12345").expect("adapter"))
    }

    fn webhook_body() -> serde_json::Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [ { "changes": [ { "field": "messages", "value": {
                "metadata": { "display_phone_number": "15550001111", "phone_number_id": "12345" },
                "contacts": [ { "wa_id": "628111", "profile": { "name": "Budi" } } ],
                "messages": [ {
                    "id": "wamid.in1",
                    "from": "628111",
                    "timestamp": "1700000000",
                    "type": "text",
                    "text": { "body": " hi nala " },
                    "context": { "from": "15550001111", "id": "wamid.out1" }
                } ],
                "statuses": [ {
                    "id": "wamid.out1",
                    "status": "read",
                    "timestamp": "1700000001",
                    "recipient_id": "628111"
                } ]
            } } ] } ]
        })
    }

    fn signed(body: &[u8], secret: &str) -> HeaderMap {
        let hex: String = hmac_sha256(secret.as_bytes(), body)
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&format!("sha256={hex}")).expect("signature header"),
        );
        headers
    }

    #[test]
    fn hmac_matches_known_sha256_vector() {
        let digest = hmac_sha256(b"key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            decode_hex("f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"),
            Some(digest.to_vec())
        );
    }

    #[test]
    fn signature_check_classifies_headers() {
        let body = br#"{"hello":"world"}"#;
        assert_eq!(
            check_signature(&signed(body, "secret"), body, "secret"),
            SignatureCheck::Valid
        );
        assert_eq!(
            check_signature(&signed(body, "wrong"), body, "secret"),
            SignatureCheck::Mismatch
        );
        assert_eq!(
            check_signature(&HeaderMap::new(), body, "secret"),
            SignatureCheck::Missing
        );

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("md5=abc"));
        assert_eq!(
            check_signature(&headers, body, "secret"),
            SignatureCheck::Malformed
        );
    }

    #[test]
    fn digests_match_requires_equal_length_and_bytes() {
        assert!(digests_match(&[1, 2, 3], &[1, 2, 3]));
        assert!(!digests_match(&[1, 2, 3], &[1, 2, 3, 4]));
        assert!(!digests_match(&[1, 2, 3], &[1, 2, 4]));
        assert_eq!(decode_hex("0aFf"), Some(vec![0x0a, 0xff]));
        assert_eq!(decode_hex("abc"), None);
    }

    #[test]
    fn change_value_converts_messages_and_statuses() {
        let payload: WhatsAppWebhookPayload =
            serde_json::from_value(webhook_body()).expect("payload");
        let value = &payload.entry[0].changes[0].value;
        let log = MessageLog::default();

        let events = convert_change_value(value, &log);
        assert_eq!(events.len(), 2);

        let message = &events[0];
        assert_eq!(message.kind, InboundMessageKind::Message);
        assert_eq!(message.chat_id.as_str(), "628111");
        assert_eq!(message.sender_name.as_deref(), Some("Budi"));
        assert_eq!(message.recipient_id.as_deref(), Some("15550001111"));
        assert_eq!(message.content, "hi nala");
        assert_eq!(message.timestamp, 1_700_000_000);
        let quoted = message.quoted.as_ref().expect("quoted ref");
        assert_eq!(quoted.message_id.as_str(), "wamid.out1");
        assert_eq!(quoted.author.as_deref(), Some("15550001111"));

        assert_eq!(
            events[1].kind,
            InboundMessageKind::Delivery(DeliveryStatus::Read)
        );
        assert_eq!(
            log.get(&"wamid.in1".into()).map(|m| m.body).as_deref(),
            Some("hi nala")
        );
    }

    #[test]
    fn non_text_messages_are_skipped() {
        let message = WhatsAppMessage {
            id: "wamid.img".to_string(),
            from: "628111".to_string(),
            timestamp: None,
            message_type: "image".to_string(),
            text: None,
            context: None,
        };
        assert!(convert_whatsapp_message(&message, &WhatsAppMetadata::default(), None).is_none());
    }

    #[tokio::test]
    async fn verify_handshake_echoes_challenge() {
        let (tx, _rx) = mpsc::channel(4);
        let router = adapter().webhook_router(tx, "verify-me".to_string(), None);

        let ok = router
            .clone()
            .oneshot(
                Request::get(format!(
                    "{WHATSAPP_WEBHOOK_PATH}?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=42"
                ))
                .body(Body::empty())
                .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(ok.status(), StatusCode::OK);

        let denied = router
            .oneshot(
                Request::get(format!(
                    "{WHATSAPP_WEBHOOK_PATH}?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42"
                ))
                .body(Body::empty())
                .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn ingest_forwards_events_to_inbound_queue() {
        let (tx, mut rx) = mpsc::channel(4);
        let router = adapter().webhook_router(tx, "verify-me".to_string(), None);

        let response = router
            .oneshot(
                Request::post(WHATSAPP_WEBHOOK_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(webhook_body().to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let first = rx.recv().await.expect("message event");
        assert_eq!(first.content, "hi nala");
        let second = rx.recv().await.expect("status event");
        assert_eq!(
            second.kind,
            InboundMessageKind::Delivery(DeliveryStatus::Read)
        );
    }

    #[tokio::test]
    async fn ingest_rejects_bad_signature_when_secret_is_set() {
        let (tx, _rx) = mpsc::channel(4);
        let router =
            adapter().webhook_router(tx, "verify-me".to_string(), Some("secret".to_string()));

        let response = router
            .oneshot(
                Request::post(WHATSAPP_WEBHOOK_PATH)
                    .header("x-hub-signature-256", "sha256=deadbeef")
                    .body(Body::from(webhook_body().to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_quotes_trigger_and_logs_reply_as_own() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/12345/messages"))
            .and(header("authorization", "Bearer token"))
            .and(body_partial_json(json!({
                "to": "628111",
                "text": { "body": "hello Budi" },
                "context": { "message_id": "wamid.in1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "messages": [ { "id": "wamid.out2" } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = WhatsAppCloudAdapter::new("token", "12345")
            .expect("adapter")
            .with_graph_base_url(server.uri());
        adapter
            .send(
                "628111",
                OutboundMessage::reply("hello Budi", "wamid.in1".into()),
            )
            .await
            .expect("send succeeds");

        let quoted = adapter
            .fetch_quoted(&QuotedRef {
                message_id: "wamid.out2".into(),
                author: None,
            })
            .await
            .expect("fetch quoted");
        assert!(quoted.from_me);
        assert_eq!(quoted.body.as_deref(), Some("hello Budi"));
    }

    #[tokio::test]
    async fn send_rejects_empty_content() {
        let err = adapter()
            .send("628111", OutboundMessage::text("   "))
            .await
            .expect_err("empty content should fail");
        assert!(err.to_string().contains("empty"));
    }
}
