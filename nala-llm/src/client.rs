use crate::EMPTY_RESPONSE;
use crate::cleanup::ReplyCleaner;
use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::traits::Completion;
use async_trait::async_trait;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone)]
pub struct LlmClient {
    model: String,
    gemini: GeminiClient,
    cleaner: ReplyCleaner,
}

impl LlmClient {
    /// Builds a client against the public Gemini endpoint. No request
    /// timeout is configured; the transport defaults apply.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        Self::with_endpoint(api_key, model, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, model: &str, endpoint: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(LlmError::InvalidInput("api key is required".to_string()));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(LlmError::InvalidInput("model is required".to_string()));
        }
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(LlmError::InvalidInput("endpoint is required".to_string()));
        }
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            model: model.to_string(),
            gemini: GeminiClient::new(http, api_key, endpoint, model),
            cleaner: ReplyCleaner::default(),
        })
    }

    pub fn with_cleaner(mut self, cleaner: ReplyCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }
}

#[async_trait]
impl Completion for LlmClient {
    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.gemini.generate(prompt).await? {
            Some(text) => Ok(self.cleaner.clean(&text)),
            None => {
                tracing::warn!("completion returned no candidate text");
                Ok(EMPTY_RESPONSE.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/models/gemini-2.0-flash:generateContent";

    async fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::with_endpoint("test-key", DEFAULT_MODEL, &server.uri()).expect("build client")
    }

    #[test]
    fn new_rejects_blank_api_key() {
        let err = LlmClient::new("   ", DEFAULT_MODEL)
            .err()
            .expect("blank key should fail");
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn complete_posts_prompt_and_returns_first_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "contents": [ { "parts": [ { "text": "User: hi\nNala:" } ] } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "parts": [ { "text": " hello there \n" } ] } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .complete("User: hi\nNala:")
            .await
            .expect("completion succeeds");
        assert_eq!(reply, "hello there");
    }

    #[tokio::test]
    async fn complete_strips_disclaimer_paragraph() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "parts": [ {
                    "text": "As an AI language model, I cannot tell jokes.\n\n*Why did the cat sit on the computer? To keep an eye on the mouse."
                } ] } } ]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .complete("User: joke\nNala:")
            .await
            .expect("completion succeeds");
        assert_eq!(
            reply,
            "Why did the cat sit on the computer? To keep an eye on the mouse."
        );
    }

    #[tokio::test]
    async fn complete_maps_missing_candidates_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .complete("User: hi\nNala:")
            .await
            .expect("missing text is not an error");
        assert_eq!(reply, EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn complete_surfaces_provider_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .complete("User: hi\nNala:")
            .await
            .expect_err("non-success status should fail");
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_rejects_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .complete("User: hi\nNala:")
            .await
            .expect_err("malformed body should fail");
        assert!(matches!(err, LlmError::ResponseFormat(_)));
    }
}
