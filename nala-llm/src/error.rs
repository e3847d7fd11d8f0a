use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("http error: {0}")]
    Http(String),

    /// Non-success status from the provider. `message` is the provider's own
    /// `error.message` when the body carried one, else the raw body.
    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl LlmError {
    /// The most specific human-readable cause, used for log lines.
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidInput(m) | Self::Http(m) | Self::ResponseFormat(m) => m,
            Self::Api { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
