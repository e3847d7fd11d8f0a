//! Completion client for the Nala bridge.
//!
//! Pure HTTP client for the Gemini `generateContent` endpoint, plus the
//! reply cleanup applied before a completion is relayed to a chat.

mod cleanup;
mod client;
mod error;
mod gemini;
mod traits;

pub use cleanup::{DEFAULT_DISCLAIMER_PREFIXES, ReplyCleaner};
pub use client::{DEFAULT_ENDPOINT, DEFAULT_MODEL, LlmClient};
pub use error::{LlmError, Result};
pub use traits::Completion;

/// Sent in place of a reply when the provider returned no candidate text.
pub const EMPTY_RESPONSE: &str = "[Empty Response]";
