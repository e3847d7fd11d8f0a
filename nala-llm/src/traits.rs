use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Completion: Send + Sync {
    /// Generate a reply for `prompt`. The returned text is already cleaned
    /// and never empty.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
