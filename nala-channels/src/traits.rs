use crate::types::{InboundMessage, OutboundMessage, QuotedMessage, QuotedRef};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier: "whatsapp".
    fn channel_id(&self) -> &str;

    /// Start receiving messages. Push to tx for each inbound event.
    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()>;

    /// Send a message into a chat on this platform.
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()>;

    /// Resolve the message an inbound message quotes.
    /// Adapters that cannot look messages up should keep the default.
    async fn fetch_quoted(&self, _quoted: &QuotedRef) -> Result<QuotedMessage> {
        Err(anyhow::anyhow!(
            "fetch_quoted is not supported by this channel"
        ))
    }
}
