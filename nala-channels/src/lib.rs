//! Channel adapters for the Nala bridge.
//!
//! Adapters are pure I/O: they convert platform events to/from the
//! transport-neutral `InboundMessage` / `OutboundMessage`.

mod message_log;
mod traits;
mod types;
mod whatsapp;

pub use message_log::{LoggedMessage, MessageLog};
pub use traits::ChannelAdapter;
pub use types::{
    ChannelId, ChatId, DeliveryStatus, InboundMessage, InboundMessageKind, MessageId,
    OutboundMessage, QuotedMessage, QuotedRef, SenderId,
};
pub use whatsapp::{WHATSAPP_WEBHOOK_PATH, WhatsAppCloudAdapter};
