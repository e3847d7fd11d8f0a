use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ChannelId);
id_newtype!(ChatId);
id_newtype!(SenderId);

/// Delivery acknowledgement reported by the platform for a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by the platform's servers.
    Server,
    /// Delivered to the recipient's device.
    Device,
    Read,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundMessageKind {
    Message,
    Delivery(DeliveryStatus),
}

/// Reference to the message an inbound message replies to, as carried by the
/// platform event. The full message is resolved lazily through
/// `ChannelAdapter::fetch_quoted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedRef {
    pub message_id: MessageId,
    #[serde(default)]
    pub author: Option<SenderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub message_id: MessageId,
    /// Text of the quoted message when the adapter still knows it.
    #[serde(default)]
    pub body: Option<String>,
    /// Sent by this bridge's own account.
    pub from_me: bool,
    #[serde(default)]
    pub author: Option<SenderId>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub kind: InboundMessageKind,
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub chat_id: ChatId,
    pub sender_id: SenderId,
    /// Display name the sender chose on the platform.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Destination of the message (the bridge's own address on the platform).
    #[serde(default)]
    pub recipient_id: Option<SenderId>,
    pub content: String,
    #[serde(default)]
    pub quoted: Option<QuotedRef>,
    /// Provider timestamp, epoch seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Name shown in logs: display name when known, else the sender id.
    pub fn sender_label(&self) -> &str {
        self.sender_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.sender_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    #[serde(default)]
    pub reply_to_message_id: Option<MessageId>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reply_to_message_id: None,
        }
    }

    pub fn reply(content: impl Into<String>, to: MessageId) -> Self {
        Self {
            content: content.into(),
            reply_to_message_id: Some(to),
        }
    }
}
