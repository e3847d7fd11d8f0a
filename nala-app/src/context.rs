//! Per-chat rolling context windows.
//!
//! Process lifetime only: windows are created on a chat's first message,
//! never persisted and never removed.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub speaker: Speaker,
    pub text: String,
    /// Provider message id, or `<BotName>-<unix millis>` for bot replies.
    pub id: String,
    /// Epoch seconds.
    pub timestamp: i64,
    /// Text of the message this one replied to.
    pub quoted_text: Option<String>,
}

impl MessageRecord {
    pub fn bot_reply(bot_name: &str, text: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
            id: format!("{bot_name}-{}", now.timestamp_millis()),
            timestamp: now.timestamp(),
            quoted_text: None,
        }
    }
}

/// Owns every chat's window. Callers only ever get cloned snapshots.
pub struct ContextStore {
    max_context: usize,
    windows: DashMap<String, VecDeque<MessageRecord>>,
}

impl ContextStore {
    pub fn new(max_context: usize) -> Self {
        Self {
            max_context: max_context.max(1),
            windows: DashMap::new(),
        }
    }

    pub fn max_context(&self) -> usize {
        self.max_context
    }

    /// Appends to the chat's window, evicting the oldest records past
    /// `max_context`. The entry lock is held for the whole update.
    pub fn append(&self, chat_id: &str, record: MessageRecord) {
        let mut window = self
            .windows
            .entry(chat_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.max_context + 1));
        window.push_back(record);
        while window.len() > self.max_context {
            window.pop_front();
        }
    }

    /// Chronological snapshot; empty for an unknown chat.
    pub fn get(&self, chat_id: &str) -> Vec<MessageRecord> {
        self.windows
            .get(chat_id)
            .map(|window| window.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn chat_count(&self) -> usize {
        self.windows.len()
    }

    pub fn chat_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: usize) -> MessageRecord {
        MessageRecord {
            speaker: Speaker::User,
            text: format!("message {id}"),
            id: format!("wamid.{id}"),
            timestamp: 1_700_000_000 + id as i64,
            quoted_text: None,
        }
    }

    #[test]
    fn window_keeps_last_max_context_records_in_arrival_order() {
        let store = ContextStore::new(5);
        for i in 0..12 {
            store.append("chat-a", user(i));
        }

        let window = store.get("chat-a");
        let ids: Vec<&str> = window.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["wamid.7", "wamid.8", "wamid.9", "wamid.10", "wamid.11"]
        );
    }

    #[test]
    fn chats_are_isolated_and_unknown_chat_is_empty() {
        let store = ContextStore::new(2);
        store.append("chat-a", user(1));
        store.append("chat-b", user(2));

        assert_eq!(store.get("chat-a").len(), 1);
        assert_eq!(store.get("chat-b")[0].id, "wamid.2");
        assert!(store.get("chat-c").is_empty());
        assert_eq!(store.chat_count(), 2);
        assert_eq!(store.chat_ids(), vec!["chat-a", "chat-b"]);
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let store = ContextStore::new(3);
        store.append("chat-a", user(1));
        let mut snapshot = store.get("chat-a");
        snapshot.clear();
        assert_eq!(store.get("chat-a").len(), 1);
    }

    #[test]
    fn bot_reply_id_uses_bot_name_and_millis() {
        let record = MessageRecord::bot_reply("Nala", "hello");
        assert_eq!(record.speaker, Speaker::Bot);
        let millis = record
            .id
            .strip_prefix("Nala-")
            .expect("id prefixed with bot name");
        assert!(millis.parse::<i64>().is_ok());
        assert!(record.quoted_text.is_none());
    }

    #[tokio::test]
    async fn concurrent_appends_never_exceed_bound() {
        let store = std::sync::Arc::new(ContextStore::new(5));
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append("shared", user(i));
            }));
        }
        for handle in handles {
            handle.await.expect("append task");
        }
        assert_eq!(store.get("shared").len(), 5);
    }
}
