use crate::types::{MessageId, QuotedMessage, QuotedRef, SenderId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub body: String,
    pub from_me: bool,
    pub author: Option<SenderId>,
    pub sender_name: Option<String>,
}

/// Bounded record of recently seen and sent messages, so an adapter can
/// resolve quoted replies on platforms that only send a message id.
/// Oldest entries are evicted first.
#[derive(Debug)]
pub struct MessageLog {
    capacity: usize,
    inner: Mutex<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    order: VecDeque<MessageId>,
    entries: HashMap<MessageId, LoggedMessage>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MessageLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LogInner::default()),
        }
    }

    pub fn record(&self, id: MessageId, message: LoggedMessage) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.insert(id.clone(), message).is_none() {
            inner.order.push_back(id);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<LoggedMessage> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(id).cloned()
    }

    /// Resolve a quoted reference. Unknown ids still yield the author the
    /// platform reported, with no body.
    pub fn resolve(&self, quoted: &QuotedRef) -> QuotedMessage {
        match self.get(&quoted.message_id) {
            Some(logged) => QuotedMessage {
                message_id: quoted.message_id.clone(),
                body: Some(logged.body),
                from_me: logged.from_me,
                author: logged.author.or_else(|| quoted.author.clone()),
                sender_name: logged.sender_name,
            },
            None => QuotedMessage {
                message_id: quoted.message_id.clone(),
                body: None,
                from_me: false,
                author: quoted.author.clone(),
                sender_name: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged(body: &str, from_me: bool) -> LoggedMessage {
        LoggedMessage {
            body: body.to_string(),
            from_me,
            author: None,
            sender_name: None,
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let log = MessageLog::with_capacity(2);
        log.record("a".into(), logged("first", false));
        log.record("b".into(), logged("second", false));
        log.record("c".into(), logged("third", true));

        assert!(log.get(&"a".into()).is_none());
        assert!(log.get(&"b".into()).is_some());
        assert_eq!(log.get(&"c".into()).map(|m| m.body).as_deref(), Some("third"));
    }

    #[test]
    fn resolve_known_message_keeps_from_me_and_body() {
        let log = MessageLog::default();
        log.record("wamid.1".into(), logged("hi from the bot", true));

        let quoted = log.resolve(&QuotedRef {
            message_id: "wamid.1".into(),
            author: Some("15550001111".into()),
        });
        assert!(quoted.from_me);
        assert_eq!(quoted.body.as_deref(), Some("hi from the bot"));
        assert_eq!(quoted.author.as_deref(), Some("15550001111"));
    }

    #[test]
    fn resolve_unknown_message_falls_back_to_reported_author() {
        let log = MessageLog::default();
        let quoted = log.resolve(&QuotedRef {
            message_id: "wamid.missing".into(),
            author: Some("15550001111".into()),
        });
        assert!(!quoted.from_me);
        assert!(quoted.body.is_none());
        assert_eq!(quoted.author.as_deref(), Some("15550001111"));
    }
}
