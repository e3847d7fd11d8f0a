//! Decides whether an inbound message should produce a reply.
//!
//! Rules are evaluated in order and the first match wins.

use anyhow::Result;
use nala_channels::QuotedMessage;
use regex::Regex;

const STATUS_COMMAND: &str = "/serverinfo";
const ASK_COMMAND: &str = "/ask ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskRule {
    ReplyToSelf,
    Mention,
    ExplicitAsk,
}

impl AskRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReplyToSelf => "reply_to_self",
            Self::Mention => "mention",
            Self::ExplicitAsk => "explicit_ask",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Reply with the server info report; no completion call.
    Status,
    /// Ask the completion service, with `user_text` as the new user line.
    Ask { rule: AskRule, user_text: String },
}

/// What the classifier knows about the message an inbound message quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteState {
    NotQuoted,
    /// Quotes a message sent by the bot.
    QuotesBot,
    /// Quotes anything else, or a message that could not be fetched.
    QuotesOther,
}

impl QuoteState {
    fn is_quoted(self) -> bool {
        !matches!(self, Self::NotQuoted)
    }
}

type Rule = fn(&TriggerClassifier, &str, QuoteState) -> Option<Trigger>;

pub const RULES: &[(&str, Rule)] = &[
    ("status", status_rule),
    ("reply_to_self", reply_to_self_rule),
    ("mention", mention_rule),
    ("explicit_ask", explicit_ask_rule),
];

pub struct TriggerClassifier {
    bot_name_lower: String,
    status_pattern: Regex,
    name_pattern: Regex,
}

impl TriggerClassifier {
    pub fn new(bot_name: &str) -> Result<Self> {
        let bot_name = bot_name.trim();
        if bot_name.is_empty() {
            return Err(anyhow::anyhow!("bot name is required"));
        }
        let escaped = regex::escape(bot_name);
        Ok(Self {
            bot_name_lower: bot_name.to_lowercase(),
            status_pattern: Regex::new(&format!("(?i){escaped}.*server|server.*{escaped}"))?,
            name_pattern: Regex::new(&format!("(?i){escaped}"))?,
        })
    }

    /// `None` means the message is only recorded.
    pub fn classify(&self, body: &str, quote: QuoteState) -> Option<Trigger> {
        RULES.iter().find_map(|(name, rule)| {
            let trigger = rule(self, body, quote)?;
            tracing::debug!(rule = %name, "trigger rule matched");
            Some(trigger)
        })
    }

    /// A quoted message counts as the bot's own when our account sent it,
    /// when its author is the current message's destination, or when its
    /// sender display name contains the bot name.
    pub fn is_reply_to_self(&self, quoted: &QuotedMessage, destination: Option<&str>) -> bool {
        if quoted.from_me {
            return true;
        }
        if let (Some(author), Some(destination)) = (quoted.author.as_deref(), destination) {
            if !author.is_empty() && author == destination {
                return true;
            }
        }
        quoted
            .sender_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&self.bot_name_lower))
    }

    fn mentions_bot(&self, body: &str) -> bool {
        body.to_lowercase().contains(&self.bot_name_lower)
    }

    fn strip_bot_name(&self, body: &str) -> String {
        self.name_pattern.replace_all(body, "").trim().to_string()
    }
}

fn status_rule(c: &TriggerClassifier, body: &str, _quote: QuoteState) -> Option<Trigger> {
    let lower = body.to_lowercase();
    (lower.starts_with(STATUS_COMMAND) || c.status_pattern.is_match(body)).then_some(Trigger::Status)
}

fn reply_to_self_rule(_c: &TriggerClassifier, body: &str, quote: QuoteState) -> Option<Trigger> {
    (quote == QuoteState::QuotesBot).then(|| Trigger::Ask {
        rule: AskRule::ReplyToSelf,
        user_text: body.to_string(),
    })
}

fn mention_rule(c: &TriggerClassifier, body: &str, quote: QuoteState) -> Option<Trigger> {
    if quote.is_quoted() || !c.mentions_bot(body) {
        return None;
    }
    Some(Trigger::Ask {
        rule: AskRule::Mention,
        user_text: c.strip_bot_name(body),
    })
}

fn explicit_ask_rule(_c: &TriggerClassifier, body: &str, quote: QuoteState) -> Option<Trigger> {
    if quote.is_quoted() || !body.to_lowercase().starts_with(ASK_COMMAND) {
        return None;
    }
    let rest: String = body.chars().skip(ASK_COMMAND.chars().count()).collect();
    Some(Trigger::Ask {
        rule: AskRule::ExplicitAsk,
        user_text: rest.trim().to_string(),
    })
}
