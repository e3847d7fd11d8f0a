//! Inbound message multiplexer.
//!
//! Every channel feeds one inbound queue. Events are routed to a lane per
//! chat so a chat's messages are handled strictly in arrival order while
//! different chats run in parallel. Lanes are unbounded: routing must never
//! wait on a chat whose completion is slow.

use crate::config::{NalaConfig, RepliesConfig};
use crate::context::{ContextStore, MessageRecord, Speaker};
use crate::prompt;
use crate::status::StatusReporter;
use crate::triggers::{QuoteState, Trigger, TriggerClassifier};
use anyhow::Result;
use dashmap::DashMap;
use nala_channels::{ChannelAdapter, InboundMessage, InboundMessageKind, OutboundMessage};
use nala_llm::Completion;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Gateway {
    bot_name: String,
    replies: RepliesConfig,
    classifier: TriggerClassifier,
    context: Arc<ContextStore>,
    completion: Arc<dyn Completion>,
    status: Arc<StatusReporter>,
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    lanes: DashMap<String, mpsc::UnboundedSender<InboundMessage>>,
}

impl Gateway {
    pub fn new(
        cfg: &NalaConfig,
        context: Arc<ContextStore>,
        completion: Arc<dyn Completion>,
        status: Arc<StatusReporter>,
        channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    ) -> Result<Self> {
        Ok(Self {
            bot_name: cfg.general.bot_name.trim().to_string(),
            replies: cfg.replies.clone(),
            classifier: TriggerClassifier::new(&cfg.general.bot_name)?,
            context,
            completion,
            status,
            channels,
            lanes: DashMap::new(),
        })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn start(
        self: Arc<Self>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(inbound_rx, shutdown).await;
            tracing::info!(lanes = self.lane_count(), "gateway loop exited");
        })
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(
        self: &Arc<Self>,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        loop {
            let inbound = tokio::select! {
                _ = shutdown.cancelled() => return,
                msg = inbound_rx.recv() => msg,
            };
            let Some(inbound) = inbound else {
                return;
            };
            if let InboundMessageKind::Delivery(status) = inbound.kind {
                tracing::info!(
                    channel_id = %inbound.channel_id,
                    chat_id = %inbound.chat_id,
                    message_id = %inbound.message_id,
                    status = ?status,
                    body = %inbound.content,
                    "delivery acknowledged"
                );
                continue;
            }
            self.dispatch(inbound, &shutdown);
        }
    }

    fn dispatch(self: &Arc<Self>, inbound: InboundMessage, shutdown: &CancellationToken) {
        let chat_id = inbound.chat_id.to_string();
        let lane = self
            .lanes
            .entry(chat_id.clone())
            .or_insert_with(|| self.spawn_lane(&chat_id, shutdown.child_token()))
            .clone();

        let Err(mpsc::error::SendError(inbound)) = lane.send(inbound) else {
            return;
        };
        tracing::warn!(chat_id = %chat_id, "chat lane closed; restarting");
        let lane = self.spawn_lane(&chat_id, shutdown.child_token());
        self.lanes.insert(chat_id.clone(), lane.clone());
        if lane.send(inbound).is_err() {
            tracing::error!(chat_id = %chat_id, "dropping message: chat lane unavailable");
        }
    }

    fn spawn_lane(
        self: &Arc<Self>,
        chat_id: &str,
        shutdown: CancellationToken,
    ) -> mpsc::UnboundedSender<InboundMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundMessage>();
        let gateway = Arc::clone(self);
        let chat_id = chat_id.to_string();
        tracing::debug!(chat_id = %chat_id, "chat lane started");
        tokio::spawn(async move {
            loop {
                let inbound = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = rx.recv() => msg,
                };
                let Some(inbound) = inbound else {
                    break;
                };
                if let Err(e) = gateway.handle_inbound(inbound).await {
                    tracing::warn!(chat_id = %chat_id, error = %e, "handle_inbound failed");
                }
            }
            tracing::debug!(chat_id = %chat_id, "chat lane stopped");
        });
        tx
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(chat_id = %inbound.chat_id, message_id = %inbound.message_id)
    )]
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        if inbound.kind != InboundMessageKind::Message {
            return Ok(());
        }
        let channel = self
            .channels
            .get(inbound.channel_id.as_str())
            .ok_or_else(|| anyhow::anyhow!("unknown channel: {}", inbound.channel_id))?
            .clone();
        let chat_id = inbound.chat_id.as_str();

        tracing::info!(
            sender = %inbound.sender_label(),
            body = %inbound.content,
            "message received"
        );

        let (quote, quoted_text) = match inbound.quoted.as_ref() {
            None => (QuoteState::NotQuoted, None),
            Some(quoted_ref) => match channel.fetch_quoted(quoted_ref).await {
                Ok(quoted) => {
                    let to_bot = self
                        .classifier
                        .is_reply_to_self(&quoted, inbound.recipient_id.as_deref());
                    let state = if to_bot {
                        QuoteState::QuotesBot
                    } else {
                        QuoteState::QuotesOther
                    };
                    (state, quoted.body)
                }
                Err(e) => {
                    tracing::warn!(
                        quoted_message_id = %quoted_ref.message_id,
                        error = %e,
                        "quoted message fetch failed; treating as not a reply to the bot"
                    );
                    (QuoteState::QuotesOther, None)
                }
            },
        };

        let speaker = if inbound.sender_name.as_deref() == Some(self.bot_name.as_str()) {
            Speaker::Bot
        } else {
            Speaker::User
        };
        self.context.append(
            chat_id,
            MessageRecord {
                speaker,
                text: inbound.content.clone(),
                id: inbound.message_id.to_string(),
                timestamp: inbound.timestamp,
                quoted_text,
            },
        );
        let window = self.context.get(chat_id);

        let Some(trigger) = self.classifier.classify(&inbound.content, quote) else {
            return Ok(());
        };

        match trigger {
            Trigger::Status => {
                let reply = match self.status.collect().await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::error!(error = %e, "server info collection failed");
                        self.replies.status_failure.clone()
                    }
                };
                channel
                    .send(
                        chat_id,
                        OutboundMessage::reply(reply.clone(), inbound.message_id.clone()),
                    )
                    .await?;
                tracing::info!(bot = %self.bot_name, report = %reply, "server info sent");
            }
            Trigger::Ask { rule, user_text } => {
                let prompt = prompt::render(&self.bot_name, &window, &user_text);
                tracing::debug!(rule = rule.as_str(), prompt = %prompt, "requesting completion");

                match self.completion.complete(&prompt).await {
                    Ok(reply) => {
                        channel
                            .send(
                                chat_id,
                                OutboundMessage::reply(reply.clone(), inbound.message_id.clone()),
                            )
                            .await?;
                        tracing::info!(
                            bot = %self.bot_name,
                            to = %inbound.sender_label(),
                            reply = %reply,
                            "reply sent"
                        );
                        self.context
                            .append(chat_id, MessageRecord::bot_reply(&self.bot_name, reply));
                    }
                    Err(e) => {
                        tracing::error!(error = %e.detail(), "completion failed");
                        channel
                            .send(
                                chat_id,
                                OutboundMessage::reply(
                                    self.replies.completion_failure.clone(),
                                    inbound.message_id.clone(),
                                ),
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }
}
