use crate::config::NalaConfig;
use anyhow::Result;
use axum::Router;
use nala_channels::{ChannelAdapter, InboundMessage, WhatsAppCloudAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const WHATSAPP: &str = "whatsapp";

pub struct ChannelLoadResult {
    pub channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    /// Webhook routes mounted next to the API routes.
    pub routers: Vec<Router>,
}

pub async fn load_enabled_channels(
    cfg: &NalaConfig,
    inbound_tx: mpsc::Sender<InboundMessage>,
) -> Result<ChannelLoadResult> {
    let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    let mut routers = Vec::new();

    let wa = &cfg.channels.whatsapp;
    if wa.enabled {
        let adapter = Arc::new(whatsapp_adapter(cfg)?);
        adapter.start(inbound_tx.clone()).await?;
        routers.push(adapter.webhook_router(
            inbound_tx.clone(),
            wa.webhook_verify_token.trim().to_string(),
            wa.app_secret.clone(),
        ));
        tracing::info!(
            channel_id = %adapter.channel_id(),
            signature_check = wa.app_secret.as_deref().is_some_and(|s| !s.trim().is_empty()),
            "whatsapp channel loaded"
        );
        channels.insert(WHATSAPP.to_string(), adapter);
    }

    if channels.is_empty() {
        tracing::warn!("no channels enabled; the bridge will not receive messages");
    }
    Ok(ChannelLoadResult { channels, routers })
}

/// Adapter for one-shot sends outside the server.
pub fn build_adapter(cfg: &NalaConfig, channel: &str) -> Result<Arc<dyn ChannelAdapter>> {
    match channel {
        WHATSAPP => Ok(Arc::new(whatsapp_adapter(cfg)?)),
        other => Err(anyhow::anyhow!("unknown channel: {other}")),
    }
}

fn whatsapp_adapter(cfg: &NalaConfig) -> Result<WhatsAppCloudAdapter> {
    let wa = &cfg.channels.whatsapp;
    WhatsAppCloudAdapter::new(&wa.access_token, &wa.phone_number_id)
}
