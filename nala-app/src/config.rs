//! Nala configuration loader.
//!
//! Order: TOML file (missing file = defaults), `.env`, environment overrides,
//! validation.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BOT_NAME: &str = "Nala";
pub const DEFAULT_MAX_CONTEXT: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NalaConfig {
    pub general: GeneralConfig,
    pub llm: LlmConfig,
    pub replies: RepliesConfig,
    pub status: StatusConfig,
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub bot_name: String,
    /// Records kept per chat context window.
    pub max_context: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bot_name: DEFAULT_BOT_NAME.to_string(),
            max_context: DEFAULT_MAX_CONTEXT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    /// Case-insensitive prefixes marking a boilerplate first paragraph.
    pub disclaimer_prefixes: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: nala_llm::DEFAULT_MODEL.to_string(),
            endpoint: nala_llm::DEFAULT_ENDPOINT.to_string(),
            disclaimer_prefixes: nala_llm::DEFAULT_DISCLAIMER_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    pub completion_failure: String,
    pub status_failure: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            completion_failure: "Sorry, Nala failed to reply.".to_string(),
            status_failure: "❌ Failed to fetch server info.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Interface reported on the Network line. Unset: first non-loopback.
    pub network_interface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub http_timeout_seconds: u64,
    pub http_max_in_flight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            http_timeout_seconds: 30,
            http_max_in_flight: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub inbound_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound_buffer: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub access_token: String,
    pub phone_number_id: String,
    pub webhook_verify_token: String,
    pub app_secret: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            access_token: String::new(),
            phone_number_id: String::new(),
            webhook_verify_token: String::new(),
            app_secret: None,
        }
    }
}

impl NalaConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (cfg, _) = Self::load_with_path(path).await?;
        Ok(cfg)
    }

    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, PathBuf)> {
        let path = path
            .or_else(|| {
                std::env::var("NALA_CONFIG")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(default_config_path);

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config_path = %path.display(), "config file not found; using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!("read config {}: {e}", path.display()));
            }
        };

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, ".env could not be loaded");
            }
        }
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok((cfg, path))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GEMINI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = var("NALA_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = var("NALA_BOT_NAME") {
            self.general.bot_name = v;
        }
        if let Some(v) = var("NALA_MAX_CONTEXT") {
            match v.trim().parse::<usize>() {
                Ok(n) => self.general.max_context = n,
                Err(e) => tracing::warn!(value = %v, error = %e, "ignoring invalid NALA_MAX_CONTEXT"),
            }
        }
        if let Some(v) = var("NALA_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = var("WHATSAPP_ACCESS_TOKEN") {
            self.channels.whatsapp.access_token = v;
        }
        if let Some(v) = var("WHATSAPP_PHONE_NUMBER_ID") {
            self.channels.whatsapp.phone_number_id = v;
        }
        if let Some(v) = var("WHATSAPP_VERIFY_TOKEN") {
            self.channels.whatsapp.webhook_verify_token = v;
        }
        if let Some(v) = var("WHATSAPP_APP_SECRET") {
            self.channels.whatsapp.app_secret = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.general.bot_name.trim().is_empty() {
            return Err(anyhow::anyhow!("general.bot_name is required"));
        }
        if self.general.max_context == 0 {
            return Err(anyhow::anyhow!("general.max_context must be > 0"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow::anyhow!("llm.model is required"));
        }
        if self.queue.inbound_buffer == 0 {
            return Err(anyhow::anyhow!("queue.inbound_buffer must be > 0"));
        }
        if self.server.http_max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.http_max_in_flight must be > 0"));
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Credentials of enabled channels; needed by `serve`, `send` and `doctor`.
    pub fn validate_channels(&self) -> anyhow::Result<()> {
        let wa = &self.channels.whatsapp;
        if wa.enabled {
            if wa.access_token.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "channels.whatsapp.access_token is required when whatsapp is enabled"
                ));
            }
            if wa.phone_number_id.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "channels.whatsapp.phone_number_id is required when whatsapp is enabled"
                ));
            }
            if wa.webhook_verify_token.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "channels.whatsapp.webhook_verify_token is required when whatsapp is enabled"
                ));
            }
        }
        Ok(())
    }

    /// The completion key is only needed by `serve`.
    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        let key = self.llm.api_key.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!(
                "llm.api_key is required (set GEMINI_API_KEY)"
            ));
        }
        Ok(key)
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind_addr
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid server.bind_addr {:?}: {e}", self.server.bind_addr))
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".nala").join("config.toml")
}
