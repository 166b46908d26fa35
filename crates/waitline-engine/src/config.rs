//! # Engine Configuration
//!
//! Configuration management for the queue engine and its server wrapper.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     WAITLINE_DATABASE_PATH=/var/lib/waitline/waitline.db               │
//! │     WAITLINE_SWEEP_INTERVAL_SECS=60                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/waitline/waitline.toml (Linux)                           │
//! │     ~/Library/Application Support/com.waitline.waitline/ (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # waitline.toml
//! [database]
//! path = "/var/lib/waitline/waitline.db"
//! max_connections = 5
//!
//! [scheduler]
//! sweep_interval_secs = 60
//! recover_timers = true
//!
//! [events]
//! capacity = 256
//!
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [notify.sms]
//! endpoint = "https://sms.example.com/v1/messages"
//! api_key = "..."
//!
//! [notify.whatsapp]
//! phone_number_id = "1234567890"
//! access_token = "..."
//!
//! [notify.email]
//! smtp_host = "smtp.example.com"
//! username = "queue@example.com"
//! password = "..."
//! from_address = "queue@example.com"
//! ```
//!
//! A missing `[notify.*]` section means that channel is not registered.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Entry Store location and pool size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "waitline", "waitline")
        .map(|dirs| dirs.data_dir().join("waitline.db"))
        .unwrap_or_else(|| PathBuf::from("./waitline.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Scheduler Settings
// =============================================================================

/// Timeout scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Interval between sweep runs (seconds).
    /// Bounds how late a no-show can be recorded after a restart.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Re-arm per-entry timers for `called` entries on start.
    #[serde(default = "default_true")]
    pub recover_timers: bool,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            sweep_interval_secs: default_sweep_interval(),
            recover_timers: true,
        }
    }
}

impl SchedulerSettings {
    /// Returns the sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// =============================================================================
// Event Bus Settings
// =============================================================================

/// Realtime event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Per-company broadcast buffer. Receivers further behind than this lag
    /// and lose the oldest events.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// HTTP SMS gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSettings {
    /// Gateway endpoint receiving `{"to", "from", "body"}` JSON.
    pub endpoint: String,

    /// Bearer token for the gateway.
    #[serde(default)]
    pub api_key: String,

    /// Sender ID or number shown to the customer.
    #[serde(default)]
    pub sender: Option<String>,

    /// Request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// WhatsApp Business Cloud API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppSettings {
    /// Graph API base URL, including the version segment.
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,

    /// WhatsApp phone number ID.
    pub phone_number_id: String,

    /// Graph API access token.
    #[serde(default)]
    pub access_token: String,

    /// Request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// SMTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Envelope sender address.
    pub from_address: String,

    /// Display name for the sender.
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Channel registrations. `None` leaves the channel unregistered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default)]
    pub sms: Option<SmsSettings>,

    #[serde(default)]
    pub whatsapp: Option<WhatsAppSettings>,

    #[serde(default)]
    pub email: Option<EmailSettings>,
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (waitline.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "events.capacity must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if let Some(sms) = &self.notify.sms {
            validate_http_url(&sms.endpoint)?;
        }

        if let Some(whatsapp) = &self.notify.whatsapp {
            validate_http_url(&whatsapp.api_base)?;
            if whatsapp.phone_number_id.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "notify.whatsapp.phone_number_id is required".into(),
                ));
            }
        }

        if let Some(email) = &self.notify.email {
            if email.smtp_host.is_empty() || email.from_address.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "notify.email needs smtp_host and from_address".into(),
                ));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    ///
    /// Secrets only fill in a channel that already has a config section.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("WAITLINE_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("WAITLINE_SWEEP_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.scheduler.sweep_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid WAITLINE_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Ok(addr) = std::env::var("WAITLINE_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("WAITLINE_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding server port from environment");
                self.server.port = p;
            }
        }

        if let Ok(capacity) = std::env::var("WAITLINE_EVENT_CAPACITY") {
            if let Ok(c) = capacity.parse::<usize>() {
                self.events.capacity = c;
            }
        }

        if let Ok(key) = std::env::var("WAITLINE_SMS_API_KEY") {
            match self.notify.sms.as_mut() {
                Some(sms) => sms.api_key = key,
                None => warn!("WAITLINE_SMS_API_KEY set but [notify.sms] is not configured"),
            }
        }

        if let Ok(token) = std::env::var("WAITLINE_WHATSAPP_TOKEN") {
            match self.notify.whatsapp.as_mut() {
                Some(whatsapp) => whatsapp.access_token = token,
                None => warn!("WAITLINE_WHATSAPP_TOKEN set but [notify.whatsapp] is not configured"),
            }
        }

        if let Ok(password) = std::env::var("WAITLINE_SMTP_PASSWORD") {
            match self.notify.email.as_mut() {
                Some(email) => email.password = password,
                None => warn!("WAITLINE_SMTP_PASSWORD set but [notify.email] is not configured"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "waitline", "waitline")
            .map(|dirs| dirs.config_dir().join("waitline.toml"))
    }
}

fn validate_http_url(raw: &str) -> EngineResult<()> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(EngineError::InvalidUrl(format!(
            "Expected http:// or https://, got {}://",
            other
        ))),
    }
}
