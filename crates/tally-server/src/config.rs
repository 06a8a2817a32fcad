//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The site events are reported for.
    #[serde(default)]
    pub site: SiteConfig,

    /// Analytics dispatch settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Slack milestone notifications.
    #[serde(default)]
    pub slack: SlackConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tally_analytics=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Deployment environment. Affects theme validation strictness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Site identity.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Public URL of the site.
    #[serde(default = "default_site_url")]
    pub url: String,

    #[serde(default)]
    pub environment: Environment,
}

/// Analytics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Whether the analytics dispatchers are subscribed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prepended to every tracked event name (e.g. "[Staging] ").
    #[serde(default)]
    pub prefix: String,

    /// Identity events are attributed to. Falls back to `site.url` when empty.
    #[serde(default)]
    pub user_id: String,

    /// Static properties attached to every tracked event.
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub segment: SegmentConfig,

    /// Extra model lifecycle entries appended to the built-in table.
    #[serde(default)]
    pub model_events: Vec<ModelEventConfig>,
}

/// Segment delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    /// Source write key. When absent, records are logged instead of sent.
    #[serde(default)]
    pub write_key: Option<String>,

    /// API base URL.
    #[serde(default = "default_segment_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_segment_timeout")]
    pub timeout_secs: u64,
}

/// One `[[analytics.model_events]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEventConfig {
    /// Model event name, e.g. `member.added`.
    pub event: String,
    /// Tracked event name, before the prefix.
    pub name: String,
    /// Output key → payload path.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Slack notification settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Incoming webhook URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    2369
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_site_url() -> String {
    "http://localhost:2368".to_string()
}

fn default_true() -> bool {
    true
}

fn default_segment_endpoint() -> String {
    tally_analytics::DEFAULT_SEGMENT_ENDPOINT.to_string()
}

fn default_segment_timeout() -> u64 {
    tally_analytics::DEFAULT_TIMEOUT.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: default_site_url(),
            environment: Environment::default(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: String::new(),
            user_id: String::new(),
            properties: Map::new(),
            segment: SegmentConfig::default(),
            model_events: Vec::new(),
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            write_key: None,
            endpoint: default_segment_endpoint(),
            timeout_secs: default_segment_timeout(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `TALLY_HOST` overrides `server.host`
/// - `TALLY_PORT` overrides `server.port`
/// - `TALLY_LOG_LEVEL` overrides `logging.level`
/// - `TALLY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `TALLY_SITE_URL` overrides `site.url`
/// - `TALLY_ANALYTICS_PREFIX` overrides `analytics.prefix`
/// - `TALLY_SEGMENT_WRITE_KEY` overrides `analytics.segment.write_key`
/// - `TALLY_SLACK_WEBHOOK_URL` overrides `slack.webhook_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("TALLY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("TALLY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("TALLY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("TALLY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(url) = var("TALLY_SITE_URL") {
        config.site.url = url;
    }
    if let Some(prefix) = var("TALLY_ANALYTICS_PREFIX") {
        config.analytics.prefix = prefix;
    }
    if let Some(key) = var("TALLY_SEGMENT_WRITE_KEY") {
        config.analytics.segment.write_key = Some(key).filter(|key| !key.is_empty());
    }
    if let Some(url) = var("TALLY_SLACK_WEBHOOK_URL") {
        config.slack.webhook_url = Some(url).filter(|url| !url.is_empty());
    }
}
