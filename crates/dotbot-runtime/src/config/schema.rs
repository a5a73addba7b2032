//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dotbot_adapter_hackchat::HcConfig;
use dotbot_adapter_idns::IdnsConfig;
use dotbot_core::SessionParams;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DotbotConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The chatter to run.
    #[serde(default)]
    pub chatter: ChatterConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    /// Line format.
    pub format: LogFormat,
    /// Destination.
    pub output: LogOutput,
    /// Span events to log.
    pub span_events: SpanEventConfig,
    /// Include thread ids.
    pub thread_ids: bool,
    /// Include file and line of the call site.
    pub file_location: bool,
    /// Log file, required when `output = "file"`.
    pub file_path: Option<PathBuf>,
    /// Per-target levels, e.g. `dotbot_core = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
}

// =============================================================================
// Chatter
// =============================================================================

/// Chat services the runtime can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// hack.chat.
    HackChat,
    /// IDNS portal.
    Idns,
}

impl Site {
    /// Returns the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HackChat => "hc",
            Self::Idns => "idns",
        }
    }
}

impl FromStr for Site {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hc" | "hackchat" | "hack.chat" => Ok(Self::HackChat),
            "idns" => Ok(Self::Idns),
            _ => Err(ConfigError::UnknownSite(s.to_owned())),
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_site() -> String {
    Site::HackChat.as_str().to_owned()
}

/// Chatter configuration.
///
/// ```toml
/// [chatter]
/// site = "idns"
/// channel = "public"
/// nick = "dotbot"
/// country = "CN"
/// log_traffic = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatterConfig {
    /// Service name: `hc` or `idns`.
    #[serde(default = "default_site")]
    pub site: String,

    /// Endpoint override.
    #[serde(default)]
    pub url: Option<String>,

    /// Channel (room, group) to join.
    #[serde(default)]
    pub channel: String,

    /// Nickname to join as.
    #[serde(default)]
    pub nick: String,

    /// Channel password (hack.chat only).
    #[serde(default)]
    pub password: Option<String>,

    /// Country code for the IDNS handshake.
    #[serde(default)]
    pub country: Option<String>,

    /// User agent for IDNS.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// IDNS keep-alive period override.
    #[serde(default)]
    pub ping_interval_secs: Option<u64>,

    /// Log every inbound and outbound frame.
    #[serde(default)]
    pub log_traffic: bool,
}

impl Default for ChatterConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            url: None,
            channel: String::new(),
            nick: String::new(),
            password: None,
            country: None,
            user_agent: None,
            ping_interval_secs: None,
            log_traffic: false,
        }
    }
}

impl ChatterConfig {
    /// Resolves the configured site.
    pub fn site(&self) -> ConfigResult<Site> {
        self.site.parse()
    }

    /// Builds the session parameters.
    pub fn session_params(&self) -> SessionParams {
        let params = SessionParams::new(self.channel.clone(), self.nick.clone());
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => params.with_password(password),
            None => params,
        }
    }

    /// Converts to hack.chat adapter config.
    pub fn to_hc_config(&self) -> HcConfig {
        let config = HcConfig::default();
        match &self.url {
            Some(url) => config.with_url(url.clone()),
            None => config,
        }
    }

    /// Converts to IDNS adapter config.
    pub fn to_idns_config(&self) -> IdnsConfig {
        let mut config = IdnsConfig::default();
        if let Some(country) = &self.country {
            config.country.clone_from(country);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if let Some(secs) = self.ping_interval_secs {
            config = config.with_ping_interval(Duration::from_secs(secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_names() {
        assert_eq!("hc".parse::<Site>().unwrap(), Site::HackChat);
        assert_eq!("IDNS".parse::<Site>().unwrap(), Site::Idns);
        assert!(matches!("irc".parse::<Site>(), Err(ConfigError::UnknownSite(_))));
    }

    #[test]
    fn test_session_params_drop_empty_password() {
        let config = ChatterConfig {
            channel: "lounge".into(),
            nick: "bot".into(),
            password: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.session_params(), SessionParams::new("lounge", "bot"));
    }

    #[test]
    fn test_adapter_configs() {
        let config = ChatterConfig {
            url: Some("ws://localhost:6060".into()),
            country: Some("CN".into()),
            ping_interval_secs: Some(10),
            ..Default::default()
        };

        assert_eq!(config.to_hc_config().url, "ws://localhost:6060");
        let idns = config.to_idns_config();
        assert_eq!(idns.url, "ws://localhost:6060");
        assert_eq!(idns.country, "CN");
        assert_eq!(idns.ping_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(
            r#"{"level":"debug","output":"stderr","filters":{"dotbot_core":"trace"}}"#,
        )
        .unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filters["dotbot_core"], LogLevel::Trace);
    }
}
