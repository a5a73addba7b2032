//! Configuration for the IDNS connector.
//!
//! # Example Configuration
//!
//! ```toml
//! [chatter]
//! site = "idns"
//! country = "CN"
//! user_agent = "Mozilla/5.0 (X11; Linux x86_64)"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default IDNS endpoint.
pub const DEFAULT_URL: &str = "ws://ws.idnsportal.com:444/";

/// Default site identifier.
pub const DEFAULT_SITE: &str = "IDNS";

/// Seconds between keep-alive pings.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

fn default_user_agent() -> String {
    concat!("dotbot/", env!("CARGO_PKG_VERSION")).to_owned()
}

/// IDNS connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdnsConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Site identifier reported by the connector.
    pub site: String,
    /// Country code announced in the `init` handshake.
    pub country: String,
    /// User agent sent as a header and in the handshake.
    pub user_agent: String,
    /// Keep-alive period in seconds.
    pub ping_interval_secs: u64,
}

impl Default for IdnsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            site: DEFAULT_SITE.to_owned(),
            country: String::new(),
            user_agent: default_user_agent(),
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
        }
    }
}

impl IdnsConfig {
    /// Creates a configuration for the public endpoint.
    pub fn new(country: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    /// Overrides the endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Overrides the keep-alive period.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Keep-alive period. Never zero.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IdnsConfig::new("CN", "agent/1.0");
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.site, "IDNS");
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config: IdnsConfig = serde_json::from_str(r#"{"ping_interval_secs":0}"#).unwrap();
        assert_eq!(config.ping_interval(), Duration::from_secs(1));
        assert!(config.user_agent.starts_with("dotbot/"));
    }
}
