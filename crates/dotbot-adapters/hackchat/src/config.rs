//! Configuration for the hack.chat connector.
//!
//! # Example Configuration
//!
//! ```toml
//! [chatter]
//! site = "hc"
//! url = "wss://hack.chat/chat-ws"
//! ```

use serde::{Deserialize, Serialize};

/// Default hack.chat endpoint.
pub const DEFAULT_URL: &str = "wss://hack.chat/chat-ws";

/// Default site identifier.
pub const DEFAULT_SITE: &str = "HC";

/// hack.chat connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HcConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Site identifier reported by the connector.
    pub site: String,
}

impl Default for HcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            site: DEFAULT_SITE.to_owned(),
        }
    }
}

impl HcConfig {
    /// Overrides the endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: HcConfig = serde_json::from_str(r#"{"url":"ws://localhost:6060"}"#).unwrap();
        assert_eq!(config.url, "ws://localhost:6060");
        assert_eq!(config.site, DEFAULT_SITE);
    }
}
