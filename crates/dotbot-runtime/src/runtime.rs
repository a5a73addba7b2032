//! Runs one configured chatter until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dotbot_runtime::DotbotRuntime;
//!
//! // Loads dotbot.toml from the current directory and DOTBOT_* variables
//! let runtime = DotbotRuntime::builder().build()?;
//! runtime.chatter().on("chat", |ctx| {
//!     if ctx.message().text() == Some("!ping") {
//!         let _ = ctx.reply("pong");
//!     }
//! });
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;

use tokio::signal;
use tracing::{debug, info, warn};

use dotbot_adapter_hackchat::HcConnector;
use dotbot_adapter_idns::IdnsConnector;
use dotbot_core::{BoxedConnector, BoxedTransport, Chatter};

use crate::config::{ChatterConfig, ConfigLoader, DotbotConfig, Site, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::traffic::{TrafficLog, apply_logging};

/// A chatter built from configuration, with logging set up.
pub struct DotbotRuntime {
    config: DotbotConfig,
    chatter: Chatter,
}

impl DotbotRuntime {
    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime over the default WebSocket transport.
    pub fn from_config(config: DotbotConfig) -> RuntimeResult<Self> {
        Self::with_transport(config, default_transport()?)
    }

    /// Creates a runtime over `transport`.
    ///
    /// Validates the configuration and initializes logging from it.
    pub fn with_transport(config: DotbotConfig, transport: BoxedTransport) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let connector = build_connector(&config.chatter, transport)?;
        let chatter = Chatter::new(connector, config.chatter.session_params());
        if config.chatter.log_traffic {
            let name = apply_logging(&chatter, TrafficLog::default());
            debug!(chatter = %name, "Traffic logging enabled");
        }

        info!(
            site = %config.chatter.site,
            channel = %config.chatter.channel,
            nick = %config.chatter.nick,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self { config, chatter })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &DotbotConfig {
        &self.config
    }

    /// Returns the chatter, for registering handlers and modules.
    pub fn chatter(&self) -> &Chatter {
        &self.chatter
    }

    /// Runs until Ctrl+C (or SIGTERM) or until the session ends.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("dotbot is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` resolves or the session ends.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.chatter.start()?;

        let session = self.chatter.wait();
        tokio::pin!(session);

        tokio::select! {
            result = &mut session => {
                info!("Session ended");
                return result.map_err(RuntimeError::from);
            }
            () = shutdown => {
                info!("Shutdown requested, closing session");
                self.chatter.quit();
            }
        }

        session.await?;
        info!("Runtime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for DotbotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DotbotRuntime")
            .field("site", &self.config.chatter.site)
            .field("chatter", &self.chatter)
            .finish()
    }
}

/// Builds the connector for the configured site.
fn build_connector(
    config: &ChatterConfig,
    transport: BoxedTransport,
) -> RuntimeResult<BoxedConnector> {
    let connector: BoxedConnector = match config.site()? {
        Site::HackChat => HcConnector::from_config(config.to_hc_config(), transport),
        Site::Idns => IdnsConnector::new(config.to_idns_config(), transport),
    };
    debug!(site = %connector.site(), url = %connector.url(), "Connector created");
    Ok(connector)
}

#[cfg(feature = "ws-client")]
fn default_transport() -> RuntimeResult<BoxedTransport> {
    Ok(dotbot_transport::WsTransport::new())
}

#[cfg(not(feature = "ws-client"))]
fn default_transport() -> RuntimeResult<BoxedTransport> {
    Err(RuntimeError::NoTransport)
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, running until the session ends");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`DotbotRuntime`].
///
/// ```rust,ignore
/// let runtime = DotbotRuntime::builder()
///     .config_file("config/dotbot.toml")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    transport: Option<BoxedTransport>,
}

impl RuntimeBuilder {
    /// Creates a builder searching the current and user config directories.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
            transport: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: DotbotConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `transport` instead of the default WebSocket transport.
    pub fn transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<DotbotRuntime> {
        let config = self.config_loader.load()?;
        match self.transport {
            Some(transport) => DotbotRuntime::with_transport(config, transport),
            None => DotbotRuntime::from_config(config),
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use dotbot_core::{CoreError, downcast_connector};
    use dotbot_transport::MemoryTransport;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;

    use crate::config::ConfigError;

    fn config(site: &str) -> DotbotConfig {
        DotbotConfig {
            chatter: ChatterConfig {
                site: site.into(),
                channel: "lounge".into(),
                nick: "bot".into(),
                country: Some("CN".into()),
                url: Some("ws://localhost:6060".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_builds_connector_per_site() {
        let hc = DotbotRuntime::with_transport(config("hc"), MemoryTransport::new()).unwrap();
        assert_eq!(hc.chatter().connector().site(), "HC");
        assert_eq!(hc.chatter().connector().url(), "ws://localhost:6060");

        let idns = DotbotRuntime::with_transport(config("idns"), MemoryTransport::new()).unwrap();
        let connector =
            downcast_connector::<IdnsConnector>(Arc::clone(idns.chatter().connector())).unwrap();
        assert_eq!(connector.config().country, "CN");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = DotbotRuntime::with_transport(config("irc"), MemoryTransport::new()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::UnknownSite(_))
        ));
    }

    #[test]
    fn test_traffic_logging_registers_handler() {
        let mut config = config("hc");
        config.chatter.log_traffic = true;
        let runtime = DotbotRuntime::with_transport(config, MemoryTransport::new()).unwrap();
        assert_eq!(runtime.chatter().dispatcher().untyped_count(), 1);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let transport = MemoryTransport::new();
        let runtime = DotbotRuntime::with_transport(config("hc"), transport.clone()).unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut peer = transport.accept().await.unwrap();
            let join: Value = serde_json::from_str(&peer.recv().await.unwrap()).unwrap();
            let _ = stop_tx.send(());
            tokio::time::sleep(Duration::from_millis(20)).await;
            (join, peer.is_open())
        });

        runtime
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();

        let (join, open) = server.await.unwrap();
        assert_eq!(join, json!({"cmd": "join", "channel": "lounge", "nick": "bot"}));
        assert!(!open);
        assert!(!runtime.chatter().is_running());
    }

    #[tokio::test]
    async fn test_run_until_returns_when_session_fails() {
        let transport = MemoryTransport::new();
        let runtime = DotbotRuntime::with_transport(config("hc"), transport.clone()).unwrap();

        tokio::spawn(async move {
            let mut peer = transport.accept().await.unwrap();
            let _join = peer.recv().await;
            peer.fail(dotbot_core::TransportError::ConnectionClosed {
                reason: "reset".into(),
            });
        });

        let err = runtime
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Core(CoreError::Transport(_))));
    }
}
