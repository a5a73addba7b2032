//! Dotbot Runtime - configuration, logging and process runtime.
//!
//! This crate provides:
//! - Layered configuration loading with figment (`dotbot.toml`, `DOTBOT_*`)
//! - Logging initialization (`LoggingBuilder`, `init_from_config`)
//! - Traffic logging for a chatter (`apply_logging`)
//! - A runtime that builds a chatter from configuration and runs it until
//!   Ctrl+C (`DotbotRuntime`)
//!
//! # Example Configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [logging.filters]
//! dotbot_transport = "debug"
//!
//! [chatter]
//! site = "hc"
//! channel = "lounge"
//! nick = "dotbot"
//! log_traffic = true
//! ```
//!
//! ```ignore
//! use dotbot_runtime::DotbotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = DotbotRuntime::builder().build()?;
//!     runtime.chatter().on("chat", |ctx| {
//!         if ctx.message().text() == Some("!ping") {
//!             let _ = ctx.reply("pong");
//!         }
//!     });
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod traffic;

// Re-exports
pub use config::{ChatterConfig, ConfigError, ConfigLoader, ConfigResult, DotbotConfig, Site};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{DotbotRuntime, RuntimeBuilder};
pub use traffic::{TrafficLog, apply_logging, traffic_log_name};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
