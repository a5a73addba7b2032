//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use dotbot_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use dotbot_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("dotbot_transport=trace")
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Default file name when `file_path` names a directory only.
const DEFAULT_LOG_FILE: &str = "dotbot.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_span(config: SpanEventConfig) -> FmtSpan {
    let mut span = FmtSpan::NONE;
    if config.new {
        span |= FmtSpan::NEW;
    }
    if config.enter {
        span |= FmtSpan::ENTER;
    }
    if config.exit {
        span |= FmtSpan::EXIT;
    }
    if config.close {
        span |= FmtSpan::CLOSE;
    }
    span
}

/// Initialize logging from a `LoggingConfig`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// A builder for configuring logging.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEventConfig,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file_location: bool,
    file_path: Option<PathBuf>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Create a new logging builder: `info`, compact, stdout.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEventConfig::default(),
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            with_target: true,
            with_thread_ids: false,
            with_file_location: false,
            file_path: None,
        }
    }

    /// Create a builder from a `LoggingConfig`.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.to_tracing_level(),
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: config.span_events,
            format: config.format,
            output: config.output,
            with_target: true,
            with_thread_ids: config.thread_ids,
            with_file_location: config.file_location,
            file_path: config.file_path.clone(),
        }
    }

    /// Set the base log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Add a filter directive such as `dotbot_core=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_owned());
        self
    }

    /// Configure which span events are logged.
    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.span_events = events;
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output destination.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Include file names and line numbers in log output.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file_location = enabled;
        self
    }

    /// Set file path for file output.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Directives the filter will be built from, base level first.
    pub fn directives(&self) -> Vec<String> {
        let mut all = vec![self.level.to_string().to_lowercase()];
        all.extend(self.directives.iter().cloned());
        all
    }

    /// Build the filter. `RUST_LOG` replaces the base level when set.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    /// Builds the formatting layer for `writer`.
    fn fmt_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(fmt_span(self.span_events))
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file_location)
            .with_line_number(self.with_file_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }

    /// Builds the layer for the configured destination.
    fn output_layer(&self) -> BoxedLayer {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => self.fmt_layer(std::io::stdout),
            (LogOutput::Stderr, _) => self.fmt_layer(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                self.fmt_layer(tracing_appender::rolling::never(dir, name))
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                self.fmt_layer(std::io::stdout)
            }
        }
    }

    /// Initialize the logging system, ignoring an already installed subscriber.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Try to initialize the logging system.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(self.output_layer())
            .with(filter)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_builder_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            thread_ids: true,
            ..Default::default()
        };
        config.filters.insert("dotbot_core".into(), LogLevel::Trace);
        config.filters.insert("dotbot_transport".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);

        assert_eq!(
            builder.directives(),
            vec!["debug", "dotbot_core=trace", "dotbot_transport=warn"]
        );
        assert!(builder.with_thread_ids);
    }

    #[test]
    fn test_span_flags() {
        let span = fmt_span(SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        });
        assert_eq!(span, FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(fmt_span(SpanEventConfig::default()), FmtSpan::NONE);
    }
}
