//! Configuration module for the dotbot runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for the chatter and the logging subsystem.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    ChatterConfig, DotbotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, Site,
    SpanEventConfig,
};
pub use validation::validate_config;
