//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. `dotbot.toml` found in the search paths, or an explicit file
//! 4. Environment variables (`DOTBOT_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `DOTBOT_` prefix with `__` as
//! separator:
//!
//! - `DOTBOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `DOTBOT_CHATTER__NICK=dotbot` → `chatter.nick = "dotbot"`
//!
//! # Example
//!
//! ```rust,ignore
//! use dotbot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./config/dotbot.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::DotbotConfig;

/// Base name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "dotbot.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DOTBOT_";

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("dotbot")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: DotbotConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<DotbotConfig> {
        let figment = self.build_figment()?;
        let config: DotbotConfig = figment.extract()?;

        debug!(
            logging_level = %config.logging.level,
            site = %config.chatter.site,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(DotbotConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment)?;
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("dotbot"));
        }
        paths
    }

    /// Loads the first `dotbot.toml` found in the search paths.
    fn load_config_files(&self, figment: Figment) -> ConfigResult<Figment> {
        for search_path in self.resolve_search_paths() {
            let path = search_path.join(CONFIG_FILE_NAME);
            if path.exists() {
                info!(path = %path.display(), "Loading configuration file");
                return Self::merge_config_file(figment, &path);
            }
        }

        warn!("No configuration file found, using defaults");
        Ok(figment)
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<DotbotConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<DotbotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ChatterConfig, LogLevel};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dotbot-config-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let empty = temp_dir("empty");
        let config = ConfigLoader::new()
            .search_path(&empty)
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.chatter.site, "hc");
        assert!(config.chatter.channel.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/dotbot.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_search_path_file_overrides_merge() {
        let dir = temp_dir("search");
        std::fs::write(
            dir.join(CONFIG_FILE_NAME),
            "[logging]\nlevel = \"debug\"\n\n[chatter]\nsite = \"idns\"\nchannel = \"public\"\nnick = \"bot\"\ncountry = \"CN\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .merge(DotbotConfig {
                chatter: ChatterConfig {
                    nick: "overridden".into(),
                    log_traffic: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .search_path(&dir)
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.chatter.site, "idns");
        assert_eq!(config.chatter.nick, "bot");
        assert_eq!(config.chatter.country.as_deref(), Some("CN"));
        assert!(config.chatter.log_traffic);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = temp_dir("ext");
        let path = dir.join("dotbot.ini");
        std::fs::write(&path, "level=debug").unwrap();

        let err = ConfigLoader::new().file(&path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
