//! Configuration parser for loading teardown configuration.
//!
//! Configuration is read once, by the caller, from an optional YAML file and
//! then overlaid with environment variables. The resulting [`TeardownConfig`]
//! is injected into the handler; nothing deeper reads the environment.

use crate::error::{ConfigError, Result, TeardownError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::TeardownConfig;

/// Environment variable overriding the poll interval.
pub const POLL_INTERVAL_ENV_KEY: &str = "TEARDOWN_POLL_INTERVAL_SECS";

/// Environment variable overriding the maximum wait per stack.
pub const MAX_WAIT_ENV_KEY: &str = "TEARDOWN_MAX_WAIT_SECS";

/// Environment variable overriding the wait timeout policy.
pub const TIMEOUT_IS_ERROR_ENV_KEY: &str = "TEARDOWN_TIMEOUT_IS_ERROR";

/// Environment variable overriding the backend region.
pub const REGION_ENV_KEY: &str = "TEARDOWN_REGION";

/// Configuration parser for loading teardown configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TeardownConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(TeardownError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TeardownError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<TeardownConfig> {
        debug!("Parsing YAML configuration");

        // An empty document means "all defaults"
        if content.trim().is_empty() {
            return Ok(TeardownConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            TeardownError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads configuration from an optional file, then applies the process
    /// environment on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or an override is invalid.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<TeardownConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => {
                info!("No configuration file found, using defaults and environment");
                TeardownConfig::default()
            }
        };

        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Applies overrides from a key lookup to the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean override cannot be parsed.
    pub fn apply_overrides<F>(config: &mut TeardownConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.stacks.merge_lookup(&lookup);

        if let Some(value) = lookup(POLL_INTERVAL_ENV_KEY) {
            debug!("Overriding waiter.poll_interval_secs from environment");
            config.waiter.poll_interval_secs = parse_u64(POLL_INTERVAL_ENV_KEY, &value)?;
        }

        if let Some(value) = lookup(MAX_WAIT_ENV_KEY) {
            debug!("Overriding waiter.max_wait_secs from environment");
            config.waiter.max_wait_secs = parse_u64(MAX_WAIT_ENV_KEY, &value)?;
        }

        if let Some(value) = lookup(TIMEOUT_IS_ERROR_ENV_KEY) {
            debug!("Overriding waiter.timeout_is_error from environment");
            config.waiter.timeout_is_error = parse_bool(TIMEOUT_IS_ERROR_ENV_KEY, &value)?;
        }

        if let Some(region) = lookup(REGION_ENV_KEY) {
            debug!("Overriding backend.region from environment");
            config.backend.region = Some(region);
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                TeardownError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        TeardownError::Config(ConfigError::InvalidEnvValue {
            name: name.to_string(),
            value: value.to_string(),
        })
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(TeardownError::Config(ConfigError::InvalidEnvValue {
            name: name.to_string(),
            value: value.to_string(),
        })),
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["teardown.yaml", "teardown.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// Returns `None` when no file exists; the environment alone is then a valid
/// configuration source.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}
