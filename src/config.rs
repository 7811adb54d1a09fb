//! Application configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the logger is
//! built and the server starts.
//!
//! ```bash
//! export LISTEN="0.0.0.0:3000"
//! export LOG_LEVEL="info"
//! export JSON_LOG="true"
//! export DEV_MODE="false"
//! export LOG_FILE_ENABLED="true"
//! export LOG_FILE="/var/log/service.log"
//! ```
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:3000`)
//! - `LOG_LEVEL` - One of `debug`, `info`, `warning`, `error`, `fatal`, `panic`,
//!   any case (default: `info`)
//! - `JSON_LOG` - JSON records on stdout; `false` switches to console output
//!   (default: `true`)
//! - `DEV_MODE` - Adds caller file/line to every record (default: `false`)
//! - `LOG_FILE_ENABLED` - Mirror records into `LOG_FILE` (default: `false`)
//! - `LOG_FILE` - Log file path, appended to (default: `service.log`)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::logging::{LoggerConfig, Severity, parse_severity};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Raw `LOG_LEVEL` value; checked by [`Config::validate`].
    pub log_level: String,
    pub json_log: bool,
    pub dev_mode: bool,
    pub log_file_enabled: bool,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            json_log: true,
            dev_mode: false,
            log_file_enabled: false,
            log_file: PathBuf::from("service.log"),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean variable holds something other than
    /// `true`/`false`/`1`/`0`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let listen_addr = env::var("LISTEN").unwrap_or(defaults.listen_addr);
        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);
        let json_log = env_bool("JSON_LOG")?.unwrap_or(defaults.json_log);
        let dev_mode = env_bool("DEV_MODE")?.unwrap_or(defaults.dev_mode);
        let log_file_enabled = env_bool("LOG_FILE_ENABLED")?.unwrap_or(defaults.log_file_enabled);
        let log_file = env::var("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        Ok(Self {
            listen_addr,
            log_level,
            json_log,
            dev_mode,
            log_file_enabled,
            log_file,
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_level` is not a known severity
    /// - `listen_addr` is invalid
    /// - file logging is enabled with an empty `log_file`
    pub fn validate(&self) -> Result<()> {
        self.severity()?;

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if self.log_file_enabled && self.log_file.as_os_str().is_empty() {
            anyhow::bail!("LOG_FILE must not be empty when LOG_FILE_ENABLED is set");
        }

        Ok(())
    }

    /// Parsed `log_level`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending value when it is not a known level.
    pub fn severity(&self) -> Result<Severity> {
        parse_severity(&self.log_level).context("LOG_LEVEL is invalid")
    }

    /// Logger settings derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `log_level` is not a known severity.
    pub fn logger_config(&self) -> Result<LoggerConfig> {
        Ok(LoggerConfig {
            pretty: !self.json_log,
            debug: self.dev_mode,
            level: self.severity()?,
            file_logging: self.log_file_enabled,
            file_name: self.log_file.clone(),
        })
    }

    /// Prints configuration summary through the installed logger.
    pub fn print_summary(&self) {
        tracing::info!(
            listen = %self.listen_addr,
            level = %self.log_level,
            json = self.json_log,
            dev_mode = self.dev_mode,
            "Configuration loaded"
        );
        if self.log_file_enabled {
            tracing::info!(file = %self.log_file.display(), "File logging enabled");
        }
    }
}

/// Reads a boolean variable; `None` when unset.
fn env_bool(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        other => anyhow::bail!("{name} must be 'true' or 'false', got '{other}'"),
    }
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if a variable is malformed or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
