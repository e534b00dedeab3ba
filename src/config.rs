//! Configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXSCAN_CONFIG` (environment variable)
//! 2. `~/.config/mboxscan/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxscan\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MboxError, Result};
use crate::options::MboxOptions;
use crate::parser::separator::Separator;
use crate::store::cursor::DEFAULT_BUFFER_SIZE;

/// Name of the log file written inside [`cache_dir`].
pub const LOG_FILE_NAME: &str = "mboxscan.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Scanning defaults.
    pub scan: ScanConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory used for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Scanning defaults, turned into [`MboxOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Separator regular expression. Unset means the standard `From ` line.
    pub separator: Option<String>,
    /// Parse headers only unless a command asks for bodies.
    pub headers_only: bool,
    /// Read buffer size in bytes (default: 131072 = 128 KB).
    pub read_buffer_size: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            separator: None,
            headers_only: false,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ScanConfig {
    /// Build mailbox options. An invalid separator is `InvalidArgument`.
    pub fn to_options(&self) -> Result<MboxOptions> {
        let separator = match self.separator.as_deref() {
            Some(pattern) => Separator::from_pattern(pattern)?,
            None => Separator::mbox(),
        };
        Ok(MboxOptions {
            separator,
            headers_only: self.headers_only,
        })
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| MboxError::io(path, e))?;
    toml::from_str::<Config>(&contents).map_err(|e| MboxError::Config(e.to_string()))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXSCAN_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxscan").join("config.toml"))
}

/// Return the directory used for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxscan")
}
