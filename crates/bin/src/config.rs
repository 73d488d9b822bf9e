//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! command-line flags.

use screener::{ARCHIVES_URL, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default identifying user agent; the SEC asks for a contact address.
const DEFAULT_USER_AGENT: &str = "screener/0.1 (admin@example.com)";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings shared by all commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ScreenerConfig {
    /// Directory holding downloaded archives and extracted documents.
    pub(crate) store_dir: PathBuf,
    /// SQLite database path.
    pub(crate) database: PathBuf,
    /// User agent sent with every request.
    pub(crate) user_agent: String,
    /// Connect and read timeout in seconds.
    pub(crate) timeout_secs: u64,
    /// Normalization page size.
    pub(crate) batch_size: usize,
    /// EDGAR archive root.
    pub(crate) archive_root: String,
}

/// Platform data directory for the screener:
/// `~/.local/share/screener` on Linux, `~/Library/Application Support/screener` on macOS.
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("screener")
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            store_dir: data_dir.join("files"),
            database: data_dir.join("screener.db"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            batch_size: DEFAULT_BATCH_SIZE,
            archive_root: ARCHIVES_URL.to_string(),
        }
    }
}

impl ScreenerConfig {
    /// Loads `path` if given, otherwise returns the defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
