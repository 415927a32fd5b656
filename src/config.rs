//! Configuration for vtinterp.
//!
//! Settings are read from `~/.vtinterp/config.toml`; every key is optional:
//!
//! ```toml
//! # ascii, utf-8, iso-8859-1 or windows-1251
//! encoding = "utf-8"
//!
//! # Log level for ~/.vtinterp/vtinterp.log (RUST_LOG overrides it)
//! log_level = "info"
//!
//! [terminal]
//! # 0 = use the size of the host terminal
//! cols = 0
//! rows = 0
//!
//! [clipboard]
//! # Copy OSC 52 selections to the system clipboard
//! sync = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::term::EncodingMode;

/// Used when the host terminal size cannot be detected
pub const FALLBACK_COLS: u16 = 80;
pub const FALLBACK_ROWS: u16 = 24;

const CONFIG_DIR: &str = ".vtinterp";
const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "vtinterp.log";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Byte encoding of the stream
    pub encoding: EncodingMode,
    /// Log level
    pub log_level: String,
    /// Terminal size
    pub terminal: TerminalConfig,
    /// Clipboard settings
    pub clipboard: ClipboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encoding: EncodingMode::Utf8,
            log_level: "info".to_string(),
            terminal: TerminalConfig::default(),
            clipboard: ClipboardConfig::default(),
        }
    }
}

/// Terminal size configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: FALLBACK_COLS,
            rows: FALLBACK_ROWS,
        }
    }
}

impl TerminalConfig {
    /// Final size; a 0 dimension is taken from `detected`, then the fallback
    pub fn resolve(&self, detected: Option<(u16, u16)>) -> (u16, u16) {
        let (detected_cols, detected_rows) = match detected {
            Some((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
            _ => (FALLBACK_COLS, FALLBACK_ROWS),
        };
        let cols = if self.cols == 0 { detected_cols } else { self.cols };
        let rows = if self.rows == 0 { detected_rows } else { self.rows };
        (cols, rows)
    }
}

/// Clipboard configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    pub sync: bool,
}

impl Config {
    /// Load configuration from `~/.vtinterp/config.toml`.
    /// A missing or broken file yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to `~/.vtinterp/config.toml`
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = Self::dir().ok_or(ConfigError::NoHomeDir)?;
        fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `~/.vtinterp`
    pub fn dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(CONFIG_DIR))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join(LOG_FILE))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
