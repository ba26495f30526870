//! Settings loading and persistence.

pub mod settings;

pub use settings::{Settings, SettingsStore, TerminalSettings, merge_values};

use std::path::PathBuf;

use thiserror::Error;

/// The user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// The agent directory used when a caller supplies none: `~/.agent`.
///
/// The user-level settings file and the session logs live under it.
pub fn default_agent_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".agent"))
}

/// Errors that can occur while loading or writing settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File read or write failed
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON
    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Stable kind tag for display and matching
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "settings_io",
            Self::Parse(_) => "settings_parse",
        }
    }
}

/// Result type for settings operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
