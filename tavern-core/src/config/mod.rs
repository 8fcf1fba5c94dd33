//! Configuration management for tavern.
//!
//! This module provides a unified configuration system that separates
//! secrets (from environment variables) from settings (from TOML files).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `OPENROUTER_API_KEY` - default completion credential
//!
//! ## Settings (TOML File)
//! Located at `~/.config/tavern/config.toml`:
//! ```toml
//! [connection]
//! model_id = "openrouter/sonoma-dusk-alpha"
//!
//! [generation]
//! temperature = 0.7
//!
//! [character]
//! name = "Hayeon"
//!
//! [logging]
//! level = "info"
//! ```

mod secrets;
mod settings;

use std::path::PathBuf;

pub use secrets::{DEFAULT_CREDENTIAL_ENV, Secrets};
pub use settings::{
    ConnectionSettings, DEFAULT_BASE_URL, DEFAULT_INSTRUCTION_PROMPT, DEFAULT_MEMORY_PROMPT,
    DEFAULT_ROLE_PROMPT, LoggingSettings, PromptSettings, SamplingSettings, Settings,
    SettingsError, StorageSettings,
};

use crate::storage::{self, StorageError};

/// Load .env file if it exists (called automatically when using `Secrets::from_env`)
pub fn load_dotenv() {
    // Silently ignore errors (file might not exist)
    let _ = dotenvy::dotenv();
}

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// This loads:
    /// 1. Secrets from environment variables
    /// 2. Settings from TOML file (creating defaults if needed)
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env();
        let settings = Settings::load()?;
        Ok(Self { secrets, settings })
    }

    /// Default completion credential (if configured).
    pub fn default_credential(&self) -> Option<&str> {
        self.secrets.default_credential.as_deref()
    }

    /// Directory for persisted state.
    ///
    /// `TAVERN_DATA_DIR` wins over `[storage] data_dir`, which wins over the
    /// platform data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        let env_set = std::env::var("TAVERN_DATA_DIR")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !env_set
            && let Some(dir) = self
                .settings
                .storage
                .data_dir
                .as_deref()
                .filter(|d| !d.trim().is_empty())
        {
            return Ok(PathBuf::from(dir));
        }
        Ok(storage::default_data_dir()?)
    }
}
