//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/tavern/config.toml).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::generation::{self, GenerationSettings};
use crate::persona::{Character, Persona};

/// Default OpenAI-compatible completion endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default role fragment.
pub const DEFAULT_ROLE_PROMPT: &str = "You are roleplaying as {{char}}. Talk to {{user}} like a close friend would: use simple, everyday language, stay relaxed and natural, and keep it genuinely friendly without robotic, formal, or poetic fluff. Generate autonomous, open-ended roleplay. Formatting rules: Dialogue=\"quotes\", Actions=*asterisks*. The user is roleplaying as {{user}}.";

/// Default memory fragment.
pub const DEFAULT_MEMORY_PROMPT: &str = "[Core Memory]";

/// Default instruction fragment.
pub const DEFAULT_INSTRUCTION_PROMPT: &str = "## RULES
1. [Rule= Do not repeat yourself or write long paragraphs that do not advance the roleplay.]
2. [Rule= The roleplay takes place in a fictional world and time.]
3. [Rule= Characters are never omniscient. Nobody knows what happened unless they were present or share the memory.]
4. [OOC: Never act, speak, or play for {{user}}. Do not repeat or comment on {{user}}'s actions.]
5. [Rule= The world is alive. NPCs interact with each other and act on their own.]

*Stay in character as {{char}}.*";

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# tavern configuration file
# Located at: ~/.config/tavern/config.toml
#
# This file contains non-sensitive configuration.
# The default completion credential is loaded from the environment:
#   - OPENROUTER_API_KEY

[connection]
model_id = "openrouter/sonoma-dusk-alpha"
base_url = "https://openrouter.ai/api/v1"
# http_referer = "https://example.com"
# app_name = "tavern"

[generation]
temperature = 0.7
max_tokens = 2048
context_window = 4096
repetition_penalty = 1.0
frequency_penalty = 0.0
presence_penalty = 0.0
top_p = 0.8

[prompt]
jailbreak = ""
# role = "You are roleplaying as {{char}} ..."
memory = "[Core Memory]"
# instruction = "*Stay in character as {{char}}.*"

[character]
name = "Hayeon"
description = "Hayeon is 22 years old, a streamer, a little grumpy."
scenario = "{{user}} and {{char}} are a couple living together."
initial_message = "Yo?? *looking at you*"

[persona]
name = ""
description = ""

[logging]
level = "info"
# dump_queries = true

[storage]
# data_dir = "/var/lib/tavern"
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Completion endpoint and model
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Sampling parameters
    #[serde(default)]
    pub generation: SamplingSettings,

    /// System prompt fragments
    #[serde(default)]
    pub prompt: PromptSettings,

    /// AI-controlled participant
    #[serde(default)]
    pub character: Character,

    /// The user's identity
    #[serde(default)]
    pub persona: Persona,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Completion endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Model identifier sent with every request
    #[serde(default = "generation::default_model_id")]
    pub model_id: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP Referer header for OpenRouter rankings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_referer: Option<String>,

    /// App name for OpenRouter rankings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            model_id: generation::default_model_id(),
            base_url: default_base_url(),
            http_referer: None,
            app_name: None,
        }
    }
}

/// Initial sampling parameters (see [`GenerationSettings`] for meaning)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SamplingSettings {
    #[serde(default = "generation::default_temperature")]
    pub temperature: f64,
    #[serde(default = "generation::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "generation::default_context_window")]
    pub context_window: u32,
    #[serde(default = "generation::default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "generation::default_frequency_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "generation::default_presence_penalty")]
    pub presence_penalty: f64,
    #[serde(default = "generation::default_top_p")]
    pub top_p: f64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            temperature: generation::default_temperature(),
            max_tokens: generation::default_max_tokens(),
            context_window: generation::default_context_window(),
            repetition_penalty: generation::default_repetition_penalty(),
            frequency_penalty: generation::default_frequency_penalty(),
            presence_penalty: generation::default_presence_penalty(),
            top_p: generation::default_top_p(),
        }
    }
}

/// Fragments of the composed system prompt.
///
/// Every fragment may use the recognized placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PromptSettings {
    #[serde(default)]
    pub jailbreak: String,
    #[serde(default = "default_role_prompt")]
    pub role: String,
    #[serde(default = "default_memory_prompt")]
    pub memory: String,
    #[serde(default = "default_instruction_prompt")]
    pub instruction: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            jailbreak: String::new(),
            role: default_role_prompt(),
            memory: default_memory_prompt(),
            instruction: default_instruction_prompt(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Dump raw completion request/response JSON to ./logs/queries/
    #[serde(default)]
    pub dump_queries: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dump_queries: false,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Override for the data directory (TAVERN_DATA_DIR still wins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

// Default value functions

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_role_prompt() -> String {
    DEFAULT_ROLE_PROMPT.to_string()
}

fn default_memory_prompt() -> String {
    DEFAULT_MEMORY_PROMPT.to_string()
}

fn default_instruction_prompt() -> String {
    DEFAULT_INSTRUCTION_PROMPT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    /// The file is located at `~/.config/tavern/config.toml`.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        // Create default config if it doesn't exist
        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/tavern/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("TAVERN_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("tavern");

        Ok(config_dir.join("config.toml"))
    }

    /// Create the default configuration file.
    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Save settings to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Initial generation settings, without a credential override.
    pub fn generation_settings(&self) -> GenerationSettings {
        let sampling = &self.generation;
        GenerationSettings {
            credential: String::new(),
            model_id: self.connection.model_id.clone(),
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            context_window: sampling.context_window,
            repetition_penalty: sampling.repetition_penalty,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            top_p: sampling.top_p,
        }
    }
}
