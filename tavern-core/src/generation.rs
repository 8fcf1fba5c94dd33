//! Connection and sampling parameters sent with every completion request.
//!
//! Values are stored as given. Range limits (temperature in 0..=1 and so on)
//! belong to whatever edits them; the registry never clamps.

use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL_ID: &str = "openrouter/sonoma-dusk-alpha";

/// Factory defaults for the sampling parameters.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_CONTEXT_WINDOW: u32 = 4096;
pub const DEFAULT_REPETITION_PENALTY: f64 = 1.0;
pub const DEFAULT_FREQUENCY_PENALTY: f64 = 0.0;
pub const DEFAULT_PRESENCE_PENALTY: f64 = 0.0;
pub const DEFAULT_TOP_P: f64 = 0.8;

/// Snapshot of every parameter the completion request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Per-session credential override; blank means "use the default".
    #[serde(default, skip_serializing)]
    pub credential: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            credential: String::new(),
            model_id: default_model_id(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            context_window: DEFAULT_CONTEXT_WINDOW,
            repetition_penalty: DEFAULT_REPETITION_PENALTY,
            frequency_penalty: DEFAULT_FREQUENCY_PENALTY,
            presence_penalty: DEFAULT_PRESENCE_PENALTY,
            top_p: DEFAULT_TOP_P,
        }
    }
}

pub(crate) fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

pub(crate) fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

pub(crate) fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

pub(crate) fn default_context_window() -> u32 {
    DEFAULT_CONTEXT_WINDOW
}

pub(crate) fn default_repetition_penalty() -> f64 {
    DEFAULT_REPETITION_PENALTY
}

pub(crate) fn default_frequency_penalty() -> f64 {
    DEFAULT_FREQUENCY_PENALTY
}

pub(crate) fn default_presence_penalty() -> f64 {
    DEFAULT_PRESENCE_PENALTY
}

pub(crate) fn default_top_p() -> f64 {
    DEFAULT_TOP_P
}

/// Names of the editable fields, for text-driven editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    Credential,
    ModelId,
    Temperature,
    MaxTokens,
    ContextWindow,
    RepetitionPenalty,
    FrequencyPenalty,
    PresencePenalty,
    TopP,
}

impl SettingField {
    pub const ALL: [SettingField; 9] = [
        SettingField::Credential,
        SettingField::ModelId,
        SettingField::Temperature,
        SettingField::MaxTokens,
        SettingField::ContextWindow,
        SettingField::RepetitionPenalty,
        SettingField::FrequencyPenalty,
        SettingField::PresencePenalty,
        SettingField::TopP,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingField::Credential => "credential",
            SettingField::ModelId => "model_id",
            SettingField::Temperature => "temperature",
            SettingField::MaxTokens => "max_tokens",
            SettingField::ContextWindow => "context_window",
            SettingField::RepetitionPenalty => "repetition_penalty",
            SettingField::FrequencyPenalty => "frequency_penalty",
            SettingField::PresencePenalty => "presence_penalty",
            SettingField::TopP => "top_p",
        }
    }
}

impl std::fmt::Display for SettingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SettingField {
    type Err = SettingValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        let field = match normalized.as_str() {
            "credential" | "api_key" => SettingField::Credential,
            "model" | "model_id" => SettingField::ModelId,
            other => SettingField::ALL
                .into_iter()
                .find(|f| f.as_str() == other)
                .ok_or_else(|| SettingValueError::UnknownField(s.to_string()))?,
        };
        Ok(field)
    }
}

/// Errors from text-driven settings edits
#[derive(Debug, thiserror::Error)]
pub enum SettingValueError {
    #[error("Unknown setting: {0}")]
    UnknownField(String),

    #[error("Invalid value '{value}' for {field}: expected a number")]
    InvalidNumber { field: SettingField, value: String },
}

/// Field-level store for [`GenerationSettings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    settings: GenerationSettings,
}

impl SettingsRegistry {
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings }
    }

    /// Current values.
    pub fn snapshot(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn credential(&self) -> &str {
        &self.settings.credential
    }

    pub fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    pub fn temperature(&self) -> f64 {
        self.settings.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.settings.max_tokens
    }

    pub fn context_window(&self) -> u32 {
        self.settings.context_window
    }

    pub fn repetition_penalty(&self) -> f64 {
        self.settings.repetition_penalty
    }

    pub fn frequency_penalty(&self) -> f64 {
        self.settings.frequency_penalty
    }

    pub fn presence_penalty(&self) -> f64 {
        self.settings.presence_penalty
    }

    pub fn top_p(&self) -> f64 {
        self.settings.top_p
    }

    pub fn set_credential(&mut self, value: impl Into<String>) {
        self.settings.credential = value.into();
    }

    pub fn set_model_id(&mut self, value: impl Into<String>) {
        self.settings.model_id = value.into();
    }

    pub fn set_temperature(&mut self, value: f64) {
        self.settings.temperature = value;
    }

    pub fn set_max_tokens(&mut self, value: u32) {
        self.settings.max_tokens = value;
    }

    pub fn set_context_window(&mut self, value: u32) {
        self.settings.context_window = value;
    }

    pub fn set_repetition_penalty(&mut self, value: f64) {
        self.settings.repetition_penalty = value;
    }

    pub fn set_frequency_penalty(&mut self, value: f64) {
        self.settings.frequency_penalty = value;
    }

    pub fn set_presence_penalty(&mut self, value: f64) {
        self.settings.presence_penalty = value;
    }

    pub fn set_top_p(&mut self, value: f64) {
        self.settings.top_p = value;
    }

    /// Parse `value` and assign it to `field`.
    pub fn set_from_str(&mut self, field: SettingField, value: &str) -> Result<(), SettingValueError> {
        let value = value.trim();
        let invalid = || SettingValueError::InvalidNumber {
            field,
            value: value.to_string(),
        };
        match field {
            SettingField::Credential => self.set_credential(value),
            SettingField::ModelId => self.set_model_id(value),
            SettingField::Temperature => self.set_temperature(value.parse().map_err(|_| invalid())?),
            SettingField::MaxTokens => self.set_max_tokens(value.parse().map_err(|_| invalid())?),
            SettingField::ContextWindow => {
                self.set_context_window(value.parse().map_err(|_| invalid())?)
            }
            SettingField::RepetitionPenalty => {
                self.set_repetition_penalty(value.parse().map_err(|_| invalid())?)
            }
            SettingField::FrequencyPenalty => {
                self.set_frequency_penalty(value.parse().map_err(|_| invalid())?)
            }
            SettingField::PresencePenalty => {
                self.set_presence_penalty(value.parse().map_err(|_| invalid())?)
            }
            SettingField::TopP => self.set_top_p(value.parse().map_err(|_| invalid())?),
        }
        Ok(())
    }

    /// Restore the sampling parameters. Credential and model are kept.
    pub fn reset_to_defaults(&mut self) {
        let defaults = GenerationSettings::default();
        self.settings = GenerationSettings {
            credential: std::mem::take(&mut self.settings.credential),
            model_id: std::mem::take(&mut self.settings.model_id),
            ..defaults
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults() {
        let registry = SettingsRegistry::default();
        assert_eq!(registry.model_id(), "openrouter/sonoma-dusk-alpha");
        assert_eq!(registry.temperature(), 0.7);
        assert_eq!(registry.max_tokens(), 2048);
        assert_eq!(registry.context_window(), 4096);
        assert_eq!(registry.repetition_penalty(), 1.0);
        assert_eq!(registry.frequency_penalty(), 0.0);
        assert_eq!(registry.presence_penalty(), 0.0);
        assert_eq!(registry.top_p(), 0.8);
        assert!(registry.credential().is_empty());
    }

    #[test]
    fn test_setters_do_not_clamp() {
        let mut registry = SettingsRegistry::default();
        registry.set_temperature(7.5);
        registry.set_max_tokens(10);
        registry.set_top_p(-1.0);
        assert_eq!(registry.temperature(), 7.5);
        assert_eq!(registry.max_tokens(), 10);
        assert_eq!(registry.top_p(), -1.0);
    }

    #[test]
    fn test_reset_keeps_credential_and_model() {
        let mut registry = SettingsRegistry::default();
        registry.set_credential("sk-or-test");
        registry.set_model_id("vendor/model-b");
        registry.set_temperature(0.1);
        registry.set_context_window(131072);
        registry.set_presence_penalty(1.5);

        registry.reset_to_defaults();

        assert_eq!(registry.credential(), "sk-or-test");
        assert_eq!(registry.model_id(), "vendor/model-b");
        assert_eq!(registry.temperature(), 0.7);
        assert_eq!(registry.context_window(), 4096);
        assert_eq!(registry.presence_penalty(), 0.0);
    }

    #[test]
    fn test_set_from_str() {
        let mut registry = SettingsRegistry::default();
        let field: SettingField = "top-p".parse().unwrap();
        registry.set_from_str(field, " 0.95 ").unwrap();
        assert_eq!(registry.top_p(), 0.95);

        registry
            .set_from_str("model".parse().unwrap(), "vendor/model-c")
            .unwrap();
        assert_eq!(registry.model_id(), "vendor/model-c");

        let err = registry
            .set_from_str(SettingField::MaxTokens, "lots")
            .unwrap_err();
        assert!(matches!(err, SettingValueError::InvalidNumber { .. }));
        assert!("warmth".parse::<SettingField>().is_err());
    }

    #[test]
    fn test_credential_never_serialized() {
        let mut settings = GenerationSettings::default();
        settings.credential = "secret".to_string();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
    }
}
