pub mod config;
pub mod custom_prompts;
pub mod generation;
pub mod message;
pub mod persona;
pub mod placeholder;
pub mod storage;

// Config re-exports
pub use config::{
    Config,
    ConfigError,
    ConnectionSettings,
    LoggingSettings,
    PromptSettings,
    SamplingSettings,
    Secrets,
    Settings,
    SettingsError,
    load_dotenv,
};

// Custom prompt re-exports
pub use custom_prompts::{
    CustomPromptRegistry,
    FormErrors,
    FormField,
    PromptForm,
    PromptPatch,
    PromptTemplate,
    RegistryError,
    validate_form,
};

pub use generation::{GenerationSettings, SettingField, SettingValueError, SettingsRegistry};
pub use message::{Message, MessageRole};
pub use persona::{Character, Persona};
pub use placeholder::{Placeholder, PlaceholderReport, Substitutions, substitute, validate};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
