//! Identity records for the two roleplay participants.

use serde::{Deserialize, Serialize};

/// Fallback shown for an unnamed character.
pub const DEFAULT_CHARACTER_NAME: &str = "Character";

/// Fallback shown for an unnamed persona.
pub const DEFAULT_PERSONA_NAME: &str = "User";

/// The user's in-roleplay identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Name to address the persona by, never blank.
    pub fn display_name(&self) -> &str {
        non_blank(&self.name).unwrap_or(DEFAULT_PERSONA_NAME)
    }
}

/// The AI-controlled participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// May embed `{{user}}` / `{{char}}`.
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub initial_message: String,
}

impl Character {
    /// Name to address the character by, never blank.
    pub fn display_name(&self) -> &str {
        non_blank(&self.name).unwrap_or(DEFAULT_CHARACTER_NAME)
    }

    /// The greeting that opens a session, if any.
    pub fn greeting(&self) -> Option<&str> {
        non_blank(&self.initial_message)
    }
}

impl Default for Character {
    fn default() -> Self {
        Self {
            name: "Hayeon".to_string(),
            description: "Hayeon is 22 years old, a streamer, a little grumpy.".to_string(),
            scenario: "{{user}} and {{char}} are a couple living together.".to_string(),
            initial_message: "Yo?? *looking at you*".to_string(),
        }
    }
}

/// Returns the value when it has non-whitespace content.
pub fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
