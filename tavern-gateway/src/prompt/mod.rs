//! System prompt composition.
//!
//! The composed prompt is the content of the single system message that
//! opens every session. It is built from the configured prompt fragments and
//! the character/persona records, or replaced wholesale by the active custom
//! template.

use tavern_core::persona::non_blank;
use tavern_core::{Character, Persona, PromptSettings, PromptTemplate, Substitutions};

/// Every fragment of the composed prompt, with placeholders resolved.
///
/// Blank fragments resolve to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFragments {
    pub jailbreak: String,
    pub role: String,
    pub character_description: String,
    pub user_description: String,
    pub scenario: String,
    pub memory: String,
    pub instruction: String,
}

impl PromptFragments {
    pub fn resolve(prompt: &PromptSettings, character: &Character, persona: &Persona) -> Self {
        let values = Substitutions::with_display_names(persona, character);
        let fragment = |raw: &str| non_blank(raw).map(|text| values.apply(text)).unwrap_or_default();

        Self {
            jailbreak: fragment(&prompt.jailbreak),
            role: fragment(&prompt.role),
            character_description: fragment(&character.description),
            user_description: fragment(&persona.description),
            scenario: fragment(&character.scenario),
            memory: fragment(&prompt.memory),
            instruction: fragment(&prompt.instruction),
        }
    }

    /// Fixed-order layout, trimmed at both ends.
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n[Scenario:{}]\n{}\n{}",
            self.jailbreak,
            self.role,
            self.character_description,
            self.user_description,
            self.scenario,
            self.memory,
            self.instruction,
        )
        .trim()
        .to_string()
    }
}

/// Compose the system prompt from the configured fragments.
pub fn compose(prompt: &PromptSettings, character: &Character, persona: &Persona) -> String {
    PromptFragments::resolve(prompt, character, persona).render()
}

/// The system prompt a new or re-applied session starts with.
///
/// An active template replaces the composed prompt entirely.
pub fn compose_system_prompt(
    prompt: &PromptSettings,
    active: Option<&PromptTemplate>,
    character: &Character,
    persona: &Persona,
) -> String {
    match active {
        Some(template) => Substitutions::with_display_names(persona, character)
            .apply(&template.content)
            .trim()
            .to_string(),
        None => compose(prompt, character, persona),
    }
}
