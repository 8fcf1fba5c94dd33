//! Placeholder substitution for prompt templates.
//!
//! Templates reference the roleplay participants through a fixed set of
//! `{{token}}` placeholders. Substitution is a single left-to-right pass, so
//! values that themselves contain `{{...}}` are never expanded again. The one
//! exception is the scenario, which gets its `{{user}}` / `{{char}}` resolved
//! before it is inserted.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::persona::{Character, Persona, non_blank};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]+\}\}").expect("static placeholder regex"));

/// A recognized template placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    User,
    Char,
    UserDescription,
    CharDescription,
    Scenario,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::User,
        Placeholder::Char,
        Placeholder::UserDescription,
        Placeholder::CharDescription,
        Placeholder::Scenario,
    ];

    /// Key between the braces.
    pub fn key(&self) -> &'static str {
        match self {
            Placeholder::User => "user",
            Placeholder::Char => "char",
            Placeholder::UserDescription => "user_description",
            Placeholder::CharDescription => "char_description",
            Placeholder::Scenario => "scenario",
        }
    }

    /// Full token including braces, e.g. `{{user}}`.
    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.key())
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Result of scanning a template for placeholder tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaceholderReport {
    pub is_valid: bool,
    /// Unrecognized tokens in order of appearance, braces included.
    pub invalid_tokens: Vec<String>,
}

/// Check that `content` only uses recognized placeholders.
pub fn validate(content: &str) -> PlaceholderReport {
    let invalid_tokens: Vec<String> = PLACEHOLDER_RE
        .find_iter(content)
        .map(|m| m.as_str())
        .filter(|token| Placeholder::from_key(&token[2..token.len() - 2]).is_none())
        .map(ToString::to_string)
        .collect();

    PlaceholderReport {
        is_valid: invalid_tokens.is_empty(),
        invalid_tokens,
    }
}

/// Replacement values for every recognized placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pub user: String,
    pub char: String,
    pub user_description: String,
    pub char_description: String,
    pub scenario: String,
}

impl Substitutions {
    /// Values taken verbatim from the records; blank fields become "".
    pub fn from_records(persona: &Persona, character: &Character) -> Self {
        Self::build(
            blank_to_empty(&persona.name),
            blank_to_empty(&character.name),
            persona,
            character,
        )
    }

    /// Like [`Substitutions::from_records`] but blank names fall back to
    /// "User" / "Character".
    pub fn with_display_names(persona: &Persona, character: &Character) -> Self {
        Self::build(
            persona.display_name(),
            character.display_name(),
            persona,
            character,
        )
    }

    fn build(user: &str, char: &str, persona: &Persona, character: &Character) -> Self {
        let mut values = Self {
            user: user.to_string(),
            char: char.to_string(),
            user_description: blank_to_empty(&persona.description).to_string(),
            char_description: blank_to_empty(&character.description).to_string(),
            scenario: String::new(),
        };
        // Only names are resolved inside the scenario.
        values.scenario = values.apply_only(
            blank_to_empty(&character.scenario),
            &[Placeholder::User, Placeholder::Char],
        );
        values
    }

    pub fn value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::User => &self.user,
            Placeholder::Char => &self.char,
            Placeholder::UserDescription => &self.user_description,
            Placeholder::CharDescription => &self.char_description,
            Placeholder::Scenario => &self.scenario,
        }
    }

    /// Replace every recognized placeholder in `template`.
    ///
    /// Unknown `{{...}}` spans and unclosed `{{` are copied through untouched.
    pub fn apply(&self, template: &str) -> String {
        self.apply_only(template, &Placeholder::ALL)
    }

    fn apply_only(&self, template: &str, allowed: &[Placeholder]) -> String {
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let (prefix, after_start) = rest.split_at(start);
            out.push_str(prefix);
            let Some(end) = after_start[2..].find("}}").map(|i| i + 2) else {
                rest = after_start;
                break;
            };
            let key = &after_start[2..end];
            match Placeholder::from_key(key).filter(|p| allowed.contains(p)) {
                Some(placeholder) => {
                    out.push_str(self.value(placeholder));
                    rest = &after_start[end + 2..];
                }
                // Copy only the opening braces so a token inside the span is still seen.
                None => {
                    out.push_str("{{");
                    rest = &after_start[2..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Replace recognized placeholders with values from the persona and
/// character records. Blank fields substitute as the empty string.
pub fn substitute(template: &str, persona: &Persona, character: &Character) -> String {
    Substitutions::from_records(persona, character).apply(template)
}

fn blank_to_empty(value: &str) -> &str {
    non_blank(value).unwrap_or("")
}
