//! User-authored prompt templates.
//!
//! The registry owns the template list, the single active reference and the
//! editing form. Templates and the selected/active references are persisted
//! under [`STORAGE_KEY`] after every mutation; form and modal state is
//! transient and never written.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::persona::{Character, Persona};
use crate::placeholder;
use crate::storage::{KeyValueStore, MemoryStore, StorageError};

/// Namespace key of the persisted registry snapshot.
pub const STORAGE_KEY: &str = "custom-prompts-storage";

/// A saved prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    /// New template with a fresh id.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a template or the form buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPatch {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl PromptPatch {
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            name: Some(value.into()),
            content: None,
        }
    }

    pub fn content(value: impl Into<String>) -> Self {
        Self {
            name: None,
            content: Some(value.into()),
        }
    }
}

/// Editable buffer behind the create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptForm {
    pub name: String,
    pub content: String,
}

impl PromptForm {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Form field an error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Name,
    Content,
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormField::Name => write!(f, "name"),
            FormField::Content => write!(f, "content"),
        }
    }
}

/// Field -> message mapping produced by form validation.
pub type FormErrors = BTreeMap<FormField, String>;

/// Validate a form buffer without touching any state.
pub fn validate_form(form: &PromptForm) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();

    if form.name.trim().is_empty() {
        errors.insert(FormField::Name, "Name is required".to_string());
    }

    if form.content.trim().is_empty() {
        errors.insert(FormField::Content, "Content is required".to_string());
    }

    let report = placeholder::validate(&form.content);
    if !report.is_valid {
        errors.insert(
            FormField::Content,
            format!("Invalid placeholders: {}", report.invalid_tokens.join(", ")),
        );
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn describe_errors(errors: &FormErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid prompt form: {}", describe_errors(.0))]
    Validation(FormErrors),

    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Prompt id already exists: {0}")]
    DuplicateId(String),
}

/// What survives a restart.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrySnapshot {
    #[serde(default)]
    prompts: Vec<PromptTemplate>,
    #[serde(default)]
    selected_prompt: Option<String>,
    #[serde(default)]
    active_prompt: Option<String>,
}

/// Store of custom prompt templates with a single active reference.
pub struct CustomPromptRegistry {
    prompts: Vec<PromptTemplate>,
    selected: Option<String>,
    active: Option<String>,
    form: PromptForm,
    form_errors: FormErrors,
    form_open: bool,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CustomPromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomPromptRegistry")
            .field("prompts", &self.prompts.len())
            .field("selected", &self.selected)
            .field("active", &self.active)
            .field("form_open", &self.form_open)
            .finish()
    }
}

impl CustomPromptRegistry {
    /// Load the registry from `store`.
    ///
    /// A snapshot that fails to parse is logged and replaced by an empty
    /// registry; storage I/O failures are returned.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, RegistryError> {
        let snapshot = match store.load(STORAGE_KEY)? {
            Some(raw) => serde_json::from_str::<RegistrySnapshot>(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable custom prompt snapshot: {}", e);
                RegistrySnapshot::default()
            }),
            None => RegistrySnapshot::default(),
        };

        let mut registry = Self {
            prompts: snapshot.prompts,
            selected: snapshot.selected_prompt,
            active: snapshot.active_prompt,
            form: PromptForm::default(),
            form_errors: FormErrors::new(),
            form_open: false,
            store,
        };
        registry.drop_dangling_references();
        info!("Loaded {} custom prompts", registry.prompts.len());
        Ok(registry)
    }

    /// Empty registry backed by a process-local store.
    pub fn in_memory() -> Self {
        Self {
            prompts: Vec::new(),
            selected: None,
            active: None,
            form: PromptForm::default(),
            form_errors: FormErrors::new(),
            form_open: false,
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn list(&self) -> &[PromptTemplate] {
        &self.prompts
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn active(&self) -> Option<&PromptTemplate> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn selected(&self) -> Option<&PromptTemplate> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn form(&self) -> &PromptForm {
        &self.form
    }

    pub fn form_errors(&self) -> &FormErrors {
        &self.form_errors
    }

    pub fn is_form_open(&self) -> bool {
        self.form_open
    }

    /// Replace the whole template list.
    pub fn set_prompts(&mut self, prompts: Vec<PromptTemplate>) -> Result<(), RegistryError> {
        self.prompts = prompts;
        self.drop_dangling_references();
        self.persist()
    }

    pub fn add(&mut self, template: PromptTemplate) -> Result<(), RegistryError> {
        if self.get(&template.id).is_some() {
            return Err(RegistryError::DuplicateId(template.id));
        }
        info!("Adding custom prompt '{}' ({})", template.name, template.id);
        self.prompts.push(template);
        self.persist()
    }

    /// Apply `patch` to the template with `id`, refreshing `updated_at`.
    pub fn update(&mut self, id: &str, patch: PromptPatch) -> Result<&PromptTemplate, RegistryError> {
        let index = self
            .prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let template = &mut self.prompts[index];
        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(content) = patch.content {
            template.content = content;
        }
        template.updated_at = Utc::now();
        debug!("Updated custom prompt {}", id);

        self.persist()?;
        Ok(&self.prompts[index])
    }

    /// Remove a template. Clears the active and selected references when
    /// they point at it.
    pub fn delete(&mut self, id: &str) -> Result<Option<PromptTemplate>, RegistryError> {
        let Some(index) = self.prompts.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let removed = self.prompts.remove(index);

        if self.active.as_deref() == Some(id) {
            info!("Deleted prompt {} was active; deactivating", id);
            self.active = None;
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }

        self.persist()?;
        Ok(Some(removed))
    }

    /// Stage a template into the form buffer for editing.
    pub fn select(&mut self, id: &str) -> Result<(), RegistryError> {
        let template = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        self.form = PromptForm::new(&template.name, &template.content);
        self.selected = Some(id.to_string());
        self.persist()
    }

    pub fn activate(&mut self, id: &str) -> Result<(), RegistryError> {
        if self.get(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        info!("Activating custom prompt {}", id);
        self.active = Some(id.to_string());
        self.persist()
    }

    pub fn deactivate(&mut self) -> Result<(), RegistryError> {
        if self.active.take().is_some() {
            info!("Custom prompt deactivated");
        }
        self.persist()
    }

    /// Activate `id`, or deactivate it if it is already active.
    pub fn toggle_active(&mut self, id: &str) -> Result<(), RegistryError> {
        if self.active.as_deref() == Some(id) {
            self.deactivate()
        } else {
            self.activate(id)
        }
    }

    pub fn set_form_data(&mut self, patch: PromptPatch) {
        if let Some(name) = patch.name {
            self.form.name = name;
        }
        if let Some(content) = patch.content {
            self.form.content = content;
        }
    }

    pub fn set_form_errors(&mut self, errors: FormErrors) {
        self.form_errors = errors;
    }

    pub fn clear_form_errors(&mut self) {
        self.form_errors.clear();
    }

    pub fn open_form(&mut self) {
        self.form_open = true;
    }

    /// Close the form, discarding the selection, buffer and errors.
    pub fn close_form(&mut self) -> Result<(), RegistryError> {
        self.form_open = false;
        self.form = PromptForm::default();
        self.form_errors.clear();
        if self.selected.take().is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Start a blank form for a new template.
    pub fn new_prompt(&mut self) -> Result<(), RegistryError> {
        self.form = PromptForm::default();
        self.form_errors.clear();
        self.form_open = true;
        if self.selected.take().is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Validate the form and store it.
    ///
    /// Updates the selected template (keeping its id and `created_at`) or adds
    /// a new one. On validation failure the errors are recorded on the form
    /// and nothing else changes. When the store rejects the write, the list,
    /// the selection and the form are left as they were.
    pub fn save_form(&mut self) -> Result<PromptTemplate, RegistryError> {
        self.clear_form_errors();
        if let Err(errors) = validate_form(&self.form) {
            self.set_form_errors(errors.clone());
            return Err(RegistryError::Validation(errors));
        }

        let previous = self.prompts.clone();
        let form = self.form.clone();
        let target = self
            .selected
            .as_deref()
            .and_then(|id| self.prompts.iter_mut().find(|p| p.id == id));
        let saved = match target {
            Some(template) => {
                template.name = form.name;
                template.content = form.content;
                template.updated_at = Utc::now();
                debug!("Updated custom prompt {}", template.id);
                template.clone()
            }
            None => {
                let template = PromptTemplate::new(form.name, form.content);
                info!("Adding custom prompt '{}' ({})", template.name, template.id);
                self.prompts.push(template.clone());
                template
            }
        };

        let selected = self.selected.take();
        if let Err(e) = self.persist() {
            warn!("Failed to save custom prompt '{}': {}", saved.name, e);
            self.prompts = previous;
            self.selected = selected;
            return Err(e);
        }

        self.form = PromptForm::default();
        Ok(saved)
    }

    /// Form content with placeholders resolved, for a live preview.
    pub fn preview_form(&self, persona: &Persona, character: &Character) -> String {
        placeholder::substitute(&self.form.content, persona, character)
    }

    /// Active template content with placeholders resolved.
    pub fn preview_active(&self, persona: &Persona, character: &Character) -> Option<String> {
        self.active()
            .map(|template| placeholder::substitute(&template.content, persona, character))
    }

    fn drop_dangling_references(&mut self) {
        if let Some(id) = self.active.as_deref()
            && self.get(id).is_none()
        {
            warn!("Active prompt {} no longer exists; clearing", id);
            self.active = None;
        }
        if let Some(id) = self.selected.as_deref()
            && self.get(id).is_none()
        {
            self.selected = None;
        }
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let snapshot = RegistrySnapshot {
            prompts: self.prompts.clone(),
            selected_prompt: self.selected.clone(),
            active_prompt: self.active.clone(),
        };
        let json = serde_json::to_string(&snapshot)?;
        self.store.save(STORAGE_KEY, &json)?;
        Ok(())
    }
}
