use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, broadcast};
use tracing::info;

use tavern_core::{Character, CustomPromptRegistry, Persona, PromptSettings, SettingsRegistry};

use crate::prompt;
use crate::providers::provider::CompletionProvider;
use crate::session::{ConversationSession, SendOutcome, TranscriptSnapshot};

/// Inputs of the system prompt other than the custom templates.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub prompt: PromptSettings,
    pub character: Character,
    pub persona: Persona,
}

/// Events broadcast to renderers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The transcript changed
    TranscriptUpdated(TranscriptSnapshot),
    /// A request started (`true`) or completed (`false`)
    AwaitingResponse(bool),
}

/// Shared application state
///
/// The session lock is never held across the completion call, so a second
/// send during a request reaches the session's own guard and is rejected.
pub struct AppState {
    settings: RwLock<SettingsRegistry>,
    prompts: Mutex<CustomPromptRegistry>,
    profile: RwLock<Profile>,
    session: Mutex<ConversationSession>,
    provider: Arc<dyn CompletionProvider>,
    default_credential: Option<String>,
    events: broadcast::Sender<SessionEvent>,
}

impl AppState {
    /// Build the state and start the first session.
    pub fn new(
        settings: SettingsRegistry,
        prompts: CustomPromptRegistry,
        profile: Profile,
        provider: Arc<dyn CompletionProvider>,
        default_credential: Option<String>,
    ) -> Self {
        let system_prompt = prompt::compose_system_prompt(
            &profile.prompt,
            prompts.active(),
            &profile.character,
            &profile.persona,
        );
        let session = ConversationSession::new(system_prompt, profile.character.greeting());
        let (events, _) = broadcast::channel(100);

        Self {
            settings: RwLock::new(settings),
            prompts: Mutex::new(prompts),
            profile: RwLock::new(profile),
            session: Mutex::new(session),
            provider,
            default_credential,
            events,
        }
    }

    /// Get a receiver for session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub async fn settings(&self) -> RwLockReadGuard<'_, SettingsRegistry> {
        self.settings.read().await
    }

    pub async fn settings_mut(&self) -> RwLockWriteGuard<'_, SettingsRegistry> {
        self.settings.write().await
    }

    pub async fn prompts(&self) -> MutexGuard<'_, CustomPromptRegistry> {
        self.prompts.lock().await
    }

    pub async fn profile(&self) -> RwLockReadGuard<'_, Profile> {
        self.profile.read().await
    }

    pub async fn snapshot(&self) -> TranscriptSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn system_prompt(&self) -> String {
        self.session.lock().await.system_prompt().to_string()
    }

    /// Send one user turn and wait for the reply or the error turn.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let settings = self.settings.read().await.snapshot().clone();

        let (pending, snapshot) = {
            let mut session = self.session.lock().await;
            match session.begin_send(text, &settings, self.default_credential.as_deref()) {
                Ok(pending) => (pending, session.snapshot()),
                Err(reason) => return SendOutcome::Rejected(reason),
            }
        };
        self.emit(SessionEvent::AwaitingResponse(true));
        self.emit(SessionEvent::TranscriptUpdated(snapshot));

        let result = self.provider.complete(pending.request()).await;

        let (outcome, snapshot) = {
            let mut session = self.session.lock().await;
            let outcome = session.finish(pending, result);
            (outcome, session.snapshot())
        };
        if !matches!(outcome, SendOutcome::Discarded) {
            self.emit(SessionEvent::AwaitingResponse(false));
            self.emit(SessionEvent::TranscriptUpdated(snapshot));
        }
        outcome
    }

    /// The system prompt a new session would start with now.
    pub async fn compose_system_prompt(&self) -> String {
        let prompts = self.prompts.lock().await;
        let profile = self.profile.read().await;
        prompt::compose_system_prompt(
            &profile.prompt,
            prompts.active(),
            &profile.character,
            &profile.persona,
        )
    }

    /// Live preview of the active template, if one is active.
    pub async fn preview_active(&self) -> Option<String> {
        let prompts = self.prompts.lock().await;
        let profile = self.profile.read().await;
        prompts.preview_active(&profile.persona, &profile.character)
    }

    /// Replace the session with a fresh one.
    ///
    /// A request still in flight for the old session is discarded when it
    /// completes.
    pub async fn new_session(&self) -> TranscriptSnapshot {
        let system_prompt = self.compose_system_prompt().await;
        let greeting = self
            .profile
            .read()
            .await
            .character
            .greeting()
            .map(str::to_string);

        let snapshot = {
            let mut session = self.session.lock().await;
            *session = ConversationSession::new(system_prompt, greeting.as_deref());
            session.snapshot()
        };
        info!("New session started");
        self.emit(SessionEvent::AwaitingResponse(false));
        self.emit(SessionEvent::TranscriptUpdated(snapshot.clone()));
        snapshot
    }

    /// Recompose the current session's system message from the current
    /// prompt settings and active template.
    pub async fn apply_prompt(&self) -> TranscriptSnapshot {
        let system_prompt = self.compose_system_prompt().await;
        let snapshot = {
            let mut session = self.session.lock().await;
            session.recompose(system_prompt);
            session.snapshot()
        };
        self.emit(SessionEvent::TranscriptUpdated(snapshot.clone()));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::provider::{CompletionRequest, CompletionResponse, ProviderError};
    use tavern_core::PromptTemplate;

    struct EchoProvider;

    #[async_trait::async_trait]
    impl CompletionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let last = request.messages.last().ok_or(ProviderError::NoContent)?;
            Ok(CompletionResponse {
                id: None,
                model: None,
                content: format!("echo: {}", last.content),
                usage: None,
                finish_reason: None,
            })
        }
    }

    fn state() -> AppState {
        let profile = Profile {
            persona: Persona::new("Alex", ""),
            ..Profile::default()
        };
        AppState::new(
            SettingsRegistry::default(),
            CustomPromptRegistry::in_memory(),
            profile,
            Arc::new(EchoProvider),
            None,
        )
    }

    #[tokio::test]
    async fn test_first_session_has_greeting() {
        let state = state();
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].content, "Yo?? *looking at you*");
        assert!(state.system_prompt().await.contains("[Scenario:Alex and Hayeon"));
    }

    #[tokio::test]
    async fn test_send_broadcasts_events() {
        let state = state();
        let mut rx = state.subscribe();

        let outcome = state.send("hi").await;
        assert_eq!(outcome.reply().unwrap().content, "echo: hi");

        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::AwaitingResponse(true)));
        match rx.recv().await.unwrap() {
            SessionEvent::TranscriptUpdated(s) => assert!(s.awaiting_response),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::AwaitingResponse(false)));
        match rx.recv().await.unwrap() {
            SessionEvent::TranscriptUpdated(s) => {
                assert!(!s.awaiting_response);
                assert_eq!(s.visible().count(), 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_activation_needs_explicit_apply() {
        let state = state();
        let before = state.system_prompt().await;

        {
            let mut prompts = state.prompts().await;
            let template = PromptTemplate::new("Short", "Talk to {{user}}.");
            let id = template.id.clone();
            prompts.add(template).unwrap();
            prompts.activate(&id).unwrap();
        }
        assert_eq!(state.system_prompt().await, before);
        assert_eq!(state.preview_active().await.as_deref(), Some("Talk to Alex."));

        state.apply_prompt().await;
        assert_eq!(state.system_prompt().await, "Talk to Alex.");
        assert_eq!(state.snapshot().await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_new_session_resets_transcript() {
        let state = state();
        state.send("hi").await;
        assert_eq!(state.snapshot().await.messages.len(), 4);

        let snapshot = state.new_session().await;
        assert_eq!(snapshot.messages.len(), 2);
    }
}
