//! The conversation session: transcript ownership and the send state machine.
//!
//! A send is split in two phases so the in-flight guard is checked and set
//! before the network call suspends: [`ConversationSession::begin_send`]
//! appends the user turn and enters `AwaitingResponse`, and
//! [`ConversationSession::finish`] is the only way back to `Idle`. Errors
//! never escape a send; they become a visible assistant turn.

use serde::Serialize;
use tracing::{debug, info, warn};

use tavern_core::persona::non_blank;
use tavern_core::{GenerationSettings, Message};

use crate::providers::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError,
};

/// Assistant turn appended when a request fails.
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// Why a send was dropped without touching the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BlankInput,
    AwaitingResponse,
}

/// Result of one send.
#[derive(Debug)]
pub enum SendOutcome {
    /// Nothing was appended or sent.
    Rejected(RejectReason),
    /// The endpoint answered; the reply was appended.
    Replied(Message),
    /// The request failed; the fixed error turn was appended.
    Recovered { reply: Message, error: ProviderError },
    /// The session was replaced while the request was in flight.
    Discarded,
}

impl SendOutcome {
    /// The assistant turn this send appended, if any.
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SendOutcome::Replied(reply) | SendOutcome::Recovered { reply, .. } => Some(reply),
            SendOutcome::Rejected(_) | SendOutcome::Discarded => None,
        }
    }
}

/// An accepted send whose request has not completed yet.
///
/// Only [`ConversationSession::begin_send`] creates one, and
/// [`ConversationSession::finish`] consumes it.
#[derive(Debug)]
pub struct PendingTurn {
    session_id: String,
    request: CompletionRequest,
}

impl PendingTurn {
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }
}

/// Read-only view of a session for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSnapshot {
    pub messages: Vec<Message>,
    pub awaiting_response: bool,
}

impl TranscriptSnapshot {
    /// Messages shown to the user: everything except the system message.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }
}

/// Pick the credential for one request: the per-session override, then the
/// configured default, then empty.
pub fn resolve_credential(session_override: &str, default: Option<&str>) -> String {
    non_blank(session_override)
        .or_else(|| default.and_then(non_blank))
        .unwrap_or_default()
        .to_string()
}

/// One conversation. The transcript always starts with exactly one system
/// message and is append-only after it.
#[derive(Debug)]
pub struct ConversationSession {
    id: String,
    transcript: Vec<Message>,
    state: SessionState,
}

impl ConversationSession {
    pub fn new(system_prompt: impl Into<String>, greeting: Option<&str>) -> Self {
        let mut transcript = vec![Message::system(system_prompt)];
        if let Some(greeting) = greeting.and_then(non_blank) {
            transcript.push(Message::assistant(greeting));
        }

        let id = uuid::Uuid::new_v4().to_string();
        info!("[session:{}] Started ({} messages)", id, transcript.len());
        Self {
            id,
            transcript,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == SessionState::AwaitingResponse
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            messages: self.transcript.clone(),
            awaiting_response: self.is_awaiting(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        self.transcript
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Replace the system message content in place.
    pub fn recompose(&mut self, system_prompt: impl Into<String>) {
        let system_prompt = system_prompt.into();
        match self.transcript.first_mut() {
            Some(first) if first.is_system() => first.content = system_prompt,
            _ => self.transcript.insert(0, Message::system(system_prompt)),
        }
        info!("[session:{}] System prompt recomposed", self.id);
    }

    /// Accept a user turn and build its request.
    ///
    /// Blank input and sends while a request is outstanding are rejected
    /// without any change.
    pub fn begin_send(
        &mut self,
        text: &str,
        settings: &GenerationSettings,
        default_credential: Option<&str>,
    ) -> Result<PendingTurn, RejectReason> {
        if text.trim().is_empty() {
            debug!("[session:{}] Ignoring blank input", self.id);
            return Err(RejectReason::BlankInput);
        }
        if self.is_awaiting() {
            debug!("[session:{}] Send rejected: awaiting response", self.id);
            return Err(RejectReason::AwaitingResponse);
        }

        self.transcript.push(Message::user(text));
        self.state = SessionState::AwaitingResponse;

        let credential = resolve_credential(&settings.credential, default_credential);
        if credential.is_empty() {
            warn!("[session:{}] No credential configured; sending anyway", self.id);
        }
        let request = CompletionRequest::new(&self.transcript, settings, credential);
        info!(
            "[session:{}] Sending {} messages to {}",
            self.id,
            request.messages.len(),
            request.model
        );

        Ok(PendingTurn {
            session_id: self.id.clone(),
            request,
        })
    }

    /// Record the outcome of a pending turn and return to `Idle`.
    pub fn finish(
        &mut self,
        pending: PendingTurn,
        result: Result<CompletionResponse, ProviderError>,
    ) -> SendOutcome {
        if pending.session_id != self.id {
            debug!(
                "[session:{}] Dropping reply for replaced session {}",
                self.id, pending.session_id
            );
            return SendOutcome::Discarded;
        }

        self.state = SessionState::Idle;
        match result {
            Ok(response) => {
                info!(
                    "[session:{}] Reply received ({} chars)",
                    self.id,
                    response.content.len()
                );
                let reply = Message::assistant(response.content);
                self.transcript.push(reply.clone());
                SendOutcome::Replied(reply)
            }
            Err(error) => {
                warn!("[session:{}] Completion failed: {}", self.id, error);
                let reply = Message::assistant(ERROR_REPLY);
                self.transcript.push(reply.clone());
                SendOutcome::Recovered { reply, error }
            }
        }
    }

    /// Both phases in one call, for callers that own the session exclusively.
    pub async fn send(
        &mut self,
        provider: &dyn CompletionProvider,
        text: &str,
        settings: &GenerationSettings,
        default_credential: Option<&str>,
    ) -> SendOutcome {
        let pending = match self.begin_send(text, settings, default_credential) {
            Ok(pending) => pending,
            Err(reason) => return SendOutcome::Rejected(reason),
        };
        let result = provider.complete(pending.request()).await;
        self.finish(pending, result)
    }
}
