pub mod prompt;
pub mod providers;
pub mod session;
pub mod shell;
pub mod state;

pub use providers::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, ProviderUsage,
    WireMessage,
};
pub use session::{
    ConversationSession, ERROR_REPLY, PendingTurn, RejectReason, SendOutcome, SessionState,
    TranscriptSnapshot,
};
pub use state::{AppState, Profile, SessionEvent};
