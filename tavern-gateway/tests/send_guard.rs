//! At most one request in flight per session.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use tavern_core::{CustomPromptRegistry, SettingsRegistry};
use tavern_gateway::providers::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError,
};
use tavern_gateway::session::{RejectReason, SendOutcome};
use tavern_gateway::state::AppState;

/// Blocks every request until released.
struct GatedProvider {
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl CompletionProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(CompletionResponse {
            id: None,
            model: None,
            content: "finally".to_string(),
            usage: None,
            finish_reason: None,
        })
    }
}

fn gated_state() -> (Arc<AppState>, Arc<GatedProvider>) {
    let provider = Arc::new(GatedProvider {
        calls: AtomicUsize::new(0),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let state = Arc::new(AppState::new(
        SettingsRegistry::default(),
        CustomPromptRegistry::in_memory(),
        common::test_profile(),
        provider.clone(),
        None,
    ));
    (state, provider)
}

#[tokio::test]
async fn test_second_send_rejected_while_first_in_flight() {
    let (state, provider) = gated_state();

    let first = tokio::spawn({
        let state = Arc::clone(&state);
        async move { state.send("first").await }
    });
    provider.entered.notified().await;

    assert!(state.snapshot().await.awaiting_response);
    let second = state.send("second").await;
    assert!(matches!(
        second,
        SendOutcome::Rejected(RejectReason::AwaitingResponse)
    ));
    // The rejected text never reaches the transcript.
    assert!(
        state
            .snapshot()
            .await
            .messages
            .iter()
            .all(|m| m.content != "second")
    );

    provider.release.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(&outcome, SendOutcome::Replied(m) if m.content == "finally"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    let contents: Vec<String> = state
        .snapshot()
        .await
        .visible()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(contents, vec!["Yo?? *looking at you*", "first", "finally"]);
}

#[tokio::test]
async fn test_reply_after_new_session_is_discarded() {
    let (state, provider) = gated_state();

    let first = tokio::spawn({
        let state = Arc::clone(&state);
        async move { state.send("first").await }
    });
    provider.entered.notified().await;

    let fresh = state.new_session().await;
    assert!(!fresh.awaiting_response);

    provider.release.notify_one();
    assert!(matches!(first.await.unwrap(), SendOutcome::Discarded));
    assert_eq!(state.snapshot().await.messages.len(), 2);
}
