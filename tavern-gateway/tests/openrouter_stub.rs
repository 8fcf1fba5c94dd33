//! End-to-end sends against a local chat-completions stub.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{build_state, completion_body, spawn_stub};
use tavern_core::{MessageRole, SettingField};
use tavern_gateway::session::{ERROR_REPLY, SendOutcome};

const SYSTEM_PROMPT: &str = "Hi Hayeon, I'm Alex\nHayeon is 22 years old, a streamer, a little grumpy.\n\n[Scenario:Alex and Hayeon are a couple living together.]";

#[tokio::test]
async fn test_reply_is_appended() {
    let stub = spawn_stub(StatusCode::OK, completion_body("Hey!")).await;
    let state = build_state(&stub, Some("sk-or-default"));

    let outcome = state.send("Hello").await;
    assert!(matches!(&outcome, SendOutcome::Replied(m) if m.content == "Hey!"));

    let snapshot = state.snapshot().await;
    assert!(!snapshot.awaiting_response);
    let turns: Vec<(MessageRole, &str)> = snapshot
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (MessageRole::System, SYSTEM_PROMPT),
            (MessageRole::Assistant, "Yo?? *looking at you*"),
            (MessageRole::User, "Hello"),
            (MessageRole::Assistant, "Hey!"),
        ]
    );
}

#[tokio::test]
async fn test_request_carries_transcript_and_settings() {
    let stub = spawn_stub(StatusCode::OK, completion_body("Hey!")).await;
    let state = build_state(&stub, Some("sk-or-default"));

    state
        .settings_mut()
        .await
        .set_from_str(SettingField::Temperature, "0.9")
        .unwrap();
    state.send("Hello").await;

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer sk-or-default"));

    let body = &request.body;
    assert_eq!(body["model"], "openrouter/sonoma-dusk-alpha");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "assistant", "content": "Yo?? *looking at you*"},
            {"role": "user", "content": "Hello"}
        ])
    );
    assert_eq!(body["temperature"], 0.9);
    assert_eq!(body["max_tokens"], 2048);
    assert_eq!(body["context_window"], 4096);
    assert_eq!(body["repetition_penalty"], 1.0);
    assert_eq!(body["frequency_penalty"], 0.0);
    assert_eq!(body["presence_penalty"], 0.0);
    assert_eq!(body["top_p"], 0.8);
    assert!(body.get("credential").is_none());
}

#[tokio::test]
async fn test_session_credential_overrides_default() {
    let stub = spawn_stub(StatusCode::OK, completion_body("Hey!")).await;
    let state = build_state(&stub, Some("sk-or-default"));
    state.settings_mut().await.set_credential("sk-or-mine");

    state.send("Hello").await;
    assert_eq!(
        stub.requests()[0].authorization.as_deref(),
        Some("Bearer sk-or-mine")
    );
}

#[tokio::test]
async fn test_missing_credential_still_sends() {
    let stub = spawn_stub(StatusCode::UNAUTHORIZED, "{\"error\":\"no key\"}").await;
    let state = build_state(&stub, None);

    let outcome = state.send("Hello").await;
    assert!(matches!(outcome, SendOutcome::Recovered { .. }));
    assert_eq!(stub.requests().len(), 1);
    assert_eq!(
        stub.requests()[0].authorization.as_deref().map(str::trim),
        Some("Bearer")
    );
}

#[tokio::test]
async fn test_server_error_becomes_error_turn() {
    let stub = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").await;
    let state = build_state(&stub, Some("sk-or-default"));

    let outcome = state.send("Hello").await;
    match outcome {
        SendOutcome::Recovered { reply, error } => {
            assert_eq!(reply.content, ERROR_REPLY);
            assert!(!error.is_malformed_response());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let snapshot = state.snapshot().await;
    assert!(!snapshot.awaiting_response);
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(snapshot.messages[3].content, ERROR_REPLY);

    // The user can resend right away.
    let retry = state.send("Hello again").await;
    assert!(matches!(retry, SendOutcome::Recovered { .. }));
    assert_eq!(stub.requests().len(), 2);
}

#[tokio::test]
async fn test_missing_choices_becomes_error_turn() {
    let stub = spawn_stub(StatusCode::OK, "{\"id\":\"gen-1\"}").await;
    let state = build_state(&stub, Some("sk-or-default"));

    match state.send("Hello").await {
        SendOutcome::Recovered { reply, error } => {
            assert_eq!(reply.content, ERROR_REPLY);
            assert!(error.is_malformed_response());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_becomes_error_turn() {
    let stub = spawn_stub(StatusCode::OK, "<html>gateway timeout</html>").await;
    let state = build_state(&stub, Some("sk-or-default"));

    let outcome = state.send("Hello").await;
    assert_eq!(outcome.reply().map(|m| m.content.as_str()), Some(ERROR_REPLY));
}
