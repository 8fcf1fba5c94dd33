//! Live test against OpenRouter (requires --features live-tests).
//!
//! Run with: cargo test --features live-tests --test openrouter_live

#[cfg(feature = "live-tests")]
use tavern_core::{GenerationSettings, Message};
#[cfg(feature = "live-tests")]
use tavern_gateway::providers::openrouter::OpenRouterClient;
#[cfg(feature = "live-tests")]
use tavern_gateway::providers::provider::{CompletionProvider, CompletionRequest};

#[cfg(feature = "live-tests")]
#[tokio::test]
async fn test_openrouter_live_reply() {
    let secrets = tavern_core::Secrets::from_env();
    let Some(credential) = secrets.default_credential else {
        eprintln!("OPENROUTER_API_KEY not set; skipping OpenRouter live test.");
        return;
    };

    let client = OpenRouterClient::new(None, None, Some("tavern-live-tests".to_string()))
        .expect("build OpenRouter client");
    let transcript = vec![
        Message::system("You are a terse assistant."),
        Message::user("Say exactly 'Hello from tavern!' and nothing else."),
    ];
    let request = CompletionRequest::new(&transcript, &GenerationSettings::default(), credential);

    let response = client.complete(&request).await.expect("OpenRouter call failed");
    assert!(!response.content.trim().is_empty());
}
