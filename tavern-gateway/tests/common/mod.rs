//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use tavern_core::{Character, CustomPromptRegistry, Persona, PromptSettings, SettingsRegistry};
use tavern_gateway::providers::openrouter::OpenRouterClient;
use tavern_gateway::state::{AppState, Profile};

/// One request seen by the stub endpoint.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

struct StubState {
    status: StatusCode,
    body: String,
    captured: Mutex<Vec<CapturedRequest>>,
}

/// A local chat-completions endpoint that answers every request the same way.
pub struct StubEndpoint {
    pub base_url: String,
    state: Arc<StubState>,
}

impl StubEndpoint {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.captured.lock().unwrap().clone()
    }

    pub fn client(&self) -> OpenRouterClient {
        OpenRouterClient::new(Some(self.base_url.clone()), None, None)
            .expect("build client for stub endpoint")
    }
}

async fn completions(
    State(stub): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.captured
        .lock()
        .unwrap()
        .push(CapturedRequest { authorization, body });
    (stub.status, stub.body.clone())
}

/// Serve `body` with `status` on `POST /v1/chat/completions`.
pub async fn spawn_stub(status: StatusCode, body: impl Into<String>) -> StubEndpoint {
    let state = Arc::new(StubState {
        status,
        body: body.into(),
        captured: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub endpoint");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub endpoint");
    });

    StubEndpoint {
        base_url: format!("http://{}/v1", addr),
        state,
    }
}

/// A well-formed completion body carrying `content`.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "gen-stub",
        "model": "vendor/model-a",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
    })
    .to_string()
}

/// Short, predictable prompt inputs.
pub fn test_profile() -> Profile {
    Profile {
        prompt: PromptSettings {
            jailbreak: String::new(),
            role: "Hi {{char}}, I'm {{user}}".to_string(),
            memory: String::new(),
            instruction: String::new(),
        },
        character: Character::default(),
        persona: Persona::new("Alex", ""),
    }
}

/// App state talking to `stub`, with an in-memory prompt registry.
pub fn build_state(stub: &StubEndpoint, default_credential: Option<&str>) -> Arc<AppState> {
    Arc::new(AppState::new(
        SettingsRegistry::default(),
        CustomPromptRegistry::in_memory(),
        test_profile(),
        Arc::new(stub.client()),
        default_credential.map(str::to_string),
    ))
}
