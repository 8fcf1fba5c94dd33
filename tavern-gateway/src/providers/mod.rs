pub mod openrouter;
pub mod provider;
pub mod query_dump;

pub use openrouter::OpenRouterClient;
pub use provider::{CompletionProvider, CompletionRequest, CompletionResponse, ProviderError};
