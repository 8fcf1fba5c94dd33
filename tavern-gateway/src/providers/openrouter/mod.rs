//! OpenRouter API integration with OpenAI-compatible format.

pub mod client;

pub use client::OpenRouterClient;
