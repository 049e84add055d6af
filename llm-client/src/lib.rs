//! Text-generation client library for the booksmd workspace
//!
//! Provides a unified interface for the supported backends:
//! - Ollama (local models, default)
//! - OpenAI and OpenRouter (chat completions API)
//! - Anthropic API (direct)
//! - Mock (scripted responses for tests)

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use providers::{MockProvider, ProviderKind, get_provider};
