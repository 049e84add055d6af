//! Mock LLM provider for testing
//!
//! Replays a script of responses and errors in call order, then keeps
//! answering with a fallback. Every request is recorded so tests can
//! inspect the prompts a caller produced.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};

/// A mock provider with scripted behaviour
pub struct MockProvider {
    /// Outcomes consumed one per call
    script: Mutex<VecDeque<Result<String>>>,
    /// Outcome once the script is exhausted
    fallback: Result<String>,
    /// Current call count
    call_count: AtomicUsize,
    /// Requests received, in order
    requests: Mutex<Vec<LlmRequest>>,
    /// Provider name for display
    name: &'static str,
}

impl MockProvider {
    /// Create a provider that replays `script`, then answers with `fallback`
    pub fn scripted(script: Vec<Result<String>>, fallback: Result<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            name: "mock",
        }
    }

    /// Create a provider that always succeeds
    pub fn always_succeeds(response: &str) -> Self {
        Self::scripted(Vec::new(), Ok(response.to_string()))
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: LlmError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: LlmError, response: &str) -> Self {
        Self::scripted(vec![Err(error); n], Ok(response.to_string()))
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Set a custom provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let input_tokens = request.prompt.split_whitespace().count() as u32;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        next.map(|content| LlmResponse {
            content,
            model: "mock-model".to_string(),
            usage: Some(TokenUsage {
                input_tokens,
                output_tokens: 1,
            }),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }
}
