use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use banter_core::client::CompletionClient;
use banter_core::errors::CompletionError;
use banter_core::turns::Turn;

/// Pre-programmed completions for deterministic testing without API calls.
pub enum MockCompletion {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Error(CompletionError),
    /// Wait, then resolve the inner completion.
    Delay(Duration, Box<MockCompletion>),
}

impl MockCompletion {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn delayed(delay: Duration, inner: MockCompletion) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock client that returns pre-programmed completions in sequence.
pub struct MockClient {
    completions: Vec<MockCompletion>,
    call_count: AtomicUsize,
}

impl MockClient {
    pub fn new(completions: Vec<MockCompletion>) -> Self {
        Self {
            completions,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `complete` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[Turn],
        _new_turn: &Turn,
    ) -> Result<String, CompletionError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        let Some(completion) = self.completions.get(idx) else {
            return Err(CompletionError::InvalidRequest(format!(
                "MockClient: no completion configured for call {idx}"
            )));
        };

        let mut current = completion;
        loop {
            match current {
                MockCompletion::Text(text) => return Ok(text.clone()),
                MockCompletion::Error(e) => return Err(e.clone()),
                MockCompletion::Delay(duration, inner) => {
                    tokio::time::sleep(*duration).await;
                    current = inner;
                }
            }
        }
    }
}
