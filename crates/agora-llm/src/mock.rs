//! Mock LLM provider for testing and offline simulation

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
enum Behavior {
    /// Cycle through canned responses
    Respond(Vec<String>),
    /// Every call fails
    Fail,
    /// The first `failures` calls fail, then cycle through responses
    Flaky {
        failures: usize,
        responses: Vec<String>,
    },
    /// Build a short on-topic reply from the prompt
    Echo,
}

/// A mock LLM provider that returns predefined responses.
///
/// Works without network access, so tests and `agora simulate` can run a
/// whole debate offline.
#[derive(Debug)]
pub struct MockProvider {
    /// Name of this mock
    pub name: String,
    behavior: Behavior,
    /// Number of `complete` calls made so far
    calls: AtomicUsize,
    /// Simulated latency
    latency: Duration,
}

impl MockProvider {
    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            latency: Duration::from_millis(50),
        }
    }

    /// Create a mock cycling through the given responses
    pub fn new(responses: Vec<String>) -> Self {
        Self::with_behavior("mock", Behavior::Respond(responses))
    }

    /// Create a mock that always returns the same response
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a mock whose every call fails with a connection error
    pub fn failing() -> Self {
        Self::with_behavior("failing-mock", Behavior::Fail)
    }

    /// Create a mock that fails `failures` times and then answers `response`
    pub fn flaky(failures: usize, response: &str) -> Self {
        Self::with_behavior(
            "flaky-mock",
            Behavior::Flaky {
                failures,
                responses: vec![response.to_string()],
            },
        )
    }

    /// Create a mock that answers from the prompt itself
    pub fn echo() -> Self {
        Self::with_behavior("echo-mock", Behavior::Echo)
    }

    /// Override the simulated latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// How many completions were requested
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn echo_response(request: &LlmRequest) -> String {
        let topic: String = request
            .prompt
            .lines()
            .find(|l| l.to_lowercase().starts_with("motion:"))
            .and_then(|l| l.get("motion:".len()..))
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| request.prompt.chars().take(60).collect());
        format!(
            "On \"{}\": first, the evidence points one way; second, the costs of ignoring it \
             are real. In conclusion, my side's case stands.",
            topic
        )
    }

    fn pick(responses: &[String], idx: usize) -> Result<String, LlmError> {
        if responses.is_empty() {
            return Err(LlmError::InvalidResponse("mock has no responses".to_string()));
        }
        Ok(responses[idx % responses.len()].clone())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !matches!(self.behavior, Behavior::Fail)
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let idx = self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let content = match &self.behavior {
            Behavior::Respond(responses) => Self::pick(responses, idx)?,
            Behavior::Fail => {
                return Err(LlmError::ConnectionFailed("mock provider is down".to_string()))
            }
            Behavior::Flaky {
                failures,
                responses,
            } => {
                if idx < *failures {
                    return Err(LlmError::ConnectionFailed(format!(
                        "mock failure {} of {}",
                        idx + 1,
                        failures
                    )));
                }
                Self::pick(responses, idx - failures)?
            }
            Behavior::Echo => Self::echo_response(&request),
        };

        Ok(LlmResponse {
            content,
            model: self.name.clone(),
            tokens_used: Some((request.prompt.len() / 4) as u32 + 100),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
