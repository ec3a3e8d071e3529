//! # Agora LLM
//!
//! Language-model plumbing for agent participants.
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`OllamaProvider`] | Local chat completions |
//! | [`MockProvider`] | Offline testing and simulation |
//! | [`ResilientProvider`] | Circuit breaker around a flaky upstream |
//! | [`LlmTurnGenerator`] | Writes an agent's speech |
//! | [`HeuristicScorer`] / [`LlmScorer`] | Advisory feedback on speeches |
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_llm::{LlmProvider, MockProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let llm = MockProvider::constant("The motion stands.");
//!     let response = llm.ask("Open the debate").await.unwrap();
//!     assert_eq!(response, "The motion stands.");
//! }
//! ```

pub mod config;
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod resilient_provider;
pub mod scorer;
pub mod turn;

pub use config::{ConfigError, LlmConfig, ProviderKind, ScorerKind};
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};
pub use resilient_provider::{CircuitState, LlmCircuitConfig, ResilientProvider};
pub use scorer::{FeedbackScorer, HeuristicScorer, LlmScorer, ScoreCard, ScoreRequest};
pub use turn::{LlmTurnGenerator, TurnGenerator, TurnRequest};
