//! Resilient LLM provider wrapper with circuit breaker pattern
//!
//! Once an upstream keeps failing, calls fail fast with [`LlmError::NotAvailable`]
//! so an agent turn drops straight to its fallback instead of waiting on timeouts.
//!
//! - Three states: Closed (normal), Open (failing fast), Half-Open (testing recovery)
//! - Configurable thresholds and timeouts
//! - Automatic recovery testing after cooldown period

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::provider::{LlmError, LlmProvider, LlmRequest, LlmResponse};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Circuit tripped - requests fail immediately
    Open,
    /// Testing recovery - limited requests allowed
    HalfOpen,
}

/// Configuration for the LLM circuit breaker
#[derive(Debug, Clone)]
pub struct LlmCircuitConfig {
    /// Number of failures before opening circuit
    pub failure_threshold: u32,
    /// Number of successes in half-open to close circuit
    pub success_threshold: u32,
    /// Time to wait before testing recovery
    pub reset_timeout: Duration,
}

impl Default for LlmCircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl LlmCircuitConfig {
    /// Conservative settings for production LLM providers
    pub fn conservative() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Wraps any provider with circuit breaker resilience
#[derive(Debug)]
pub struct ResilientProvider<P: LlmProvider + ?Sized> {
    inner: Arc<P>,
    config: LlmCircuitConfig,
    cb_state: RwLock<CircuitBreakerState>,
    total_requests: AtomicU64,
    total_failures: AtomicU64,
    circuit_opens: AtomicU32,
}

impl<P: LlmProvider> ResilientProvider<P> {
    /// Create a resilient wrapper around an LLM provider
    pub fn new(provider: P, config: LlmCircuitConfig) -> Self {
        Self::from_arc(Arc::new(provider), config)
    }

    /// Create with conservative config
    pub fn wrap(provider: P) -> Self {
        Self::new(provider, LlmCircuitConfig::conservative())
    }
}

impl<P: LlmProvider + ?Sized> ResilientProvider<P> {
    /// Wrap an already shared provider
    pub fn from_arc(inner: Arc<P>, config: LlmCircuitConfig) -> Self {
        Self {
            inner,
            config,
            cb_state: RwLock::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
            total_requests: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            circuit_opens: AtomicU32::new(0),
        }
    }

    /// Get current circuit state
    pub async fn circuit_state(&self) -> CircuitState {
        self.cb_state.read().await.state
    }

    /// (requests, failures, circuit opens)
    pub fn stats(&self) -> (u64, u64, u32) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
            self.circuit_opens.load(Ordering::Relaxed),
        )
    }

    async fn record_success(&self) {
        let mut state = self.cb_state.write().await;
        state.failure_count = 0;

        if state.state == CircuitState::HalfOpen {
            state.success_count += 1;
            if state.success_count >= self.config.success_threshold {
                state.state = CircuitState::Closed;
                state.success_count = 0;
                tracing::info!(provider = %self.inner.name(), "Circuit closed - provider recovered");
            }
        }
    }

    async fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut state = self.cb_state.write().await;
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());

        if state.state == CircuitState::HalfOpen {
            state.state = CircuitState::Open;
            self.circuit_opens.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(provider = %self.inner.name(), "Circuit re-opened - recovery test failed");
        } else if state.state == CircuitState::Closed
            && state.failure_count >= self.config.failure_threshold
        {
            state.state = CircuitState::Open;
            self.circuit_opens.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                provider = %self.inner.name(),
                failures = state.failure_count,
                "Circuit opened - failure threshold exceeded"
            );
        }
    }

    async fn check_circuit(&self) -> Result<(), LlmError> {
        let mut state = self.cb_state.write().await;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                if let Some(last_failure) = state.last_failure {
                    if last_failure.elapsed() >= self.config.reset_timeout {
                        state.state = CircuitState::HalfOpen;
                        state.success_count = 0;
                        tracing::info!(provider = %self.inner.name(), "Circuit half-open - testing recovery");
                        return Ok(());
                    }
                }
                Err(LlmError::NotAvailable)
            }
        }
    }
}

#[async_trait]
impl<P: LlmProvider + ?Sized + 'static> LlmProvider for ResilientProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.check_circuit().await.is_ok() && self.inner.is_available().await
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        self.check_circuit().await?;

        match self.inner.complete(request).await {
            Ok(response) => {
                self.record_success().await;
                Ok(response)
            }
            Err(e) => {
                // Malformed output is the model's fault, not the upstream's
                if e.is_transient() {
                    self.record_failure().await;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    fn quick() -> LlmCircuitConfig {
        LlmCircuitConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_resilient_provider_passes_through() {
        let resilient = ResilientProvider::wrap(MockProvider::constant("ok"));
        assert_eq!(resilient.ask("test").await.unwrap(), "ok");
        assert_eq!(resilient.circuit_state().await, CircuitState::Closed);
        assert_eq!(resilient.name(), "mock");
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let resilient = ResilientProvider::new(
            MockProvider::failing().with_latency(Duration::ZERO),
            quick(),
        );
        assert!(resilient.ask("a").await.is_err());
        assert!(resilient.ask("b").await.is_err());
        assert_eq!(resilient.circuit_state().await, CircuitState::Open);

        assert_eq!(resilient.ask("c").await, Err(LlmError::NotAvailable));
        // The third call never reached the inner provider
        assert_eq!(resilient.inner.calls(), 2);
        assert_eq!(resilient.stats(), (3, 2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_recovers() {
        let resilient = ResilientProvider::new(
            MockProvider::flaky(2, "back").with_latency(Duration::ZERO),
            quick(),
        );
        let _ = resilient.ask("a").await;
        let _ = resilient.ask("b").await;
        assert_eq!(resilient.circuit_state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(resilient.ask("c").await.unwrap(), "back");
        assert_eq!(resilient.circuit_state().await, CircuitState::Closed);
    }
}
