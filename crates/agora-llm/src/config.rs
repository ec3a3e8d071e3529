//! LLM configuration
//!
//! Picks the provider behind agent speeches and the scorer behind feedback.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::provider::LlmProvider;
use crate::resilient_provider::{LlmCircuitConfig, ResilientProvider};
use crate::scorer::{FeedbackScorer, HeuristicScorer, LlmScorer};
use crate::turn::{LlmTurnGenerator, TurnGenerator};

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Backend that writes agent speeches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Invalid(format!("unknown LLM provider '{}'", other))),
        }
    }
}

/// Which scorer produces feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    Heuristic,
    Llm,
}

impl FromStr for ScorerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "llm" => Ok(Self::Llm),
            other => Err(ConfigError::Invalid(format!("unknown scorer '{}'", other))),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider (env: AGORA_LLM_PROVIDER, default: mock)
    pub provider: ProviderKind,
    /// Ollama base URL (env: OLLAMA_URL, default: http://localhost:11434)
    pub ollama_url: String,
    /// Model name (env: AGORA_MODEL)
    pub model: String,
    /// Sampling temperature for speeches (env: AGORA_TEMPERATURE)
    pub temperature: f32,
    /// Scorer (env: AGORA_SCORER, default: heuristic)
    pub scorer: ScorerKind,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.8,
            scorer: ScorerKind::Heuristic,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            provider: match env::var("AGORA_LLM_PROVIDER") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.provider,
            },
            ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: env::var("AGORA_MODEL").unwrap_or(defaults.model),
            temperature: match env::var("AGORA_TEMPERATURE") {
                Ok(v) => v.parse().map_err(|_| {
                    ConfigError::Invalid(format!("AGORA_TEMPERATURE '{}' is not a number", v))
                })?,
                Err(_) => defaults.temperature,
            },
            scorer: match env::var("AGORA_SCORER") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.scorer,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0..=2",
                self.temperature
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("AGORA_MODEL".to_string()));
        }
        // The mock provider echoes prompts and never returns a score card
        if self.scorer == ScorerKind::Llm && self.provider == ProviderKind::Mock {
            return Err(ConfigError::Invalid(
                "the llm scorer needs a real provider, not mock".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured provider. Network providers sit behind a circuit breaker.
    pub fn build_provider(&self) -> Arc<dyn LlmProvider> {
        match self.provider {
            ProviderKind::Mock => Arc::new(MockProvider::echo()),
            ProviderKind::Ollama => Arc::new(ResilientProvider::new(
                OllamaProvider::with_url(&self.ollama_url, &self.model),
                LlmCircuitConfig::conservative(),
            )),
        }
    }

    pub fn build_generator(&self, provider: Arc<dyn LlmProvider>) -> Arc<dyn TurnGenerator> {
        Arc::new(LlmTurnGenerator::new(provider).with_temperature(self.temperature))
    }

    pub fn build_scorer(&self, provider: Arc<dyn LlmProvider>) -> Arc<dyn FeedbackScorer> {
        match self.scorer {
            ScorerKind::Heuristic => Arc::new(HeuristicScorer::new()),
            ScorerKind::Llm => Arc::new(LlmScorer::new(provider)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, ProviderKind::Mock);
        assert_eq!(config.scorer, ScorerKind::Heuristic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!(" llm ".parse::<ScorerKind>().unwrap(), ScorerKind::Llm);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_rejects_wild_temperature() {
        let config = LlmConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_llm_scorer_needs_real_provider() {
        let config = LlmConfig {
            scorer: ScorerKind::Llm,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LlmConfig {
            provider: ProviderKind::Ollama,
            scorer: ScorerKind::Llm,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builds_configured_parts() {
        let config = LlmConfig {
            provider: ProviderKind::Ollama,
            ..Default::default()
        };
        let provider = config.build_provider();
        assert_eq!(provider.name(), "ollama");
        let _generator = config.build_generator(provider.clone());
        let _scorer = config.build_scorer(provider);
    }
}
