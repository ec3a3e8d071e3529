//! AI turn agent: writes speeches for agent participants

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use agora_core::{DebateSession, TurnScheduler};
use agora_llm::{TurnGenerator, TurnRequest};

use crate::config::RuntimeConfig;
use crate::fallback;

/// A composed agent speech
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpeech {
    pub content: String,
    /// Whether the deterministic fallback had to stand in for the generator
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct AiTurnAgent {
    generator: Arc<dyn TurnGenerator>,
    config: RuntimeConfig,
}

impl AiTurnAgent {
    pub fn new(generator: Arc<dyn TurnGenerator>, config: RuntimeConfig) -> Self {
        Self { generator, config }
    }

    /// Randomized pause before speaking, within the configured bounds
    pub fn delay(&self) -> Duration {
        let range = self.config.agent_delay_ms();
        if range.start() >= range.end() {
            return Duration::from_millis(*range.start());
        }
        Duration::from_millis(rand::rng().random_range(range))
    }

    /// Generator input for the current turn, if the session is mid-debate
    pub fn turn_request(&self, session: &DebateSession) -> Option<TurnRequest> {
        let role = session.current_role()?.clone();
        Some(TurnRequest {
            role,
            motion: session.motion.clone(),
            history: session
                .recent_speeches(self.config.history_window)
                .to_vec(),
            speech_number: TurnScheduler::speech_number(session.current_speaker_index),
            total_speeches: session.total_turns(),
        })
    }

    /// Produce speech content. Never fails: once the generator has used up its
    /// attempts the deterministic fallback is used instead.
    pub async fn compose(&self, request: &TurnRequest) -> AgentSpeech {
        let attempts = self.config.agent_attempts.max(1);
        for attempt in 1..=attempts {
            match self.generator.generate(request).await {
                Ok(content) => {
                    debug!(role = %request.role, attempt, "Generator produced a speech");
                    return AgentSpeech {
                        content,
                        used_fallback: false,
                    };
                }
                Err(e) => {
                    warn!(role = %request.role, attempt, attempts, error = %e, "Generator attempt failed");
                }
            }
        }

        metrics::counter!("agora_generator_fallbacks_total").increment(1);
        warn!(role = %request.role, "Generator exhausted, using fallback speech");
        AgentSpeech {
            content: fallback::compose(request),
            used_fallback: true,
        }
    }
}
