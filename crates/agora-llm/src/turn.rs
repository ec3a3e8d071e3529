//! Speech generation for agent participants

use async_trait::async_trait;
use std::sync::Arc;

use agora_core::session::MAX_SPEECH_CHARS;
use agora_core::{Role, Speech};

use crate::provider::{LlmError, LlmProvider, LlmRequest};

/// Everything a generator sees when writing one turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub role: Role,
    pub motion: String,
    /// Most recent speeches, oldest first
    pub history: Vec<Speech>,
    /// 1-based number of the speech being written
    pub speech_number: usize,
    pub total_speeches: usize,
}

impl TurnRequest {
    /// Whether this turn is in the rebuttal round
    pub fn is_rebuttal(&self) -> bool {
        self.speech_number * 2 > self.total_speeches
    }
}

/// Produces speech text for an agent's turn
#[async_trait]
pub trait TurnGenerator: Send + Sync + std::fmt::Debug {
    async fn generate(&self, request: &TurnRequest) -> Result<String, LlmError>;
}

/// [`TurnGenerator`] that prompts an [`LlmProvider`]
#[derive(Debug, Clone)]
pub struct LlmTurnGenerator {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmTurnGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: 0.8,
            max_tokens: 600,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn system_prompt(request: &TurnRequest) -> String {
        format!(
            "You are a competitive debater arguing for the {} side. Stay on the motion, \
             answer your opponents directly and keep the speech under 250 words. \
             Reply with the speech text only.",
            request.role
        )
    }

    fn user_prompt(request: &TurnRequest) -> String {
        let mut prompt = format!(
            "Role: {}\nMotion: {}\nSpeech {} of {}{}\n",
            request.role,
            request.motion,
            request.speech_number,
            request.total_speeches,
            if request.is_rebuttal() {
                " (rebuttal)"
            } else {
                " (opening)"
            }
        );
        if request.history.is_empty() {
            prompt.push_str("\nYou speak first. Open the debate.\n");
        } else {
            prompt.push_str("\nTranscript so far:\n");
            for speech in &request.history {
                prompt.push_str(&format!("[{}] {}\n", speech.role, speech.content));
            }
        }
        prompt
    }
}

#[async_trait]
impl TurnGenerator for LlmTurnGenerator {
    async fn generate(&self, request: &TurnRequest) -> Result<String, LlmError> {
        let llm_request =
            LlmRequest::with_role(&Self::system_prompt(request), &Self::user_prompt(request))
                .temperature(self.temperature)
                .max_tokens(self.max_tokens);

        let response = self.provider.complete(llm_request).await?;
        let content = response.content.trim();
        if content.is_empty() {
            return Err(LlmError::InvalidResponse("empty speech".to_string()));
        }
        Ok(content.chars().take(MAX_SPEECH_CHARS).collect())
    }
}
