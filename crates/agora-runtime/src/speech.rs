//! Speech processing: turn bookkeeping and asynchronous feedback

use std::sync::Arc;
use tracing::{debug, warn};

use agora_core::{DebateSession, Feedback, Speech, TurnScheduler};
use agora_llm::{FeedbackScorer, ScoreRequest};

/// What happens after a turn is used up (by a speech or a forfeit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Move to turn `index`
    Advance { index: usize },
    /// No turn remains; the debate moves to evaluation
    EndDebate,
}

impl NextStep {
    pub fn after(session: &DebateSession) -> Self {
        match TurnScheduler::next_index(&session.speaking_order, session.current_speaker_index) {
            Some(index) => Self::Advance { index },
            None => Self::EndDebate,
        }
    }
}

/// Turns submitted speeches into feedback
#[derive(Debug, Clone)]
pub struct SpeechProcessor {
    scorer: Arc<dyn FeedbackScorer>,
}

impl SpeechProcessor {
    pub fn new(scorer: Arc<dyn FeedbackScorer>) -> Self {
        Self { scorer }
    }

    /// Build the scorer input for `speech`, pairing it with the speech it answers
    pub fn score_request(session: &DebateSession, speech: &Speech) -> ScoreRequest {
        let previous = session
            .speeches
            .iter()
            .rev()
            .filter(|s| s.order < speech.order)
            .find(|s| s.role != speech.role)
            .cloned();
        ScoreRequest {
            motion: session.motion.clone(),
            speech: speech.clone(),
            previous,
        }
    }

    /// Score a speech. A failing scorer means the speech gets no feedback;
    /// the failure is logged and never retried.
    pub async fn score(&self, request: ScoreRequest) -> Option<Feedback> {
        let speech_id = request.speech.id;
        let card = match self.scorer.score(&request).await {
            Ok(card) => card,
            Err(e) => {
                warn!(speech_id = %speech_id, error = %e, "Scorer failed, speech stays unscored");
                return None;
            }
        };
        match Feedback::new(speech_id, card.score, card.tags) {
            Ok(feedback) => {
                debug!(speech_id = %speech_id, score = feedback.score, "Speech scored");
                Some(feedback)
            }
            Err(e) => {
                warn!(speech_id = %speech_id, error = %e, "Scorer returned an invalid score");
                None
            }
        }
    }
}
