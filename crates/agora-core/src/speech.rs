//! Speeches and their feedback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::DebateError;
use crate::session::{ParticipantId, ParticipantKind, Role, SessionId};

/// Highest score a scorer may award
pub const MAX_SCORE: f64 = 10.0;

/// One turn of the debate. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    pub id: Uuid,
    pub session_id: SessionId,
    pub speaker_id: ParticipantId,
    pub role: Role,
    /// 1-based position in the transcript
    pub order: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ParticipantKind,
}

/// Advisory score for a single speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub speech_id: Uuid,
    pub score: f64,
    pub tags: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl Feedback {
    /// Build feedback, rejecting scores outside `0..=MAX_SCORE`
    pub fn new(
        speech_id: Uuid,
        score: f64,
        tags: impl IntoIterator<Item = String>,
    ) -> Result<Self, DebateError> {
        if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
            return Err(DebateError::InvalidScore(score));
        }
        Ok(Self {
            speech_id,
            score,
            tags: tags.into_iter().collect(),
            timestamp: Utc::now(),
        })
    }
}
