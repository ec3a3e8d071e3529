//! Error types shared by every layer that mutates a debate session

use thiserror::Error;

use crate::phase::Phase;
use crate::session::{Role, SessionId};

/// Errors raised while validating or applying an operation on a session.
///
/// Validation variants never leave a partially mutated session behind: callers
/// work on a copy and only persist it once every check has passed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DebateError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Invalid timing configuration: {0}")]
    InvalidTiming(String),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Operation requires phase {expected}, session is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Need at least {required} occupied roles, found {occupied}")]
    NotEnoughParticipants { occupied: usize, required: usize },

    #[error("Role '{0}' is not part of this debate")]
    UnknownRole(Role),

    #[error("Role '{role}' is already held by {holder}")]
    RoleTaken { role: Role, holder: String },

    #[error("Participant {participant} already holds role '{role}'")]
    AlreadySeated { participant: String, role: Role },

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Out of turn: {speaker} cannot speak now (current role: {expected})")]
    OutOfTurn { speaker: String, expected: String },

    #[error("Speech content is empty")]
    EmptySpeech,

    #[error("Speech exceeds {limit} characters")]
    SpeechTooLong { limit: usize },

    #[error("Score {0} is outside 0..=10")]
    InvalidScore(f64),

    #[error("Session is completed and can no longer change")]
    SessionCompleted,

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Finalization failed: {0}")]
    Finalization(String),
}

impl DebateError {
    /// Whether this error came from rejecting caller input rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Finalization(_))
    }

    /// Short machine-readable code used in `error` events and API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidSession(_) => "INVALID_SESSION",
            Self::InvalidTiming(_) => "INVALID_TIMING",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::WrongPhase { .. } => "WRONG_PHASE",
            Self::NotEnoughParticipants { .. } => "NOT_ENOUGH_PARTICIPANTS",
            Self::UnknownRole(_) => "UNKNOWN_ROLE",
            Self::RoleTaken { .. } => "ROLE_TAKEN",
            Self::AlreadySeated { .. } => "ALREADY_SEATED",
            Self::UnknownParticipant(_) => "UNKNOWN_PARTICIPANT",
            Self::OutOfTurn { .. } => "OUT_OF_TURN",
            Self::EmptySpeech => "EMPTY_SPEECH",
            Self::SpeechTooLong { .. } => "SPEECH_TOO_LONG",
            Self::InvalidScore(_) => "INVALID_SCORE",
            Self::SessionCompleted => "SESSION_COMPLETED",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::Finalization(_) => "FINALIZATION_FAILED",
        }
    }
}
