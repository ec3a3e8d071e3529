//! Debate session aggregate
//!
//! [`DebateSession`] is the single document the store persists per debate. Every
//! mutation goes through a method here so the invariants (one participant per
//! role, contiguous speech order, frozen after completion) hold no matter which
//! component drives the change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::error::DebateError;
use crate::leaderboard::LeaderboardEntry;
use crate::phase::Phase;
use crate::result::FinalResult;
use crate::scheduler::TurnScheduler;
use crate::speech::{Feedback, Speech};
use crate::timing::TimingConfig;

/// Unique identifier for a session
pub type SessionId = Uuid;

/// Opaque participant identifier supplied by the caller
pub type ParticipantId = String;

/// Minimum number of distinct occupied roles before preparation can start
pub const MIN_OCCUPIED_ROLES: usize = 2;

/// Upper bound on a single speech
pub const MAX_SPEECH_CHARS: usize = 8_000;

/// Upper bound on a motion
pub const MAX_MOTION_CHARS: usize = 2_000;

/// A debating side, e.g. `proposition` or `opposition`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create a role from its key (normalized to trimmed lowercase)
    pub fn new(key: &str) -> Self {
        Self(key.trim().to_lowercase())
    }

    pub fn proposition() -> Self {
        Self::new("proposition")
    }

    pub fn opposition() -> Self {
        Self::new("opposition")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Who authors a participant's speeches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Human,
    Agent,
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => f.write_str("human"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// A seated participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
    pub kind: ParticipantKind,
    pub joined_at: DateTime<Utc>,
}

/// Result of a join request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Participant took a free seat
    Joined,
    /// Participant already held this role; nothing changed
    AlreadySeated,
}

/// The aggregate root of a debate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    /// Unique ID, immutable
    pub id: SessionId,
    /// The motion under debate, immutable
    pub motion: String,
    /// Role rotation; fixed at creation
    pub speaking_order: Vec<Role>,
    /// Seated participants in join order
    pub participants: Vec<Participant>,
    /// Canonical lifecycle phase
    pub phase: Phase,
    /// Phase the session was in when it was paused
    #[serde(default)]
    pub paused_from: Option<Phase>,
    /// Position in the turn sequence (0-based, `< 2 * speaking_order.len()`)
    pub current_speaker_index: usize,
    /// Append-only transcript
    pub speeches: Vec<Speech>,
    /// At most one entry per speech, in arrival order
    #[serde(default)]
    pub feedback: Vec<Feedback>,
    /// Running score aggregates keyed by participant
    #[serde(default)]
    pub leaderboard: BTreeMap<ParticipantId, LeaderboardEntry>,
    /// Clock settings, validated at creation
    pub timing: TimingConfig,
    /// Bumped whenever a timer-relevant fact changes (phase or speaker)
    #[serde(default)]
    pub clock_epoch: u64,
    pub phase_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present once completed
    #[serde(default)]
    pub final_result: Option<FinalResult>,
}

impl DebateSession {
    /// Create a session whose speaking order is exactly `speaking_order`.
    pub fn new(
        motion: &str,
        speaking_order: Vec<Role>,
        timing: TimingConfig,
    ) -> Result<Self, DebateError> {
        let motion = motion.trim();
        if motion.is_empty() {
            return Err(DebateError::InvalidSession("motion is empty".to_string()));
        }
        if motion.chars().count() > MAX_MOTION_CHARS {
            return Err(DebateError::InvalidSession(format!(
                "motion exceeds {} characters",
                MAX_MOTION_CHARS
            )));
        }
        if speaking_order.len() < MIN_OCCUPIED_ROLES {
            return Err(DebateError::InvalidSession(format!(
                "a debate needs at least {} roles",
                MIN_OCCUPIED_ROLES
            )));
        }
        let distinct: BTreeSet<&Role> = speaking_order.iter().collect();
        if distinct.len() != speaking_order.len() {
            return Err(DebateError::InvalidSession(
                "speaking order repeats a role".to_string(),
            ));
        }
        if speaking_order.iter().any(|r| r.as_str().is_empty()) {
            return Err(DebateError::InvalidSession("role key is empty".to_string()));
        }
        timing.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            motion: motion.to_string(),
            speaking_order,
            participants: Vec::new(),
            phase: Phase::Setup,
            paused_from: None,
            current_speaker_index: 0,
            speeches: Vec::new(),
            feedback: Vec::new(),
            leaderboard: BTreeMap::new(),
            timing,
            clock_epoch: 0,
            phase_changed_at: now,
            created_at: now,
            updated_at: now,
            final_result: None,
        })
    }

    /// Create a session from an unordered role set; turns rotate alphabetically by role key.
    pub fn with_role_set(
        motion: &str,
        roles: impl IntoIterator<Item = Role>,
        timing: TimingConfig,
    ) -> Result<Self, DebateError> {
        Self::new(motion, TurnScheduler::alphabetical(roles), timing)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participant seated in `role`, if any
    pub fn holder_of(&self, role: &Role) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.role == role)
    }

    /// Number of distinct roles with a seated participant
    pub fn occupied_roles(&self) -> usize {
        self.participants
            .iter()
            .map(|p| &p.role)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Seat a participant.
    ///
    /// New seats are only handed out during setup. Re-joining one's own role is
    /// accepted in any phase so reconnecting clients need no special casing.
    pub fn join(
        &mut self,
        participant_id: &str,
        role: &Role,
        kind: ParticipantKind,
    ) -> Result<JoinOutcome, DebateError> {
        if self.is_completed() {
            return Err(DebateError::SessionCompleted);
        }
        if participant_id.trim().is_empty() {
            return Err(DebateError::InvalidSession(
                "participant id is empty".to_string(),
            ));
        }
        if !self.speaking_order.contains(role) {
            return Err(DebateError::UnknownRole(role.clone()));
        }
        if let Some(existing) = self.participant(participant_id) {
            if &existing.role == role {
                return Ok(JoinOutcome::AlreadySeated);
            }
            return Err(DebateError::AlreadySeated {
                participant: participant_id.to_string(),
                role: existing.role.clone(),
            });
        }
        if self.phase != Phase::Setup {
            return Err(DebateError::WrongPhase {
                expected: Phase::Setup,
                actual: self.phase,
            });
        }
        if let Some(holder) = self.holder_of(role) {
            return Err(DebateError::RoleTaken {
                role: role.clone(),
                holder: holder.id.clone(),
            });
        }

        self.participants.push(Participant {
            id: participant_id.to_string(),
            role: role.clone(),
            kind,
            joined_at: Utc::now(),
        });
        self.touch();
        Ok(JoinOutcome::Joined)
    }

    /// Total number of turns in this debate
    pub fn total_turns(&self) -> usize {
        TurnScheduler::total_speeches(&self.speaking_order)
    }

    /// Role whose turn it is; only meaningful during the debate phase
    pub fn current_role(&self) -> Option<&Role> {
        if self.phase != Phase::Debate {
            return None;
        }
        TurnScheduler::role_at(&self.speaking_order, self.current_speaker_index)
    }

    /// Participant whose turn it is
    pub fn current_speaker(&self) -> Option<&Participant> {
        self.current_role().and_then(|role| self.holder_of(role))
    }

    /// Check that `speaker_id` may submit right now
    pub fn check_turn(&self, speaker_id: &str) -> Result<&Participant, DebateError> {
        if self.is_completed() {
            return Err(DebateError::SessionCompleted);
        }
        if self.phase != Phase::Debate {
            return Err(DebateError::WrongPhase {
                expected: Phase::Debate,
                actual: self.phase,
            });
        }
        let participant = self
            .participant(speaker_id)
            .ok_or_else(|| DebateError::UnknownParticipant(speaker_id.to_string()))?;
        match self.current_role() {
            Some(role) if role == &participant.role => Ok(participant),
            current => Err(DebateError::OutOfTurn {
                speaker: speaker_id.to_string(),
                expected: current
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            }),
        }
    }

    /// Append a speech for the current turn.
    ///
    /// `order` is always `speeches.len() + 1`, which keeps the transcript contiguous.
    pub fn append_speech(
        &mut self,
        speaker_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Speech, DebateError> {
        let participant = self.check_turn(speaker_id)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(DebateError::EmptySpeech);
        }
        if content.chars().count() > MAX_SPEECH_CHARS {
            return Err(DebateError::SpeechTooLong {
                limit: MAX_SPEECH_CHARS,
            });
        }

        let speech = Speech {
            id: Uuid::new_v4(),
            session_id: self.id,
            speaker_id: participant.id.clone(),
            role: participant.role.clone(),
            order: self.speeches.len() as u32 + 1,
            content: content.to_string(),
            timestamp: at,
            kind: participant.kind,
        };
        self.speeches.push(speech.clone());
        self.touch();
        Ok(speech)
    }

    pub fn speech(&self, speech_id: Uuid) -> Option<&Speech> {
        self.speeches.iter().find(|s| s.id == speech_id)
    }

    pub fn feedback_for(&self, speech_id: Uuid) -> Option<&Feedback> {
        self.feedback.iter().find(|f| f.speech_id == speech_id)
    }

    /// Attach feedback to its speech and fold the score into the leaderboard.
    ///
    /// Returns `Ok(false)` when the speech already has feedback.
    pub fn record_feedback(&mut self, feedback: Feedback) -> Result<bool, DebateError> {
        if self.is_completed() {
            return Err(DebateError::SessionCompleted);
        }
        let speaker_id = self
            .speech(feedback.speech_id)
            .map(|s| s.speaker_id.clone())
            .ok_or_else(|| {
                DebateError::InvalidSession(format!("unknown speech {}", feedback.speech_id))
            })?;
        if self.feedback_for(feedback.speech_id).is_some() {
            return Ok(false);
        }

        self.leaderboard
            .entry(speaker_id)
            .or_default()
            .record(feedback.score);
        self.feedback.push(feedback);
        self.touch();
        Ok(true)
    }

    /// Speeches authored by one participant, in order
    pub fn speeches_by<'a>(&'a self, participant_id: &'a str) -> impl Iterator<Item = &'a Speech> {
        self.speeches
            .iter()
            .filter(move |s| s.speaker_id == participant_id)
    }

    /// The last `n` speeches (fewer if the transcript is shorter)
    pub fn recent_speeches(&self, n: usize) -> &[Speech] {
        let start = self.speeches.len().saturating_sub(n);
        &self.speeches[start..]
    }

    /// Where a paused session goes back to
    pub fn resume_target(&self) -> Phase {
        if self.speeches.is_empty() {
            Phase::Preparation
        } else {
            Phase::Debate
        }
    }

    /// Move to `to`, recording pause bookkeeping and invalidating pending timers.
    ///
    /// Legality is checked by [`crate::PhaseRules`]; this only applies the change.
    pub fn enter_phase(&mut self, to: Phase, at: DateTime<Utc>) {
        if to == Phase::Paused {
            self.paused_from = Some(self.phase);
        } else {
            self.paused_from = None;
        }
        self.phase = to;
        self.phase_changed_at = at;
        self.clock_epoch += 1;
        self.touch();
    }

    /// Advance to turn `index` and invalidate the previous speaker's timer
    pub fn advance_to(&mut self, index: usize) {
        self.current_speaker_index = index;
        self.clock_epoch += 1;
        self.touch();
    }

    /// Restart the current speaker's window without moving the index
    pub fn restart_clock(&mut self) {
        self.clock_epoch += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
