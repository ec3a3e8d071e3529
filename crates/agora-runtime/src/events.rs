//! Session events and their delivery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

use agora_core::{
    DebateError, FinalResult, ParticipantId, ParticipantKind, Phase, Role, SessionId, Speech,
};

/// Something participants of a session are told about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DebateEvent {
    PhaseChanged {
        phase: Phase,
        timestamp: DateTime<Utc>,
        automatic: bool,
    },
    SpeakerChanged {
        /// `None` when nobody holds the role whose turn it is
        current_speaker: Option<ParticipantId>,
        role: Role,
        speech_number: usize,
        total_speeches: usize,
        automatic: bool,
    },
    SpeechTimerStart {
        speaker: Option<ParticipantId>,
        /// Milliseconds
        time_remaining: u64,
        speech_number: usize,
    },
    NewMessage {
        id: Uuid,
        speaker_id: ParticipantId,
        role: Role,
        kind: ParticipantKind,
        content: String,
        order: u32,
        timestamp: DateTime<Utc>,
    },
    Feedback {
        speech_id: Uuid,
        score: f64,
        tags: Vec<String>,
    },
    DebateCompleted {
        final_result: FinalResult,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        participant_id: ParticipantId,
        role: Role,
        kind: ParticipantKind,
    },
    Error {
        code: String,
        reason: String,
    },
}

impl DebateEvent {
    pub fn new_message(speech: &Speech) -> Self {
        Self::NewMessage {
            id: speech.id,
            speaker_id: speech.speaker_id.clone(),
            role: speech.role.clone(),
            kind: speech.kind,
            content: speech.content.clone(),
            order: speech.order,
            timestamp: speech.timestamp,
        }
    }

    pub fn error(err: &DebateError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }

    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::SpeakerChanged { .. } => "speaker_changed",
            Self::SpeechTimerStart { .. } => "speech_timer_start",
            Self::NewMessage { .. } => "new_message",
            Self::Feedback { .. } => "feedback",
            Self::DebateCompleted { .. } => "debate_completed",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::Error { .. } => "error",
        }
    }
}

/// An event with its audience
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub session_id: SessionId,
    /// `None` for everyone in the session, otherwise a single participant
    pub recipient: Option<ParticipantId>,
    pub event: DebateEvent,
}

impl Envelope {
    pub fn to_all(session_id: SessionId, event: DebateEvent) -> Self {
        Self {
            session_id,
            recipient: None,
            event,
        }
    }

    pub fn to_participant(session_id: SessionId, participant: &str, event: DebateEvent) -> Self {
        Self {
            session_id,
            recipient: Some(participant.to_string()),
            event,
        }
    }

    /// Whether a subscriber identified as `viewer` should see this event
    pub fn visible_to(&self, viewer: Option<&str>) -> bool {
        match &self.recipient {
            None => true,
            Some(recipient) => viewer == Some(recipient.as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Event channel closed: {0}")]
    Closed(String),
}

/// Delivers events to the participants of a session
pub trait Broadcaster: Send + Sync + std::fmt::Debug {
    /// Publish an event; returns how many subscribers received it
    fn publish(&self, envelope: Envelope) -> Result<usize, BroadcastError>;

    /// Drop all delivery state for a session
    fn close(&self, session_id: SessionId);
}

/// Publish `envelope`, logging instead of failing. Delivery problems never undo
/// a change that has already been persisted.
pub fn deliver(broadcaster: &dyn Broadcaster, envelope: Envelope) {
    let session_id = envelope.session_id;
    let name = envelope.event.name();
    match broadcaster.publish(envelope) {
        Ok(receivers) => trace!(session_id = %session_id, event = name, receivers, "Event published"),
        Err(e) => warn!(session_id = %session_id, event = name, error = %e, "Event delivery failed"),
    }
}

/// In-process [`Broadcaster`] with one tokio broadcast channel per session
#[derive(Debug)]
pub struct ChannelBroadcaster {
    channels: Mutex<HashMap<SessionId, broadcast::Sender<Envelope>>>,
    capacity: usize,
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, broadcast::Sender<Envelope>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every event published for `session_id` from now on
    pub fn subscribe(&self, session_id: SessionId) -> broadcast::Receiver<Envelope> {
        self.lock()
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, session_id: SessionId) -> usize {
        self.lock()
            .get(&session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, envelope: Envelope) -> Result<usize, BroadcastError> {
        let channels = self.lock();
        match channels.get(&envelope.session_id) {
            // No receivers is not a failure: nobody is listening right now
            Some(tx) => Ok(tx.send(envelope).unwrap_or(0)),
            None => Ok(0),
        }
    }

    fn close(&self, session_id: SessionId) {
        self.lock().remove(&session_id);
    }
}
