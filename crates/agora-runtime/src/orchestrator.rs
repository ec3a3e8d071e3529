//! Debate orchestrator: the phase state machine and every inbound trigger
//!
//! Each read-modify-write of a session runs inside that session's lane, so
//! triggers, timer callbacks and agent turns for one session are applied one at
//! a time while different sessions proceed independently. Everything is
//! persisted before it is announced.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use agora_core::{
    DebateError, DebateSession, FinalResult, JoinOutcome, ParticipantKind, Phase, PhaseRules,
    Role, SessionId, Speech, TimingConfig, Transition, TransitionCheck, Trigger, TurnScheduler,
};
use agora_llm::{FeedbackScorer, TurnGenerator};
use agora_persist::{SessionFilter, SessionStore};

use crate::agent::AiTurnAgent;
use crate::config::RuntimeConfig;
use crate::events::{deliver, Broadcaster, DebateEvent, Envelope};
use crate::finalizer::SessionFinalizer;
use crate::registry::{SessionRegistry, SessionSlot};
use crate::speech::{NextStep, SpeechProcessor};
use crate::timers::{TimerKind, TimerRegistry};

/// Parameters for a new session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub motion: String,
    /// Explicit rotation, kept as given
    #[serde(default)]
    pub speaking_order: Option<Vec<Role>>,
    /// Unordered role set, rotated alphabetically
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
}

impl NewSession {
    pub fn new(motion: &str) -> Self {
        Self {
            motion: motion.to_string(),
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_speaking_order(mut self, order: Vec<Role>) -> Self {
        self.speaking_order = Some(order);
        self
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = Some(roles);
        self
    }

    fn build(self) -> Result<DebateSession, DebateError> {
        let timing = self.timing.unwrap_or_default();
        match (self.speaking_order, self.roles) {
            (Some(_), Some(_)) => Err(DebateError::InvalidSession(
                "give either a speaking order or a role set, not both".to_string(),
            )),
            (Some(order), None) => DebateSession::new(&self.motion, order, timing),
            (None, Some(roles)) => DebateSession::with_role_set(&self.motion, roles, timing),
            (None, None) => DebateSession::new(
                &self.motion,
                vec![Role::proposition(), Role::opposition()],
                timing,
            ),
        }
    }
}

/// What a timer or agent turn was scheduled against. A callback whose stamp no
/// longer matches the stored session does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClockStamp {
    phase: Phase,
    speaker_index: usize,
    clock_epoch: u64,
}

impl ClockStamp {
    fn of(session: &DebateSession) -> Self {
        Self {
            phase: session.phase,
            speaker_index: session.current_speaker_index,
            clock_epoch: session.clock_epoch,
        }
    }

    fn matches(&self, session: &DebateSession) -> bool {
        *self == Self::of(session)
    }
}

#[derive(Debug)]
struct Inner {
    store: Arc<dyn SessionStore>,
    broadcaster: Arc<dyn Broadcaster>,
    timers: TimerRegistry,
    sessions: Arc<SessionRegistry>,
    processor: SpeechProcessor,
    agent: AiTurnAgent,
    finalizer: SessionFinalizer,
    config: RuntimeConfig,
}

/// Drives debate sessions through their lifecycle.
///
/// Cheap to clone; clones share all state.
#[derive(Debug, Clone)]
pub struct DebateOrchestrator {
    inner: Arc<Inner>,
}

impl DebateOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        broadcaster: Arc<dyn Broadcaster>,
        generator: Arc<dyn TurnGenerator>,
        scorer: Arc<dyn FeedbackScorer>,
        config: RuntimeConfig,
    ) -> Self {
        let timers = TimerRegistry::new();
        let sessions = Arc::new(SessionRegistry::new());
        let finalizer = SessionFinalizer::new(
            store.clone(),
            broadcaster.clone(),
            timers.clone(),
            sessions.clone(),
            config.feedback_grace,
        );
        Self {
            inner: Arc::new(Inner {
                store,
                broadcaster,
                timers,
                sessions,
                processor: SpeechProcessor::new(scorer),
                agent: AiTurnAgent::new(generator, config.clone()),
                finalizer,
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.inner.timers
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub async fn is_healthy(&self) -> bool {
        self.inner.store.is_healthy().await
    }

    // =========================================================================
    // Session management
    // =========================================================================

    pub async fn create_session(&self, params: NewSession) -> Result<DebateSession, DebateError> {
        let session = params.build()?;
        self.inner.store.create(&session).await?;
        info!(
            session_id = %session.id,
            roles = session.speaking_order.len(),
            "Session created"
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        self.inner
            .store
            .get(session_id)
            .await?
            .ok_or(DebateError::SessionNotFound(session_id))
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<DebateSession>, DebateError> {
        Ok(self.inner.store.query(filter).await?)
    }

    /// Delete a session and cancel everything still running for it
    pub async fn delete_session(&self, session_id: SessionId) -> Result<(), DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let deleted = {
            let _lane = slot.enter().await;
            let deleted = self.inner.store.delete(session_id).await?;
            self.inner.timers.cancel_all(session_id);
            deleted
        };
        self.inner.sessions.remove(session_id);
        self.inner.broadcaster.close(session_id);

        if deleted {
            info!(session_id = %session_id, "Session deleted");
            Ok(())
        } else {
            Err(DebateError::SessionNotFound(session_id))
        }
    }

    // =========================================================================
    // Inbound triggers
    // =========================================================================

    /// Seat a participant. Re-joining one's own role is a silent no-op.
    pub async fn join(
        &self,
        session_id: SessionId,
        participant_id: &str,
        role: &Role,
        kind: ParticipantKind,
    ) -> Result<JoinOutcome, DebateError> {
        let result = self.try_join(session_id, participant_id, role, kind).await;
        if let Err(e) = &result {
            self.reject(session_id, participant_id, e);
        }
        result
    }

    async fn try_join(
        &self,
        session_id: SessionId,
        participant_id: &str,
        role: &Role,
        kind: ParticipantKind,
    ) -> Result<JoinOutcome, DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let mut session = self.load(session_id).await?;

        let outcome = session.join(participant_id, role, kind)?;
        if outcome == JoinOutcome::Joined {
            self.persist(&session).await?;
            info!(session_id = %session_id, participant = participant_id, role = %role, %kind, "Participant joined");
            self.emit(
                session_id,
                DebateEvent::ParticipantJoined {
                    participant_id: participant_id.to_string(),
                    role: role.clone(),
                    kind,
                },
            );
        }
        Ok(outcome)
    }

    /// Submit a speech for the current turn
    pub async fn submit_speech(
        &self,
        session_id: SessionId,
        speaker_id: &str,
        content: &str,
    ) -> Result<Speech, DebateError> {
        let result = self.try_submit(session_id, speaker_id, content).await;
        if let Err(e) = &result {
            self.reject(session_id, speaker_id, e);
        }
        result
    }

    async fn try_submit(
        &self,
        session_id: SessionId,
        speaker_id: &str,
        content: &str,
    ) -> Result<Speech, DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let session = self.load(session_id).await?;
        self.apply_speech(&slot, session, speaker_id, content).await
    }

    /// Move a session to `target` on request
    pub async fn request_phase(
        &self,
        session_id: SessionId,
        target: Phase,
    ) -> Result<DebateSession, DebateError> {
        if target == Phase::Completed {
            self.finalize(session_id).await?;
            return self.get_session(session_id).await;
        }
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let session = self.load(session_id).await?;
        self.transition(&slot, session, target, Trigger::Manual).await
    }

    /// Close the debate early and move to evaluation
    pub async fn end_debate(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let session = self.load(session_id).await?;
        if session.phase != Phase::Debate {
            return Err(DebateError::WrongPhase {
                expected: Phase::Debate,
                actual: session.phase,
            });
        }
        self.transition(&slot, session, Phase::Evaluation, Trigger::Manual)
            .await
    }

    pub async fn pause(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        self.request_phase(session_id, Phase::Paused).await
    }

    /// Resume a paused session where it left off, with a fresh clock
    pub async fn resume(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let session = self.load(session_id).await?;
        if session.phase != Phase::Paused {
            return Err(DebateError::WrongPhase {
                expected: Phase::Paused,
                actual: session.phase,
            });
        }
        let target = session.resume_target();
        self.transition(&slot, session, target, Trigger::Manual).await
    }

    /// Finalize (or re-try finalizing) a session in evaluation
    pub async fn finalize(&self, session_id: SessionId) -> Result<FinalResult, DebateError> {
        self.inner
            .finalizer
            .finalize(session_id, Trigger::Manual)
            .await
    }

    // =========================================================================
    // Internals (callers hold the session lane)
    // =========================================================================

    async fn load(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        match self.inner.store.get(session_id).await? {
            Some(session) => {
                // Completed sessions keep no transient state
                if session.is_completed() {
                    self.inner.sessions.forget(session_id);
                }
                Ok(session)
            }
            None => {
                self.inner.sessions.remove(session_id);
                Err(DebateError::SessionNotFound(session_id))
            }
        }
    }

    async fn persist(&self, session: &DebateSession) -> Result<(), DebateError> {
        Ok(self.inner.store.update(session).await?)
    }

    fn emit(&self, session_id: SessionId, event: DebateEvent) {
        deliver(
            self.inner.broadcaster.as_ref(),
            Envelope::to_all(session_id, event),
        );
    }

    /// Tell only the requester why their request failed
    fn reject(&self, session_id: SessionId, participant_id: &str, err: &DebateError) {
        debug!(session_id = %session_id, participant = participant_id, error = %err, "Request rejected");
        deliver(
            self.inner.broadcaster.as_ref(),
            Envelope::to_participant(session_id, participant_id, DebateEvent::error(err)),
        );
    }

    /// Validate, persist and announce a phase change, then start its side effects
    async fn transition(
        &self,
        slot: &Arc<SessionSlot>,
        mut session: DebateSession,
        to: Phase,
        trigger: Trigger,
    ) -> Result<DebateSession, DebateError> {
        let transition = match PhaseRules::check(&session, to, trigger)? {
            TransitionCheck::Apply(t) => t,
            TransitionCheck::NoOp => {
                debug!(session_id = %session.id, phase = %to, "Already in requested phase");
                return Ok(session);
            }
        };
        session.enter_phase(to, Utc::now());
        self.persist(&session).await?;
        self.after_transition(slot, &session, transition);
        Ok(session)
    }

    fn after_transition(&self, slot: &Arc<SessionSlot>, session: &DebateSession, t: Transition) {
        let session_id = session.id;
        let automatic = t.trigger.is_automatic();
        metrics::counter!("agora_phase_transitions_total", "to" => t.to.as_str()).increment(1);
        info!(session_id = %session_id, from = %t.from, to = %t.to, automatic, "Phase changed");
        self.emit(
            session_id,
            DebateEvent::PhaseChanged {
                phase: t.to,
                timestamp: session.phase_changed_at,
                automatic,
            },
        );

        match t.to {
            Phase::Preparation => {
                let this = self.clone();
                let stamp = ClockStamp::of(session);
                self.inner.timers.start(
                    session_id,
                    TimerKind::Phase,
                    session.timing.prep_duration(),
                    move || async move { this.on_prep_elapsed(session_id, stamp).await },
                );
            }
            Phase::Debate => {
                self.inner.timers.cancel(session_id, TimerKind::Phase);
                self.begin_turn(slot, session, false, automatic);
            }
            Phase::Paused => {
                self.inner.timers.cancel_all(session_id);
                slot.cancel_agent_turn();
            }
            Phase::Evaluation => {
                self.inner.timers.cancel_all(session_id);
                slot.cancel_agent_turn();
                self.spawn_finalize(session_id);
            }
            Phase::Setup | Phase::Completed => {}
        }
    }

    /// Announce the current turn, start its clock and wake an agent if it is theirs
    fn begin_turn(
        &self,
        slot: &Arc<SessionSlot>,
        session: &DebateSession,
        after_break: bool,
        automatic: bool,
    ) {
        let Some(role) = session.current_role().cloned() else {
            return;
        };
        let session_id = session.id;
        let speaker = session.holder_of(&role);
        let speaker_id = speaker.map(|p| p.id.clone());
        let speech_number = TurnScheduler::speech_number(session.current_speaker_index);
        let window = session.timing.speech_window(after_break);

        debug!(session_id = %session_id, speaker = ?speaker_id, role = %role, speech_number, "Turn started");
        self.emit(
            session_id,
            DebateEvent::SpeakerChanged {
                current_speaker: speaker_id.clone(),
                role,
                speech_number,
                total_speeches: session.total_turns(),
                automatic,
            },
        );
        self.emit(
            session_id,
            DebateEvent::SpeechTimerStart {
                speaker: speaker_id,
                time_remaining: window.as_millis() as u64,
                speech_number,
            },
        );

        let this = self.clone();
        let stamp = ClockStamp::of(session);
        self.inner
            .timers
            .start(session_id, TimerKind::Speech, window, move || async move {
                this.on_speech_elapsed(session_id, stamp).await
            });

        if speaker.map(|p| p.kind) == Some(ParticipantKind::Agent) {
            self.schedule_agent_turn(slot, session_id);
        }
    }

    /// Append, persist and announce a speech, then move the turn on
    async fn apply_speech(
        &self,
        slot: &Arc<SessionSlot>,
        mut session: DebateSession,
        speaker_id: &str,
        content: &str,
    ) -> Result<Speech, DebateError> {
        let now = Utc::now();
        let speech = session.append_speech(speaker_id, content, now)?;
        let step = NextStep::after(&session);
        match step {
            NextStep::Advance { index } => session.advance_to(index),
            NextStep::EndDebate => session.enter_phase(Phase::Evaluation, now),
        }
        // Speech and turn change are one write
        self.persist(&session).await?;

        metrics::counter!("agora_speeches_total", "kind" => speech.kind.to_string()).increment(1);
        info!(
            session_id = %session.id,
            speaker = speaker_id,
            order = speech.order,
            kind = %speech.kind,
            "Speech accepted"
        );
        self.emit(session.id, DebateEvent::new_message(&speech));
        self.spawn_scoring(slot, &session, &speech);

        match step {
            NextStep::Advance { .. } => self.begin_turn(slot, &session, true, false),
            NextStep::EndDebate => self.after_transition(
                slot,
                &session,
                Transition {
                    from: Phase::Debate,
                    to: Phase::Evaluation,
                    trigger: Trigger::Automatic,
                },
            ),
        }
        Ok(speech)
    }

    fn spawn_scoring(&self, slot: &SessionSlot, session: &DebateSession, speech: &Speech) {
        let request = SpeechProcessor::score_request(session, speech);
        let session_id = session.id;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let Some(feedback) = this.inner.processor.score(request).await else {
                return;
            };
            if let Err(e) = this.record_feedback(session_id, feedback).await {
                warn!(session_id = %session_id, error = %e, "Could not record feedback");
            }
        });
        slot.track_scoring(handle);
    }

    async fn record_feedback(
        &self,
        session_id: SessionId,
        feedback: agora_core::Feedback,
    ) -> Result<bool, DebateError> {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let mut session = self.load(session_id).await?;
        if session.is_completed() {
            debug!(session_id = %session_id, speech_id = %feedback.speech_id, "Late feedback discarded");
            return Ok(false);
        }
        if !session.record_feedback(feedback.clone())? {
            return Ok(false);
        }
        self.persist(&session).await?;
        self.emit(
            session_id,
            DebateEvent::Feedback {
                speech_id: feedback.speech_id,
                score: feedback.score,
                tags: feedback.tags.into_iter().collect(),
            },
        );
        Ok(true)
    }

    fn spawn_finalize(&self, session_id: SessionId) {
        let finalizer = self.inner.finalizer.clone();
        tokio::spawn(async move {
            if let Err(e) = finalizer.finalize(session_id, Trigger::Automatic).await {
                error!(session_id = %session_id, error = %e, "Automatic finalization failed, session stays in evaluation");
            }
        });
    }

    // =========================================================================
    // Background work
    // =========================================================================

    fn schedule_agent_turn(&self, slot: &Arc<SessionSlot>, session_id: SessionId) {
        let this = self.clone();
        let agent_slot = slot.clone();
        slot.spawn_agent_turn(move |token| async move {
            this.run_agent_turn(session_id, agent_slot, token).await
        });
    }

    async fn run_agent_turn(&self, session_id: SessionId, slot: Arc<SessionSlot>, token: u64) {
        tokio::time::sleep(self.inner.agent.delay()).await;

        let session = match self.inner.store.get(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Agent could not read session");
                return;
            }
        };
        let stamp = ClockStamp::of(&session);
        let Some(speaker) = session
            .current_speaker()
            .filter(|p| p.kind == ParticipantKind::Agent)
            .map(|p| p.id.clone())
        else {
            return;
        };
        let Some(request) = self.inner.agent.turn_request(&session) else {
            return;
        };
        let speech = self.inner.agent.compose(&request).await;

        // From here on the turn is ours to finish; later cancels leave it alone
        if !slot.release_agent_turn(token) {
            debug!(session_id = %session_id, "Agent turn superseded");
            return;
        }

        let _lane = slot.enter().await;
        let session = match self.load(session_id).await {
            Ok(session) => session,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Agent turn dropped");
                return;
            }
        };
        if !stamp.matches(&session) {
            self.stale(session_id, "agent turn");
            return;
        }
        if let Err(e) = self
            .apply_speech(&slot, session, &speaker, &speech.content)
            .await
        {
            error!(session_id = %session_id, speaker = %speaker, error = %e, "Agent speech rejected");
        }
    }

    async fn on_prep_elapsed(&self, session_id: SessionId, stamp: ClockStamp) {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let session = match self.load(session_id).await {
            Ok(session) => session,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Preparation timer dropped");
                return;
            }
        };
        if !stamp.matches(&session) {
            self.stale(session_id, "preparation timer");
            return;
        }
        if let Err(e) = self
            .transition(&slot, session, Phase::Debate, Trigger::Automatic)
            .await
        {
            error!(session_id = %session_id, error = %e, "Automatic start of debate failed");
        }
    }

    /// The speaker's window ran out: the turn is forfeited
    async fn on_speech_elapsed(&self, session_id: SessionId, stamp: ClockStamp) {
        let slot = self.inner.sessions.slot(session_id);
        let _lane = slot.enter().await;
        let mut session = match self.load(session_id).await {
            Ok(session) => session,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Speech timer dropped");
                return;
            }
        };
        if !stamp.matches(&session) {
            self.stale(session_id, "speech timer");
            return;
        }

        info!(
            session_id = %session_id,
            speech_number = TurnScheduler::speech_number(session.current_speaker_index),
            "Turn forfeited"
        );
        slot.cancel_agent_turn();
        match NextStep::after(&session) {
            NextStep::Advance { index } => {
                session.advance_to(index);
                if let Err(e) = self.persist(&session).await {
                    error!(session_id = %session_id, error = %e, "Could not advance forfeited turn");
                    return;
                }
                self.begin_turn(&slot, &session, true, true);
            }
            NextStep::EndDebate => {
                if let Err(e) = self
                    .transition(&slot, session, Phase::Evaluation, Trigger::Automatic)
                    .await
                {
                    error!(session_id = %session_id, error = %e, "Automatic end of debate failed");
                }
            }
        }
    }

    fn stale(&self, session_id: SessionId, what: &'static str) {
        metrics::counter!("agora_stale_timer_noops_total").increment(1);
        debug!(session_id = %session_id, source = what, "Stale callback ignored");
    }
}
