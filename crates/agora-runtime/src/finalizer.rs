//! Session finalization: aggregate scores, rank, and complete the session

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use agora_core::{DebateError, DebateSession, FinalResult, Phase, SessionId, Trigger};
use agora_persist::SessionStore;

use crate::events::{deliver, Broadcaster, DebateEvent, Envelope};
use crate::registry::SessionRegistry;
use crate::timers::TimerRegistry;

/// Runs once per session when it reaches evaluation
#[derive(Debug, Clone)]
pub struct SessionFinalizer {
    store: Arc<dyn SessionStore>,
    broadcaster: Arc<dyn Broadcaster>,
    timers: TimerRegistry,
    sessions: Arc<SessionRegistry>,
    /// Upper bound on waiting for in-flight feedback
    grace: Duration,
}

impl SessionFinalizer {
    pub fn new(
        store: Arc<dyn SessionStore>,
        broadcaster: Arc<dyn Broadcaster>,
        timers: TimerRegistry,
        sessions: Arc<SessionRegistry>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            broadcaster,
            timers,
            sessions,
            grace,
        }
    }

    async fn load(&self, session_id: SessionId) -> Result<DebateSession, DebateError> {
        self.store
            .get(session_id)
            .await?
            .ok_or(DebateError::SessionNotFound(session_id))
    }

    fn stored_result(session: &DebateSession) -> Option<FinalResult> {
        if session.is_completed() {
            session.final_result.clone()
        } else {
            None
        }
    }

    /// Finalize a session in evaluation.
    ///
    /// A completed session returns its stored result unchanged. On failure the
    /// session stays in evaluation and the call can be repeated.
    pub async fn finalize(
        &self,
        session_id: SessionId,
        trigger: Trigger,
    ) -> Result<FinalResult, DebateError> {
        if let Some(result) = Self::stored_result(&self.load(session_id).await?) {
            return Ok(result);
        }

        let slot = self.sessions.slot(session_id);
        if !slot.try_begin_finalize() {
            return Err(DebateError::Finalization(
                "finalization already in progress".to_string(),
            ));
        }

        // Outstanding feedback is awaited outside the lane: recording it needs the lane
        let pending = slot.take_scoring();
        if !pending.is_empty() {
            let count = pending.len();
            if tokio::time::timeout(self.grace, join_all(pending))
                .await
                .is_err()
            {
                warn!(
                    session_id = %session_id,
                    pending = count,
                    grace_ms = self.grace.as_millis() as u64,
                    "Feedback grace period elapsed, finalizing without late scores"
                );
            }
        }

        let _lane = slot.enter().await;
        let mut session = match self.load(session_id).await {
            Ok(session) => session,
            Err(e) => {
                slot.end_finalize();
                return Err(e);
            }
        };
        if let Some(result) = Self::stored_result(&session) {
            self.sessions.forget(session_id);
            return Ok(result);
        }
        if session.phase != Phase::Evaluation {
            slot.end_finalize();
            return Err(DebateError::WrongPhase {
                expected: Phase::Evaluation,
                actual: session.phase,
            });
        }

        let now = Utc::now();
        let result = FinalResult::compute(&session, now);
        session.final_result = Some(result.clone());
        session.enter_phase(Phase::Completed, now);

        // Result and phase land in a single write
        if let Err(e) = self.store.update(&session).await {
            slot.end_finalize();
            return Err(DebateError::Finalization(e.to_string()));
        }

        self.timers.cancel_all(session_id);
        slot.cancel_agent_turn();
        // The stored result now guards re-entry, so the slot can go
        self.sessions.forget(session_id);

        metrics::counter!("agora_sessions_completed_total").increment(1);
        metrics::counter!("agora_phase_transitions_total", "to" => Phase::Completed.as_str())
            .increment(1);
        info!(
            session_id = %session_id,
            winner = ?result.winner,
            average = result.average_score,
            automatic = trigger.is_automatic(),
            "Session completed"
        );

        deliver(
            self.broadcaster.as_ref(),
            Envelope::to_all(
                session_id,
                DebateEvent::PhaseChanged {
                    phase: Phase::Completed,
                    timestamp: now,
                    automatic: trigger.is_automatic(),
                },
            ),
        );
        deliver(
            self.broadcaster.as_ref(),
            Envelope::to_all(
                session_id,
                DebateEvent::DebateCompleted {
                    final_result: result.clone(),
                    timestamp: now,
                },
            ),
        );
        debug!(session_id = %session_id, "Completion events published");

        Ok(result)
    }
}
