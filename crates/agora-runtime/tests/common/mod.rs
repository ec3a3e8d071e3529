//! Shared fixtures for orchestrator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use agora_core::{DebateSession, ParticipantKind, Phase, Role, SessionId};
use agora_llm::{HeuristicScorer, LlmTurnGenerator, MockProvider};
use agora_persist::{KvSessionStore, MemoryBackend, SessionFilter, SessionStore, StorageError};
use agora_runtime::{
    ChannelBroadcaster, DebateEvent, DebateOrchestrator, Envelope, NewSession, RuntimeConfig,
};

/// Session store that can be told to fail writes
#[derive(Debug)]
pub struct FlakyStore {
    inner: KvSessionStore<MemoryBackend>,
    /// Fail every update
    pub fail_updates: AtomicBool,
    /// Fail only the update that completes a session
    pub fail_completion: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: KvSessionStore::new(Arc::new(MemoryBackend::new())),
            fail_updates: AtomicBool::new(false),
            fail_completion: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create(&self, session: &DebateSession) -> Result<(), StorageError> {
        self.inner.create(session).await
    }

    async fn get(&self, id: SessionId) -> Result<Option<DebateSession>, StorageError> {
        self.inner.get(id).await
    }

    async fn update(&self, session: &DebateSession) -> Result<(), StorageError> {
        if self.fail_updates.load(Ordering::SeqCst)
            || (session.phase == Phase::Completed && self.fail_completion.load(Ordering::SeqCst))
        {
            return Err(StorageError::Connection("store unavailable".to_string()));
        }
        self.inner.update(session).await
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StorageError> {
        self.inner.delete(id).await
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<DebateSession>, StorageError> {
        self.inner.query(filter).await
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

pub struct Harness {
    pub orchestrator: DebateOrchestrator,
    pub broadcaster: Arc<ChannelBroadcaster>,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        let store = Arc::new(FlakyStore::new());
        let broadcaster = Arc::new(ChannelBroadcaster::new(256));
        let generator = LlmTurnGenerator::new(Arc::new(provider.with_latency(Duration::ZERO)));
        let orchestrator = DebateOrchestrator::new(
            store.clone(),
            broadcaster.clone(),
            Arc::new(generator),
            Arc::new(HeuristicScorer::new()),
            RuntimeConfig::instant(),
        );
        Self {
            orchestrator,
            broadcaster,
            store,
        }
    }

    pub fn humans() -> Self {
        Self::new(MockProvider::constant("unused"))
    }

    /// A two-sided session with the given participants already seated
    pub async fn seated(
        &self,
        proposition: (&str, ParticipantKind),
        opposition: (&str, ParticipantKind),
    ) -> SessionId {
        self.seated_on("Cities should ban private cars downtown", proposition, opposition)
            .await
    }

    /// Like [`Self::seated`] with a chosen motion
    pub async fn seated_on(
        &self,
        motion: &str,
        proposition: (&str, ParticipantKind),
        opposition: (&str, ParticipantKind),
    ) -> SessionId {
        let session = self
            .orchestrator
            .create_session(NewSession::new(motion))
            .await
            .unwrap();
        self.orchestrator
            .join(session.id, proposition.0, &Role::proposition(), proposition.1)
            .await
            .unwrap();
        self.orchestrator
            .join(session.id, opposition.0, &Role::opposition(), opposition.1)
            .await
            .unwrap();
        session.id
    }

    pub async fn session(&self, id: SessionId) -> DebateSession {
        self.orchestrator.get_session(id).await.unwrap()
    }
}

/// Receive envelopes until one satisfies `done`; returns everything received,
/// the matching envelope last.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<Envelope>,
    done: impl Fn(&DebateEvent) -> bool,
) -> Vec<Envelope> {
    let mut seen = Vec::new();
    loop {
        let envelope = tokio::time::timeout(Duration::from_secs(3_600), rx.recv())
            .await
            .expect("event arrives in time")
            .expect("channel open");
        let finished = done(&envelope.event);
        seen.push(envelope);
        if finished {
            return seen;
        }
    }
}

/// Everything already queued on the receiver
pub fn drain(rx: &mut broadcast::Receiver<Envelope>) -> Vec<Envelope> {
    let mut seen = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        seen.push(envelope);
    }
    seen
}

pub fn is_phase(phase: Phase) -> impl Fn(&DebateEvent) -> bool {
    move |event| matches!(event, DebateEvent::PhaseChanged { phase: p, .. } if *p == phase)
}

pub fn is_completed(event: &DebateEvent) -> bool {
    matches!(event, DebateEvent::DebateCompleted { .. })
}
