//! # Agora Runtime
//!
//! Tokio-based orchestration of debate sessions.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`orchestrator`] | Phase state machine and inbound triggers |
//! | [`timers`] | Per-session delayed callbacks |
//! | [`speech`] | Turn advancement and asynchronous feedback |
//! | [`agent`] | Speeches for agent participants |
//! | [`finalizer`] | Ranking and completion |
//! | [`events`] | Session events and their delivery |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agora_core::{ParticipantKind, Phase, Role};
//! use agora_llm::{HeuristicScorer, LlmTurnGenerator, MockProvider};
//! use agora_persist::{KvSessionStore, MemoryBackend};
//! use agora_runtime::{ChannelBroadcaster, DebateOrchestrator, NewSession, RuntimeConfig};
//!
//! # async fn run() -> Result<(), agora_core::DebateError> {
//! let orchestrator = DebateOrchestrator::new(
//!     Arc::new(KvSessionStore::new(Arc::new(MemoryBackend::new()))),
//!     Arc::new(ChannelBroadcaster::default()),
//!     Arc::new(LlmTurnGenerator::new(Arc::new(MockProvider::echo()))),
//!     Arc::new(HeuristicScorer::new()),
//!     RuntimeConfig::default(),
//! );
//!
//! let session = orchestrator.create_session(NewSession::new("Homework should be abolished")).await?;
//! orchestrator.join(session.id, "alice", &Role::proposition(), ParticipantKind::Human).await?;
//! orchestrator.join(session.id, "bot", &Role::opposition(), ParticipantKind::Agent).await?;
//! orchestrator.request_phase(session.id, Phase::Preparation).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod events;
pub mod fallback;
pub mod finalizer;
pub mod orchestrator;
pub mod registry;
pub mod speech;
pub mod timers;

pub use agent::{AgentSpeech, AiTurnAgent};
pub use config::RuntimeConfig;
pub use events::{deliver, BroadcastError, Broadcaster, ChannelBroadcaster, DebateEvent, Envelope};
pub use finalizer::SessionFinalizer;
pub use orchestrator::{DebateOrchestrator, NewSession};
pub use registry::{SessionRegistry, SessionSlot};
pub use speech::{NextStep, SpeechProcessor};
pub use timers::{TimerKind, TimerRegistry};
