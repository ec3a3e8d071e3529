//! Application state

use std::sync::Arc;

use agora_runtime::{ChannelBroadcaster, DebateOrchestrator};

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    orchestrator: DebateOrchestrator,
    events: Arc<ChannelBroadcaster>,
}

impl AppState {
    /// `events` must be the broadcaster the orchestrator publishes to
    pub fn new(orchestrator: DebateOrchestrator, events: Arc<ChannelBroadcaster>) -> Self {
        Self {
            orchestrator,
            events,
        }
    }

    pub fn orchestrator(&self) -> &DebateOrchestrator {
        &self.orchestrator
    }

    /// Event channels for streaming subscribers
    pub fn events(&self) -> Arc<ChannelBroadcaster> {
        self.events.clone()
    }
}
