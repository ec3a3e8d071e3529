//! Process-local state owned per session
//!
//! Everything here is transient: a restart loses it and the persisted session
//! stays authoritative.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::JoinHandle;

use agora_core::SessionId;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transient state for one session
#[derive(Debug, Default)]
pub struct SessionSlot {
    /// Serializes every read-modify-write of the session
    lane: AsyncMutex<()>,
    agent_turn: Mutex<Option<(u64, JoinHandle<()>)>>,
    agent_generation: AtomicU64,
    scoring: Mutex<Vec<JoinHandle<()>>>,
    finalizing: AtomicBool,
}

impl SessionSlot {
    /// Enter the session's lane
    pub async fn enter(&self) -> AsyncMutexGuard<'_, ()> {
        self.lane.lock().await
    }

    /// Spawn a pending agent turn, cancelling any previous one.
    ///
    /// `task` receives the turn's token for [`Self::release_agent_turn`]. The
    /// handle is registered before the task can observe the registry.
    pub fn spawn_agent_turn<F, Fut>(&self, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = lock(&self.agent_turn);
        let token = self.agent_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = tokio::spawn(task(token));
        if let Some((_, previous)) = current.replace((token, handle)) {
            previous.abort();
        }
        token
    }

    /// Stop tracking the agent turn with `token` without aborting it.
    ///
    /// An agent task calls this once its content is ready, so later
    /// cancellations cannot interrupt it halfway through submitting.
    pub fn release_agent_turn(&self, token: u64) -> bool {
        let mut slot = lock(&self.agent_turn);
        match slot.as_ref() {
            Some((current, _)) if *current == token => {
                slot.take();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_agent_turn(&self) -> bool {
        match lock(&self.agent_turn).take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn has_agent_turn(&self) -> bool {
        lock(&self.agent_turn).is_some()
    }

    /// Track an in-flight scoring task
    pub fn track_scoring(&self, handle: JoinHandle<()>) {
        let mut scoring = lock(&self.scoring);
        scoring.retain(|h| !h.is_finished());
        scoring.push(handle);
    }

    /// Take the in-flight scoring tasks (to wait on them)
    pub fn take_scoring(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *lock(&self.scoring))
    }

    pub fn abort_scoring(&self) {
        for handle in self.take_scoring() {
            handle.abort();
        }
    }

    /// Claim the single-run finalization flag
    pub fn try_begin_finalize(&self) -> bool {
        self.finalizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give the flag back after a failed attempt so it can be retried
    pub fn end_finalize(&self) {
        self.finalizing.store(false, Ordering::Release);
    }

    /// Cancel all background work owned by this slot
    pub fn shutdown(&self) {
        self.cancel_agent_turn();
        self.abort_scoring();
    }
}

/// Explicit owner of per-session transient state
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `session_id`, created on first use
    pub fn slot(&self, session_id: SessionId) -> Arc<SessionSlot> {
        lock(&self.slots).entry(session_id).or_default().clone()
    }

    pub fn get(&self, session_id: SessionId) -> Option<Arc<SessionSlot>> {
        lock(&self.slots).get(&session_id).cloned()
    }

    /// Remove a slot and cancel its background work
    pub fn remove(&self, session_id: SessionId) -> bool {
        match lock(&self.slots).remove(&session_id) {
            Some(slot) => {
                slot.shutdown();
                true
            }
            None => false,
        }
    }

    /// Drop the slot without touching its background work.
    ///
    /// Holders of the slot keep their lane. A later trigger gets a fresh slot.
    pub fn forget(&self, session_id: SessionId) -> bool {
        lock(&self.slots).remove(&session_id).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
