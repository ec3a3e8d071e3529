//! Per-session delayed callbacks with cancel-on-supersede semantics

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

use agora_core::SessionId;

/// What a timer is for. A session has at most one timer of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Preparation auto-advance
    Phase,
    /// Per-speech auto-advance
    Speech,
}

#[derive(Debug)]
struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerMap = HashMap<(SessionId, TimerKind), TimerEntry>;

/// Registry of pending timers keyed by `(session, kind)`.
///
/// A timer leaves the registry the moment it fires, before its callback runs,
/// so cancelling or superseding never interrupts a callback in progress.
#[derive(Debug, Default, Clone)]
pub struct TimerRegistry {
    timers: Arc<Mutex<TimerMap>>,
    next_generation: Arc<AtomicU64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TimerMap> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `callback` after `delay`, replacing any pending timer of the same kind.
    pub fn start<F, Fut>(&self, session_id: SessionId, kind: TimerKind, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();

        // Held across spawn + insert so the task cannot look itself up before it is registered
        let mut map = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = timers.lock().unwrap_or_else(PoisonError::into_inner);
                match map.get(&(session_id, kind)) {
                    Some(entry) if entry.generation == generation => {
                        map.remove(&(session_id, kind));
                    }
                    _ => return,
                }
            }
            callback().await;
        });

        if let Some(previous) = map.insert((session_id, kind), TimerEntry { generation, handle }) {
            previous.handle.abort();
            trace!(session_id = %session_id, ?kind, "Superseded pending timer");
        }
    }

    /// Cancel the pending timer of `kind`; returns whether one was pending
    pub fn cancel(&self, session_id: SessionId, kind: TimerKind) -> bool {
        match self.lock().remove(&(session_id, kind)) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer of a session
    pub fn cancel_all(&self, session_id: SessionId) {
        self.cancel(session_id, TimerKind::Phase);
        self.cancel(session_id, TimerKind::Speech);
    }

    pub fn is_pending(&self, session_id: SessionId, kind: TimerKind) -> bool {
        self.lock().contains_key(&(session_id, kind))
    }

    /// Number of pending timers across all sessions
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}
