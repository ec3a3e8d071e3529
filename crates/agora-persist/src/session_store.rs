//! Session storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use agora_core::{DebateSession, Phase, SessionId};

use crate::backend::{StorageBackend, StorageError, StorageExt};

/// Criteria for [`SessionStore::query`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub phase: Option<Phase>,
    /// Sessions this participant is seated in
    pub participant: Option<String>,
    /// Case-insensitive substring of the motion
    pub motion: Option<String>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn matches(&self, session: &DebateSession) -> bool {
        if let Some(phase) = self.phase {
            if session.phase != phase {
                return false;
            }
        }
        if let Some(participant) = &self.participant {
            if session.participant(participant).is_none() {
                return false;
            }
        }
        if let Some(needle) = &self.motion {
            if !session
                .motion
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Persistence for whole session documents.
///
/// `update` is last-write-wins; callers serialize writes per session.
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Insert a new session; fails if the id is taken
    async fn create(&self, session: &DebateSession) -> Result<(), StorageError>;

    async fn get(&self, id: SessionId) -> Result<Option<DebateSession>, StorageError>;

    /// Replace an existing session; fails if it does not exist
    async fn update(&self, session: &DebateSession) -> Result<(), StorageError>;

    async fn delete(&self, id: SessionId) -> Result<bool, StorageError>;

    /// Matching sessions, newest first
    async fn query(&self, filter: &SessionFilter) -> Result<Vec<DebateSession>, StorageError>;

    async fn is_healthy(&self) -> bool;
}

/// [`SessionStore`] on top of any key/value [`StorageBackend`]
#[derive(Debug)]
pub struct KvSessionStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    prefix: String,
}

impl<B: StorageBackend + ?Sized> KvSessionStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_prefix(backend, "session:")
    }

    /// Create with custom prefix
    pub fn with_prefix(backend: Arc<B>, prefix: &str) -> Self {
        Self {
            backend,
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, id: SessionId) -> String {
        format!("{}{}", self.prefix, id)
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized + 'static> SessionStore for KvSessionStore<B> {
    async fn create(&self, session: &DebateSession) -> Result<(), StorageError> {
        let key = self.key(session.id);
        if self.backend.exists(&key).await? {
            return Err(StorageError::AlreadyExists(key));
        }
        self.backend.set(&key, session).await
    }

    async fn get(&self, id: SessionId) -> Result<Option<DebateSession>, StorageError> {
        self.backend.get(&self.key(id)).await
    }

    async fn update(&self, session: &DebateSession) -> Result<(), StorageError> {
        let key = self.key(session.id);
        if !self.backend.exists(&key).await? {
            return Err(StorageError::NotFound(key));
        }
        self.backend.set(&key, session).await
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StorageError> {
        self.backend.delete(&self.key(id)).await
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<DebateSession>, StorageError> {
        let keys = self.backend.list_keys(&self.prefix).await?;
        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            // Deleted between list and get
            let Some(session) = self.backend.get::<DebateSession>(&key).await? else {
                continue;
            };
            if filter.matches(&session) {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    async fn is_healthy(&self) -> bool {
        self.backend.is_healthy().await
    }
}
