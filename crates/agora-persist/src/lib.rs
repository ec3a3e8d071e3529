//! # Agora Persistence
//!
//! Storage for debate sessions.
//!
//! Supports:
//! - In-memory (tests and single-run simulations)
//! - SQLite (single node, enabled by the default `sqlite` feature)
//!
//! Sessions are stored whole, one JSON document per key, through
//! [`KvSessionStore`].

pub mod backend;
pub mod session_store;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{MemoryBackend, StorageBackend, StorageError, StorageExt};
pub use session_store::{KvSessionStore, SessionFilter, SessionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteConfig};
