//! # Agora API
//!
//! HTTP surface for debate sessions.
//!
//! ## Features
//!
//! - **Session triggers**: create, join, speak, move phases, finalize
//! - **Event stream**: per-session server-sent events, filtered per participant
//! - **Error mapping**: `{error: {code, message}}` bodies with HTTP status codes
//! - **Graceful shutdown**: Ctrl+C and SIGTERM

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::api_router;
pub use server::{init_tracing, AgoraServer, ServerConfig};
pub use state::AppState;
