//! Agora API server with graceful shutdown

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use agora_llm::LlmConfig;
use agora_persist::{KvSessionStore, MemoryBackend, SessionStore, SqliteBackend};
use agora_runtime::{ChannelBroadcaster, DebateOrchestrator, RuntimeConfig};

use crate::error::ApiError;
use crate::middleware::{
    body_limit_layer, cors_layer, request_id_middleware, timeout_layer, tracing_middleware,
};
use crate::routes::api_router;
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Request timeout
    pub timeout: Duration,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// SQLite URL; sessions live in memory when unset
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024, // 64KB
            cors_origins: Vec::new(),
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("AGORA_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let timeout_secs: u64 = std::env::var("AGORA_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        let cors_origins = std::env::var("AGORA_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs),
            cors_origins,
            database_url: std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            ..Default::default()
        }
    }
}

/// Agora API server
pub struct AgoraServer {
    config: ServerConfig,
    app_state: AppState,
}

impl AgoraServer {
    /// Wire storage, generator, scorer and orchestrator from configuration
    pub async fn new(
        config: ServerConfig,
        llm: LlmConfig,
        runtime: RuntimeConfig,
    ) -> Result<Self, ApiError> {
        llm.validate()?;
        runtime.validate()?;

        let store: Arc<dyn SessionStore> = match &config.database_url {
            Some(url) => {
                tracing::info!("Using SQLite session store");
                let db = SqliteBackend::new(url)
                    .await
                    .map_err(|e| ApiError::Internal(format!("DB Init failed: {}", e)))?;
                Arc::new(KvSessionStore::new(Arc::new(db)))
            }
            None => {
                tracing::warn!("DATABASE_URL not set. Sessions are kept in memory only.");
                Arc::new(KvSessionStore::new(Arc::new(MemoryBackend::new())))
            }
        };

        let provider = llm.build_provider();
        let generator = llm.build_generator(provider.clone());
        let scorer = llm.build_scorer(provider);
        let events = Arc::new(ChannelBroadcaster::new(runtime.event_capacity));

        let orchestrator =
            DebateOrchestrator::new(store, events.clone(), generator, scorer, runtime);

        Ok(Self::with_state(config, AppState::new(orchestrator, events)))
    }

    /// Serve an already assembled state
    pub fn with_state(config: ServerConfig, app_state: AppState) -> Self {
        Self { config, app_state }
    }

    /// Get the configured router
    pub fn router(&self) -> Router {
        api_router(self.app_state.clone())
            // Body size limit
            .layer(body_limit_layer(self.config.max_body_size))
            // Timeout
            .layer(timeout_layer(self.config.timeout))
            // CORS
            .layer(cors_layer(&self.config.cors_origins))
            // Tracing (runs after the request id is assigned)
            .layer(middleware::from_fn(tracing_middleware))
            // Request ID (outermost)
            .layer(middleware::from_fn(request_id_middleware))
    }

    /// Run the server with graceful shutdown
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Agora API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,agora=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
