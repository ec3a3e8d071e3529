//! API routes for debate sessions

use axum::response::sse as ax_sse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use agora_core::{DebateSession, FinalResult, JoinOutcome, ParticipantKind, Phase, Role, Speech};
use agora_persist::SessionFilter;
use agora_runtime::NewSession;

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub store: String,
    pub active_sessions: usize,
}

/// Liveness plus store health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.orchestrator().is_healthy().await;
    Json(HealthResponse {
        status: if store_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        store: if store_healthy { "healthy" } else { "unhealthy" }.to_string(),
        active_sessions: state.orchestrator().sessions().len(),
    })
}

/// Create a session
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<NewSession>,
) -> ApiResult<(StatusCode, Json<DebateSession>)> {
    let session = state.orchestrator().create_session(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// List sessions matching `?phase=&participant=&motion=&limit=`
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<Json<Vec<DebateSession>>> {
    Ok(Json(state.orchestrator().list_sessions(&filter).await?))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DebateSession>> {
    Ok(Json(state.orchestrator().get_session(id).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.orchestrator().delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub participant_id: String,
    pub role: Role,
    #[serde(default = "default_kind")]
    pub kind: ParticipantKind,
}

fn default_kind() -> ParticipantKind {
    ParticipantKind::Human
}

/// Join response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub participant_id: String,
    pub role: Role,
    /// False when the participant already held this role
    pub joined: bool,
}

pub async fn join(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<JoinResponse>> {
    let outcome = state
        .orchestrator()
        .join(id, &req.participant_id, &req.role, req.kind)
        .await?;
    Ok(Json(JoinResponse {
        participant_id: req.participant_id,
        role: req.role,
        joined: outcome == JoinOutcome::Joined,
    }))
}

/// Speech submission
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub speaker_id: String,
    pub content: String,
}

pub async fn submit_speech(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SpeechRequest>,
) -> ApiResult<(StatusCode, Json<Speech>)> {
    let speech = state
        .orchestrator()
        .submit_speech(id, &req.speaker_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(speech)))
}

/// Phase change request
#[derive(Debug, Deserialize)]
pub struct PhaseRequest {
    pub phase: Phase,
}

pub async fn request_phase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PhaseRequest>,
) -> ApiResult<Json<DebateSession>> {
    Ok(Json(state.orchestrator().request_phase(id, req.phase).await?))
}

pub async fn end_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DebateSession>> {
    Ok(Json(state.orchestrator().end_debate(id).await?))
}

pub async fn pause(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DebateSession>> {
    Ok(Json(state.orchestrator().pause(id).await?))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DebateSession>> {
    Ok(Json(state.orchestrator().resume(id).await?))
}

pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FinalResult>> {
    Ok(Json(state.orchestrator().finalize(id).await?))
}

/// Event stream query
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Receive events addressed to this participant as well as broadcasts
    pub participant: Option<String>,
}

/// Server-sent events for one session. Each event is named after its `type`.
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<ax_sse::Sse<impl Stream<Item = Result<ax_sse::Event, Infallible>>>> {
    // Unknown sessions get a 404 instead of a silent stream
    state.orchestrator().get_session(id).await?;

    let viewer = query.participant;
    let rx = state.events().subscribe(id);
    tracing::debug!(session_id = %id, viewer = ?viewer, "Event stream opened");

    let stream = BroadcastStream::new(rx).filter_map(move |item| match item {
        Ok(envelope) if envelope.visible_to(viewer.as_deref()) => {
            let event = ax_sse::Event::default()
                .event(envelope.event.name())
                .json_data(&envelope.event)
                .unwrap_or_else(|_| ax_sse::Event::default().event("error").data("encoding"));
            Some(Ok(event))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Event stream lagged");
            None
        }
    });

    Ok(ax_sse::Sse::new(stream).keep_alive(ax_sse::KeepAlive::default()))
}

/// Build the API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/sessions",
            post(create_session).get(list_sessions),
        )
        .route(
            "/api/v1/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/v1/sessions/{id}/join", post(join))
        .route("/api/v1/sessions/{id}/speeches", post(submit_speech))
        .route("/api/v1/sessions/{id}/phase", post(request_phase))
        .route("/api/v1/sessions/{id}/end", post(end_debate))
        .route("/api/v1/sessions/{id}/pause", post(pause))
        .route("/api/v1/sessions/{id}/resume", post(resume))
        .route("/api/v1/sessions/{id}/finalize", post(finalize))
        .route("/api/v1/sessions/{id}/events", get(session_events))
        .with_state(state)
}
