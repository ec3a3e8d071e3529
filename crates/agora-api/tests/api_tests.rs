//! Router-level tests driven through `tower::ServiceExt::oneshot`

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use agora_api::{AgoraServer, AppState, ServerConfig};
use agora_core::{ParticipantKind, Role};
use agora_llm::{HeuristicScorer, LlmTurnGenerator, MockProvider};
use agora_persist::{KvSessionStore, MemoryBackend};
use agora_runtime::{ChannelBroadcaster, DebateOrchestrator, RuntimeConfig};

fn state() -> AppState {
    let events = Arc::new(ChannelBroadcaster::new(64));
    let provider = MockProvider::constant("A generated argument.").with_latency(Duration::ZERO);
    let orchestrator = DebateOrchestrator::new(
        Arc::new(KvSessionStore::new(Arc::new(MemoryBackend::new()))),
        events.clone(),
        Arc::new(LlmTurnGenerator::new(Arc::new(provider))),
        Arc::new(HeuristicScorer::new()),
        RuntimeConfig::instant(),
    );
    AppState::new(orchestrator, events)
}

fn app(state: AppState) -> Router {
    AgoraServer::with_state(ServerConfig::default(), state).router()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn seated_session(app: &Router) -> String {
    let (status, session) = send(
        app,
        "POST",
        "/api/v1/sessions",
        Some(json!({"motion": "Cities should ban private cars downtown"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = session["id"].as_str().unwrap().to_string();

    for (participant, role) in [("alice", "proposition"), ("bob", "opposition")] {
        let (status, body) = send(
            app,
            "POST",
            &format!("/api/v1/sessions/{}/join", id),
            Some(json!({"participantId": participant, "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["joined"], true);
    }
    id
}

#[tokio::test]
async fn test_health() {
    let app = app(state());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "healthy");
}

#[tokio::test]
async fn test_create_get_and_list() {
    let app = app(state());
    let id = seated_session(&app).await;

    let (status, session) = send(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "setup");
    assert_eq!(session["participants"].as_array().unwrap().len(), 2);

    let (status, list) = send(&app, "GET", "/api/v1/sessions?phase=setup&participant=bob", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, list) = send(&app, "GET", "/api/v1/sessions?phase=debate", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejoin_is_not_an_error() {
    let app = app(state());
    let id = seated_session(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/join", id),
        Some(json!({"participantId": "alice", "role": "proposition"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["joined"], false);
}

#[tokio::test]
async fn test_speech_turns_and_errors() {
    let app = app(state());
    let id = seated_session(&app).await;

    // Setup cannot jump straight to debate
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/phase", id),
        Some(json!({"phase": "debate"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    for phase in ["preparation", "debate"] {
        let (status, session) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{}/phase", id),
            Some(json!({"phase": phase})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["phase"], phase);
    }

    let speeches = format!("/api/v1/sessions/{}/speeches", id);
    let (status, body) = send(
        &app,
        "POST",
        &speeches,
        Some(json!({"speakerId": "bob", "content": "Not my turn yet."})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "OUT_OF_TURN");

    let (status, body) = send(
        &app,
        "POST",
        &speeches,
        Some(json!({"speakerId": "alice", "content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "EMPTY_SPEECH");

    let (status, speech) = send(
        &app,
        "POST",
        &speeches,
        Some(json!({"speakerId": "alice", "content": "Private cars choke our streets."})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(speech["speaker_id"], "alice");

    let (_, session) = send(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(session["current_speaker_index"], 1);
}

#[tokio::test]
async fn test_end_pause_and_finalize() {
    let app = app(state());
    let id = seated_session(&app).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/sessions/{}/end", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "WRONG_PHASE");

    send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/phase", id),
        Some(json!({"phase": "preparation"})),
    )
    .await;
    let (status, session) = send(&app, "POST", &format!("/api/v1/sessions/{}/pause", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "paused");

    let (status, session) = send(&app, "POST", &format!("/api/v1/sessions/{}/resume", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "preparation");

    send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/phase", id),
        Some(json!({"phase": "debate"})),
    )
    .await;
    let (status, session) = send(&app, "POST", &format!("/api/v1/sessions/{}/end", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "evaluation");

    // Evaluation finalizes on its own
    let mut session = Value::Null;
    for _ in 0..200 {
        session = send(&app, "GET", &format!("/api/v1/sessions/{}", id), None).await.1;
        if session["phase"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session["phase"], "completed");

    // A manual request afterwards returns the stored result
    let (status, result) = send(&app, "POST", &format!("/api/v1/sessions/{}/finalize", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result, session["final_result"]);
    // Completed sessions no longer count as active
    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["active_sessions"], 0);
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let app = app(state());
    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, "GET", &format!("/api/v1/sessions/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");

    let (status, _) = send(&app, "GET", &format!("/api/v1/sessions/{}/events", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = seated_session(&app).await;
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_conflicting_orders() {
    let app = app(state());
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        Some(json!({
            "motion": "Homework should be abolished",
            "speakingOrder": ["proposition", "opposition"],
            "roles": ["proposition", "opposition"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_create_rejects_overlong_motion() {
    let app = app(state());
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        Some(json!({"motion": "Cities should ban private cars ".repeat(300)})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_event_stream_filters_by_participant() {
    let state = state();
    let app = app(state.clone());
    let id = seated_session(&app).await;
    let session_id: uuid::Uuid = id.parse().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/sessions/{}/events?participant=carol", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    // bob's rejection is addressed to bob only; carol then sees her own join
    let _ = state
        .orchestrator()
        .join(session_id, "bob", &Role::proposition(), ParticipantKind::Human)
        .await;
    let _ = state
        .orchestrator()
        .join(session_id, "carol", &Role::new("judge"), ParticipantKind::Human)
        .await;
    state
        .orchestrator()
        .join(session_id, "carol", &Role::opposition(), ParticipantKind::Human)
        .await
        .unwrap_err();

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.starts_with("event: error"), "unexpected frame: {}", text);
    assert!(text.contains("UNKNOWN_ROLE"));
}
