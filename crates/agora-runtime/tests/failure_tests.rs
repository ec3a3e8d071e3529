//! Rejected requests and collaborator failures

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use agora_core::{DebateError, ParticipantKind, Phase, Role};
use agora_runtime::DebateEvent;
use common::{collect_until, drain, is_phase, Harness};

const HUMAN: ParticipantKind = ParticipantKind::Human;

async fn debating(h: &Harness) -> uuid::Uuid {
    let id = h.seated(("alice", HUMAN), ("bob", HUMAN)).await;
    h.orchestrator
        .request_phase(id, Phase::Preparation)
        .await
        .unwrap();
    h.orchestrator.request_phase(id, Phase::Debate).await.unwrap();
    id
}

#[tokio::test(start_paused = true)]
async fn test_out_of_turn_speech_changes_nothing() {
    let h = Harness::humans();
    let id = debating(&h).await;
    let mut rx = h.broadcaster.subscribe(id);

    let err = h
        .orchestrator
        .submit_speech(id, "bob", "Let me go first.")
        .await
        .unwrap_err();
    assert!(matches!(err, DebateError::OutOfTurn { .. }));

    // Only bob hears about it
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].recipient.as_deref(), Some("bob"));
    assert!(!events[0].visible_to(Some("alice")));
    assert!(matches!(
        &events[0].event,
        DebateEvent::Error { code, .. } if code == "OUT_OF_TURN"
    ));

    let session = h.session(id).await;
    assert!(session.speeches.is_empty());
    assert!(session.leaderboard.is_empty());
    assert_eq!(session.current_speaker_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors() {
    let h = Harness::humans();
    let id = h.seated(("alice", HUMAN), ("bob", HUMAN)).await;

    assert!(matches!(
        h.orchestrator.request_phase(id, Phase::Debate).await,
        Err(DebateError::InvalidTransition {
            from: Phase::Setup,
            to: Phase::Debate
        })
    ));
    assert!(matches!(
        h.orchestrator
            .join(id, "carol", &Role::proposition(), HUMAN)
            .await,
        Err(DebateError::RoleTaken { .. })
    ));
    assert!(matches!(
        h.orchestrator
            .join(id, "carol", &Role::new("judge"), HUMAN)
            .await,
        Err(DebateError::UnknownRole(_))
    ));
    assert!(matches!(
        h.orchestrator.resume(id).await,
        Err(DebateError::WrongPhase { .. })
    ));

    h.orchestrator
        .request_phase(id, Phase::Preparation)
        .await
        .unwrap();
    h.orchestrator.request_phase(id, Phase::Debate).await.unwrap();
    assert_eq!(
        h.orchestrator.submit_speech(id, "alice", "   ").await,
        Err(DebateError::EmptySpeech)
    );
    assert_eq!(
        h.orchestrator.submit_speech(id, "mallory", "Hi").await,
        Err(DebateError::UnknownParticipant("mallory".to_string()))
    );
    assert!(h.session(id).await.speeches.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_needs_two_occupied_roles() {
    let h = Harness::humans();
    let session = h
        .orchestrator
        .create_session(agora_runtime::NewSession::new("Tea beats coffee"))
        .await
        .unwrap();
    h.orchestrator
        .join(session.id, "alice", &Role::proposition(), HUMAN)
        .await
        .unwrap();
    assert_eq!(
        h.orchestrator
            .request_phase(session.id, Phase::Preparation)
            .await
            .unwrap_err(),
        DebateError::NotEnoughParticipants {
            occupied: 1,
            required: 2
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_not_announced() {
    let h = Harness::humans();
    let id = debating(&h).await;
    let mut rx = h.broadcaster.subscribe(id);

    h.store.fail_updates.store(true, Ordering::SeqCst);
    let err = h
        .orchestrator
        .submit_speech(id, "alice", "This will not be saved.")
        .await
        .unwrap_err();
    assert!(matches!(err, DebateError::Storage(_)));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .all(|env| !matches!(env.event, DebateEvent::NewMessage { .. } | DebateEvent::SpeakerChanged { .. })));
    assert!(events
        .iter()
        .any(|env| matches!(env.event, DebateEvent::Error { .. })));

    h.store.fail_updates.store(false, Ordering::SeqCst);
    let session = h.session(id).await;
    assert!(session.speeches.is_empty());
    assert_eq!(session.current_speaker_index, 0);

    // The same speech goes through once the store recovers
    h.orchestrator
        .submit_speech(id, "alice", "This one is saved.")
        .await
        .unwrap();
    assert_eq!(h.session(id).await.speeches.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_finalization_can_be_retried() {
    let h = Harness::humans();
    let id = debating(&h).await;
    let mut rx = h.broadcaster.subscribe(id);

    h.store.fail_completion.store(true, Ordering::SeqCst);
    h.orchestrator.end_debate(id).await.unwrap();
    collect_until(&mut rx, is_phase(Phase::Evaluation)).await;
    // Let the automatic attempt run and fail
    tokio::time::sleep(Duration::from_secs(5)).await;

    let session = h.session(id).await;
    assert_eq!(session.phase, Phase::Evaluation);
    assert!(session.final_result.is_none());
    assert!(matches!(
        h.orchestrator.finalize(id).await,
        Err(DebateError::Finalization(_))
    ));
    assert!(drain(&mut rx)
        .iter()
        .all(|env| !matches!(env.event, DebateEvent::DebateCompleted { .. })));

    h.store.fail_completion.store(false, Ordering::SeqCst);
    let result = h.orchestrator.finalize(id).await.unwrap();
    assert_eq!(result.participants.len(), 2);
    assert_eq!(h.session(id).await.phase, Phase::Completed);

    let events = drain(&mut rx);
    let completions = events
        .iter()
        .filter(|env| matches!(env.event, DebateEvent::DebateCompleted { .. }))
        .count();
    assert_eq!(completions, 1);
    assert!(events.iter().any(|env| matches!(
        env.event,
        DebateEvent::PhaseChanged {
            phase: Phase::Completed,
            automatic: false,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session() {
    let h = Harness::humans();
    let id = uuid::Uuid::new_v4();
    assert_eq!(
        h.orchestrator.submit_speech(id, "alice", "Hello").await,
        Err(DebateError::SessionNotFound(id))
    );
    assert_eq!(
        h.orchestrator.pause(id).await.unwrap_err(),
        DebateError::SessionNotFound(id)
    );
    assert!(h.orchestrator.sessions().is_empty());
}
