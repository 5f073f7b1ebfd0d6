//! Tests for move gating, validation, and write-back.

use std::sync::Arc;

use strictly_chess::{
    MemoryStore, MoveAttempt, MoveDescriptor, Participant, RulesEngine, Session,
    SessionErrorKind, SessionManager, SessionStatus, Side, StandardChess, SyncConfig,
    derive_status,
};

const START_AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

async fn setup_active_game() -> (MemoryStore, SessionManager, String) {
    let store = MemoryStore::new();
    let manager = SessionManager::new(
        Arc::new(store.clone()),
        Arc::new(StandardChess::new()),
        &SyncConfig::default(),
    );
    let created = manager
        .create_session(&Participant::new("alice".to_string(), None))
        .await
        .expect("Create failed");
    let id = created.session().id().clone();
    manager
        .join_session(&id, &Participant::new("bob".to_string(), None))
        .await
        .expect("Join failed");
    (store, manager, id)
}

fn mv(text: &str) -> MoveDescriptor {
    text.parse().expect("Invalid descriptor")
}

async fn play(manager: &SessionManager, id: &str, user: &str, text: &str) -> Session {
    match manager
        .submit_move(id, user, &mv(text))
        .await
        .expect("Move failed")
    {
        MoveAttempt::Accepted(session) => session,
        other => panic!("Expected {} to be accepted, got {:?}", text, other),
    }
}

#[tokio::test]
async fn test_first_move_accepted() {
    let (store, manager, id) = setup_active_game().await;
    let commits = store.commit_count();

    let session = play(&manager, &id, "alice", "e2e4").await;

    assert_eq!(session.move_history(), &vec!["e4".to_string()]);
    assert_eq!(*session.turn(), Side::Black);
    assert_eq!(session.position(), START_AFTER_E4);
    assert_eq!(*session.status(), SessionStatus::Active);
    assert_eq!(*session.revision(), 3);
    assert_eq!(store.commit_count(), commits + 1);

    let stored = manager.load_session(&id).await.expect("Load failed");
    assert_eq!(stored, session);
}

#[tokio::test]
async fn test_out_of_turn_move_not_permitted() {
    let (store, manager, id) = setup_active_game().await;
    let commits = store.commit_count();

    let attempt = manager
        .submit_move(&id, "bob", &mv("e7e5"))
        .await
        .expect("Attempt failed");

    assert_eq!(attempt, MoveAttempt::NotPermitted);
    assert_eq!(store.commit_count(), commits);
}

#[tokio::test]
async fn test_observer_never_permitted() {
    let (store, manager, id) = setup_active_game().await;
    let commits = store.commit_count();

    for text in ["e2e4", "e7e5", "g1f3"] {
        let attempt = manager
            .submit_move(&id, "carol", &mv(text))
            .await
            .expect("Attempt failed");
        assert_eq!(attempt, MoveAttempt::NotPermitted);
    }
    assert_eq!(store.commit_count(), commits);
}

#[tokio::test]
async fn test_waiting_session_black_not_seated() {
    let store = MemoryStore::new();
    let manager = SessionManager::new(
        Arc::new(store.clone()),
        Arc::new(StandardChess::new()),
        &SyncConfig::default(),
    );
    let created = manager
        .create_session(&Participant::new("alice".to_string(), None))
        .await
        .expect("Create failed");
    let id = created.session().id().clone();

    // White may open before the opponent arrives.
    let session = play(&manager, &id, "alice", "e2e4").await;
    assert_eq!(*session.status(), SessionStatus::Waiting);

    let attempt = manager
        .submit_move(&id, "alice", &mv("e7e5"))
        .await
        .expect("Attempt failed");
    assert_eq!(attempt, MoveAttempt::NotPermitted);
}

#[tokio::test]
async fn test_illegal_move_rejected() {
    let (store, manager, id) = setup_active_game().await;
    let commits = store.commit_count();

    let attempt = manager
        .submit_move(&id, "alice", &mv("e2e5"))
        .await
        .expect("Attempt failed");

    assert_eq!(attempt, MoveAttempt::Rejected);
    assert_eq!(store.commit_count(), commits);
}

#[tokio::test]
async fn test_checkmate_finishes_game() {
    let (_store, manager, id) = setup_active_game().await;

    play(&manager, &id, "alice", "e2e4").await;
    play(&manager, &id, "bob", "e7e5").await;
    play(&manager, &id, "alice", "d1h5").await;
    play(&manager, &id, "bob", "b8c6").await;
    play(&manager, &id, "alice", "f1c4").await;
    play(&manager, &id, "bob", "g8f6").await;
    let session = play(&manager, &id, "alice", "h5f7").await;

    assert_eq!(*session.status(), SessionStatus::Finished);
    assert_eq!(session.move_history().last().map(String::as_str), Some("Qxf7#"));

    let rules = StandardChess::new();
    let report = derive_status(&rules, session.position(), session.move_history())
        .expect("Status failed");
    assert_eq!(report.message(), "Checkmate! White wins!");
    assert!(report.is_game_over());

    let after = manager
        .submit_move(&id, "bob", &mv("e8e7"))
        .await
        .expect("Attempt failed");
    assert_eq!(after, MoveAttempt::Rejected);
}

#[tokio::test]
async fn test_stale_snapshot_conflicts() {
    let (store, manager, id) = setup_active_game().await;
    let stale = manager.load_session(&id).await.expect("Load failed");

    play(&manager, &id, "alice", "e2e4").await;
    let commits = store.commit_count();

    let err = manager
        .moves()
        .attempt_move(&stale, "alice", &mv("d2d4"))
        .await
        .expect_err("Stale write should fail");

    assert!(matches!(
        err.kind,
        SessionErrorKind::RevisionConflict {
            expected: 2,
            actual: 3
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(store.commit_count(), commits);
}

#[tokio::test]
async fn test_move_surfaces_persistence_failure() {
    let (store, manager, id) = setup_active_game().await;
    store.fail_next_commits(1);

    let err = manager
        .submit_move(&id, "alice", &mv("e2e4"))
        .await
        .expect_err("Move should fail");
    assert!(matches!(err.kind, SessionErrorKind::Persistence(_)));

    let stored = manager.load_session(&id).await.expect("Load failed");
    assert!(stored.move_history().is_empty());
}

#[tokio::test]
async fn test_history_replays_to_position() {
    let (_store, manager, id) = setup_active_game().await;

    play(&manager, &id, "alice", "e2e4").await;
    play(&manager, &id, "bob", "e7e5").await;
    play(&manager, &id, "alice", "g1f3").await;
    play(&manager, &id, "bob", "b8c6").await;
    play(&manager, &id, "alice", "f1c4").await;
    play(&manager, &id, "bob", "f8c5").await;
    let session = play(&manager, &id, "alice", "e1g1").await;

    assert_eq!(session.move_history().last().map(String::as_str), Some("O-O"));

    let rules = StandardChess::new();
    let replayed = rules.replay(session.move_history()).expect("Replay failed");
    assert_eq!(&replayed, session.position());
}

#[tokio::test]
async fn test_status_message_tracks_turn() {
    let (_store, manager, id) = setup_active_game().await;
    let rules = StandardChess::new();

    let session = manager.load_session(&id).await.expect("Load failed");
    let report = derive_status(&rules, session.position(), session.move_history())
        .expect("Status failed");
    assert_eq!(report.message(), "White's turn");

    let session = play(&manager, &id, "alice", "e2e4").await;
    let report = derive_status(&rules, session.position(), session.move_history())
        .expect("Status failed");
    assert_eq!(report.message(), "Black's turn");
    assert_eq!(*report.turn(), Side::Black);
}

#[tokio::test]
async fn test_threefold_repetition_finishes_game() {
    let (store, manager, id) = setup_active_game().await;
    let shuffle = [
        ("alice", "g1f3"),
        ("bob", "g8f6"),
        ("alice", "f3g1"),
        ("bob", "f6g8"),
        ("alice", "g1f3"),
        ("bob", "g8f6"),
        ("alice", "f3g1"),
    ];
    for (user, text) in shuffle {
        let session = play(&manager, &id, user, text).await;
        assert_eq!(*session.status(), SessionStatus::Active);
    }

    let attempt = manager
        .submit_move(&id, "bob", &mv("f6g8"))
        .await
        .expect("Move failed");
    assert!(attempt.is_accepted());
    let MoveAttempt::Accepted(session) = attempt else {
        unreachable!("checked above");
    };

    assert_eq!(*session.status(), SessionStatus::Finished);
    assert_eq!(session.move_history().len(), 8);

    let rules = StandardChess::new();
    let report = derive_status(&rules, session.position(), session.move_history())
        .expect("Status failed");
    assert_eq!(report.message(), "Game ended by threefold repetition");
    assert!(report.terminal().as_ref().is_some_and(|t| t.is_draw()));

    let commits = store.commit_count();
    let after = manager
        .submit_move(&id, "alice", &mv("g1f3"))
        .await
        .expect("Attempt failed");
    assert!(!after.is_accepted());
    assert_eq!(after, MoveAttempt::Rejected);
    assert_eq!(store.commit_count(), commits);
}
