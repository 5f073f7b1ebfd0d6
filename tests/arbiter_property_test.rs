//! Property tests for turn gating and status monotonicity.

use std::sync::Arc;

use proptest::prelude::*;
use strictly_chess::{
    MemoryStore, MoveAttempt, MoveDescriptor, Participant, Role, Session, SessionManager,
    SessionStatus, StandardChess, SyncConfig,
};

const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Moves that are legal somewhere in common openings, so a random walk
/// produces a mix of accepted and rejected attempts.
const CANDIDATES: [&str; 14] = [
    "e2e4", "e7e5", "d2d4", "d7d5", "g1f3", "b8c6", "f1c4", "f8c5", "e1g1", "e8g8", "d1h5",
    "g8f6", "h5f7", "e4d5",
];

fn session_document(second: Option<&str>, turn: &str, status: &str) -> Session {
    let second = match second {
        Some(id) => format!(r#"{{"id":"{}","displayName":"Player 2"}}"#, id),
        None => "null".to_string(),
    };
    let document = format!(
        r#"{{
            "id": "game_prop",
            "firstPlayer": {{"id": "alice", "displayName": "Player 1"}},
            "secondPlayer": {},
            "position": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "turn": "{}",
            "status": "{}",
            "moveHistory": [],
            "createdAt": "2026-01-01T00:00:00Z",
            "lastUpdated": "2026-01-01T00:00:00Z",
            "revision": 1
        }}"#,
        second, turn, status
    );
    Session::from_document(&document).expect("Invalid document")
}

fn status_strategy() -> impl Strategy<Value = SessionStatus> {
    prop_oneof![
        Just(SessionStatus::Waiting),
        Just(SessionStatus::Active),
        Just(SessionStatus::Finished),
    ]
}

proptest! {
    #[test]
    fn test_only_side_to_move_may_move(
        second in prop::option::of(prop::sample::select(USERS[1..].to_vec())),
        white_to_move in any::<bool>(),
        status in prop::sample::select(vec!["waiting", "active", "finished"]),
    ) {
        let turn = if white_to_move { "w" } else { "b" };
        let session = session_document(second, turn, status);

        let movers: Vec<&str> = USERS
            .iter()
            .copied()
            .filter(|user| session.may_move(user))
            .collect();
        prop_assert!(movers.len() <= 1);

        for user in USERS {
            let role = session.role_of(user);
            prop_assert_eq!(session.may_move(user), role.side() == Some(*session.turn()));
            if role == Role::Observer || role == Role::Unassigned {
                prop_assert!(!session.may_move(user));
            }
        }
    }

    #[test]
    fn test_advance_never_goes_back(
        statuses in prop::collection::vec(status_strategy(), 1..20),
    ) {
        let mut current = SessionStatus::Waiting;
        for next in statuses {
            let advanced = current.advance_to(next);
            prop_assert!(advanced >= current);
            prop_assert!(advanced >= next);
            current = advanced;
        }
    }

    #[test]
    fn test_random_attempts_keep_invariants(
        attempts in prop::collection::vec((0..USERS.len(), 0..CANDIDATES.len()), 1..30),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime");

        runtime.block_on(async {
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

            for (user_index, move_index) in attempts {
                let user = USERS[user_index];
                let before = manager.load_session(&id).await.expect("Load failed");
                let commits = store.commit_count();
                let descriptor: MoveDescriptor =
                    CANDIDATES[move_index].parse().expect("Invalid descriptor");

                let attempt = manager
                    .submit_move(&id, user, &descriptor)
                    .await
                    .expect("Attempt failed");
                let after = manager.load_session(&id).await.expect("Load failed");

                prop_assert!(*after.status() >= *before.status());
                match attempt {
                    MoveAttempt::Accepted(session) => {
                        prop_assert!(before.may_move(user));
                        prop_assert_eq!(*session.revision(), before.revision() + 1);
                        prop_assert_eq!(session.move_history().len(), before.move_history().len() + 1);
                        prop_assert_eq!(*session.turn(), before.turn().opponent());
                        prop_assert_eq!(store.commit_count(), commits + 1);
                    }
                    MoveAttempt::NotPermitted => {
                        prop_assert!(!before.may_move(user));
                        prop_assert_eq!(&after, &before);
                        prop_assert_eq!(store.commit_count(), commits);
                    }
                    MoveAttempt::Rejected => {
                        prop_assert_eq!(&after, &before);
                        prop_assert_eq!(store.commit_count(), commits);
                    }
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
